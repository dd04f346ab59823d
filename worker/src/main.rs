use std::{sync::Arc, time::Duration};

use anyhow::Result;
use backend::usecases::{
    access::AccessPolicy, entitlements::EntitlementsUseCase, webhook_outbox::WebhookOutboxUseCase,
};
use chrono::Utc;
use crates::{
    domain::repositories::{
        cache::CacheStore, rate_limits::RateLimitRepository, subscriptions::SubscriptionRepository,
        users::UserRepository,
    },
    infra::{
        cache::memory_cache::MemoryCache,
        db::{
            postgres::postgres_connection,
            repositories::{
                organizations::OrganizationPostgres, qr_code_scans::QrCodeScanPostgres,
                qr_codes::QrCodePostgres, rate_limits::RateLimitPostgres,
                subscriptions::SubscriptionPostgres, users::UserPostgres,
                webhook_logs::WebhookLogPostgres,
            },
        },
        webhooks::http_dispatcher::HttpWebhookDispatcher,
    },
};
use tracing::{error, info};
use worker::{
    axum_http, config,
    services::worker_loop::run_periodic,
    usecases::{
        downgrade_lapsed_subscriptions::DowngradeLapsedSubscriptionsUseCase,
        prune_rate_limits::PruneRateLimitsUseCase,
    },
};

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(error) = run().await {
        error!("Worker exited with error: {}", error);
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    crates::observability::init_observability("worker")?;

    let dotenvy_env = Arc::new(config::config_loader::load()?);
    info!("ENV has been loaded");

    let postgres_pool = postgres_connection::establish_connection(
        &dotenvy_env.database.url,
        dotenvy_env.database.max_connections,
    )?;
    info!("Postgres connection has been established");

    let db_pool_arc = Arc::new(postgres_pool);
    let schedule = dotenvy_env.schedule.clone();

    let memory_cache = Arc::new(MemoryCache::new());
    let cache_sweeper = Arc::clone(&memory_cache)
        .spawn_sweeper(Duration::from_secs(schedule.cache_sweep_interval));
    let cache: Arc<dyn CacheStore> = memory_cache;

    let users: Arc<dyn UserRepository + Send + Sync> =
        Arc::new(UserPostgres::new(Arc::clone(&db_pool_arc)));
    let qr_codes = Arc::new(QrCodePostgres::new(Arc::clone(&db_pool_arc)));

    let entitlements = Arc::new(EntitlementsUseCase::new(
        Arc::clone(&users),
        qr_codes.clone(),
        Arc::new(QrCodeScanPostgres::new(Arc::clone(&db_pool_arc))),
        Arc::clone(&cache),
    ));
    let webhook_outbox = Arc::new(WebhookOutboxUseCase::new(
        qr_codes,
        Arc::new(WebhookLogPostgres::new(Arc::clone(&db_pool_arc))),
        Arc::new(HttpWebhookDispatcher::new(Duration::from_secs(
            dotenvy_env.outbound_webhooks.timeout_seconds,
        ))?),
        entitlements,
        Arc::new(AccessPolicy::new(Arc::new(OrganizationPostgres::new(
            Arc::clone(&db_pool_arc),
        )))),
        dotenvy_env.outbound_webhooks.max_attempts,
    ));

    let webhook_retry_loop = tokio::spawn(run_periodic(
        "webhook_retry",
        Duration::from_secs(schedule.webhook_retry_interval),
        move || {
            let webhook_outbox = Arc::clone(&webhook_outbox);
            async move {
                let attempted = webhook_outbox.retry_due().await?;
                if attempted > 0 {
                    info!(attempted, "webhook_retry: redelivered failed webhooks");
                }
                Ok(())
            }
        },
    ));

    let subscriptions: Arc<dyn SubscriptionRepository + Send + Sync> =
        Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool_arc)));
    let downgrade_usecase = Arc::new(DowngradeLapsedSubscriptionsUseCase::new(
        subscriptions,
        users,
        Arc::clone(&cache),
    ));
    let grace_downgrade_loop = tokio::spawn(run_periodic(
        "grace_downgrade",
        Duration::from_secs(schedule.grace_downgrade_interval),
        move || {
            let downgrade_usecase = Arc::clone(&downgrade_usecase);
            async move {
                let result = downgrade_usecase.run(Utc::now()).await?;
                if result.scanned > 0 {
                    info!(
                        scanned = result.scanned,
                        downgraded = result.downgraded,
                        skipped = result.skipped,
                        failed = result.failed,
                        "grace_downgrade: run finished"
                    );
                }
                Ok(())
            }
        },
    ));

    let rate_limit_repository: Arc<dyn RateLimitRepository + Send + Sync> =
        Arc::new(RateLimitPostgres::new(Arc::clone(&db_pool_arc)));
    let prune_usecase = Arc::new(PruneRateLimitsUseCase::new(
        rate_limit_repository,
        schedule.rate_limit_retention_hours,
    ));
    let rate_limit_prune_loop = tokio::spawn(run_periodic(
        "rate_limit_prune",
        Duration::from_secs(schedule.rate_limit_prune_interval),
        move || {
            let prune_usecase = Arc::clone(&prune_usecase);
            async move {
                prune_usecase.run(Utc::now()).await?;
                Ok(())
            }
        },
    ));

    let health_server = tokio::spawn(axum_http::http_serve::start(Arc::clone(&dotenvy_env)));

    info!("Worker started");

    // The health server is the only task that returns on its own (graceful shutdown).
    tokio::select! {
        result = health_server => result??,
        result = webhook_retry_loop => result??,
        result = grace_downgrade_loop => result??,
        result = rate_limit_prune_loop => result??,
        result = cache_sweeper => result?,
    };

    info!("Worker stopped");
    Ok(())
}
