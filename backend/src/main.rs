use std::{sync::Arc, time::Duration};

use anyhow::Result;
use backend::{
    app::AppServices,
    axum_http::http_serve,
    config::config_loader,
};
use crates::infra::{cache::memory_cache::MemoryCache, db::postgres::postgres_connection};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        error!("Backend exited with error: {:#}", error);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    crates::observability::init_observability("backend")?;

    let dotenvy_env = config_loader::load()?;
    let stage = config_loader::get_stage();
    info!(%stage, "ENV has been loaded");

    let postgres_pool = postgres_connection::establish_connection(
        &dotenvy_env.database.url,
        dotenvy_env.database.max_connections,
    )?;
    info!("Postgres connection has been established");

    let cache = Arc::new(MemoryCache::new());
    Arc::clone(&cache).spawn_sweeper(Duration::from_secs(
        dotenvy_env.cache.sweep_interval_seconds.max(1),
    ));

    let (services, side_effect_rx) =
        AppServices::build(&dotenvy_env, Arc::new(postgres_pool), cache)?;
    let side_effects = tokio::spawn(Arc::clone(&services.side_effect_runner).run(side_effect_rx));

    let services = Arc::new(services);
    http_serve::start(Arc::new(dotenvy_env), Arc::clone(&services), stage).await?;

    // Dropping the services closes the queue so the runner can drain.
    drop(services);
    if let Err(err) = side_effects.await {
        error!(error = %err, "side effect runner panicked");
    }
    info!("Backend stopped");

    Ok(())
}
