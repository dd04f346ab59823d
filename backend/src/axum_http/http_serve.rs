use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Result;
use axum::{
    Extension, Router,
    http::{
        HeaderName, HeaderValue, Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    middleware,
    routing::get,
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::{
    app::AppServices,
    axum_http::{
        default_routers,
        error_responses::{REQUEST_ID_HEADER, render_api_errors},
        routers::{self, user::UserState},
    },
    config::{config_model::DotEnvyConfig, stage::Stage},
};

pub fn build_router(config: &DotEnvyConfig, services: &AppServices, stage: Stage) -> Result<Router> {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    let qr_codes = Router::new()
        .merge(routers::qr_codes::routes(Arc::clone(&services.qr_codes)))
        .merge(routers::bulk::routes(Arc::clone(&services.bulk)))
        .merge(routers::scans::routes(Arc::clone(&services.scans)));

    let app = Router::new()
        .fallback(default_routers::not_found)
        .nest("/api/qr-codes", qr_codes)
        .nest(
            "/api/billing",
            routers::billing_webhook::routes(Arc::clone(&services.billing_webhook)),
        )
        .nest(
            "/api/v1/webhooks",
            routers::webhooks_v1::routes(Arc::clone(&services.webhook_outbox)),
        )
        .nest("/api/api-keys", routers::api_keys::routes(Arc::clone(&services.api_keys)))
        .nest(
            "/api/user",
            routers::user::routes(UserState {
                credits: Arc::clone(&services.credits),
                entitlements: Arc::clone(&services.entitlements),
            }),
        )
        .nest("/api/admin", routers::admin::routes(Arc::clone(&services.credits)))
        .route("/api/health-check", get(default_routers::health_check))
        .layer(Extension(Arc::clone(&services.session_verifier)))
        .layer(Extension(Arc::clone(&services.api_keys)))
        .layer(Extension(Arc::clone(&services.rate_limiter)))
        .layer(middleware::from_fn_with_state(stage, render_api_errors))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.backend_server.timeout,
        )))
        .layer(RequestBodyLimitLayer::new(
            (config.backend_server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(cors_layer(&config.backend_server.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid));

    Ok(app)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::PUT,
            Method::DELETE,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "cors: ignoring invalid origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(origins)
    }
}

pub async fn start(config: Arc<DotEnvyConfig>, services: Arc<AppServices>, stage: Stage) -> Result<()> {
    let app = build_router(&config, &services, stage)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.backend_server.port));
    let listener = TcpListener::bind(addr).await?;

    info!(%stage, "Server is running on port {}", config.backend_server.port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
