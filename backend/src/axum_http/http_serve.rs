use crate::{
    axum_http::{
        default_routers,
        internal_auth::{InternalToken, require_internal_token},
        routers,
    },
    config::config_model::DotEnvyConfig,
};
use anyhow::Result;
use axum::{
    Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    middleware,
    routing::get,
};
use infra::postgres::postgres_connection::PgPoolSquad;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

pub async fn start(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Result<()> {
    let mut app = Router::new()
        .fallback(default_routers::not_found)
        .nest(
            "/api/v1/webhooks",
            routers::usage_webhook::routes(Arc::clone(&config), Arc::clone(&db_pool)),
        )
        .nest(
            "/api/v1/payment",
            routers::payment_callback::routes(Arc::clone(&config), Arc::clone(&db_pool)),
        )
        .route("/api/v1/health-check", get(default_routers::health_check));

    match config.internal.admin_token.as_deref() {
        Some(token) => {
            app = app.nest(
                "/internal/v1",
                internal_routes(&config, &db_pool).route_layer(middleware::from_fn_with_state(
                    InternalToken::new(token),
                    require_internal_token,
                )),
            );
        }
        None => warn!("http_serve: INTERNAL_ADMIN_TOKEN is not set, internal API disabled"),
    }

    let app = app
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.backend_server.timeout,
        )))
        .layer(RequestBodyLimitLayer::new(
            (config.backend_server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.backend_server.port));
    let listener = TcpListener::bind(addr).await?;

    info!("Server is running on port {}", config.backend_server.port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn internal_routes(config: &Arc<DotEnvyConfig>, db_pool: &Arc<PgPoolSquad>) -> Router {
    Router::new()
        .nest(
            "/credits",
            routers::credits::routes(Arc::clone(config), Arc::clone(db_pool)),
        )
        .nest(
            "/subscriptions",
            routers::subscriptions::routes(Arc::clone(config), Arc::clone(db_pool)),
        )
        .nest(
            "/orders",
            routers::orders::routes(Arc::clone(config), Arc::clone(db_pool)),
        )
        .nest(
            "/usage",
            routers::usage_records::routes(Arc::clone(config), Arc::clone(db_pool)),
        )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("Failed to install SIGTERM signal handler");
        sigterm.recv().await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
