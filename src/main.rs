use axum::routing::{get, post};
use axum::Router;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use centavo::config::AppConfig;
use centavo::handlers;
use centavo::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(%err, "configuration rejected");
            std::process::exit(1);
        }
    };

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config)
        .await
        .expect("failed to build application state");

    let app = Router::new()
        .route("/payments", post(handlers::create_payment))
        .route(
            "/payments-summary",
            get(handlers::payments_summary).delete(handlers::purge_payments),
        )
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("failed to bind listener");
    info!(addr = %bind_addr, "payment gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received, draining");
}
