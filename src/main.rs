//! longpoll-relay server entry point.

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use longpoll_relay::adapters::http::app_router;
use longpoll_relay::config::AppConfig;
use longpoll_relay::domain::relay::ConnectionRegistry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    // RUST_LOG wins over the configured directive
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.server.log_level))?;
    if config.server.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!("longpoll-relay v{} starting", env!("CARGO_PKG_VERSION"));

    let registry = ConnectionRegistry::new(config.relay.relay_config());
    let app = app_router(&config, registry.clone());

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        poll_path = %config.relay.poll_path,
        idle_timeout_secs = config.relay.idle_timeout_secs,
        "listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(err) = registry.disconnect_all() {
        tracing::warn!(error = %err, "disconnect listeners failed during shutdown");
    }
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
