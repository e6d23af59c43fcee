use anyhow::Context;
use mock_image_backend::app;
use mock_image_backend::config::MockConfig;
use mock_image_backend::gateway::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = MockConfig::from_env().context("failed to load configuration")?;
    info!(
        name = %config.name,
        port = config.port,
        delay_min_ms = config.delay_min_ms,
        delay_max_ms = config.delay_max_ms,
        error_rate = config.error_rate,
        timeout_rate = config.timeout_rate,
        "Loaded mock backend configuration"
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = Arc::new(AppState::new(config));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Mock image backend listening on {}", addr);

    axum::serve(listener, app(state)).await?;
    Ok(())
}
