//! RiskGate HTTP Server
//!
//! Receives payment provider webhooks and serves rule and trust-score administration.

use anyhow::Result;
use riskgate_server::config::{LogFormat, ServerConfig};
use riskgate_server::{api, engine};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration before tracing so the log format can be applied
    let config = ServerConfig::load()?;
    init_tracing(config.log_format)?;
    info!(
        "Loaded configuration: host={}, port={}, redis={}, database={}, geoip={:?}",
        config.host,
        config.port,
        config.redis_url.is_some(),
        config.database_url.is_some(),
        config.geoip_path
    );

    let backends = engine::connect_backends(&config).await?;
    let state = engine::init_state(&config, backends)?;
    let detector = state.detector.clone();
    info!("Fraud pipeline initialized");

    let app = api::create_router(state);

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);
    info!("  Health check: http://{}/health", addr);
    info!("  Webhooks: POST http://{}/v1/webhooks/{{provider}}", addr);
    info!("  Metrics: http://{}/metrics", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Give in-flight trust updates a chance to land
    if !detector
        .jobs()
        .drain(std::time::Duration::from_secs(10))
        .await
    {
        tracing::warn!("Shutting down with {} pending jobs", detector.jobs().pending());
    }
    Ok(())
}

/// Initialize tracing subscriber
fn init_tracing(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "riskgate_server=info,riskgate_sdk=info,riskgate_runtime=info,tower_http=debug".into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
