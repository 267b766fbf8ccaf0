//! Server configuration

use riskgate_sdk::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host
    pub host: String,

    /// Server port (HTTP)
    pub port: u16,

    /// Shared secret for webhook signatures
    pub webhook_secret: String,

    /// Maximum age of a signed webhook timestamp
    pub signature_tolerance_secs: i64,

    /// Redis cache; in-memory cache when unset
    pub redis_url: Option<String>,

    /// Postgres store; in-memory store when unset
    pub database_url: Option<String>,

    pub database_max_connections: u32,

    /// JSON geo-ip range table. Without one the geolocation detector abstains.
    pub geoip_path: Option<PathBuf>,

    pub log_format: LogFormat,

    /// Pipeline tunables
    pub engine: EngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            webhook_secret: String::new(),
            signature_tolerance_secs: 300,
            redis_url: None,
            database_url: None,
            database_max_connections: 10,
            geoip_path: None,
            log_format: LogFormat::Text,
            engine: EngineConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables and config file
    pub fn load() -> anyhow::Result<Self> {
        // Load .env file if exists
        dotenvy::dotenv().ok();

        let config_result = config::Config::builder()
            .add_source(config::File::with_name("config/server").required(false))
            .add_source(
                config::Environment::with_prefix("RISKGATE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build();

        let config: Self = match config_result {
            Ok(cfg) => cfg
                .try_deserialize()
                .map_err(|e| anyhow::anyhow!("Failed to deserialize config: {}", e))?,
            Err(e) => {
                tracing::info!("No usable config sources ({}), using defaults", e);
                Self::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.webhook_secret.trim().is_empty() {
            anyhow::bail!("webhook_secret must be set (RISKGATE_WEBHOOK_SECRET)");
        }
        if self.signature_tolerance_secs <= 0 {
            anyhow::bail!("signature_tolerance_secs must be positive");
        }
        self.engine.validate()?;
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
