use std::env;
use anyhow::{bail, Context, Result};

/// Connection settings for the Spanner backend
#[derive(Debug, Clone)]
pub struct SpannerConfig {
    pub emulator_host: Option<String>,
    pub project: String,
    pub instance: String,
    pub database: String,
}

/// Which key-value backend holds codes and claims
#[derive(Debug, Clone)]
pub enum StoreConfig {
    Memory,
    Spanner(SpannerConfig),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub admin_secret: Option<String>,
    pub store: StoreConfig,
    pub service_port: u16,
    pub service_host: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let admin_secret = env::var("ADMIN_SECRET")
            .ok()
            .filter(|secret| !secret.is_empty());

        let backend = env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "spanner".to_string());

        let store = match backend.as_str() {
            "memory" => StoreConfig::Memory,
            "spanner" => StoreConfig::Spanner(SpannerConfig::from_env()?),
            other => bail!("STORE_BACKEND must be one of: memory, spanner, got '{}'", other),
        };

        let service_port = env::var("SERVICE_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .context("SERVICE_PORT must be a valid port number (0-65535)")?;

        let service_host = env::var("SERVICE_HOST")
            .unwrap_or_else(|_| "0.0.0.0".to_string());

        Ok(Config {
            admin_secret,
            store,
            service_port,
            service_host,
        })
    }

    pub fn log_startup(&self) {
        tracing::info!("Configuration loaded:");
        let secret_state = if self.admin_secret.is_some() {
            "configured"
        } else {
            "not set (admin API disabled)"
        };
        tracing::info!("  Admin secret: {}", secret_state);
        match &self.store {
            StoreConfig::Memory => {
                tracing::info!("  Store backend: memory (state is lost on restart)");
            }
            StoreConfig::Spanner(spanner) => {
                tracing::info!("  Store backend: spanner");
                tracing::info!("  Spanner emulator: {}",
                    spanner.emulator_host.as_deref().unwrap_or("disabled (using production)"));
                tracing::info!("  Spanner project: {}", spanner.project);
                tracing::info!("  Spanner instance: {}", spanner.instance);
                tracing::info!("  Spanner database: {}", spanner.database);
            }
        }
        tracing::info!("  Service listening on: {}:{}", self.service_host, self.service_port);
    }
}

impl SpannerConfig {
    fn from_env() -> Result<Self> {
        let emulator_host = env::var("SPANNER_EMULATOR_HOST").ok();

        let project = env::var("SPANNER_PROJECT")
            .context("SPANNER_PROJECT environment variable is required")?;

        let instance = env::var("SPANNER_INSTANCE")
            .context("SPANNER_INSTANCE environment variable is required")?;

        let database = env::var("SPANNER_DATABASE")
            .context("SPANNER_DATABASE environment variable is required")?;

        Ok(SpannerConfig {
            emulator_host,
            project,
            instance,
            database,
        })
    }
}
