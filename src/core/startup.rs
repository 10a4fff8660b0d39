use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::blockchains::cosmos::storage::{ChainStore, ClickhouseStore, InMemoryStore};
use crate::core::config::{AppConfig, LogFormat, StorageKind};

/// fmt subscriber filtered by RUST_LOG, info by default
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    let result = match format {
        LogFormat::Text => builder.with_ansi(true).try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if let Err(e) = result {
        eprintln!("Could not install tracing subscriber: {}", e);
    }
}

/// Loads the config, installing the configured log format. Any failure is
/// logged and ends the process.
pub fn load_config_or_exit(path: &str) -> AppConfig {
    match AppConfig::load(path) {
        Ok(config) => {
            init_tracing(config.general.log_format);
            info!("[main] Config loaded from {}", path);
            config
        }
        Err(e) => {
            init_tracing(LogFormat::Text);
            exit_with(&anyhow::Error::new(e), "Invalid configuration");
        }
    }
}

pub async fn build_store(kind: StorageKind) -> anyhow::Result<Arc<dyn ChainStore>> {
    match kind {
        StorageKind::Memory => {
            info!("[main] Using in-memory storage");
            Ok(Arc::new(InMemoryStore::new()))
        }
        StorageKind::Clickhouse => {
            let store = ClickhouseStore::from_env().context("Could not configure ClickHouse")?;
            store.ensure_schema().await?;
            info!("[main] Using ClickHouse storage");
            Ok(Arc::new(store))
        }
    }
}

pub fn rpc_timeout(config: &AppConfig) -> Duration {
    Duration::from_secs(config.general.rpc_timeout_seconds)
}

/// Logs the error with its cause chain and exits with status 1
pub fn exit_with(err: &anyhow::Error, what: &str) -> ! {
    error!("{}:", what);
    for (i, cause) in err.chain().enumerate() {
        error!("  {}: {}", i, cause);
    }
    std::process::exit(1);
}
