use serde::Deserialize;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("No chains configured")]
    NoChains,

    #[error("Chain {0} is configured more than once")]
    DuplicateChain(String),

    #[error("Chain {chain_id} has no {surface} nodes configured")]
    NoNodes {
        chain_id: String,
        surface: &'static str,
    },

    #[error("Chain {chain_id} has a zero interval for {module}")]
    ZeroInterval {
        chain_id: String,
        module: &'static str,
    },

    #[error("Chain {0} not found in config")]
    UnknownChain(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Memory,
    Clickhouse,
}

/// Which smart-contract runtime a chain runs, drives executed-contract extraction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContractFeature {
    #[default]
    None,
    SecretWasm,
    Cosmwasm,
}

/// How the LCD tx search endpoint expects the height filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxSearchStyle {
    /// cosmos-sdk >= 0.47: `query=tx.height=N&page=P&limit=L`
    #[default]
    Query,
    /// older cosmos-sdk: `events=tx.height=N&pagination.offset=O&pagination.limit=L`
    Events,
}

/// General configuration for the explorer
#[derive(Debug, Deserialize, Clone)]
pub struct GeneralConfig {
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default = "default_rpc_timeout")]
    pub rpc_timeout_seconds: u64,
    #[serde(default)]
    pub storage: StorageKind,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    pub address: String,
    pub port: u16,
    pub path: String,
}

/// Node configuration for RPC and LCD endpoints
#[derive(Debug, Deserialize, Clone)]
pub struct NodeConfig {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NodesConfig {
    pub rpc: Vec<NodeConfig>,
    #[serde(default)]
    pub lcd: Vec<NodeConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default = "default_sync_interval")]
    pub interval: u64,
    #[serde(default)]
    pub tx_search: TxSearchStyle,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: default_sync_interval(),
            tx_search: TxSearchStyle::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RefreshConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_refresh_interval")]
    pub interval: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: default_refresh_interval(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PruningConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_refresh_interval")]
    pub interval: u64,
    /// Number of most recent heights kept
    #[serde(default = "default_keep_blocks")]
    pub keep_blocks: u64,
}

impl Default for PruningConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: default_refresh_interval(),
            keep_blocks: default_keep_blocks(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChainConfig {
    pub chain_id: String,
    pub name: String,
    pub bech32_prefix: String,
    #[serde(default)]
    pub contracts_feature: ContractFeature,
    #[serde(default)]
    pub start_height: Option<u64>,
    pub nodes: NodesConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub validators: RefreshConfig,
    #[serde(default)]
    pub proposals: RefreshConfig,
    #[serde(default)]
    pub contracts: RefreshConfig,
    #[serde(default)]
    pub pruning: PruningConfig,
}

/// Top-level config struct for the explorer
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub chains: Vec<ChainConfig>,
}

impl AppConfig {
    /// Reads, parses and validates a YAML config file
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_yaml(&raw, path)
    }

    pub fn from_yaml(raw: &str, path: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_yaml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chains.is_empty() {
            return Err(ConfigError::NoChains);
        }

        let mut seen = HashSet::new();
        for chain in &self.chains {
            if !seen.insert(chain.chain_id.as_str()) {
                return Err(ConfigError::DuplicateChain(chain.chain_id.clone()));
            }
            if chain.nodes.rpc.is_empty() {
                return Err(ConfigError::NoNodes {
                    chain_id: chain.chain_id.clone(),
                    surface: "rpc",
                });
            }
            if chain.nodes.lcd.is_empty() {
                return Err(ConfigError::NoNodes {
                    chain_id: chain.chain_id.clone(),
                    surface: "lcd",
                });
            }
            let intervals = [
                ("sync", chain.sync.enabled, chain.sync.interval),
                ("validators", chain.validators.enabled, chain.validators.interval),
                ("proposals", chain.proposals.enabled, chain.proposals.interval),
                ("contracts", chain.contracts.enabled, chain.contracts.interval),
                ("pruning", chain.pruning.enabled, chain.pruning.interval),
            ];
            for (module, enabled, interval) in intervals {
                if enabled && interval == 0 {
                    return Err(ConfigError::ZeroInterval {
                        chain_id: chain.chain_id.clone(),
                        module,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn find_chain(&self, chain_id: &str) -> Result<&ChainConfig, ConfigError> {
        self.chains
            .iter()
            .find(|chain| chain.chain_id == chain_id)
            .ok_or_else(|| ConfigError::UnknownChain(chain_id.to_string()))
    }
}

impl NodesConfig {
    pub fn rpc_urls(&self) -> Vec<String> {
        self.rpc.iter().map(|n| n.url.clone()).collect()
    }

    pub fn lcd_urls(&self) -> Vec<String> {
        self.lcd.iter().map(|n| n.url.clone()).collect()
    }
}

fn enabled() -> bool {
    true
}

fn default_rpc_timeout() -> u64 {
    15
}

fn default_sync_interval() -> u64 {
    30
}

fn default_refresh_interval() -> u64 {
    300
}

fn default_keep_blocks() -> u64 {
    100_000
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
general:
  metrics:
    address: 0.0.0.0
    port: 9100
    path: /metrics
  storage: clickhouse
chains:
  - chain_id: secret-4
    name: secret
    bech32_prefix: secret
    contracts_feature: secret-wasm
    start_height: 100
    nodes:
      rpc:
        - name: primary
          url: http://rpc-1:26657
        - name: backup
          url: http://rpc-2:26657/
      lcd:
        - name: primary
          url: http://lcd-1:1317
    contracts:
      enabled: true
      interval: 120
"#;

    #[test]
    fn parses_chain_config_with_defaults() {
        let config = AppConfig::from_yaml(CONFIG, "test.yaml").unwrap();
        assert_eq!(config.general.rpc_timeout_seconds, 15);
        assert_eq!(config.general.log_format, LogFormat::Text);
        assert_eq!(config.general.storage, StorageKind::Clickhouse);

        let chain = config.find_chain("secret-4").unwrap();
        assert_eq!(chain.contracts_feature, ContractFeature::SecretWasm);
        assert_eq!(chain.start_height, Some(100));
        assert!(chain.sync.enabled);
        assert_eq!(chain.sync.interval, 30);
        assert_eq!(chain.sync.tx_search, TxSearchStyle::Query);
        assert!(!chain.validators.enabled);
        assert_eq!(chain.contracts.interval, 120);
        assert_eq!(
            chain.nodes.rpc_urls(),
            vec!["http://rpc-1:26657", "http://rpc-2:26657/"]
        );
    }

    #[test]
    fn unknown_chain_is_a_config_error() {
        let config = AppConfig::from_yaml(CONFIG, "test.yaml").unwrap();
        assert!(matches!(
            config.find_chain("cosmoshub-4"),
            Err(ConfigError::UnknownChain(id)) if id == "cosmoshub-4"
        ));
    }

    #[test]
    fn rejects_chain_without_lcd_nodes() {
        let raw = CONFIG.replace(
            "      lcd:\n        - name: primary\n          url: http://lcd-1:1317\n",
            "      lcd: []\n",
        );
        let err = AppConfig::from_yaml(&raw, "test.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::NoNodes { surface: "lcd", .. }));
    }

    #[test]
    fn rejects_zero_interval_on_enabled_module() {
        let raw = CONFIG.replace("interval: 120", "interval: 0");
        let err = AppConfig::from_yaml(&raw, "test.yaml").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ZeroInterval {
                module: "contracts",
                ..
            }
        ));
    }

    #[test]
    fn example_config_is_valid() {
        let raw = include_str!("../../config.example.yaml");
        let config = AppConfig::from_yaml(raw, "config.example.yaml").unwrap();
        let chain = config.find_chain("secret-4").unwrap();
        assert!(chain.validators.enabled);
        assert!(!chain.pruning.enabled);
    }
}
