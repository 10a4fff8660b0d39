use thiserror::Error;

use crate::core::clients::http_client::PoolError;

pub mod address;
pub mod block;
pub mod contracts;
pub mod events;
pub mod messages;
pub mod metrics;
pub mod proposals;
pub mod proto;
pub mod prune;
pub mod storage;
pub mod supervisor;
pub mod sync;
pub mod tx;
pub mod types;
pub mod validators;

use address::AddressError;
use proto::ProtoError;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("Node serves chain {actual}, expected {expected}")]
    ChainMismatch { expected: String, actual: String },

    #[error("Block {height} declares {declared} transactions but tx search returned {found}")]
    TxCountMismatch {
        height: u64,
        declared: u64,
        found: u64,
    },

    #[error("Nodes only keep history from height {earliest}, sync needs {start}")]
    HistoryPruned { earliest: u64, start: u64 },

    #[error("Asked for height {requested}, node answered with {returned}")]
    UnexpectedHeight { requested: u64, returned: u64 },

    #[error("Tx search for height {height} returned {txs} txs and {responses} responses")]
    MalformedTxSearch {
        height: u64,
        txs: usize,
        responses: usize,
    },

    #[error("Could not decode {what}: {source}")]
    Decode {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid number {value} in {field}")]
    InvalidNumber { field: &'static str, value: String },

    #[error(transparent)]
    Proto(#[from] ProtoError),

    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl SyncError {
    /// Short label for the errors metric
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Pool(_) => "pool",
            SyncError::ChainMismatch { .. } => "chain_mismatch",
            SyncError::TxCountMismatch { .. } => "tx_count_mismatch",
            SyncError::HistoryPruned { .. } => "history_pruned",
            SyncError::UnexpectedHeight { .. } => "unexpected_height",
            SyncError::MalformedTxSearch { .. } => "malformed_tx_search",
            SyncError::Decode { .. } => "decode",
            SyncError::InvalidNumber { .. } => "invalid_number",
            SyncError::Proto(_) => "proto",
            SyncError::Address(_) => "address",
            SyncError::Storage(_) => "storage",
        }
    }
}

pub(crate) fn parse_height(field: &'static str, value: &str) -> Result<u64, SyncError> {
    crate::core::utils::parse_u64(value).map_err(|_| SyncError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use mockito::Matcher;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;

    use crate::core::app_context::ChainContext;
    use crate::core::config::{ChainConfig, ContractFeature, NodeConfig, NodesConfig};

    use super::storage::InMemoryStore;

    pub const CHAIN_ID: &str = "test-1";

    pub fn chain_config(rpc: Vec<String>, lcd: Vec<String>, feature: ContractFeature) -> ChainConfig {
        let nodes = |urls: Vec<String>| {
            urls.into_iter()
                .enumerate()
                .map(|(i, url)| NodeConfig {
                    name: format!("node-{}", i),
                    url,
                })
                .collect()
        };
        ChainConfig {
            chain_id: CHAIN_ID.to_string(),
            name: "test".to_string(),
            bech32_prefix: "secret".to_string(),
            contracts_feature: feature,
            start_height: None,
            nodes: NodesConfig {
                rpc: nodes(rpc),
                lcd: nodes(lcd),
            },
            sync: Default::default(),
            validators: Default::default(),
            proposals: Default::default(),
            contracts: Default::default(),
            pruning: Default::default(),
        }
    }

    pub fn context(
        config: ChainConfig,
        store: Arc<InMemoryStore>,
    ) -> Arc<ChainContext> {
        Arc::new(ChainContext::new(config, Duration::from_secs(5), store).unwrap())
    }

    // mockito either matches the bare path or path+query depending on version
    pub fn path_matcher(path: &str) -> Matcher {
        Matcher::Regex(format!(r"^{}(\?.*)?$", path))
    }

    pub fn height_query(height: u64) -> Matcher {
        Matcher::UrlEncoded("height".into(), height.to_string())
    }

    pub fn status_body(network: &str, earliest: u64, latest: u64) -> String {
        json!({
            "jsonrpc": "2.0",
            "id": -1,
            "result": {
                "node_info": {"network": network, "moniker": "node"},
                "sync_info": {
                    "latest_block_height": latest.to_string(),
                    "earliest_block_height": earliest.to_string(),
                    "catching_up": false
                }
            }
        })
        .to_string()
    }

    pub fn block_body(chain_id: &str, height: u64, txs: &[String]) -> String {
        json!({
            "jsonrpc": "2.0",
            "id": -1,
            "result": {
                "block_id": {"hash": format!("BLOCK{}", height)},
                "block": {
                    "header": {
                        "chain_id": chain_id,
                        "height": height.to_string(),
                        "time": "2024-05-01T12:00:00.5Z"
                    },
                    "data": {"txs": if txs.is_empty() { Value::Null } else { json!(txs) }}
                }
            }
        })
        .to_string()
    }

    /// `gas` holds (gas_wanted, gas_used) per transaction
    pub fn block_results_body(height: u64, gas: &[(u64, u64)]) -> String {
        let results: Vec<Value> = gas
            .iter()
            .map(|(wanted, used)| {
                json!({"code": 0, "gas_wanted": wanted.to_string(), "gas_used": used.to_string()})
            })
            .collect();
        json!({
            "jsonrpc": "2.0",
            "id": -1,
            "result": {"height": height.to_string(), "txs_results": results}
        })
        .to_string()
    }

    /// LCD tx entry signed by a single secp256k1 key
    pub fn tx_value(sender: &str, contract: &str) -> Value {
        json!({
            "body": {
                "messages": [{
                    "@type": "/secret.compute.v1beta1.MsgExecuteContract",
                    "sender": sender,
                    "contract": contract,
                    "msg": "ZW5jcnlwdGVk"
                }],
                "memo": ""
            },
            "auth_info": {
                "signer_infos": [{
                    "public_key": {
                        "@type": "/cosmos.crypto.secp256k1.PubKey",
                        "key": "AhERERERERERERERERERERERERERERERERERERERERER"
                    }
                }],
                "fee": {
                    "amount": [{"denom": "uscrt", "amount": "2500"}],
                    "gas_limit": "200000",
                    "payer": "",
                    "granter": "secret1granter"
                }
            }
        })
    }

    pub fn tx_response_value(height: u64, hash: &str, contract_b64: &str) -> Value {
        json!({
            "height": height.to_string(),
            "txhash": hash,
            "code": 0,
            "gas_wanted": "200000",
            "gas_used": "150000",
            "logs": [],
            "events": [
                {"type": "coin_received", "attributes": [
                    {"key": "cmVjZWl2ZXI=", "value": "c2VjcmV0MXJlY3Y=", "index": true}
                ]},
                {"type": "wasm", "attributes": [
                    {"key": "Y29udHJhY3RfYWRkcmVzcw==", "value": contract_b64, "index": true}
                ]}
            ],
            "timestamp": "2024-05-01T12:00:00Z"
        })
    }

    pub fn tx_search_body(txs: Vec<Value>, responses: Vec<Value>) -> String {
        json!({
            "txs": txs,
            "tx_responses": responses,
            "pagination": null,
            "total": "0"
        })
        .to_string()
    }
}
