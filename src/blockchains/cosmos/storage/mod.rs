use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

pub mod clickhouse_store;
pub mod memory;

pub use self::clickhouse_store::ClickhouseStore;
pub use self::memory::InMemoryStore;

/// Cursor name of the contract metadata pass
pub const CONTRACTS_CURSOR: &str = "contracts";

/// Keyed by (chain_id, height). Re-fetching a height replaces the record.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockRecord {
    pub chain_id: String,
    pub height: u64,
    pub hash: String,
    pub time: DateTime<Utc>,
    pub tx_count: u64,
    pub gas_wanted: u64,
    pub gas_used: u64,
    /// denom -> exact decimal total
    pub fees: BTreeMap<String, String>,
    pub raw_block: Value,
    pub raw_results: Value,
}

/// Keyed by transaction hash
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub hash: String,
    pub chain_id: String,
    pub height: u64,
    pub block_hash: String,
    pub time: DateTime<Utc>,
    pub signers: Vec<String>,
    pub senders: Vec<String>,
    pub recipients: Vec<String>,
    pub executed_contracts: Vec<String>,
    pub message_types: Vec<String>,
    pub fee_payer: Option<String>,
    pub fee_granter: Option<String>,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub success: bool,
    pub raw_tx: Value,
}

/// Keyed by (chain_id, operator_address)
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatorRecord {
    pub chain_id: String,
    pub operator_address: String,
    pub moniker: String,
    pub consensus_pubkey: Option<String>,
    pub consensus_address: Option<String>,
    pub status: String,
    pub jailed: bool,
    pub tokens: String,
    pub delegator_shares: String,
    pub commission_rate: String,
}

/// Keyed by (chain_id, id)
#[derive(Debug, Clone, PartialEq)]
pub struct ProposalRecord {
    pub chain_id: String,
    pub id: u64,
    pub title: String,
    pub status: String,
    pub submit_time: Option<DateTime<Utc>>,
    pub voting_start_time: Option<DateTime<Utc>>,
    pub voting_end_time: Option<DateTime<Utc>>,
    pub raw: Value,
}

/// Keyed by (chain_id, address)
#[derive(Debug, Clone, PartialEq)]
pub struct ContractRecord {
    pub chain_id: String,
    pub address: String,
    pub code_id: u64,
    pub creator: String,
    pub label: String,
    pub first_seen_height: u64,
    pub nft_token_count: Option<u64>,
}

/// Persistence of everything the explorer ingests. Every upsert replaces the
/// record stored under the same natural key.
#[async_trait]
pub trait ChainStore: Send + Sync {
    async fn upsert_block(&self, block: BlockRecord) -> Result<()>;
    async fn upsert_transactions(&self, transactions: Vec<TransactionRecord>) -> Result<()>;
    async fn find_block(&self, chain_id: &str, height: u64) -> Result<Option<BlockRecord>>;
    async fn find_transaction(&self, hash: &str) -> Result<Option<TransactionRecord>>;
    async fn max_height(&self, chain_id: &str) -> Result<Option<u64>>;
    async fn min_height(&self, chain_id: &str) -> Result<Option<u64>>;
    async fn count_transactions(&self, chain_id: &str, height: Option<u64>) -> Result<u64>;

    async fn upsert_validators(&self, validators: Vec<ValidatorRecord>) -> Result<()>;
    async fn upsert_proposals(&self, proposals: Vec<ProposalRecord>) -> Result<()>;
    async fn upsert_contract(&self, contract: ContractRecord) -> Result<()>;
    async fn find_contract(&self, chain_id: &str, address: &str) -> Result<Option<ContractRecord>>;

    async fn get_cursor(&self, chain_id: &str, name: &str) -> Result<Option<u64>>;
    async fn set_cursor(&self, chain_id: &str, name: &str, height: u64) -> Result<()>;

    /// Contracts executed in `[from, to]` with the lowest height each one
    /// appears at, ordered by that height.
    async fn executed_contracts_between(
        &self,
        chain_id: &str,
        from: u64,
        to: u64,
    ) -> Result<Vec<(String, u64)>>;

    /// Deletes blocks and transactions below `height`, returns the number of blocks removed
    async fn prune_below(&self, chain_id: &str, height: u64) -> Result<u64>;
}
