use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clickhouse::{sql::Identifier, Client, Row};
use serde::{Deserialize, Serialize};
use std::env;
use tracing::info;

use super::{
    BlockRecord, ChainStore, ContractRecord, ProposalRecord, TransactionRecord, ValidatorRecord,
};

const BLOCKS_TABLE: &str = "explorer_blocks";
const TRANSACTIONS_TABLE: &str = "explorer_transactions";
const VALIDATORS_TABLE: &str = "explorer_validators";
const PROPOSALS_TABLE: &str = "explorer_proposals";
const CONTRACTS_TABLE: &str = "explorer_contracts";
const CURSORS_TABLE: &str = "explorer_cursors";

const SCHEMA: [&str; 6] = [
    r#"
    CREATE TABLE IF NOT EXISTS explorer_blocks (
        chain_id String,
        height UInt64,
        hash String,
        time DateTime64(9, 'UTC'),
        tx_count UInt64,
        gas_wanted UInt64,
        gas_used UInt64,
        fees String,
        raw_block String,
        raw_results String
    ) ENGINE = ReplacingMergeTree
    ORDER BY (chain_id, height)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS explorer_transactions (
        hash String,
        chain_id String,
        height UInt64,
        block_hash String,
        time DateTime64(9, 'UTC'),
        signers Array(String),
        senders Array(String),
        recipients Array(String),
        executed_contracts Array(String),
        message_types Array(String),
        fee_payer Nullable(String),
        fee_granter Nullable(String),
        gas_limit UInt64,
        gas_used UInt64,
        success UInt8,
        raw_tx String
    ) ENGINE = ReplacingMergeTree
    ORDER BY hash
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS explorer_validators (
        chain_id String,
        operator_address String,
        moniker String,
        consensus_pubkey Nullable(String),
        consensus_address Nullable(String),
        status String,
        jailed UInt8,
        tokens String,
        delegator_shares String,
        commission_rate String
    ) ENGINE = ReplacingMergeTree
    ORDER BY (chain_id, operator_address)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS explorer_proposals (
        chain_id String,
        id UInt64,
        title String,
        status String,
        submit_time Nullable(DateTime64(9, 'UTC')),
        voting_start_time Nullable(DateTime64(9, 'UTC')),
        voting_end_time Nullable(DateTime64(9, 'UTC')),
        raw String
    ) ENGINE = ReplacingMergeTree
    ORDER BY (chain_id, id)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS explorer_contracts (
        chain_id String,
        address String,
        code_id UInt64,
        creator String,
        label String,
        first_seen_height UInt64,
        nft_token_count Nullable(UInt64)
    ) ENGINE = ReplacingMergeTree
    ORDER BY (chain_id, address)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS explorer_cursors (
        chain_id String,
        name String,
        height UInt64
    ) ENGINE = ReplacingMergeTree
    ORDER BY (chain_id, name)
    "#,
];

#[derive(Debug, Row, Serialize, Deserialize)]
struct BlockRow {
    chain_id: String,
    height: u64,
    hash: String,
    #[serde(with = "clickhouse::serde::chrono::datetime64::nanos")]
    time: DateTime<Utc>,
    tx_count: u64,
    gas_wanted: u64,
    gas_used: u64,
    fees: String,
    raw_block: String,
    raw_results: String,
}

#[derive(Debug, Row, Serialize, Deserialize)]
struct TransactionRow {
    hash: String,
    chain_id: String,
    height: u64,
    block_hash: String,
    #[serde(with = "clickhouse::serde::chrono::datetime64::nanos")]
    time: DateTime<Utc>,
    signers: Vec<String>,
    senders: Vec<String>,
    recipients: Vec<String>,
    executed_contracts: Vec<String>,
    message_types: Vec<String>,
    fee_payer: Option<String>,
    fee_granter: Option<String>,
    gas_limit: u64,
    gas_used: u64,
    success: u8,
    raw_tx: String,
}

#[derive(Debug, Row, Serialize)]
struct ValidatorRow<'a> {
    chain_id: &'a str,
    operator_address: &'a str,
    moniker: &'a str,
    consensus_pubkey: Option<&'a str>,
    consensus_address: Option<&'a str>,
    status: &'a str,
    jailed: u8,
    tokens: &'a str,
    delegator_shares: &'a str,
    commission_rate: &'a str,
}

#[derive(Debug, Row, Serialize)]
struct ProposalRow<'a> {
    chain_id: &'a str,
    id: u64,
    title: &'a str,
    status: &'a str,
    #[serde(with = "clickhouse::serde::chrono::datetime64::nanos::option")]
    submit_time: Option<DateTime<Utc>>,
    #[serde(with = "clickhouse::serde::chrono::datetime64::nanos::option")]
    voting_start_time: Option<DateTime<Utc>>,
    #[serde(with = "clickhouse::serde::chrono::datetime64::nanos::option")]
    voting_end_time: Option<DateTime<Utc>>,
    raw: String,
}

#[derive(Debug, Row, Serialize, Deserialize)]
struct ContractRow {
    chain_id: String,
    address: String,
    code_id: u64,
    creator: String,
    label: String,
    first_seen_height: u64,
    nft_token_count: Option<u64>,
}

#[derive(Debug, Row, Serialize, Deserialize)]
struct CursorRow {
    chain_id: String,
    name: String,
    height: u64,
}

#[derive(Debug, Row, Deserialize)]
struct MaybeHeight {
    height: Option<u64>,
}

#[derive(Debug, Row, Deserialize)]
struct Count {
    count: u64,
}

#[derive(Debug, Row, Deserialize)]
struct ExecutedContract {
    contract: String,
    first_height: u64,
}

fn read_env_var(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{} env variable should be set", key))
}

impl TryFrom<BlockRecord> for BlockRow {
    type Error = anyhow::Error;

    fn try_from(block: BlockRecord) -> Result<Self> {
        Ok(BlockRow {
            fees: serde_json::to_string(&block.fees).context("Could not encode fees")?,
            raw_block: block.raw_block.to_string(),
            raw_results: block.raw_results.to_string(),
            chain_id: block.chain_id,
            height: block.height,
            hash: block.hash,
            time: block.time,
            tx_count: block.tx_count,
            gas_wanted: block.gas_wanted,
            gas_used: block.gas_used,
        })
    }
}

impl From<TransactionRecord> for TransactionRow {
    fn from(tx: TransactionRecord) -> Self {
        TransactionRow {
            raw_tx: tx.raw_tx.to_string(),
            hash: tx.hash,
            chain_id: tx.chain_id,
            height: tx.height,
            block_hash: tx.block_hash,
            time: tx.time,
            signers: tx.signers,
            senders: tx.senders,
            recipients: tx.recipients,
            executed_contracts: tx.executed_contracts,
            message_types: tx.message_types,
            fee_payer: tx.fee_payer,
            fee_granter: tx.fee_granter,
            gas_limit: tx.gas_limit,
            gas_used: tx.gas_used,
            success: u8::from(tx.success),
        }
    }
}

impl TryFrom<BlockRow> for BlockRecord {
    type Error = anyhow::Error;

    fn try_from(row: BlockRow) -> Result<Self> {
        Ok(BlockRecord {
            fees: serde_json::from_str(&row.fees).context("Could not parse stored fees")?,
            raw_block: serde_json::from_str(&row.raw_block)
                .context("Could not parse stored block")?,
            raw_results: serde_json::from_str(&row.raw_results)
                .context("Could not parse stored block results")?,
            chain_id: row.chain_id,
            height: row.height,
            hash: row.hash,
            time: row.time,
            tx_count: row.tx_count,
            gas_wanted: row.gas_wanted,
            gas_used: row.gas_used,
        })
    }
}

impl TryFrom<TransactionRow> for TransactionRecord {
    type Error = anyhow::Error;

    fn try_from(row: TransactionRow) -> Result<Self> {
        Ok(TransactionRecord {
            raw_tx: serde_json::from_str(&row.raw_tx)
                .context("Could not parse stored transaction")?,
            hash: row.hash,
            chain_id: row.chain_id,
            height: row.height,
            block_hash: row.block_hash,
            time: row.time,
            signers: row.signers,
            senders: row.senders,
            recipients: row.recipients,
            executed_contracts: row.executed_contracts,
            message_types: row.message_types,
            fee_payer: row.fee_payer,
            fee_granter: row.fee_granter,
            gas_limit: row.gas_limit,
            gas_used: row.gas_used,
            success: row.success == 1,
        })
    }
}

impl From<ContractRow> for ContractRecord {
    fn from(row: ContractRow) -> Self {
        ContractRecord {
            chain_id: row.chain_id,
            address: row.address,
            code_id: row.code_id,
            creator: row.creator,
            label: row.label,
            first_seen_height: row.first_seen_height,
            nft_token_count: row.nft_token_count,
        }
    }
}

/// ClickHouse backed store. Tables are ReplacingMergeTree keyed by the
/// natural keys, so every read goes through FINAL.
pub struct ClickhouseStore {
    pub clickhouse_client: Client,
}

impl ClickhouseStore {
    pub fn new(clickhouse_client: Client) -> Self {
        Self { clickhouse_client }
    }

    /// Builds the client from CLICKHOUSE_URL, CLICKHOUSE_USER, CLICKHOUSE_PASSWORD
    /// and CLICKHOUSE_DATABASE
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(
            Client::default()
                .with_url(read_env_var("CLICKHOUSE_URL")?)
                .with_user(read_env_var("CLICKHOUSE_USER")?)
                .with_password(read_env_var("CLICKHOUSE_PASSWORD")?)
                .with_database(read_env_var("CLICKHOUSE_DATABASE")?),
        ))
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            self.clickhouse_client
                .query(statement)
                .execute()
                .await
                .context("Could not create explorer table")?;
        }
        info!("(Clickhouse) Explorer tables are in place");
        Ok(())
    }

    async fn height_bound(&self, chain_id: &str, aggregate: &str) -> Result<Option<u64>> {
        let query = format!(
            "SELECT {}(height) AS height FROM ? FINAL WHERE chain_id = ?",
            aggregate
        );
        let row = self
            .clickhouse_client
            .query(&query)
            .bind(Identifier(BLOCKS_TABLE))
            .bind(chain_id)
            .fetch_one::<MaybeHeight>()
            .await
            .with_context(|| format!("Could not query {} height", aggregate))?;
        Ok(row.height)
    }
}

#[async_trait]
impl ChainStore for ClickhouseStore {
    async fn upsert_block(&self, block: BlockRecord) -> Result<()> {
        let row = BlockRow::try_from(block)?;
        let mut insert = self.clickhouse_client.insert(BLOCKS_TABLE)?;
        insert.write(&row).await.context("Failed to write block")?;
        insert.end().await.context("Failed to end block insert")?;
        Ok(())
    }

    async fn upsert_transactions(&self, transactions: Vec<TransactionRecord>) -> Result<()> {
        if transactions.is_empty() {
            return Ok(());
        }
        let mut insert = self.clickhouse_client.insert(TRANSACTIONS_TABLE)?;
        for tx in transactions {
            let row = TransactionRow::from(tx);
            insert
                .write(&row)
                .await
                .context("Failed to write transaction")?;
        }
        insert
            .end()
            .await
            .context("Failed to end transaction insert")?;
        Ok(())
    }

    async fn find_block(&self, chain_id: &str, height: u64) -> Result<Option<BlockRecord>> {
        self.clickhouse_client
            .query("SELECT ?fields FROM ? FINAL WHERE chain_id = ? AND height = ? LIMIT 1")
            .bind(Identifier(BLOCKS_TABLE))
            .bind(chain_id)
            .bind(height)
            .fetch_optional::<BlockRow>()
            .await
            .context("Could not query block")?
            .map(BlockRecord::try_from)
            .transpose()
    }

    async fn find_transaction(&self, hash: &str) -> Result<Option<TransactionRecord>> {
        self.clickhouse_client
            .query("SELECT ?fields FROM ? FINAL WHERE hash = ? LIMIT 1")
            .bind(Identifier(TRANSACTIONS_TABLE))
            .bind(hash)
            .fetch_optional::<TransactionRow>()
            .await
            .context("Could not query transaction")?
            .map(TransactionRecord::try_from)
            .transpose()
    }

    async fn max_height(&self, chain_id: &str) -> Result<Option<u64>> {
        self.height_bound(chain_id, "maxOrNull").await
    }

    async fn min_height(&self, chain_id: &str) -> Result<Option<u64>> {
        self.height_bound(chain_id, "minOrNull").await
    }

    async fn count_transactions(&self, chain_id: &str, height: Option<u64>) -> Result<u64> {
        let query = match height {
            Some(_) => "SELECT count() AS count FROM ? FINAL WHERE chain_id = ? AND height = ?",
            None => "SELECT count() AS count FROM ? FINAL WHERE chain_id = ?",
        };
        let mut query = self
            .clickhouse_client
            .query(query)
            .bind(Identifier(TRANSACTIONS_TABLE))
            .bind(chain_id);
        if let Some(height) = height {
            query = query.bind(height);
        }
        let row = query
            .fetch_one::<Count>()
            .await
            .context("Could not count transactions")?;
        Ok(row.count)
    }

    async fn upsert_validators(&self, validators: Vec<ValidatorRecord>) -> Result<()> {
        if validators.is_empty() {
            return Ok(());
        }
        let mut insert = self.clickhouse_client.insert(VALIDATORS_TABLE)?;
        for v in &validators {
            insert
                .write(&ValidatorRow {
                    chain_id: &v.chain_id,
                    operator_address: &v.operator_address,
                    moniker: &v.moniker,
                    consensus_pubkey: v.consensus_pubkey.as_deref(),
                    consensus_address: v.consensus_address.as_deref(),
                    status: &v.status,
                    jailed: u8::from(v.jailed),
                    tokens: &v.tokens,
                    delegator_shares: &v.delegator_shares,
                    commission_rate: &v.commission_rate,
                })
                .await
                .context("Failed to write validator")?;
        }
        insert
            .end()
            .await
            .context("Failed to end validator insert")?;
        Ok(())
    }

    async fn upsert_proposals(&self, proposals: Vec<ProposalRecord>) -> Result<()> {
        if proposals.is_empty() {
            return Ok(());
        }
        let mut insert = self.clickhouse_client.insert(PROPOSALS_TABLE)?;
        for p in &proposals {
            insert
                .write(&ProposalRow {
                    chain_id: &p.chain_id,
                    id: p.id,
                    title: &p.title,
                    status: &p.status,
                    submit_time: p.submit_time,
                    voting_start_time: p.voting_start_time,
                    voting_end_time: p.voting_end_time,
                    raw: p.raw.to_string(),
                })
                .await
                .context("Failed to write proposal")?;
        }
        insert
            .end()
            .await
            .context("Failed to end proposal insert")?;
        Ok(())
    }

    async fn upsert_contract(&self, contract: ContractRecord) -> Result<()> {
        let row = ContractRow {
            chain_id: contract.chain_id,
            address: contract.address,
            code_id: contract.code_id,
            creator: contract.creator,
            label: contract.label,
            first_seen_height: contract.first_seen_height,
            nft_token_count: contract.nft_token_count,
        };
        let mut insert = self.clickhouse_client.insert(CONTRACTS_TABLE)?;
        insert.write(&row).await.context("Failed to write contract")?;
        insert
            .end()
            .await
            .context("Failed to end contract insert")?;
        Ok(())
    }

    async fn find_contract(&self, chain_id: &str, address: &str) -> Result<Option<ContractRecord>> {
        Ok(self
            .clickhouse_client
            .query("SELECT ?fields FROM ? FINAL WHERE chain_id = ? AND address = ? LIMIT 1")
            .bind(Identifier(CONTRACTS_TABLE))
            .bind(chain_id)
            .bind(address)
            .fetch_optional::<ContractRow>()
            .await
            .context("Could not query contract")?
            .map(ContractRecord::from))
    }

    async fn get_cursor(&self, chain_id: &str, name: &str) -> Result<Option<u64>> {
        Ok(self
            .clickhouse_client
            .query("SELECT ?fields FROM ? FINAL WHERE chain_id = ? AND name = ? LIMIT 1")
            .bind(Identifier(CURSORS_TABLE))
            .bind(chain_id)
            .bind(name)
            .fetch_optional::<CursorRow>()
            .await
            .context("Could not query cursor")?
            .map(|row| row.height))
    }

    async fn set_cursor(&self, chain_id: &str, name: &str, height: u64) -> Result<()> {
        let mut insert = self.clickhouse_client.insert(CURSORS_TABLE)?;
        insert
            .write(&CursorRow {
                chain_id: chain_id.to_string(),
                name: name.to_string(),
                height,
            })
            .await
            .context("Failed to write cursor")?;
        insert.end().await.context("Failed to end cursor insert")?;
        Ok(())
    }

    async fn executed_contracts_between(
        &self,
        chain_id: &str,
        from: u64,
        to: u64,
    ) -> Result<Vec<(String, u64)>> {
        let query = r#"
            SELECT contract, min(height) AS first_height
            FROM ? FINAL
            ARRAY JOIN executed_contracts AS contract
            WHERE chain_id = ? AND height >= ? AND height <= ?
            GROUP BY contract
            ORDER BY first_height, contract
        "#;
        let mut cursor = self
            .clickhouse_client
            .query(query)
            .bind(Identifier(TRANSACTIONS_TABLE))
            .bind(chain_id)
            .bind(from)
            .bind(to)
            .fetch::<ExecutedContract>()?;

        let mut contracts = Vec::new();
        while let Some(row) = cursor.next().await? {
            contracts.push((row.contract, row.first_height));
        }
        Ok(contracts)
    }

    async fn prune_below(&self, chain_id: &str, height: u64) -> Result<u64> {
        let removed = self
            .clickhouse_client
            .query("SELECT count() AS count FROM ? FINAL WHERE chain_id = ? AND height < ?")
            .bind(Identifier(BLOCKS_TABLE))
            .bind(chain_id)
            .bind(height)
            .fetch_one::<Count>()
            .await
            .context("Could not count prunable blocks")?
            .count;

        for table in [BLOCKS_TABLE, TRANSACTIONS_TABLE] {
            self.clickhouse_client
                .query("ALTER TABLE ? DELETE WHERE chain_id = ? AND height < ?")
                .bind(Identifier(table))
                .bind(chain_id)
                .bind(height)
                .execute()
                .await
                .with_context(|| format!("Could not prune {}", table))?;
        }
        Ok(removed)
    }
}
