use anyhow::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use super::{
    BlockRecord, ChainStore, ContractRecord, ProposalRecord, TransactionRecord, ValidatorRecord,
};

#[derive(Default)]
struct Tables {
    blocks: BTreeMap<(String, u64), BlockRecord>,
    transactions: HashMap<String, TransactionRecord>,
    validators: HashMap<(String, String), ValidatorRecord>,
    proposals: BTreeMap<(String, u64), ProposalRecord>,
    contracts: HashMap<(String, String), ContractRecord>,
    cursors: HashMap<(String, String), u64>,
}

/// Process-local store for tests and deployments that do not need history
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn block_count(&self, chain_id: &str) -> usize {
        self.tables
            .read()
            .await
            .blocks
            .keys()
            .filter(|(chain, _)| chain == chain_id)
            .count()
    }

    pub async fn validators(&self, chain_id: &str) -> Vec<ValidatorRecord> {
        let mut validators: Vec<_> = self
            .tables
            .read()
            .await
            .validators
            .values()
            .filter(|v| v.chain_id == chain_id)
            .cloned()
            .collect();
        validators.sort_by(|a, b| a.operator_address.cmp(&b.operator_address));
        validators
    }

    pub async fn proposals(&self, chain_id: &str) -> Vec<ProposalRecord> {
        self.tables
            .read()
            .await
            .proposals
            .values()
            .filter(|p| p.chain_id == chain_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ChainStore for InMemoryStore {
    async fn upsert_block(&self, block: BlockRecord) -> Result<()> {
        self.tables
            .write()
            .await
            .blocks
            .insert((block.chain_id.clone(), block.height), block);
        Ok(())
    }

    async fn upsert_transactions(&self, transactions: Vec<TransactionRecord>) -> Result<()> {
        let mut tables = self.tables.write().await;
        for tx in transactions {
            tables.transactions.insert(tx.hash.clone(), tx);
        }
        Ok(())
    }

    async fn find_block(&self, chain_id: &str, height: u64) -> Result<Option<BlockRecord>> {
        Ok(self
            .tables
            .read()
            .await
            .blocks
            .get(&(chain_id.to_string(), height))
            .cloned())
    }

    async fn find_transaction(&self, hash: &str) -> Result<Option<TransactionRecord>> {
        Ok(self.tables.read().await.transactions.get(hash).cloned())
    }

    async fn max_height(&self, chain_id: &str) -> Result<Option<u64>> {
        Ok(self
            .tables
            .read()
            .await
            .blocks
            .range((chain_id.to_string(), 0)..=(chain_id.to_string(), u64::MAX))
            .next_back()
            .map(|((_, height), _)| *height))
    }

    async fn min_height(&self, chain_id: &str) -> Result<Option<u64>> {
        Ok(self
            .tables
            .read()
            .await
            .blocks
            .range((chain_id.to_string(), 0)..=(chain_id.to_string(), u64::MAX))
            .next()
            .map(|((_, height), _)| *height))
    }

    async fn count_transactions(&self, chain_id: &str, height: Option<u64>) -> Result<u64> {
        Ok(self
            .tables
            .read()
            .await
            .transactions
            .values()
            .filter(|tx| tx.chain_id == chain_id && height.map_or(true, |h| tx.height == h))
            .count() as u64)
    }

    async fn upsert_validators(&self, validators: Vec<ValidatorRecord>) -> Result<()> {
        let mut tables = self.tables.write().await;
        for validator in validators {
            tables.validators.insert(
                (
                    validator.chain_id.clone(),
                    validator.operator_address.clone(),
                ),
                validator,
            );
        }
        Ok(())
    }

    async fn upsert_proposals(&self, proposals: Vec<ProposalRecord>) -> Result<()> {
        let mut tables = self.tables.write().await;
        for proposal in proposals {
            tables
                .proposals
                .insert((proposal.chain_id.clone(), proposal.id), proposal);
        }
        Ok(())
    }

    async fn upsert_contract(&self, contract: ContractRecord) -> Result<()> {
        self.tables.write().await.contracts.insert(
            (contract.chain_id.clone(), contract.address.clone()),
            contract,
        );
        Ok(())
    }

    async fn find_contract(&self, chain_id: &str, address: &str) -> Result<Option<ContractRecord>> {
        Ok(self
            .tables
            .read()
            .await
            .contracts
            .get(&(chain_id.to_string(), address.to_string()))
            .cloned())
    }

    async fn get_cursor(&self, chain_id: &str, name: &str) -> Result<Option<u64>> {
        Ok(self
            .tables
            .read()
            .await
            .cursors
            .get(&(chain_id.to_string(), name.to_string()))
            .copied())
    }

    async fn set_cursor(&self, chain_id: &str, name: &str, height: u64) -> Result<()> {
        self.tables
            .write()
            .await
            .cursors
            .insert((chain_id.to_string(), name.to_string()), height);
        Ok(())
    }

    async fn executed_contracts_between(
        &self,
        chain_id: &str,
        from: u64,
        to: u64,
    ) -> Result<Vec<(String, u64)>> {
        let tables = self.tables.read().await;
        let mut first_seen: HashMap<&str, u64> = HashMap::new();
        for tx in tables
            .transactions
            .values()
            .filter(|tx| tx.chain_id == chain_id && tx.height >= from && tx.height <= to)
        {
            for contract in &tx.executed_contracts {
                first_seen
                    .entry(contract.as_str())
                    .and_modify(|h| *h = (*h).min(tx.height))
                    .or_insert(tx.height);
            }
        }
        let mut contracts: Vec<(String, u64)> = first_seen
            .into_iter()
            .map(|(address, height)| (address.to_string(), height))
            .collect();
        contracts.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        Ok(contracts)
    }

    async fn prune_below(&self, chain_id: &str, height: u64) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.blocks.len();
        tables
            .blocks
            .retain(|(chain, h), _| chain != chain_id || *h >= height);
        let removed = (before - tables.blocks.len()) as u64;
        tables
            .transactions
            .retain(|_, tx| tx.chain_id != chain_id || tx.height >= height);
        Ok(removed)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    pub(crate) fn block(chain_id: &str, height: u64) -> BlockRecord {
        BlockRecord {
            chain_id: chain_id.to_string(),
            height,
            hash: format!("HASH{}", height),
            time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            tx_count: 0,
            gas_wanted: 0,
            gas_used: 0,
            fees: BTreeMap::new(),
            raw_block: json!({}),
            raw_results: json!({}),
        }
    }

    pub(crate) fn transaction(chain_id: &str, height: u64, hash: &str) -> TransactionRecord {
        TransactionRecord {
            hash: hash.to_string(),
            chain_id: chain_id.to_string(),
            height,
            block_hash: format!("HASH{}", height),
            time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            signers: Vec::new(),
            senders: Vec::new(),
            recipients: Vec::new(),
            executed_contracts: Vec::new(),
            message_types: Vec::new(),
            fee_payer: None,
            fee_granter: None,
            gas_limit: 0,
            gas_used: 0,
            success: true,
            raw_tx: json!({}),
        }
    }

    #[tokio::test]
    async fn heights_are_tracked_per_chain() {
        let store = InMemoryStore::new();
        assert_eq!(store.max_height("a-1").await.unwrap(), None);
        for height in [5, 3, 9] {
            store.upsert_block(block("a-1", height)).await.unwrap();
        }
        store.upsert_block(block("b-1", 100)).await.unwrap();

        assert_eq!(store.max_height("a-1").await.unwrap(), Some(9));
        assert_eq!(store.min_height("a-1").await.unwrap(), Some(3));
        assert_eq!(store.max_height("b-1").await.unwrap(), Some(100));
    }

    #[tokio::test]
    async fn upserts_replace_by_natural_key() {
        let store = InMemoryStore::new();
        store.upsert_block(block("a-1", 1)).await.unwrap();
        let mut replaced = block("a-1", 1);
        replaced.tx_count = 4;
        store.upsert_block(replaced).await.unwrap();
        assert_eq!(store.block_count("a-1").await, 1);
        assert_eq!(store.find_block("a-1", 1).await.unwrap().unwrap().tx_count, 4);

        store
            .upsert_transactions(vec![transaction("a-1", 1, "T1"), transaction("a-1", 1, "T1")])
            .await
            .unwrap();
        assert_eq!(store.count_transactions("a-1", None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn executed_contracts_report_first_height() {
        let store = InMemoryStore::new();
        let mut t1 = transaction("a-1", 12, "T1");
        t1.executed_contracts = vec!["c2".to_string(), "c1".to_string()];
        let mut t2 = transaction("a-1", 10, "T2");
        t2.executed_contracts = vec!["c2".to_string()];
        let mut t3 = transaction("a-1", 30, "T3");
        t3.executed_contracts = vec!["c3".to_string()];
        store.upsert_transactions(vec![t1, t2, t3]).await.unwrap();

        let contracts = store.executed_contracts_between("a-1", 10, 20).await.unwrap();
        assert_eq!(
            contracts,
            vec![("c2".to_string(), 10), ("c1".to_string(), 12)]
        );
    }

    #[tokio::test]
    async fn prune_removes_only_older_heights_of_chain() {
        let store = InMemoryStore::new();
        for height in 1..=5 {
            store.upsert_block(block("a-1", height)).await.unwrap();
            store
                .upsert_transactions(vec![transaction("a-1", height, &format!("T{}", height))])
                .await
                .unwrap();
        }
        store.upsert_block(block("b-1", 1)).await.unwrap();

        assert_eq!(store.prune_below("a-1", 4).await.unwrap(), 3);
        assert_eq!(store.min_height("a-1").await.unwrap(), Some(4));
        assert_eq!(store.count_transactions("a-1", None).await.unwrap(), 2);
        assert_eq!(store.min_height("b-1").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn cursors_are_named_per_chain() {
        let store = InMemoryStore::new();
        store.set_cursor("a-1", "contracts", 10).await.unwrap();
        assert_eq!(store.get_cursor("a-1", "contracts").await.unwrap(), Some(10));
        assert_eq!(store.get_cursor("b-1", "contracts").await.unwrap(), None);
    }
}
