use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::core::app_context::ChainContext;
use crate::core::clients::path::Path;
use crate::core::config::TxSearchStyle;

use super::address::signer_addresses;
use super::block::BlockFetcher;
use super::events::{executed_contracts, recipients, ExecutedContracts};
use super::messages::{senders, TxMessage};
use super::metrics::EXPLORER_TXS_IMPORTED;
use super::storage::{BlockRecord, TransactionRecord};
use super::types::{Tx, TxResponse, TxSearchResponse};
use super::{parse_height, SyncError};

pub const TX_SEARCH_PAGE_SIZE: u64 = 100;

pub struct TransactionImporter {
    ctx: Arc<ChainContext>,
    blocks: BlockFetcher,
    unsupported_logged: AtomicBool,
}

impl TransactionImporter {
    pub fn new(ctx: Arc<ChainContext>) -> Self {
        Self {
            blocks: BlockFetcher::new(ctx.clone()),
            ctx,
            unsupported_logged: AtomicBool::new(false),
        }
    }

    /// Imports every transaction of `height`. Nothing is written unless the
    /// tx search returns exactly as many transactions as the block declares.
    pub async fn import_transactions(&self, height: u64) -> Result<usize, SyncError> {
        let chain_id = self.ctx.chain_id();
        let block = match self.ctx.store.find_block(chain_id, height).await? {
            Some(block) => block,
            None => self.blocks.fetch_block(height).await?,
        };
        if block.tx_count == 0 {
            return Ok(0);
        }

        let (txs, responses) = self.search(height, block.tx_count).await?;
        if txs.len() as u64 != block.tx_count {
            return Err(SyncError::TxCountMismatch {
                height,
                declared: block.tx_count,
                found: txs.len() as u64,
            });
        }

        let records = txs
            .into_iter()
            .zip(responses)
            .map(|(tx, response)| self.to_record(&block, tx, response))
            .collect::<Result<Vec<_>, _>>()?;
        let imported = records.len();
        self.ctx.store.upsert_transactions(records).await?;

        EXPLORER_TXS_IMPORTED
            .with_label_values(&[chain_id])
            .inc_by(imported as u64);
        info!(
            "(Cosmos Tx) {} stored {} txs of block {}",
            chain_id, imported, height
        );
        Ok(imported)
    }

    fn page_path(&self, height: u64, page: u64) -> Path {
        let path = Path::from("/cosmos/tx/v1beta1/txs");
        let filter = format!("tx.height={}", height);
        match self.ctx.config.sync.tx_search {
            TxSearchStyle::Query => path
                .with_query("query", filter)
                .with_query("page", page)
                .with_query("limit", TX_SEARCH_PAGE_SIZE),
            TxSearchStyle::Events => path
                .with_query("events", filter)
                .with_query("pagination.offset", (page - 1) * TX_SEARCH_PAGE_SIZE)
                .with_query("pagination.limit", TX_SEARCH_PAGE_SIZE),
        }
    }

    /// Pages the LCD tx search until a short page, a page with no unseen
    /// txhash, or `declared` unique entries
    async fn search(
        &self,
        height: u64,
        declared: u64,
    ) -> Result<(Vec<Value>, Vec<Value>), SyncError> {
        let mut txs = Vec::new();
        let mut responses = Vec::new();
        let mut seen = HashSet::new();
        let mut page = 1;
        loop {
            let body: TxSearchResponse = self.ctx.lcd.get(self.page_path(height, page)).await?;
            if body.txs.len() != body.tx_responses.len() {
                return Err(SyncError::MalformedTxSearch {
                    height,
                    txs: body.txs.len(),
                    responses: body.tx_responses.len(),
                });
            }
            let received = body.txs.len() as u64;
            let mut added = 0;
            for (tx, response) in body.txs.into_iter().zip(body.tx_responses) {
                // Nodes that ignore paging serve the same entries again
                if let Some(hash) = response.get("txhash").and_then(Value::as_str) {
                    if !seen.insert(hash.to_string()) {
                        continue;
                    }
                }
                txs.push(tx);
                responses.push(response);
                added += 1;
            }
            debug!(
                "(Cosmos Tx) {} height {} page {} returned {} txs, {} new",
                self.ctx.chain_id(),
                height,
                page,
                received,
                added
            );

            if received < TX_SEARCH_PAGE_SIZE || added == 0 || txs.len() as u64 >= declared {
                break;
            }
            page += 1;
        }
        Ok((txs, responses))
    }

    fn to_record(
        &self,
        block: &BlockRecord,
        raw_tx: Value,
        raw_response: Value,
    ) -> Result<TransactionRecord, SyncError> {
        let tx: Tx = serde_json::from_value(raw_tx.clone()).map_err(|source| SyncError::Decode {
            what: format!("tx at height {}", block.height),
            source,
        })?;
        let response: TxResponse =
            serde_json::from_value(raw_response.clone()).map_err(|source| SyncError::Decode {
                what: format!("tx response at height {}", block.height),
                source,
            })?;

        let returned = parse_height("tx_response.height", &response.height)?;
        if returned != block.height {
            return Err(SyncError::UnexpectedHeight {
                requested: block.height,
                returned,
            });
        }

        let prefix = &self.ctx.config.bech32_prefix;
        let mut signers: Vec<String> = Vec::new();
        for key in tx
            .auth_info
            .signer_infos
            .iter()
            .filter_map(|info| info.public_key.as_ref())
        {
            for address in signer_addresses(prefix, key)? {
                if !signers.contains(&address) {
                    signers.push(address);
                }
            }
        }

        let messages: Vec<TxMessage> = tx.body.messages.iter().map(TxMessage::from_value).collect();

        let feature = self.ctx.config.contracts_feature;
        let contracts = executed_contracts(feature, &response.logs, &response.events);
        if let ExecutedContracts::Unsupported(feature) = &contracts {
            if !self.unsupported_logged.swap(true, Ordering::Relaxed) {
                debug!(
                    "(Cosmos Tx) {} executed contract extraction is not supported for {:?} chains",
                    self.ctx.chain_id(),
                    feature
                );
            }
        }

        let fee = &tx.auth_info.fee;
        Ok(TransactionRecord {
            hash: response.txhash.clone(),
            chain_id: block.chain_id.clone(),
            height: block.height,
            block_hash: block.hash.clone(),
            time: response.timestamp.unwrap_or(block.time),
            signers,
            senders: senders(&messages),
            recipients: recipients(&response.logs, &response.events),
            executed_contracts: contracts.into_addresses(),
            message_types: messages.iter().map(|m| m.type_url().to_string()).collect(),
            fee_payer: Some(fee.payer.clone()).filter(|p| !p.is_empty()),
            fee_granter: Some(fee.granter.clone()).filter(|g| !g.is_empty()),
            gas_limit: parse_height("fee.gas_limit", &fee.gas_limit)?,
            gas_used: parse_height("gas_used", &response.gas_used)?,
            success: response.code == 0,
            raw_tx: json!({ "tx": raw_tx, "tx_response": raw_response }),
        })
    }
}
