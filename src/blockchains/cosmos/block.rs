use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::core::app_context::ChainContext;
use crate::core::clients::path::Path;

use super::metrics::EXPLORER_BLOCKS_IMPORTED;
use super::proto::accumulate_fees;
use super::storage::BlockRecord;
use super::types::{BlockResult, BlockResultsResult, RpcResponse};
use super::{parse_height, SyncError};

pub struct BlockFetcher {
    ctx: Arc<ChainContext>,
}

impl BlockFetcher {
    pub fn new(ctx: Arc<ChainContext>) -> Self {
        Self { ctx }
    }

    /// Fetches a height's block and block results, aggregates gas and fees
    /// and replaces whatever was stored for (chain, height).
    pub async fn fetch_block(&self, height: u64) -> Result<BlockRecord, SyncError> {
        let chain_id = self.ctx.chain_id();
        let (block, results) = tokio::try_join!(
            self.ctx
                .rpc
                .get::<RpcResponse<Value>>(Path::from("/block").with_query("height", height)),
            self.ctx.rpc.get::<RpcResponse<Value>>(
                Path::from("/block_results").with_query("height", height)
            ),
        )?;
        let raw_block = block.into_inner();
        let raw_results = results.into_inner();

        let parsed: BlockResult =
            serde_json::from_value(raw_block.clone()).map_err(|source| SyncError::Decode {
                what: format!("block {}", height),
                source,
            })?;
        let header = &parsed.block.header;
        if header.chain_id != chain_id {
            return Err(SyncError::ChainMismatch {
                expected: chain_id.to_string(),
                actual: header.chain_id.clone(),
            });
        }
        let returned = parse_height("block.header.height", &header.height)?;
        if returned != height {
            return Err(SyncError::UnexpectedHeight {
                requested: height,
                returned,
            });
        }

        let block_results: BlockResultsResult = serde_json::from_value(raw_results.clone())
            .map_err(|source| SyncError::Decode {
                what: format!("block results {}", height),
                source,
            })?;
        let mut gas_wanted = 0u64;
        let mut gas_used = 0u64;
        for result in block_results.txs_results.iter().flatten() {
            gas_wanted =
                gas_wanted.saturating_add(parse_height("gas_wanted", &result.gas_wanted)?);
            gas_used = gas_used.saturating_add(parse_height("gas_used", &result.gas_used)?);
        }

        let txs = parsed.block.data.txs.as_deref().unwrap_or_default();
        let fees = accumulate_fees(txs)?
            .into_iter()
            .map(|(denom, amount)| (denom, amount.to_string()))
            .collect();

        let record = BlockRecord {
            chain_id: chain_id.to_string(),
            height,
            hash: parsed.block_id.hash.clone(),
            time: header.time,
            tx_count: txs.len() as u64,
            gas_wanted,
            gas_used,
            fees,
            raw_block,
            raw_results,
        };
        self.ctx.store.upsert_block(record.clone()).await?;

        EXPLORER_BLOCKS_IMPORTED.with_label_values(&[chain_id]).inc();
        info!(
            "(Cosmos Block) {} stored block {} with {} txs",
            chain_id, height, record.tx_count
        );
        Ok(record)
    }
}
