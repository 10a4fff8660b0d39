use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use futures::stream::{self, StreamExt};
use tracing::{error, info};

use crate::blockchains::cosmos::block::BlockFetcher;
use crate::blockchains::cosmos::tx::TransactionImporter;
use crate::core::app_context::ChainContext;

pub const REPAIR_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepairSummary {
    pub blocks: usize,
    pub transactions: usize,
}

/// Re-fetches every height of `[start_height, end_height]`, replacing the stored
/// block and transactions. Heights are independent, so they run concurrently.
pub async fn run_repair(
    ctx: Arc<ChainContext>,
    start_height: u64,
    end_height: u64,
    concurrency: usize,
) -> Result<RepairSummary> {
    if start_height > end_height {
        bail!(
            "Invalid height range: start ({}) must not exceed end ({})",
            start_height,
            end_height
        );
    }

    let blocks = Arc::new(BlockFetcher::new(ctx.clone()));
    let txs = Arc::new(TransactionImporter::new(ctx.clone()));
    let total = (end_height - start_height + 1) as usize;
    let processed = AtomicUsize::new(0);
    let transactions = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let chain_id = ctx.chain_id().to_string();

    info!(
        "(Repair) {} re-importing {} heights from {} to {}",
        chain_id, total, start_height, end_height
    );

    stream::iter(start_height..=end_height)
        .map(|height| {
            let blocks = blocks.clone();
            let txs = txs.clone();
            async move {
                blocks
                    .fetch_block(height)
                    .await
                    .with_context(|| format!("Failed to fetch block {}", height))?;
                let imported = txs
                    .import_transactions(height)
                    .await
                    .with_context(|| format!("Failed to import txs of block {}", height))?;
                Ok::<usize, anyhow::Error>(imported)
            }
        })
        .buffer_unordered(concurrency.max(1))
        .for_each(|result| {
            match result {
                Ok(imported) => {
                    transactions.fetch_add(imported, Ordering::Relaxed);
                    let count = processed.fetch_add(1, Ordering::Relaxed) + 1;
                    if count % 1000 == 0 || count == total {
                        info!(
                            "(Repair) {} progress: {}/{} heights",
                            chain_id, count, total
                        );
                    }
                }
                Err(e) => {
                    failed.fetch_add(1, Ordering::Relaxed);
                    error!("(Repair) {}: {:#}", chain_id, e);
                }
            }
            futures::future::ready(())
        })
        .await;

    let failed = failed.load(Ordering::Relaxed);
    if failed > 0 {
        bail!("{} of {} heights could not be repaired", failed, total);
    }
    Ok(RepairSummary {
        blocks: processed.load(Ordering::Relaxed),
        transactions: transactions.load(Ordering::Relaxed),
    })
}
