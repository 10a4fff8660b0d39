use anyhow::Context;
use std::sync::Arc;
use tracing::info;

use crate::core::app_context::ChainContext;

use super::metrics::EXPLORER_PRUNED_BLOCKS;

pub struct Pruner {
    ctx: Arc<ChainContext>,
}

impl Pruner {
    pub fn new(ctx: Arc<ChainContext>) -> Self {
        Self { ctx }
    }

    /// Keeps the newest `keep_blocks` heights, returns the number of blocks deleted
    pub async fn prune(&self) -> anyhow::Result<u64> {
        let chain_id = self.ctx.chain_id();
        let keep = self.ctx.config.pruning.keep_blocks.max(1);
        let Some(max) = self.ctx.store.max_height(chain_id).await? else {
            return Ok(0);
        };
        if max < keep {
            return Ok(0);
        }

        let cutoff = max - keep + 1;
        let removed = self
            .ctx
            .store
            .prune_below(chain_id, cutoff)
            .await
            .with_context(|| format!("Could not prune below {}", cutoff))?;
        if removed > 0 {
            EXPLORER_PRUNED_BLOCKS
                .with_label_values(&[chain_id])
                .inc_by(removed);
            info!(
                "(Cosmos Prune) {} removed {} blocks below {}",
                chain_id, removed, cutoff
            );
        }
        Ok(removed)
    }
}
