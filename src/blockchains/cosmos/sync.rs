use std::sync::Arc;
use tracing::{debug, info};

use crate::core::app_context::ChainContext;
use crate::core::clients::path::Path;
use crate::core::in_flight::InFlightGuard;

use super::block::BlockFetcher;
use super::metrics::{EXPLORER_CHAIN_HEAD_HEIGHT, EXPLORER_SYNC_ERRORS, EXPLORER_SYNC_HEIGHT};
use super::tx::TransactionImporter;
use super::types::{RpcResponse, StatusResult};
use super::{parse_height, SyncError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Another pass of the same chain was in flight
    Skipped,
    /// Stored history is ahead of what the node reports
    UpToDate,
    Completed { from: u64, to: u64 },
}

/// Walks a chain from its sync cursor to the head, one height at a time
pub struct SyncDriver {
    ctx: Arc<ChainContext>,
    guard: InFlightGuard,
    blocks: BlockFetcher,
    txs: TransactionImporter,
}

impl SyncDriver {
    pub fn new(ctx: Arc<ChainContext>, guard: InFlightGuard) -> Self {
        Self {
            blocks: BlockFetcher::new(ctx.clone()),
            txs: TransactionImporter::new(ctx.clone()),
            ctx,
            guard,
        }
    }

    pub async fn sync(&self) -> Result<SyncOutcome, SyncError> {
        let Some(_token) = self.guard.try_enter() else {
            debug!(
                "(Cosmos Sync) {} pass already running, skipping",
                self.ctx.chain_id()
            );
            return Ok(SyncOutcome::Skipped);
        };

        let result = self.pass().await;
        if let Err(err) = &result {
            EXPLORER_SYNC_ERRORS
                .with_label_values(&[self.ctx.chain_id(), "sync", err.kind()])
                .inc();
        }
        result
    }

    async fn pass(&self) -> Result<SyncOutcome, SyncError> {
        let chain_id = self.ctx.chain_id();
        let status = self
            .ctx
            .rpc
            .get::<RpcResponse<StatusResult>>(Path::from("/status"))
            .await?
            .into_inner();
        if status.node_info.network != chain_id {
            return Err(SyncError::ChainMismatch {
                expected: chain_id.to_string(),
                actual: status.node_info.network,
            });
        }

        let latest = parse_height("latest_block_height", &status.sync_info.latest_block_height)?;
        let earliest = parse_height(
            "earliest_block_height",
            &status.sync_info.earliest_block_height,
        )?;
        EXPLORER_CHAIN_HEAD_HEIGHT
            .with_label_values(&[chain_id])
            .set(latest as i64);

        // the last stored height is imported again, its txs may be incomplete
        let start = match self.ctx.store.max_height(chain_id).await? {
            Some(height) => height,
            None => self.ctx.config.start_height.unwrap_or(earliest),
        };
        if earliest > start {
            return Err(SyncError::HistoryPruned { earliest, start });
        }
        if start > latest {
            debug!(
                "(Cosmos Sync) {} stored height {} is ahead of node head {}",
                chain_id, start, latest
            );
            return Ok(SyncOutcome::UpToDate);
        }

        info!(
            "(Cosmos Sync) {} syncing heights {} to {}",
            chain_id, start, latest
        );
        for height in start..=latest {
            self.blocks.fetch_block(height).await?;
            self.txs.import_transactions(height).await?;
            EXPLORER_SYNC_HEIGHT
                .with_label_values(&[chain_id])
                .set(height as i64);
        }
        info!("(Cosmos Sync) {} synced up to {}", chain_id, latest);

        Ok(SyncOutcome::Completed {
            from: start,
            to: latest,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchains::cosmos::proto::encode_tx;
    use crate::blockchains::cosmos::storage::{ChainStore, InMemoryStore};
    use crate::blockchains::cosmos::test_support::*;
    use crate::core::config::ContractFeature;
    use mockito::{Matcher, Mock, Server, ServerGuard};

    async fn mock_heights(
        server: &mut ServerGuard,
        heights: std::ops::RangeInclusive<u64>,
    ) -> Vec<Mock> {
        let mut mocks = Vec::new();
        for height in heights {
            // every third height carries one transaction
            let txs: Vec<String> = if height % 3 == 0 {
                vec![encode_tx(&[("uscrt", "2500")])]
            } else {
                Vec::new()
            };
            let gas: Vec<(u64, u64)> = txs.iter().map(|_| (200_000, 150_000)).collect();
            mocks.push(
                server
                    .mock("GET", path_matcher("/block"))
                    .match_query(height_query(height))
                    .with_body(block_body(CHAIN_ID, height, &txs))
                    .create_async()
                    .await,
            );
            mocks.push(
                server
                    .mock("GET", path_matcher("/block_results"))
                    .match_query(height_query(height))
                    .with_body(block_results_body(height, &gas))
                    .create_async()
                    .await,
            );
        }
        mocks
    }

    async fn mock_tx_search(lcd: &mut ServerGuard) -> Mock {
        // only height 102 has a transaction in these scenarios
        lcd.mock("GET", path_matcher("/cosmos/tx/v1beta1/txs"))
            .match_query(Matcher::UrlEncoded("query".into(), "tx.height=102".into()))
            .with_body(tx_search_body(
                vec![tx_value("secret1sender", "secret1contract")],
                vec![tx_response_value(102, "TX102", "c2VjcmV0MWNvbnRyYWN0")],
            ))
            .create_async()
            .await
    }

    async fn assert_committed(store: &InMemoryStore, heights: std::ops::RangeInclusive<u64>) {
        for height in heights {
            let block = store
                .find_block(CHAIN_ID, height)
                .await
                .unwrap()
                .unwrap_or_else(|| panic!("block {} missing", height));
            assert_eq!(block.hash, format!("BLOCK{}", height));
            assert_eq!(
                store.count_transactions(CHAIN_ID, Some(height)).await.unwrap(),
                block.tx_count,
                "tx records of block {}",
                height
            );
        }
    }

    #[tokio::test]
    async fn syncs_from_configured_start_and_fails_over_on_server_error() {
        let mut e1 = Server::new_async().await;
        let mut e2 = Server::new_async().await;
        let mut lcd = Server::new_async().await;

        // the node keeps history from height 1, the configured start wins
        let e1_status = e1
            .mock("GET", path_matcher("/status"))
            .with_body(status_body(CHAIN_ID, 1, 102))
            .create_async()
            .await;
        let e1_heights = mock_heights(&mut e1, 100..=102).await;
        let _e2_status = e2
            .mock("GET", path_matcher("/status"))
            .with_body(status_body(CHAIN_ID, 1, 103))
            .create_async()
            .await;
        let _e2_heights = mock_heights(&mut e2, 100..=103).await;
        let _search = mock_tx_search(&mut lcd).await;

        let mut config =
            chain_config(vec![e1.url(), e2.url()], vec![lcd.url()], ContractFeature::SecretWasm);
        config.start_height = Some(100);
        let store = Arc::new(InMemoryStore::new());
        let ctx = context(config, store.clone());
        let driver = SyncDriver::new(ctx.clone(), InFlightGuard::new());

        let outcome = driver.sync().await.unwrap();
        assert_eq!(outcome, SyncOutcome::Completed { from: 100, to: 102 });
        assert_eq!(store.min_height(CHAIN_ID).await.unwrap(), Some(100));
        assert_eq!(store.max_height(CHAIN_ID).await.unwrap(), Some(102));
        assert_eq!(store.block_count(CHAIN_ID).await, 3);
        assert_committed(&store, 100..=102).await;
        assert_eq!(
            store.find_block(CHAIN_ID, 102).await.unwrap().unwrap().tx_count,
            1
        );
        let tx = store.find_transaction("TX102").await.unwrap().unwrap();
        assert_eq!(tx.height, 102);
        assert_eq!(tx.block_hash, "BLOCK102");

        // e1 starts failing, the next pass completes through e2
        e1_status.remove_async().await;
        for mock in e1_heights {
            mock.remove_async().await;
        }
        let _e1_down = e1
            .mock("GET", Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let outcome = driver.sync().await.unwrap();
        assert_eq!(outcome, SyncOutcome::Completed { from: 102, to: 103 });
        assert!(ctx.rpc.is_cooling_down(&e1.url()).await);
        assert_eq!(store.max_height(CHAIN_ID).await.unwrap(), Some(103));
        assert_committed(&store, 100..=103).await;
        assert_eq!(store.count_transactions(CHAIN_ID, None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn busy_guard_skips_without_network_calls() {
        let mut rpc = Server::new_async().await;
        let any = rpc
            .mock("GET", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let store = Arc::new(InMemoryStore::new());
        let guard = InFlightGuard::new();
        let driver = SyncDriver::new(
            context(
                chain_config(vec![rpc.url()], vec![rpc.url()], ContractFeature::None),
                store,
            ),
            guard.clone(),
        );

        let token = guard.try_enter().unwrap();
        assert_eq!(driver.sync().await.unwrap(), SyncOutcome::Skipped);
        any.assert_async().await;
        drop(token);
        assert!(!guard.is_running());
    }

    #[tokio::test]
    async fn configured_start_before_earliest_is_history_pruned() {
        let mut rpc = Server::new_async().await;
        let _status = rpc
            .mock("GET", path_matcher("/status"))
            .with_body(status_body(CHAIN_ID, 100, 102))
            .create_async()
            .await;

        let mut config = chain_config(vec![rpc.url()], vec![rpc.url()], ContractFeature::None);
        config.start_height = Some(50);
        let guard = InFlightGuard::new();
        let driver = SyncDriver::new(
            context(config, Arc::new(InMemoryStore::new())),
            guard.clone(),
        );

        let err = driver.sync().await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::HistoryPruned {
                earliest: 100,
                start: 50
            }
        ));
        // guard is released after a failed pass
        assert!(!guard.is_running());
    }

    #[tokio::test]
    async fn node_of_another_chain_is_fatal() {
        let mut rpc = Server::new_async().await;
        let _status = rpc
            .mock("GET", path_matcher("/status"))
            .with_body(status_body("other-1", 1, 2))
            .create_async()
            .await;
        let blocks = rpc
            .mock("GET", path_matcher("/block"))
            .expect(0)
            .create_async()
            .await;

        let driver = SyncDriver::new(
            context(
                chain_config(vec![rpc.url()], vec![rpc.url()], ContractFeature::None),
                Arc::new(InMemoryStore::new()),
            ),
            InFlightGuard::new(),
        );
        let err = driver.sync().await.unwrap_err();
        assert!(matches!(err, SyncError::ChainMismatch { .. }));
        blocks.assert_async().await;
    }

    #[tokio::test]
    async fn configured_start_height_is_honored() {
        let mut rpc = Server::new_async().await;
        let _status = rpc
            .mock("GET", path_matcher("/status"))
            .with_body(status_body(CHAIN_ID, 1, 101))
            .create_async()
            .await;
        let _heights = mock_heights(&mut rpc, 100..=101).await;

        let mut config = chain_config(vec![rpc.url()], vec![rpc.url()], ContractFeature::None);
        config.start_height = Some(100);
        let store = Arc::new(InMemoryStore::new());
        let driver = SyncDriver::new(context(config, store.clone()), InFlightGuard::new());

        assert_eq!(
            driver.sync().await.unwrap(),
            SyncOutcome::Completed { from: 100, to: 101 }
        );
        assert_eq!(store.block_count(CHAIN_ID).await, 2);
    }
}
