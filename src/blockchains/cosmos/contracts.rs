use anyhow::Context;
use base64::{engine::general_purpose, Engine};
use std::sync::Arc;
use tracing::{debug, info};

use crate::core::app_context::ChainContext;
use crate::core::clients::http_client::RequestOptions;
use crate::core::clients::path::Path;
use crate::core::config::ContractFeature;
use crate::core::in_flight::InFlightGuard;

use super::metrics::EXPLORER_CONTRACTS_IMPORTED;
use super::storage::{ContractRecord, CONTRACTS_CURSOR};
use super::types::{
    NumTokens, SecretContractInfoResponse, SmartQueryResponse, WasmContractInfoResponse,
};

const NUM_TOKENS_QUERY: &str = r#"{"num_tokens":{}}"#;

/// Fills contract records for every contract the stored transactions executed,
/// resuming from the persisted `contracts` cursor.
pub struct ContractImporter {
    ctx: Arc<ChainContext>,
    guard: InFlightGuard,
}

impl ContractImporter {
    pub fn new(ctx: Arc<ChainContext>, guard: InFlightGuard) -> Self {
        Self { ctx, guard }
    }

    /// Number of contracts upserted, None when another import is in flight
    pub async fn import(&self) -> anyhow::Result<Option<usize>> {
        let Some(_token) = self.guard.try_enter() else {
            debug!(
                "(Cosmos Contracts) {} import already running, skipping",
                self.ctx.chain_id()
            );
            return Ok(None);
        };

        let chain_id = self.ctx.chain_id();
        let store = &self.ctx.store;
        let from = match store.get_cursor(chain_id, CONTRACTS_CURSOR).await? {
            Some(cursor) => cursor + 1,
            None => match store.min_height(chain_id).await? {
                Some(height) => height,
                None => return Ok(Some(0)),
            },
        };
        // sync re-imports the newest stored height, its txs may still be missing
        let Some(to) = store
            .max_height(chain_id)
            .await?
            .map(|height| height.saturating_sub(1))
        else {
            return Ok(Some(0));
        };
        if from > to {
            return Ok(Some(0));
        }

        let executed = store
            .executed_contracts_between(chain_id, from, to)
            .await
            .context("Could not list executed contracts")?;
        for (address, height) in &executed {
            let first_seen = match store.find_contract(chain_id, address).await? {
                Some(existing) => existing.first_seen_height.min(*height),
                None => *height,
            };
            let record = self
                .fetch_contract(address, first_seen)
                .await
                .with_context(|| format!("Could not import contract {}", address))?;
            store.upsert_contract(record).await?;
            EXPLORER_CONTRACTS_IMPORTED
                .with_label_values(&[chain_id])
                .inc();
        }

        store
            .set_cursor(chain_id, CONTRACTS_CURSOR, to)
            .await
            .context("Could not advance contracts cursor")?;
        info!(
            "(Cosmos Contracts) {} imported {} contracts from heights {} to {}",
            chain_id,
            executed.len(),
            from,
            to
        );
        Ok(Some(executed.len()))
    }

    pub async fn fetch_contract(
        &self,
        address: &str,
        first_seen_height: u64,
    ) -> anyhow::Result<ContractRecord> {
        let chain_id = self.ctx.chain_id().to_string();
        match self.ctx.config.contracts_feature {
            ContractFeature::SecretWasm => {
                let info: SecretContractInfoResponse = self
                    .ctx
                    .lcd
                    .get(Path::from(format!("/compute/v1beta1/info/{}", address)))
                    .await
                    .context("Could not fetch secret contract info")?;
                // secret contract state is encrypted, token counts cannot be queried
                Ok(ContractRecord {
                    chain_id,
                    address: info.contract_address,
                    code_id: info
                        .contract_info
                        .code_id
                        .parse()
                        .context("Invalid code id")?,
                    creator: info.contract_info.creator,
                    label: info.contract_info.label,
                    first_seen_height,
                    nft_token_count: None,
                })
            }
            ContractFeature::Cosmwasm => {
                let info: WasmContractInfoResponse = self
                    .ctx
                    .lcd
                    .get(Path::from(format!("/cosmwasm/wasm/v1/contract/{}", address)))
                    .await
                    .context("Could not fetch contract info")?;
                Ok(ContractRecord {
                    chain_id,
                    nft_token_count: self.nft_token_count(address).await,
                    address: info.address,
                    code_id: info
                        .contract_info
                        .code_id
                        .parse()
                        .context("Invalid code id")?,
                    creator: info.contract_info.creator,
                    label: info.contract_info.label,
                    first_seen_height,
                })
            }
            ContractFeature::None => {
                anyhow::bail!("{} has no contract runtime configured", chain_id)
            }
        }
    }

    /// CW721 token count, None when the contract does not answer the query
    async fn nft_token_count(&self, address: &str) -> Option<u64> {
        let query = general_purpose::STANDARD.encode(NUM_TOKENS_QUERY);
        let path = Path::from(format!(
            "/cosmwasm/wasm/v1/contract/{}/smart/{}",
            address, query
        ));
        let options = RequestOptions::default().without_isolation();
        match self
            .ctx
            .lcd
            .fetch::<SmartQueryResponse<NumTokens>, _>(path, &options, |_| true)
            .await
        {
            Ok(response) => Some(response.data.count),
            Err(e) => {
                debug!(
                    "(Cosmos Contracts) {} no token count for {}: {}",
                    self.ctx.chain_id(),
                    address,
                    e
                );
                None
            }
        }
    }
}
