use anyhow::Context;
use std::sync::Arc;
use tracing::info;

use crate::core::app_context::ChainContext;
use crate::core::clients::path::Path;

use super::address::consensus_address;
use super::metrics::EXPLORER_VALIDATORS;
use super::storage::ValidatorRecord;
use super::types::{LcdValidator, ValidatorsResponse};

const PAGE_LIMIT: u64 = 200;
const ED25519_PUBKEY: &str = "/cosmos.crypto.ed25519.PubKey";

pub struct ValidatorRefresher {
    ctx: Arc<ChainContext>,
}

impl ValidatorRefresher {
    pub fn new(ctx: Arc<ChainContext>) -> Self {
        Self { ctx }
    }

    async fn get_validators(&self) -> anyhow::Result<Vec<LcdValidator>> {
        let mut validators = Vec::new();
        let mut next_key: Option<String> = None;
        loop {
            let mut path = Path::from("/cosmos/staking/v1beta1/validators")
                .with_query("pagination.limit", PAGE_LIMIT);
            if let Some(key) = &next_key {
                path = path.with_query("pagination.key", key);
            }
            let page: ValidatorsResponse = self
                .ctx
                .lcd
                .get(path)
                .await
                .context("Could not fetch validators")?;
            validators.extend(page.validators);

            next_key = page
                .pagination
                .and_then(|p| p.next_key)
                .filter(|key| !key.is_empty());
            if next_key.is_none() {
                break;
            }
        }
        Ok(validators)
    }

    pub async fn refresh(&self) -> anyhow::Result<usize> {
        let chain_id = self.ctx.chain_id();
        let validators = self.get_validators().await?;

        let mut records = Vec::with_capacity(validators.len());
        for validator in validators {
            let consensus = match &validator.consensus_pubkey {
                Some(key) if key.type_url == ED25519_PUBKEY => Some(
                    consensus_address(&key.key).with_context(|| {
                        format!(
                            "Could not derive consensus address of {}",
                            validator.operator_address
                        )
                    })?,
                ),
                _ => None,
            };
            records.push(ValidatorRecord {
                chain_id: chain_id.to_string(),
                consensus_pubkey: validator.consensus_pubkey.map(|k| k.key),
                consensus_address: consensus,
                operator_address: validator.operator_address,
                moniker: validator.description.moniker,
                status: validator.status,
                jailed: validator.jailed,
                tokens: validator.tokens,
                delegator_shares: validator.delegator_shares,
                commission_rate: validator.commission.commission_rates.rate,
            });
        }

        let count = records.len();
        self.ctx
            .store
            .upsert_validators(records)
            .await
            .context("Could not store validators")?;
        EXPLORER_VALIDATORS
            .with_label_values(&[chain_id])
            .set(count as i64);
        info!("(Cosmos Validators) {} refreshed {} validators", chain_id, count);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchains::cosmos::storage::InMemoryStore;
    use crate::blockchains::cosmos::test_support::*;
    use crate::core::config::ContractFeature;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn validator(operator: &str, key_type: &str) -> serde_json::Value {
        json!({
            "operator_address": operator,
            "consensus_pubkey": {"@type": key_type, "key": "qqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqo="},
            "jailed": false,
            "status": "BOND_STATUS_BONDED",
            "tokens": "1000000",
            "delegator_shares": "1000000.000000000000000000",
            "description": {"moniker": operator.to_uppercase()},
            "commission": {"commission_rates": {"rate": "0.050000000000000000", "max_rate": "0.2"}}
        })
    }

    #[tokio::test]
    async fn follows_pagination_keys() {
        let mut lcd = Server::new_async().await;
        let first = lcd
            .mock("GET", path_matcher("/cosmos/staking/v1beta1/validators"))
            .match_query(Matcher::Regex("^pagination.limit=200$".into()))
            .with_body(
                json!({
                    "validators": [validator("secretvaloper1a", "/cosmos.crypto.ed25519.PubKey")],
                    "pagination": {"next_key": "AAE=", "total": "2"}
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;
        let second = lcd
            .mock("GET", path_matcher("/cosmos/staking/v1beta1/validators"))
            .match_query(Matcher::UrlEncoded("pagination.key".into(), "AAE=".into()))
            .with_body(
                json!({
                    "validators": [validator("secretvaloper1b", "/cosmos.crypto.secp256k1.PubKey")],
                    "pagination": {"next_key": null, "total": "0"}
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let store = Arc::new(InMemoryStore::new());
        let refresher = ValidatorRefresher::new(context(
            chain_config(vec![lcd.url()], vec![lcd.url()], ContractFeature::None),
            store.clone(),
        ));
        assert_eq!(refresher.refresh().await.unwrap(), 2);
        first.assert_async().await;
        second.assert_async().await;

        let validators = store.validators(CHAIN_ID).await;
        assert_eq!(validators[0].operator_address, "secretvaloper1a");
        assert_eq!(
            validators[0].consensus_address.as_deref(),
            Some("E0E77A507412B120F6EDE61F62295B1A7B2FF19D")
        );
        assert_eq!(validators[0].moniker, "SECRETVALOPER1A");
        assert_eq!(validators[1].consensus_address, None);
        assert_eq!(validators[1].commission_rate, "0.050000000000000000");
    }
}
