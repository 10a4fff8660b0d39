use anyhow::Context;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::core::app_context::ChainContext;
use crate::core::clients::path::Path;

use super::metrics::EXPLORER_PROPOSALS;
use super::storage::ProposalRecord;
use super::types::{LcdProposal, ProposalsResponse};

const PAGE_LIMIT: u64 = 100;

pub struct ProposalRefresher {
    ctx: Arc<ChainContext>,
}

impl ProposalRefresher {
    pub fn new(ctx: Arc<ChainContext>) -> Self {
        Self { ctx }
    }

    async fn get_proposals(&self) -> anyhow::Result<Vec<Value>> {
        let mut proposals = Vec::new();
        let mut next_key: Option<String> = None;
        loop {
            let mut path = Path::from("/cosmos/gov/v1beta1/proposals")
                .with_query("pagination.limit", PAGE_LIMIT);
            if let Some(key) = &next_key {
                path = path.with_query("pagination.key", key);
            }
            let page: ProposalsResponse = self
                .ctx
                .lcd
                .get(path)
                .await
                .context("Could not fetch proposals")?;
            proposals.extend(page.proposals);

            next_key = page
                .pagination
                .and_then(|p| p.next_key)
                .filter(|key| !key.is_empty());
            if next_key.is_none() {
                break;
            }
        }
        Ok(proposals)
    }

    pub async fn refresh(&self) -> anyhow::Result<usize> {
        let chain_id = self.ctx.chain_id();
        let mut records = Vec::new();
        for raw in self.get_proposals().await? {
            let proposal: LcdProposal =
                serde_json::from_value(raw.clone()).context("Could not decode proposal")?;
            let id = proposal
                .proposal_id
                .parse::<u64>()
                .with_context(|| format!("Invalid proposal id {}", proposal.proposal_id))?;
            records.push(ProposalRecord {
                chain_id: chain_id.to_string(),
                id,
                title: proposal.content.map(|c| c.title).unwrap_or_default(),
                status: proposal.status,
                submit_time: proposal.submit_time,
                voting_start_time: proposal.voting_start_time,
                voting_end_time: proposal.voting_end_time,
                raw,
            });
        }

        let count = records.len();
        self.ctx
            .store
            .upsert_proposals(records)
            .await
            .context("Could not store proposals")?;
        EXPLORER_PROPOSALS
            .with_label_values(&[chain_id])
            .set(count as i64);
        info!("(Cosmos Proposals) {} refreshed {} proposals", chain_id, count);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchains::cosmos::storage::InMemoryStore;
    use crate::blockchains::cosmos::test_support::*;
    use crate::core::config::ContractFeature;
    use mockito::Server;
    use serde_json::json;

    #[tokio::test]
    async fn stores_proposals_with_raw_payload() {
        let mut lcd = Server::new_async().await;
        let _m = lcd
            .mock("GET", path_matcher("/cosmos/gov/v1beta1/proposals"))
            .with_body(
                json!({
                    "proposals": [
                        {
                            "proposal_id": "7",
                            "content": {"@type": "/cosmos.gov.v1beta1.TextProposal", "title": "Raise gas"},
                            "status": "PROPOSAL_STATUS_PASSED",
                            "submit_time": "2024-01-01T00:00:00Z",
                            "voting_start_time": "2024-01-02T00:00:00Z",
                            "voting_end_time": "2024-01-09T00:00:00Z"
                        },
                        {
                            "proposal_id": "8",
                            "status": "PROPOSAL_STATUS_DEPOSIT_PERIOD",
                            "submit_time": "2024-02-01T00:00:00Z",
                            "voting_start_time": null,
                            "voting_end_time": null
                        }
                    ],
                    "pagination": {"next_key": null, "total": "2"}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let store = Arc::new(InMemoryStore::new());
        let refresher = ProposalRefresher::new(context(
            chain_config(vec![lcd.url()], vec![lcd.url()], ContractFeature::None),
            store.clone(),
        ));
        assert_eq!(refresher.refresh().await.unwrap(), 2);

        let proposals = store.proposals(CHAIN_ID).await;
        assert_eq!(proposals[0].id, 7);
        assert_eq!(proposals[0].title, "Raise gas");
        assert!(proposals[0].voting_end_time.is_some());
        assert_eq!(proposals[1].title, "");
        assert_eq!(proposals[1].voting_start_time, None);
        assert_eq!(proposals[1].raw["proposal_id"], "8");
    }
}
