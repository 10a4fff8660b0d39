use anyhow::Context;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::core::app_context::ChainContext;
use crate::core::exporter::RunnableModule;
use crate::core::in_flight::InFlightGuard;

use super::contracts::ContractImporter;
use super::proposals::ProposalRefresher;
use super::prune::Pruner;
use super::sync::SyncDriver;
use super::validators::ValidatorRefresher;

/// Owns the per-chain state every module of one chain shares
pub struct ChainSupervisor {
    ctx: Arc<ChainContext>,
    sync_guard: InFlightGuard,
    contracts_guard: InFlightGuard,
}

impl ChainSupervisor {
    pub fn new(ctx: Arc<ChainContext>) -> Self {
        Self {
            ctx,
            sync_guard: InFlightGuard::new(),
            contracts_guard: InFlightGuard::new(),
        }
    }

    pub fn context(&self) -> &Arc<ChainContext> {
        &self.ctx
    }

    pub fn sync_driver(&self) -> SyncDriver {
        SyncDriver::new(self.ctx.clone(), self.sync_guard.clone())
    }

    /// Modules enabled for this chain
    pub fn modules(&self) -> Vec<Arc<dyn RunnableModule>> {
        let config = &self.ctx.config;
        let mut modules: Vec<Arc<dyn RunnableModule>> = Vec::new();

        if config.sync.enabled {
            modules.push(Arc::new(SyncModule {
                chain_id: config.chain_id.clone(),
                driver: self.sync_driver(),
                interval: Duration::from_secs(config.sync.interval),
            }));
        }
        if config.validators.enabled {
            modules.push(Arc::new(ValidatorModule {
                chain_id: config.chain_id.clone(),
                refresher: ValidatorRefresher::new(self.ctx.clone()),
                interval: Duration::from_secs(config.validators.interval),
            }));
        }
        if config.proposals.enabled {
            modules.push(Arc::new(ProposalModule {
                chain_id: config.chain_id.clone(),
                refresher: ProposalRefresher::new(self.ctx.clone()),
                interval: Duration::from_secs(config.proposals.interval),
            }));
        }
        if config.contracts.enabled {
            modules.push(Arc::new(ContractModule {
                chain_id: config.chain_id.clone(),
                importer: ContractImporter::new(self.ctx.clone(), self.contracts_guard.clone()),
                interval: Duration::from_secs(config.contracts.interval),
            }));
        }
        if config.pruning.enabled {
            modules.push(Arc::new(PruneModule {
                chain_id: config.chain_id.clone(),
                pruner: Pruner::new(self.ctx.clone()),
                interval: Duration::from_secs(config.pruning.interval),
            }));
        }
        modules
    }
}

struct SyncModule {
    chain_id: String,
    driver: SyncDriver,
    interval: Duration,
}

#[async_trait]
impl RunnableModule for SyncModule {
    async fn run(&self) -> anyhow::Result<()> {
        self.driver
            .sync()
            .await
            .with_context(|| format!("Sync pass of {} failed", self.chain_id))?;
        Ok(())
    }

    fn name(&self) -> String {
        format!("Cosmos Sync {}", self.chain_id)
    }

    fn interval(&self) -> Duration {
        self.interval
    }
}

struct ValidatorModule {
    chain_id: String,
    refresher: ValidatorRefresher,
    interval: Duration,
}

#[async_trait]
impl RunnableModule for ValidatorModule {
    async fn run(&self) -> anyhow::Result<()> {
        self.refresher.refresh().await?;
        Ok(())
    }

    fn name(&self) -> String {
        format!("Cosmos Validators {}", self.chain_id)
    }

    fn interval(&self) -> Duration {
        self.interval
    }
}

struct ProposalModule {
    chain_id: String,
    refresher: ProposalRefresher,
    interval: Duration,
}

#[async_trait]
impl RunnableModule for ProposalModule {
    async fn run(&self) -> anyhow::Result<()> {
        self.refresher.refresh().await?;
        Ok(())
    }

    fn name(&self) -> String {
        format!("Cosmos Proposals {}", self.chain_id)
    }

    fn interval(&self) -> Duration {
        self.interval
    }
}

struct ContractModule {
    chain_id: String,
    importer: ContractImporter,
    interval: Duration,
}

#[async_trait]
impl RunnableModule for ContractModule {
    async fn run(&self) -> anyhow::Result<()> {
        self.importer.import().await?;
        Ok(())
    }

    fn name(&self) -> String {
        format!("Cosmos Contracts {}", self.chain_id)
    }

    fn interval(&self) -> Duration {
        self.interval
    }
}

struct PruneModule {
    chain_id: String,
    pruner: Pruner,
    interval: Duration,
}

#[async_trait]
impl RunnableModule for PruneModule {
    async fn run(&self) -> anyhow::Result<()> {
        self.pruner.prune().await?;
        Ok(())
    }

    fn name(&self) -> String {
        format!("Cosmos Prune {}", self.chain_id)
    }

    fn interval(&self) -> Duration {
        self.interval
    }
}
