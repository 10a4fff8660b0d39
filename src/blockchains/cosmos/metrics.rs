use lazy_static::lazy_static;
use prometheus::{CounterVec, IntCounterVec, IntGaugeVec, Opts, Registry};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref EXPLORER_SYNC_HEIGHT: IntGaugeVec = IntGaugeVec::new(
        Opts::new(
            "rcosmos_explorer_sync_height",
            "Last height fully imported by the sync pass"
        ),
        &["chain_id"]
    )
    .unwrap();
    pub static ref EXPLORER_CHAIN_HEAD_HEIGHT: IntGaugeVec = IntGaugeVec::new(
        Opts::new(
            "rcosmos_explorer_chain_head_height",
            "Latest height reported by the chain"
        ),
        &["chain_id"]
    )
    .unwrap();
    pub static ref EXPLORER_BLOCKS_IMPORTED: IntCounterVec = IntCounterVec::new(
        Opts::new("rcosmos_explorer_blocks_imported", "Blocks upserted"),
        &["chain_id"]
    )
    .unwrap();
    pub static ref EXPLORER_TXS_IMPORTED: IntCounterVec = IntCounterVec::new(
        Opts::new("rcosmos_explorer_txs_imported", "Transactions upserted"),
        &["chain_id"]
    )
    .unwrap();
    pub static ref EXPLORER_SYNC_ERRORS: CounterVec = CounterVec::new(
        Opts::new(
            "rcosmos_explorer_sync_errors",
            "Aborted passes by module and error kind"
        ),
        &["chain_id", "module", "kind"]
    )
    .unwrap();
    pub static ref EXPLORER_VALIDATORS: IntGaugeVec = IntGaugeVec::new(
        Opts::new(
            "rcosmos_explorer_validators",
            "Validators seen by the last refresh"
        ),
        &["chain_id"]
    )
    .unwrap();
    pub static ref EXPLORER_PROPOSALS: IntGaugeVec = IntGaugeVec::new(
        Opts::new(
            "rcosmos_explorer_proposals",
            "Proposals seen by the last refresh"
        ),
        &["chain_id"]
    )
    .unwrap();
    pub static ref EXPLORER_CONTRACTS_IMPORTED: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "rcosmos_explorer_contracts_imported",
            "Contract metadata records upserted"
        ),
        &["chain_id"]
    )
    .unwrap();
    pub static ref EXPLORER_PRUNED_BLOCKS: IntCounterVec = IntCounterVec::new(
        Opts::new("rcosmos_explorer_pruned_blocks", "Blocks deleted by pruning"),
        &["chain_id"]
    )
    .unwrap();
}

pub fn cosmos_custom_metrics() {
    REGISTRY
        .register(Box::new(EXPLORER_SYNC_HEIGHT.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(EXPLORER_CHAIN_HEAD_HEIGHT.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(EXPLORER_BLOCKS_IMPORTED.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(EXPLORER_TXS_IMPORTED.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(EXPLORER_SYNC_ERRORS.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(EXPLORER_VALIDATORS.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(EXPLORER_PROPOSALS.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(EXPLORER_CONTRACTS_IMPORTED.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(EXPLORER_PRUNED_BLOCKS.clone()))
        .unwrap();
}
