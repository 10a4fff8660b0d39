use std::sync::Arc;
use tracing::info;

use rcosmos_explorer::core::app_context::ChainContext;
use rcosmos_explorer::core::repair::{run_repair, REPAIR_CONCURRENCY};
use rcosmos_explorer::core::startup::{build_store, exit_with, load_config_or_exit, rpc_timeout};

fn usage_error(message: &str) -> ! {
    eprintln!("{}", message);
    eprintln!(
        "Usage: rcosmos-explorer-repair [--config FILE] --chain CHAIN_ID --start-height N --end-height M"
    );
    std::process::exit(1);
}

fn parse_height(flag: &str, value: Option<String>) -> u64 {
    let Some(value) = value else {
        usage_error(&format!("{} flag provided but no value specified", flag));
    };
    value
        .parse::<u64>()
        .unwrap_or_else(|_| usage_error(&format!("{} must be a non-negative integer", flag)))
}

#[tokio::main]
async fn main() {
    let _ = dotenv::dotenv();

    // Parse flags: --config, --chain, --start-height, --end-height
    let mut args = std::env::args().skip(1);
    let mut config_path = "config.yaml".to_string();
    let mut chain_id: Option<String> = None;
    let mut start_height: Option<u64> = None;
    let mut end_height: Option<u64> = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => match args.next() {
                Some(path) => config_path = path,
                None => usage_error("--config flag provided but no file specified"),
            },
            "--chain" => match args.next() {
                Some(id) => chain_id = Some(id),
                None => usage_error("--chain flag provided but no chain id specified"),
            },
            "--start-height" => start_height = Some(parse_height("--start-height", args.next())),
            "--end-height" => end_height = Some(parse_height("--end-height", args.next())),
            other => usage_error(&format!("Unknown argument: {}", other)),
        }
    }

    let Some(chain_id) = chain_id else {
        usage_error("--chain is required");
    };
    let (Some(start_height), Some(end_height)) = (start_height, end_height) else {
        usage_error("--start-height and --end-height are required");
    };

    let config = load_config_or_exit(&config_path);
    let chain = match config.find_chain(&chain_id) {
        Ok(chain) => chain.clone(),
        Err(e) => exit_with(&anyhow::Error::new(e), "Invalid repair target"),
    };

    let store = match build_store(config.general.storage).await {
        Ok(store) => store,
        Err(err) => exit_with(&err, "Storage setup failed"),
    };
    let ctx = match ChainContext::new(chain, rpc_timeout(&config), store) {
        Ok(ctx) => Arc::new(ctx),
        Err(e) => exit_with(&anyhow::Error::new(e), "Startup failed"),
    };

    match run_repair(ctx, start_height, end_height, REPAIR_CONCURRENCY).await {
        Ok(summary) => info!(
            "(Repair) {} done: {} blocks, {} transactions",
            chain_id, summary.blocks, summary.transactions
        ),
        Err(err) => exit_with(&err, "Repair failed"),
    }
}
