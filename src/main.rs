use std::sync::Arc;

use tokio::{signal, sync::mpsc::unbounded_channel};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use rcosmos_explorer::blockchains::cosmos::metrics::cosmos_custom_metrics;
use rcosmos_explorer::blockchains::cosmos::supervisor::ChainSupervisor;
use rcosmos_explorer::core::app_context::ChainContext;
use rcosmos_explorer::core::exporter::BlockchainExporter;
use rcosmos_explorer::core::metrics::exporter_metrics::{
    register_app_version_info, register_explorer_metrics, start_heartbeat,
};
use rcosmos_explorer::core::metrics::serve_metrics::serve_metrics;
use rcosmos_explorer::core::startup::{build_store, exit_with, load_config_or_exit, rpc_timeout};

#[tokio::main]
async fn main() {
    // It's okay if .env doesn't exist
    let _ = dotenv::dotenv();

    println!("{}", banner());

    let mut args = std::env::args().skip(1);
    let mut config_path = "config.yaml".to_string();
    while let Some(arg) = args.next() {
        if arg == "--config" {
            if let Some(path) = args.next() {
                config_path = path;
            } else {
                eprintln!("--config flag provided but no file specified");
                std::process::exit(1);
            }
        }
    }

    let config = load_config_or_exit(&config_path);

    register_explorer_metrics();
    cosmos_custom_metrics();
    register_app_version_info();
    start_heartbeat();

    let store = match build_store(config.general.storage).await {
        Ok(store) => store,
        Err(err) => exit_with(&err, "Storage setup failed"),
    };

    let timeout = rpc_timeout(&config);
    let mut modules = Vec::new();
    for chain in &config.chains {
        let ctx = match ChainContext::new(chain.clone(), timeout, store.clone()) {
            Ok(ctx) => Arc::new(ctx),
            Err(e) => exit_with(&anyhow::Error::new(e), "Startup failed"),
        };
        let supervisor = ChainSupervisor::new(ctx);
        let chain_modules = supervisor.modules();
        if chain_modules.is_empty() {
            warn!("[main] {} has no module enabled", chain.chain_id);
        }
        info!(
            "[main] {} ({}) runs {} modules over {} rpc and {} lcd endpoints",
            chain.chain_id,
            chain.name,
            chain_modules.len(),
            chain.nodes.rpc.len(),
            chain.nodes.lcd.len()
        );
        modules.extend(chain_modules);
    }

    let token = CancellationToken::new();
    let (tx, mut rx) = unbounded_channel();
    let exporter = BlockchainExporter::new(modules);
    exporter.start(token.clone(), tx);

    let metrics = config.general.metrics.clone();
    tokio::select! {
        _ = serve_metrics(metrics.address, metrics.port, metrics.path) => {
            error!("Hyper server exited.");
        },
        _ = listen_for_shutdown(token.clone()) => {
            let number_of_modules = exporter.number_of_modules();
            let mut finished_modules = 0;

            while number_of_modules > 0 && rx.recv().await.is_some() {
                finished_modules += 1;
                info!("[main] Waiting for modules: {}/{}", finished_modules, number_of_modules);
                if finished_modules == number_of_modules {
                    info!("[main] All modules finished...");
                    break;
                }
            }

            info!("Gracefully shut down server.")
        }
    }
}

pub async fn listen_for_shutdown(cancel_token: CancellationToken) {
    let sigint = signal::ctrl_c();
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = sigint => info!("Received SIGINT"),
                _ = sigterm.recv() => info!("Received SIGTERM"),
            }
        }
        Err(e) => {
            warn!("Could not listen for SIGTERM: {}", e);
            let _ = sigint.await;
            info!("Received SIGINT");
        }
    }

    cancel_token.cancel();
}

fn banner() -> &'static str {
    r#"
  ___  ___ ___  ___ __  __  ___  ___
 | _ \/ __/ _ \/ __|  \/  |/ _ \/ __|
 |   / (_| (_) \__ \ |\/| | (_) \__ \
 |_|_\\___\___/|___/_|  |_|\___/|___/
            E X P L O R E R
"#
}
