use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// A unit of periodic work. Each tick spawns `run`, so a module that must not
/// overlap with itself guards its own body.
#[async_trait]
pub trait RunnableModule: Send + Sync {
    async fn run(&self) -> anyhow::Result<()>;
    fn name(&self) -> String;
    fn interval(&self) -> Duration;
}

pub struct BlockchainExporter {
    modules: Vec<Arc<dyn RunnableModule>>,
}

impl BlockchainExporter {
    pub fn new(modules: Vec<Arc<dyn RunnableModule>>) -> Self {
        Self { modules }
    }

    pub fn number_of_modules(&self) -> usize {
        self.modules.len()
    }

    /// Starts one timer loop per module. Each loop sends on `finished` once it
    /// stopped after cancellation and its spawned runs completed.
    pub fn start(&self, token: CancellationToken, finished: UnboundedSender<()>) {
        for module in self.modules.iter() {
            let module = Arc::clone(module);
            let token = token.clone();
            let finished = finished.clone();

            tokio::spawn(async move {
                let name = module.name();
                let mut ticker = tokio::time::interval(module.interval());
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                let mut runs = JoinSet::new();

                info!("({}) Scheduled every {}s", name, module.interval().as_secs());
                loop {
                    tokio::select! {
                        _ = token.cancelled() => {
                            info!("({}) Stopping", name);
                            break;
                        }
                        _ = ticker.tick() => {
                            while runs.try_join_next().is_some() {}
                            let module = Arc::clone(&module);
                            let name = name.clone();
                            runs.spawn(async move {
                                if let Err(err) = module.run().await {
                                    error!("({}) Run failed:", name);
                                    for (i, cause) in err.chain().enumerate() {
                                        error!("({})   {}: {}", name, i, cause);
                                    }
                                }
                            });
                        }
                    }
                }

                while runs.join_next().await.is_some() {}
                let _ = finished.send(());
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc::unbounded_channel;

    struct Counting {
        runs: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl RunnableModule for Counting {
        async fn run(&self) -> anyhow::Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("scheduled failure");
            }
            Ok(())
        }

        fn name(&self) -> String {
            "Counting".to_string()
        }

        fn interval(&self) -> Duration {
            Duration::from_millis(10)
        }
    }

    #[tokio::test]
    async fn modules_keep_ticking_after_failures_and_report_shutdown() {
        let ok_runs = Arc::new(AtomicUsize::new(0));
        let failing_runs = Arc::new(AtomicUsize::new(0));
        let exporter = BlockchainExporter::new(vec![
            Arc::new(Counting {
                runs: ok_runs.clone(),
                fail: false,
            }),
            Arc::new(Counting {
                runs: failing_runs.clone(),
                fail: true,
            }),
        ]);

        let token = CancellationToken::new();
        let (tx, mut rx) = unbounded_channel();
        exporter.start(token.clone(), tx);

        tokio::time::sleep(Duration::from_millis(80)).await;
        token.cancel();

        for _ in 0..exporter.number_of_modules() {
            rx.recv().await.expect("module finished");
        }
        assert!(ok_runs.load(Ordering::SeqCst) >= 2);
        assert!(failing_runs.load(Ordering::SeqCst) >= 2);
    }
}
