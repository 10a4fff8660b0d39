use lazy_static::lazy_static;
use prometheus::{CounterVec, IntGauge, IntGaugeVec, Opts, Registry};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

lazy_static! {
    pub static ref EXPLORER_REGISTRY: Registry = Registry::new();
    pub static ref EXPLORER_HTTP_REQUESTS: CounterVec = CounterVec::new(
        Opts::new(
            "rcosmos_explorer_http_requests",
            "rcosmos explorer http requests by endpoint and status"
        ),
        &["endpoint", "status_code", "chain_id"]
    )
    .unwrap();
    pub static ref EXPLORER_ENDPOINT_COOLDOWNS: CounterVec = CounterVec::new(
        Opts::new(
            "rcosmos_explorer_endpoint_cooldowns",
            "Times an endpoint was isolated after a failure"
        ),
        &["endpoint", "chain_id"]
    )
    .unwrap();
    pub static ref EXPLORER_APP_VERSION_INFO: IntGaugeVec = IntGaugeVec::new(
        Opts::new("rcosmos_explorer_app_version_info", "Build information"),
        &["version", "commit_hash", "build_date"]
    )
    .unwrap();
    pub static ref EXPLORER_HEARTBEAT: IntGauge = IntGauge::new(
        "rcosmos_explorer_heartbeat",
        "Unix time of the last explorer heartbeat"
    )
    .unwrap();
}

pub fn register_explorer_metrics() {
    EXPLORER_REGISTRY
        .register(Box::new(EXPLORER_HTTP_REQUESTS.clone()))
        .unwrap();
    EXPLORER_REGISTRY
        .register(Box::new(EXPLORER_ENDPOINT_COOLDOWNS.clone()))
        .unwrap();
    EXPLORER_REGISTRY
        .register(Box::new(EXPLORER_APP_VERSION_INFO.clone()))
        .unwrap();
    EXPLORER_REGISTRY
        .register(Box::new(EXPLORER_HEARTBEAT.clone()))
        .unwrap();
}

pub fn register_app_version_info() {
    EXPLORER_APP_VERSION_INFO
        .with_label_values(&[
            env!("CARGO_PKG_VERSION"),
            env!("GIT_COMMIT_HASH"),
            env!("BUILD_DATE"),
        ])
        .set(1);
}

pub fn start_heartbeat() {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(10));
        loop {
            ticker.tick().await;
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs() as i64)
                .unwrap_or_default();
            EXPLORER_HEARTBEAT.set(now);
        }
    });
}
