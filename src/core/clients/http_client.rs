use reqwest::{Client, ClientBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::cooldown::CooldownTable;
use super::path::Path;
use crate::core::metrics::exporter_metrics::{
    EXPLORER_ENDPOINT_COOLDOWNS, EXPLORER_HTTP_REQUESTS,
};
use crate::core::utils::create_error_preview;

/// Default per-request timeout when none is configured.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Construct a full URL from an endpoint base url and a path
fn construct_url(endpoint: &str, path: &Path) -> String {
    format!("{}{}", endpoint.trim_end_matches('/'), path.as_str())
}

/// Why a single endpoint could not serve a request
#[derive(Debug, Error)]
pub enum FailureReason {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(StatusCode),

    #[error("could not decode response: {source} (body: {preview})")]
    Decode {
        #[source]
        source: serde_json::Error,
        preview: String,
    },

    #[error("response rejected by verifier")]
    Verification,
}

impl FailureReason {
    /// 404 and 501 mean the query itself is unanswerable there, not that the endpoint is sick.
    pub fn isolates_endpoint(&self) -> bool {
        !matches!(
            self,
            FailureReason::Status(status)
                if *status == StatusCode::NOT_FOUND || *status == StatusCode::NOT_IMPLEMENTED
        )
    }
}

#[derive(Debug)]
pub struct EndpointFailure {
    pub endpoint: String,
    pub reason: FailureReason,
}

fn format_failures(failures: &[EndpointFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.endpoint, f.reason))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("No endpoints configured for {0}")]
    NoEndpoints(String),

    #[error("Could not build http client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("All endpoints of {chain_id} are cooling down, not calling {path}")]
    Exhausted { chain_id: String, path: String },

    #[error("All endpoints failed when calling {path}: {}", format_failures(.failures))]
    AllFailed {
        path: String,
        failures: Vec<EndpointFailure>,
    },
}

/// Per-request overrides merged over the pool defaults
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub timeout: Option<Duration>,
    pub query: Vec<(String, String)>,
    /// false for optional queries whose failure says nothing about endpoint health
    pub isolate_on_failure: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            query: Vec::new(),
            isolate_on_failure: true,
        }
    }
}

impl RequestOptions {
    pub fn without_isolation(mut self) -> Self {
        self.isolate_on_failure = false;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }
}

///
/// EndpointPool serves one logical chain surface (RPC or LCD) from an ordered
/// list of equivalent endpoints.
///
/// The first eligible endpoint is always tried first. Endpoints that fail with
/// anything but 404/501 are isolated for the cooldown window and come back on
/// their own once it elapses; there is no background probing.
///
pub struct EndpointPool {
    chain_id: String,
    endpoints: Vec<String>,
    client: Client,
    cooldowns: Mutex<CooldownTable>,
}

impl EndpointPool {
    pub fn new(
        chain_id: impl Into<String>,
        endpoints: Vec<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, PoolError> {
        let chain_id = chain_id.into();
        if endpoints.is_empty() {
            return Err(PoolError::NoEndpoints(chain_id));
        }

        let client = ClientBuilder::new()
            .timeout(timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT))
            .build()?;

        let endpoints = endpoints
            .into_iter()
            .map(|url| url.trim_end_matches('/').to_string())
            .collect();

        Ok(Self {
            chain_id,
            endpoints,
            client,
            cooldowns: Mutex::new(CooldownTable::default()),
        })
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    pub async fn is_cooling_down(&self, endpoint: &str) -> bool {
        self.cooldowns
            .lock()
            .await
            .is_isolated(endpoint.trim_end_matches('/'))
    }

    /// Purges expired cooldowns and returns the eligible endpoints in configured order
    pub async fn candidates(&self) -> Vec<String> {
        let mut cooldowns = self.cooldowns.lock().await;
        for endpoint in cooldowns.purge_expired(Instant::now()) {
            info!(
                "(EndpointPool) {} endpoint {} is back in rotation",
                self.chain_id, endpoint
            );
        }
        self.endpoints
            .iter()
            .filter(|endpoint| !cooldowns.is_isolated(endpoint))
            .cloned()
            .collect()
    }

    pub(crate) async fn isolate(&self, endpoint: &str) {
        let endpoint = endpoint.trim_end_matches('/');
        self.cooldowns.lock().await.isolate(endpoint, Instant::now());
        EXPLORER_ENDPOINT_COOLDOWNS
            .with_label_values(&[endpoint, &self.chain_id])
            .inc();
    }

    /// GET and decode, accepting whatever the first healthy endpoint returns
    pub async fn get<T: DeserializeOwned>(&self, path: Path) -> Result<T, PoolError> {
        self.fetch(path, &RequestOptions::default(), |_: &T| true)
            .await
    }

    /// GET and decode, moving on to the next endpoint whenever `verify` rejects the body
    pub async fn fetch<T, F>(
        &self,
        path: Path,
        options: &RequestOptions,
        verify: F,
    ) -> Result<T, PoolError>
    where
        T: DeserializeOwned,
        F: Fn(&T) -> bool,
    {
        let candidates = self.candidates().await;
        if candidates.is_empty() {
            warn!(
                "(EndpointPool) {} has every endpoint cooling down, skipping {}",
                self.chain_id, path
            );
            return Err(PoolError::Exhausted {
                chain_id: self.chain_id.clone(),
                path: path.to_string(),
            });
        }

        let mut failures = Vec::new();
        for endpoint in candidates {
            let reason = match self.attempt::<T>(&endpoint, &path, options).await {
                Ok(body) if verify(&body) => return Ok(body),
                Ok(_) => FailureReason::Verification,
                Err(reason) => reason,
            };

            if options.isolate_on_failure && reason.isolates_endpoint() {
                warn!(
                    "(EndpointPool) {} isolating {} for {}s after calling {}: {}",
                    self.chain_id,
                    endpoint,
                    super::cooldown::COOLDOWN_WINDOW.as_secs(),
                    path,
                    reason
                );
                self.isolate(&endpoint).await;
            } else {
                debug!(
                    "(EndpointPool) {} endpoint {} cannot answer {}: {}",
                    self.chain_id, endpoint, path, reason
                );
            }
            failures.push(EndpointFailure { endpoint, reason });
        }

        Err(PoolError::AllFailed {
            path: path.to_string(),
            failures,
        })
    }

    async fn attempt<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        path: &Path,
        options: &RequestOptions,
    ) -> Result<T, FailureReason> {
        let url = construct_url(endpoint, path);
        debug!("(EndpointPool) GET {}", url);

        let mut request = self.client.get(&url);
        if !options.query.is_empty() {
            request = request.query(&options.query);
        }
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                EXPLORER_HTTP_REQUESTS
                    .with_label_values(&[endpoint, "error", &self.chain_id])
                    .inc();
                return Err(e.into());
            }
        };

        let status = response.status();
        EXPLORER_HTTP_REQUESTS
            .with_label_values(&[endpoint, &status.as_u16().to_string(), &self.chain_id])
            .inc();
        if !status.is_success() {
            return Err(FailureReason::Status(status));
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|source| FailureReason::Decode {
            source,
            preview: create_error_preview(&text, 200),
        })
    }
}
