use std::sync::Arc;
use std::time::Duration;

use crate::blockchains::cosmos::storage::ChainStore;
use crate::core::clients::http_client::{EndpointPool, PoolError};
use crate::core::config::ChainConfig;

/// Everything a chain's modules share: its configuration, one pool per
/// surface and the store handle.
pub struct ChainContext {
    pub config: ChainConfig,
    pub rpc: Arc<EndpointPool>,
    pub lcd: Arc<EndpointPool>,
    pub store: Arc<dyn ChainStore>,
}

impl ChainContext {
    pub fn new(
        config: ChainConfig,
        timeout: Duration,
        store: Arc<dyn ChainStore>,
    ) -> Result<Self, PoolError> {
        let rpc = EndpointPool::new(
            config.chain_id.clone(),
            config.nodes.rpc_urls(),
            Some(timeout),
        )?;
        let lcd = EndpointPool::new(
            config.chain_id.clone(),
            config.nodes.lcd_urls(),
            Some(timeout),
        )?;
        Ok(Self {
            config,
            rpc: Arc::new(rpc),
            lcd: Arc::new(lcd),
            store,
        })
    }

    pub fn chain_id(&self) -> &str {
        &self.config.chain_id
    }
}
