//! Chain module - JSON-RPC access to the configured networks
//!
//! This module provides:
//! - The `ChainClient` seam every workflow step talks through
//! - Multi-RPC providers with failover on read calls
//! - Bounded receipt polling

pub mod provider;
pub mod receipt;

pub use provider::ChainProvider;
pub use receipt::ReceiptWatcher;

use crate::config::{NetworkConfig, Settings};
use crate::error::{SubmissionError, SubmissionResult};

use async_trait::async_trait;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionReceipt, H256, U256};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// JSON-RPC operations needed to build, submit and confirm a transaction
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Chain id this client was configured for
    fn chain_id(&self) -> u64;

    /// Chain id reported by the endpoint itself
    async fn remote_chain_id(&self) -> SubmissionResult<U256>;

    async fn get_balance(&self, address: Address) -> SubmissionResult<U256>;

    /// Pending transaction count, used as the next nonce
    async fn get_transaction_count(&self, address: Address) -> SubmissionResult<U256>;

    async fn get_gas_price(&self) -> SubmissionResult<U256>;

    async fn estimate_gas(&self, tx: &TypedTransaction) -> SubmissionResult<U256>;

    /// Read-only contract call
    async fn call(&self, tx: &TypedTransaction) -> SubmissionResult<Bytes>;

    async fn send_raw_transaction(&self, raw: Bytes) -> SubmissionResult<H256>;

    async fn get_transaction_receipt(
        &self,
        tx_hash: H256,
    ) -> SubmissionResult<Option<TransactionReceipt>>;
}

/// A configured network together with its client
#[derive(Clone)]
pub struct Network {
    pub key: String,
    pub config: NetworkConfig,
    pub client: Arc<dyn ChainClient>,
}

impl Network {
    /// Check that the endpoint really serves the configured chain
    pub async fn verify_chain_id(&self) -> SubmissionResult<()> {
        let remote = self.client.remote_chain_id().await?;
        if remote != U256::from(self.config.chain_id) {
            return Err(SubmissionError::ChainMismatch {
                expected: self.config.chain_id,
                actual: remote.low_u64(),
            });
        }
        debug!("Endpoint for {} verified as chain {}", self.key, remote);
        Ok(())
    }
}

/// All enabled networks, keyed by their config name
pub struct NetworkRegistry {
    networks: HashMap<String, Network>,
}

impl NetworkRegistry {
    /// Create providers for every enabled network
    pub fn from_settings(settings: &Settings) -> SubmissionResult<Self> {
        let mut registry = Self::empty();

        for (key, network_config) in settings.enabled_networks() {
            info!(
                "Initializing network {} (ID: {})",
                network_config.name, network_config.chain_id
            );

            let provider = ChainProvider::new(network_config.clone())?;
            registry.insert(key, network_config.clone(), Arc::new(provider));
        }

        Ok(registry)
    }

    pub fn empty() -> Self {
        Self {
            networks: HashMap::new(),
        }
    }

    /// Register a network with an explicit client
    pub fn insert(&mut self, key: &str, config: NetworkConfig, client: Arc<dyn ChainClient>) {
        self.networks.insert(
            key.to_string(),
            Network {
                key: key.to_string(),
                config,
                client,
            },
        );
    }

    /// Get a network by its config key
    pub fn get(&self, key: &str) -> SubmissionResult<&Network> {
        self.networks
            .get(key)
            .ok_or_else(|| SubmissionError::UnknownNetwork(key.to_string()))
    }

    /// Get all configured network keys
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.networks.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}
