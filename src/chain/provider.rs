//! Chain provider with multi-RPC support and automatic failover

use super::ChainClient;
use crate::config::NetworkConfig;
use crate::error::{SubmissionError, SubmissionResult};

use async_trait::async_trait;
use ethers::prelude::*;
use ethers::providers::{Http, Provider, ProviderError};
use ethers::types::transaction::eip2718::TypedTransaction;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Multi-provider wrapper with automatic failover
pub struct ChainProvider {
    /// Network configuration
    config: NetworkConfig,
    /// HTTP providers (multiple for failover)
    http_providers: Vec<Provider<Http>>,
    /// Current active provider index
    current_provider: AtomicUsize,
}

impl ChainProvider {
    /// Create a new chain provider; no request is made until first use
    pub fn new(config: NetworkConfig) -> SubmissionResult<Self> {
        let mut http_providers = Vec::new();

        for url in &config.rpc_urls {
            match Provider::<Http>::try_from(url.as_str()) {
                Ok(provider) => {
                    let provider = provider.interval(Duration::from_millis(500));
                    http_providers.push(provider);
                    debug!("Added HTTP provider for chain {}: {}", config.chain_id, url);
                }
                Err(e) => {
                    warn!("Failed to create provider for {}: {}", url, e);
                }
            }
        }

        if http_providers.is_empty() {
            return Err(SubmissionError::ChainConnection {
                chain_id: config.chain_id,
                message: "No valid RPC providers".to_string(),
            });
        }

        Ok(Self {
            config,
            http_providers,
            current_provider: AtomicUsize::new(0),
        })
    }

    /// Get the active HTTP provider
    pub fn http(&self) -> &Provider<Http> {
        let idx = self.current_provider.load(Ordering::Relaxed);
        &self.http_providers[idx % self.http_providers.len()]
    }

    /// Switch to next available provider
    pub fn failover(&self) {
        let current = self.current_provider.load(Ordering::Relaxed);
        let next = (current + 1) % self.http_providers.len();
        self.current_provider.store(next, Ordering::Relaxed);
        warn!(
            "Chain {} failover to provider {}",
            self.config.chain_id, next
        );
    }

    /// Run a read-only request, moving to the next RPC URL on failure
    async fn read_with_failover<T, F, Fut>(&self, operation: &str, request: F) -> SubmissionResult<T>
    where
        F: Fn(Provider<Http>) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut last_error = String::new();

        for _ in 0..self.http_providers.len() {
            match request(self.http().clone()).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(
                        "Failed to {} on chain {}: {}",
                        operation, self.config.chain_id, e
                    );
                    last_error = e.to_string();
                    self.failover();
                }
            }
        }

        Err(SubmissionError::ChainConnection {
            chain_id: self.config.chain_id,
            message: format!("All providers failed to {}: {}", operation, last_error),
        })
    }
}

#[async_trait]
impl ChainClient for ChainProvider {
    fn chain_id(&self) -> u64 {
        self.config.chain_id
    }

    async fn remote_chain_id(&self) -> SubmissionResult<U256> {
        self.read_with_failover("get chain id", |p| async move { p.get_chainid().await })
            .await
    }

    async fn get_balance(&self, address: Address) -> SubmissionResult<U256> {
        self.read_with_failover("get balance", move |p| async move {
            p.get_balance(address, None).await
        })
        .await
    }

    async fn get_transaction_count(&self, address: Address) -> SubmissionResult<U256> {
        self.read_with_failover("get transaction count", move |p| async move {
            p.get_transaction_count(address, Some(BlockNumber::Pending.into()))
                .await
        })
        .await
    }

    async fn get_gas_price(&self) -> SubmissionResult<U256> {
        self.read_with_failover("get gas price", |p| async move { p.get_gas_price().await })
            .await
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> SubmissionResult<U256> {
        self.http()
            .estimate_gas(tx, None)
            .await
            .map_err(|e| SubmissionError::GasEstimation(e.to_string()))
    }

    async fn call(&self, tx: &TypedTransaction) -> SubmissionResult<Bytes> {
        self.http()
            .call(tx, None)
            .await
            .map_err(|e| SubmissionError::Contract(e.to_string()))
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> SubmissionResult<H256> {
        let pending = self
            .http()
            .send_raw_transaction(raw)
            .await
            .map_err(|e| SubmissionError::Transaction(e.to_string()))?;
        Ok(pending.tx_hash())
    }

    async fn get_transaction_receipt(
        &self,
        tx_hash: H256,
    ) -> SubmissionResult<Option<TransactionReceipt>> {
        self.read_with_failover("get transaction receipt", move |p| async move {
            p.get_transaction_receipt(tx_hash).await
        })
        .await
    }
}
