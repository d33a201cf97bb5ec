//! Gas estimation and the balance-for-gas check

use crate::chain::ChainClient;
use crate::config::SwapConfig;
use crate::error::{SubmissionError, SubmissionResult};

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::U256;
use ethers::utils::format_ether;
use tracing::{debug, info};

/// Raw node estimate and the buffered limit put on the transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasLimit {
    pub estimated: U256,
    pub limit: U256,
}

/// Gas estimator for transactions
#[derive(Debug, Clone)]
pub struct GasEstimator {
    /// Buffer percentage for gas limit (e.g., 20 = 20% buffer)
    gas_limit_buffer_percent: u64,
    /// Buffer percentage for gas price
    gas_price_buffer_percent: u64,
}

impl GasEstimator {
    pub fn new(gas_limit_buffer_percent: u64, gas_price_buffer_percent: u64) -> Self {
        Self {
            gas_limit_buffer_percent,
            gas_price_buffer_percent,
        }
    }

    pub fn from_config(config: &SwapConfig) -> Self {
        Self::new(
            config.gas_limit_buffer_percent,
            config.gas_price_buffer_percent,
        )
    }

    /// Ask the node for a gas estimate and add the limit buffer
    pub async fn estimate_gas_limit(
        &self,
        client: &dyn ChainClient,
        tx: &TypedTransaction,
    ) -> SubmissionResult<GasLimit> {
        let estimated = client.estimate_gas(tx).await?;
        let buffer = estimated * self.gas_limit_buffer_percent / 100;

        info!("Estimated Gas: {}", estimated);
        Ok(GasLimit {
            estimated,
            limit: estimated + buffer,
        })
    }

    /// Current network gas price plus the price buffer
    pub async fn get_gas_price(&self, client: &dyn ChainClient) -> SubmissionResult<U256> {
        let price = client.get_gas_price().await?;
        let buffered = price + price * self.gas_price_buffer_percent / 100;

        debug!("Gas price for chain {}: {}", client.chain_id(), buffered);
        Ok(buffered)
    }

    /// Calculate total cost in wei
    pub fn calculate_cost(gas_limit: U256, gas_price: U256) -> U256 {
        gas_limit.saturating_mul(gas_price)
    }

    /// Reject when `gas * price` exceeds the balance; equality passes
    pub fn ensure_affordable(
        chain_id: u64,
        balance: U256,
        estimated_gas: U256,
        gas_price: U256,
    ) -> SubmissionResult<U256> {
        let max_gas_cost = Self::calculate_cost(estimated_gas, gas_price);
        info!("Max Gas Cost: {} ETH", format_ether(max_gas_cost));

        if max_gas_cost > balance {
            return Err(SubmissionError::InsufficientFunds {
                chain_id,
                have: format_ether(balance),
                need: format_ether(max_gas_cost),
            });
        }

        Ok(max_gas_cost)
    }
}

impl Default for GasEstimator {
    fn default() -> Self {
        Self::new(20, 0)
    }
}
