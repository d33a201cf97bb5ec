//! Transaction submitter: prepare, sign, broadcast, wait for the receipt

use super::credential::Credential;
use super::gas::GasEstimator;
use super::nonce::NonceManager;
use super::request::{ContractCall, TransactionRequest, TxReceipt};
use crate::chain::{ChainClient, ReceiptWatcher};
use crate::config::SwapConfig;
use crate::error::{SubmissionError, SubmissionResult};

use ethers::types::{Address, U256};
use ethers::utils::{format_ether, format_units};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Submits transactions to one chain. Sends are never retried.
pub struct TransactionSubmitter {
    /// Client for the chain this submitter serves
    client: Arc<dyn ChainClient>,
    /// Per-account nonce lanes, shared across submitters
    nonces: Arc<NonceManager>,
    /// Gas estimator
    gas_estimator: GasEstimator,
    /// Bounded receipt wait
    watcher: ReceiptWatcher,
}

impl TransactionSubmitter {
    pub fn new(
        client: Arc<dyn ChainClient>,
        nonces: Arc<NonceManager>,
        gas_estimator: GasEstimator,
        watcher: ReceiptWatcher,
    ) -> Self {
        Self {
            client,
            nonces,
            gas_estimator,
            watcher,
        }
    }

    pub fn from_config(
        client: Arc<dyn ChainClient>,
        nonces: Arc<NonceManager>,
        config: &SwapConfig,
    ) -> Self {
        let watcher = ReceiptWatcher::new(
            Duration::from_millis(config.receipt_poll_interval_ms),
            Duration::from_secs(config.receipt_timeout_secs),
        );
        Self::new(client, nonces, GasEstimator::from_config(config), watcher)
    }

    pub fn chain_id(&self) -> u64 {
        self.client.chain_id()
    }

    pub fn client(&self) -> &dyn ChainClient {
        self.client.as_ref()
    }

    pub fn nonces(&self) -> &NonceManager {
        &self.nonces
    }

    fn ensure_chain(&self, chain_id: u64) -> SubmissionResult<()> {
        let actual = self.chain_id();
        if chain_id != actual {
            return Err(SubmissionError::ChainMismatch {
                expected: chain_id,
                actual,
            });
        }
        Ok(())
    }

    /// Estimate gas, price it, and check the sender can pay for it
    pub async fn prepare(
        &self,
        call: &ContractCall,
        from: Address,
        nonce: U256,
    ) -> SubmissionResult<TransactionRequest> {
        self.ensure_chain(call.chain_id)?;

        let gas = self
            .gas_estimator
            .estimate_gas_limit(self.client(), &call.to_typed(from))
            .await?;
        let gas_price = self.gas_estimator.get_gas_price(self.client()).await?;
        let balance = self.client.get_balance(from).await?;

        info!("Balance: {} ETH", format_ether(balance));
        info!(
            "Gas Price: {} Gwei",
            format_units(gas_price, "gwei").unwrap_or_else(|_| gas_price.to_string())
        );

        GasEstimator::ensure_affordable(call.chain_id, balance, gas.estimated, gas_price)?;

        Ok(TransactionRequest {
            chain_id: call.chain_id,
            from,
            to: call.to,
            data: call.data.clone(),
            value: call.value,
            gas_limit: gas.limit,
            gas_price,
            nonce,
        })
    }

    /// Sign, broadcast and wait for the receipt of a prepared request
    pub async fn submit(
        &self,
        request: &TransactionRequest,
        credential: &Credential,
    ) -> SubmissionResult<TxReceipt> {
        self.ensure_chain(request.chain_id)?;

        if request.from != credential.address() {
            return Err(SubmissionError::Wallet(format!(
                "Request is from {:?} but the credential controls {:?}",
                request.from,
                credential.address()
            )));
        }

        let raw = credential.sign(request).await?;

        let tx_hash = self.client.send_raw_transaction(raw).await.map_err(|e| {
            error!("Error executing transaction: {}", e);
            e
        })?;
        info!(
            "Transaction sent: {:?} (chain {}, nonce {})",
            tx_hash, request.chain_id, request.nonce
        );

        let receipt = self.watcher.wait(self.client(), tx_hash).await?;
        let receipt = TxReceipt::from(&receipt);

        if !receipt.success {
            return Err(SubmissionError::Reverted {
                chain_id: request.chain_id,
                tx_hash: format!("{:?}", tx_hash),
            });
        }

        debug!("Transaction receipt: {:?}", receipt);
        Ok(receipt)
    }

    /// Reserve the nonce lane, then prepare and submit the call
    pub async fn execute(
        &self,
        call: &ContractCall,
        credential: &Credential,
    ) -> SubmissionResult<TxReceipt> {
        self.ensure_chain(call.chain_id)?;

        let reservation = self
            .nonces
            .reserve(self.client(), credential.address())
            .await?;
        let request = self
            .prepare(call, credential.address(), reservation.nonce)
            .await?;

        info!("Submitting {} on chain {}", call.label, call.chain_id);
        self.submit(&request, credential).await
    }
}
