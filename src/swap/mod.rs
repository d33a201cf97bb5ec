//! Swap orchestration
//!
//! Every swap walks the same stages:
//! BUILD -> APPROVE -> ESTIMATE_GAS -> BALANCE_CHECK -> SIGN -> SUBMIT -> CONFIRMED
//! Any failure ends the swap as FAILED. A mined approval is never undone.

mod allowance;
mod amount;
mod builder;
mod calls;

use allowance::{AllowanceManager, AllowanceOutcome};
use builder::{is_native, SwapAmounts, NATIVE_DECIMALS};

use crate::chain::{Network, NetworkRegistry};
use crate::config::SwapConfig;
use crate::error::{SubmissionError, SubmissionResult};
use crate::tx::{ContractCall, Credential, NonceManager, TransactionSubmitter, TxReceipt};

use ethers::types::{Address, U256};
use ethers::utils::format_ether;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

/// Workflow stage of a swap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapStage {
    Build,
    Approve,
    EstimateGas,
    BalanceCheck,
    Sign,
    Submit,
    Confirmed,
    Failed,
}

impl fmt::Display for SwapStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SwapStage::Build => "BUILD",
            SwapStage::Approve => "APPROVE",
            SwapStage::EstimateGas => "ESTIMATE_GAS",
            SwapStage::BalanceCheck => "BALANCE_CHECK",
            SwapStage::Sign => "SIGN",
            SwapStage::Submit => "SUBMIT",
            SwapStage::Confirmed => "CONFIRMED",
            SwapStage::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

fn advance(stage: &mut SwapStage, next: SwapStage) {
    info!("{} -> {}", stage, next);
    *stage = next;
}

/// Stage a failed `submit` ended in; only broadcast and receipt failures get past SIGN
fn submit_failure_stage(error: &SubmissionError) -> SwapStage {
    match error {
        SubmissionError::Transaction(_)
        | SubmissionError::Reverted { .. }
        | SubmissionError::Timeout { .. } => SwapStage::Submit,
        _ => SwapStage::Sign,
    }
}

/// What to swap, independent of where
#[derive(Debug, Clone)]
pub struct SwapOrder {
    /// Symbol from the network's token table, or a raw address
    pub token_in: String,
    pub token_out: String,
    /// Decimal amount of `token_in`, e.g. "0.001"
    pub amount: String,
    pub slippage_percent: f64,
}

/// Receipts of a completed swap
#[derive(Debug, Clone, Serialize)]
pub struct SwapOutcome {
    pub swap_id: Uuid,
    pub approval: Option<TxReceipt>,
    pub receipt: TxReceipt,
}

/// Runs on-chain and cross-chain swaps for one credential
pub struct Swapper {
    registry: Arc<NetworkRegistry>,
    credential: Credential,
    nonces: Arc<NonceManager>,
    config: SwapConfig,
}

impl Swapper {
    pub fn new(registry: Arc<NetworkRegistry>, credential: Credential, config: SwapConfig) -> Self {
        Self {
            registry,
            credential,
            nonces: Arc::new(NonceManager::new()),
            config,
        }
    }

    pub fn address(&self) -> Address {
        self.credential.address()
    }

    fn submitter(&self, network: &Network) -> TransactionSubmitter {
        TransactionSubmitter::from_config(
            network.client.clone(),
            self.nonces.clone(),
            &self.config,
        )
    }

    /// Swap on a single network through its on-chain router
    pub async fn on_chain_swap(
        &self,
        network: &str,
        order: &SwapOrder,
    ) -> SubmissionResult<SwapOutcome> {
        let swap_id = Uuid::new_v4();
        let span = info_span!("swap", id = %swap_id, kind = "on_chain", network);
        let mut stage = SwapStage::Build;

        let result = self
            .run_on_chain(swap_id, network, order, &mut stage)
            .instrument(span.clone())
            .await;
        Self::finish(result, stage, "on-chain", &span)
    }

    /// Swap from one network to another through the cross-chain router
    pub async fn cross_chain_swap(
        &self,
        from_network: &str,
        to_network: &str,
        order: &SwapOrder,
    ) -> SubmissionResult<SwapOutcome> {
        let swap_id = Uuid::new_v4();
        let span = info_span!(
            "swap",
            id = %swap_id,
            kind = "cross_chain",
            from = from_network,
            to = to_network
        );
        let mut stage = SwapStage::Build;

        let result = self
            .run_cross_chain(swap_id, from_network, to_network, order, &mut stage)
            .instrument(span.clone())
            .await;
        Self::finish(result, stage, "cross-chain", &span)
    }

    fn finish(
        result: SubmissionResult<SwapOutcome>,
        stage: SwapStage,
        kind: &str,
        span: &tracing::Span,
    ) -> SubmissionResult<SwapOutcome> {
        let _entered = span.enter();
        match &result {
            Ok(outcome) => info!("Swap confirmed in block {}", outcome.receipt.block_number),
            Err(e) => error!(
                "Error executing {} swap at {}: {} ({})",
                kind,
                stage,
                e,
                SwapStage::Failed
            ),
        }
        result
    }

    async fn run_on_chain(
        &self,
        swap_id: Uuid,
        network_key: &str,
        order: &SwapOrder,
        stage: &mut SwapStage,
    ) -> SubmissionResult<SwapOutcome> {
        let network = self.registry.get(network_key)?;
        network.verify_chain_id().await?;
        let submitter = self.submitter(network);

        let token_in = network.config.token(&order.token_in)?;
        let token_out = network.config.token(&order.token_out)?;
        let decimals = self.token_decimals(&submitter, token_in).await?;
        let amounts = SwapAmounts::new(&order.amount, decimals, order.slippage_percent)?;

        let call = builder::on_chain_swap(
            &network.config,
            token_in,
            token_out,
            amounts,
            self.address(),
        )?;

        advance(stage, SwapStage::Approve);
        let approval = self
            .approve(&submitter, token_in, network.config.on_chain_router, amounts.amount_in)
            .await?;

        let receipt = self.send(&submitter, &call, stage).await?;
        Ok(SwapOutcome {
            swap_id,
            approval,
            receipt,
        })
    }

    async fn run_cross_chain(
        &self,
        swap_id: Uuid,
        from_network: &str,
        to_network: &str,
        order: &SwapOrder,
        stage: &mut SwapStage,
    ) -> SubmissionResult<SwapOutcome> {
        let source = self.registry.get(from_network)?;
        let destination = self.registry.get(to_network)?;
        source.verify_chain_id().await?;
        let submitter = self.submitter(source);

        let token_in = source.config.token(&order.token_in)?;
        let token_out = destination.config.token(&order.token_out)?;
        let decimals = self.token_decimals(&submitter, token_in).await?;
        let amounts = SwapAmounts::new(&order.amount, decimals, order.slippage_percent)?;

        let swap = builder::cross_chain_swap(
            &source.config,
            &destination.config,
            token_in,
            token_out,
            amounts,
            self.address(),
        )?;
        let fee = self.quote_bridge_fee(&submitter, &swap.fee_quote_call()).await?;
        let swap = swap.with_bridge_fee(fee);

        advance(stage, SwapStage::Approve);
        let approval = self
            .approve(
                &submitter,
                token_in,
                source.config.cross_chain_router,
                amounts.amount_in,
            )
            .await?;

        let receipt = self.send(&submitter, &swap.call, stage).await?;
        Ok(SwapOutcome {
            swap_id,
            approval,
            receipt,
        })
    }

    /// Decimals of `token`; the native coin has 18
    async fn token_decimals(
        &self,
        submitter: &TransactionSubmitter,
        token: Address,
    ) -> SubmissionResult<u32> {
        if is_native(token) {
            return Ok(NATIVE_DECIMALS);
        }

        let call = ContractCall::new(submitter.chain_id(), token, calls::decimals(), "decimals");
        let output = submitter.client().call(&call.to_typed(self.address())).await?;
        let decimals = calls::decode_uint(&output)?;
        if decimals > U256::from(u8::MAX) {
            return Err(SubmissionError::Contract(format!(
                "Token {:?} reports {} decimals",
                token, decimals
            )));
        }
        Ok(decimals.as_u32())
    }

    async fn quote_bridge_fee(
        &self,
        submitter: &TransactionSubmitter,
        quote: &ContractCall,
    ) -> SubmissionResult<U256> {
        let output = submitter.client().call(&quote.to_typed(self.address())).await?;
        let (native_fee, _) = calls::decode_fee(&output)?;
        info!("Bridge fee: {} ETH", format_ether(native_fee));
        Ok(native_fee)
    }

    async fn approve(
        &self,
        submitter: &TransactionSubmitter,
        token: Address,
        router: Address,
        amount: U256,
    ) -> SubmissionResult<Option<TxReceipt>> {
        if is_native(token) {
            info!("Native coin input, no approval needed");
            return Ok(None);
        }

        let outcome = AllowanceManager::new(submitter, self.config.reuse_existing_allowance)
            .ensure_allowance(token, router, amount, &self.credential)
            .await?;
        match outcome {
            AllowanceOutcome::Approved(receipt) => Ok(Some(receipt)),
            AllowanceOutcome::Sufficient { current } => {
                info!("Existing allowance of {} covers the swap", current);
                Ok(None)
            }
        }
    }

    /// ESTIMATE_GAS -> BALANCE_CHECK -> SIGN -> SUBMIT -> CONFIRMED under one nonce lane
    async fn send(
        &self,
        submitter: &TransactionSubmitter,
        call: &ContractCall,
        stage: &mut SwapStage,
    ) -> SubmissionResult<TxReceipt> {
        let reservation = submitter
            .nonces()
            .reserve(submitter.client(), self.address())
            .await?;

        advance(stage, SwapStage::EstimateGas);
        let request = match submitter
            .prepare(call, self.address(), reservation.nonce)
            .await
        {
            Ok(request) => request,
            Err(e) => {
                if matches!(e, SubmissionError::InsufficientFunds { .. }) {
                    *stage = SwapStage::BalanceCheck;
                }
                return Err(e);
            }
        };
        advance(stage, SwapStage::BalanceCheck);

        advance(stage, SwapStage::Sign);
        let receipt = match submitter.submit(&request, &self.credential).await {
            Ok(receipt) => receipt,
            Err(e) => {
                *stage = submit_failure_stage(&e);
                return Err(e);
            }
        };
        advance(stage, SwapStage::Submit);
        advance(stage, SwapStage::Confirmed);

        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockChainClient;
    use crate::config::tests::SAMPLE;
    use crate::config::Settings;
    use crate::tx::credential::tests::test_credential;
    use crate::tx::submitter_tests::{mined, GWEI};
    use ethers::abi::{self, Token};
    use ethers::types::transaction::eip2718::TypedTransaction;
    use ethers::types::H256;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn fast_config(settings: &Settings) -> SwapConfig {
        let mut config = settings.swap.clone();
        config.receipt_poll_interval_ms = 1;
        config.receipt_timeout_secs = 1;
        config
    }

    fn uint(value: u64) -> ethers::types::Bytes {
        abi::encode(&[Token::Uint(U256::from(value))]).into()
    }

    fn chain_client(chain_id: u64, balance: U256, sends: Arc<AtomicUsize>) -> MockChainClient {
        recording_client(chain_id, balance, sends, Arc::new(Mutex::new(Vec::new())))
    }

    /// Mock whose sends are counted and whose gas-estimated transactions are kept
    fn recording_client(
        chain_id: u64,
        balance: U256,
        sends: Arc<AtomicUsize>,
        estimated: Arc<Mutex<Vec<TypedTransaction>>>,
    ) -> MockChainClient {
        let mut client = MockChainClient::new();
        client.expect_chain_id().return_const(chain_id);
        client
            .expect_remote_chain_id()
            .returning(move || Ok(U256::from(chain_id)));
        client.expect_call().returning(|tx| {
            let data = tx.data().cloned().unwrap_or_default();
            if data.len() == 4 {
                // decimals()
                Ok(uint(18))
            } else {
                // quoteLayerZeroFee -> (nativeFee, zroFee)
                Ok(abi::encode(&[Token::Uint(U256::from(1000)), Token::Uint(U256::zero())]).into())
            }
        });
        let nonce = Arc::new(AtomicUsize::new(0));
        client
            .expect_get_transaction_count()
            .returning(move |_| Ok(U256::from(nonce.fetch_add(1, Ordering::SeqCst))));
        client.expect_estimate_gas().returning(move |tx| {
            estimated.lock().unwrap().push(tx.clone());
            Ok(U256::from(150_000))
        });
        client
            .expect_get_gas_price()
            .returning(|| Ok(U256::from(GWEI)));
        client
            .expect_get_balance()
            .returning(move |_| Ok(balance));
        client.expect_send_raw_transaction().returning(move |_| {
            let n = sends.fetch_add(1, Ordering::SeqCst);
            Ok(H256::from_low_u64_be(n as u64 + 1))
        });
        client
            .expect_get_transaction_receipt()
            .returning(|hash| Ok(Some(mined(hash, 1))));
        client
    }

    fn swapper(mainnet: MockChainClient, linea: Option<MockChainClient>) -> Swapper {
        let settings = Settings::from_toml(SAMPLE).unwrap();
        let mut registry = NetworkRegistry::empty();
        registry.insert(
            "mainnet",
            settings.networks["mainnet"].clone(),
            Arc::new(mainnet),
        );
        if let Some(linea) = linea {
            registry.insert("linea", settings.networks["linea"].clone(), Arc::new(linea));
        }
        Swapper::new(Arc::new(registry), test_credential(), fast_config(&settings))
    }

    fn order(token_in: &str, token_out: &str) -> SwapOrder {
        SwapOrder {
            token_in: token_in.to_string(),
            token_out: token_out.to_string(),
            amount: "0.001".to_string(),
            slippage_percent: 1.0,
        }
    }

    #[test]
    fn test_rejections_before_signing_stay_at_sign() {
        let mismatch = SubmissionError::ChainMismatch {
            expected: 1,
            actual: 137,
        };
        assert_eq!(submit_failure_stage(&mismatch), SwapStage::Sign);
        assert_eq!(
            submit_failure_stage(&SubmissionError::Wallet("wrong sender".into())),
            SwapStage::Sign
        );
        assert_eq!(
            submit_failure_stage(&SubmissionError::Signing("bad key".into())),
            SwapStage::Sign
        );

        assert_eq!(
            submit_failure_stage(&SubmissionError::Transaction("nonce too low".into())),
            SwapStage::Submit
        );
        let reverted = SubmissionError::Reverted {
            chain_id: 1,
            tx_hash: "0x01".into(),
        };
        assert_eq!(submit_failure_stage(&reverted), SwapStage::Submit);
        let timeout = SubmissionError::Timeout {
            operation: "receipt".into(),
        };
        assert_eq!(submit_failure_stage(&timeout), SwapStage::Submit);
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(SwapStage::EstimateGas.to_string(), "ESTIMATE_GAS");
        assert_eq!(SwapStage::Confirmed.to_string(), "CONFIRMED");
    }

    #[tokio::test]
    async fn test_on_chain_swap_approves_then_swaps() {
        let sends = Arc::new(AtomicUsize::new(0));
        let swapper = swapper(chain_client(1, U256::exp10(18), sends.clone()), None);

        let outcome = swapper
            .on_chain_swap("mainnet", &order("weth", "usdc"))
            .await
            .unwrap();

        assert_eq!(sends.load(Ordering::SeqCst), 2);
        assert_eq!(
            outcome.approval.unwrap().tx_hash,
            H256::from_low_u64_be(1)
        );
        assert_eq!(outcome.receipt.tx_hash, H256::from_low_u64_be(2));
        assert!(outcome.receipt.success);
    }

    #[tokio::test]
    async fn test_native_input_skips_approval() {
        let sends = Arc::new(AtomicUsize::new(0));
        let swapper = swapper(chain_client(1, U256::exp10(18), sends.clone()), None);

        let outcome = swapper
            .on_chain_swap(
                "mainnet",
                &order("0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE", "usdc"),
            )
            .await
            .unwrap();

        assert!(outcome.approval.is_none());
        assert_eq!(sends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_low_balance_stops_before_any_send() {
        let sends = Arc::new(AtomicUsize::new(0));
        // Enough for nothing: 150k gas at 1 gwei needs 150_000 gwei
        let swapper = swapper(chain_client(1, U256::from(GWEI), sends.clone()), None);

        let err = swapper
            .on_chain_swap("mainnet", &order("weth", "usdc"))
            .await
            .unwrap_err();

        assert!(matches!(err, SubmissionError::InsufficientFunds { .. }));
        assert_eq!(sends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cross_chain_swap_runs_on_source() {
        let sends = Arc::new(AtomicUsize::new(0));
        let mut linea = MockChainClient::new();
        linea.expect_chain_id().return_const(59144u64);
        linea.expect_send_raw_transaction().never();

        let swapper = swapper(
            chain_client(1, U256::exp10(18), sends.clone()),
            Some(linea),
        );

        let outcome = swapper
            .cross_chain_swap("mainnet", "linea", &order("weth", "usdc"))
            .await
            .unwrap();

        assert_eq!(sends.load(Ordering::SeqCst), 2);
        assert!(outcome.approval.is_some());
    }

    #[tokio::test]
    async fn test_cross_chain_swap_pays_bridge_fee_to_cross_router() {
        let settings = Settings::from_toml(SAMPLE).unwrap();
        let mainnet = &settings.networks["mainnet"];
        let estimated = Arc::new(Mutex::new(Vec::new()));
        let mut linea = MockChainClient::new();
        linea.expect_chain_id().return_const(59144u64);

        let swapper = swapper(
            recording_client(
                1,
                U256::exp10(18),
                Arc::new(AtomicUsize::new(0)),
                estimated.clone(),
            ),
            Some(linea),
        );
        swapper
            .cross_chain_swap("mainnet", "linea", &order("weth", "usdc"))
            .await
            .unwrap();

        let estimated = estimated.lock().unwrap();
        assert_eq!(estimated.len(), 2);

        // approve goes to the token, for the cross-chain router
        let approve = &estimated[0];
        assert_eq!(approve.to_addr(), Some(&mainnet.token("weth").unwrap()));
        let approve_data = approve.data().unwrap();
        assert_eq!(&approve_data[..4], &ethers::utils::id(calls::APPROVE)[..]);
        assert_eq!(
            abi::decode(&[abi::ParamType::Address], &approve_data[4..36]).unwrap()[0],
            Token::Address(mainnet.cross_chain_router)
        );

        // weth input carries no value of its own, only the quoted fee
        let cross_swap = &estimated[1];
        assert_eq!(cross_swap.to_addr(), Some(&mainnet.cross_chain_router));
        assert_eq!(cross_swap.value(), Some(&U256::from(1000)));
        assert_eq!(
            &cross_swap.data().unwrap()[..4],
            &ethers::utils::id(calls::CROSS_SWAP)[..]
        );
    }

    #[tokio::test]
    async fn test_wrong_endpoint_fails_before_anything_is_sent() {
        let sends = Arc::new(AtomicUsize::new(0));
        let mut client = MockChainClient::new();
        client.expect_chain_id().return_const(1u64);
        client
            .expect_remote_chain_id()
            .returning(|| Ok(U256::from(137)));
        client.expect_send_raw_transaction().never();

        let err = swapper(client, None)
            .on_chain_swap("mainnet", &order("weth", "usdc"))
            .await
            .unwrap_err();

        assert!(matches!(err, SubmissionError::ChainMismatch { .. }));
        assert_eq!(sends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_token_and_network() {
        let sends = Arc::new(AtomicUsize::new(0));
        let swapper = swapper(chain_client(1, U256::exp10(18), sends), None);

        let err = swapper
            .on_chain_swap("mainnet", &order("weth", "doge"))
            .await
            .unwrap_err();
        assert!(matches!(err, SubmissionError::UnknownToken { .. }));

        let err = swapper
            .cross_chain_swap("mainnet", "arbitrum", &order("weth", "usdc"))
            .await
            .unwrap_err();
        assert!(matches!(err, SubmissionError::UnknownNetwork(_)));
    }
}
