//! Builders for the on-chain and cross-chain router calls

use super::amount::{min_output, to_base_units};
use super::calls::{self, AggregatorLeg, DstInfos, SrcInfos};
use crate::config::NetworkConfig;
use crate::error::{SubmissionError, SubmissionResult};
use crate::tx::ContractCall;

use ethers::types::{Address, H160, U256};

/// WooFi's placeholder address for the chain's native coin
pub const NATIVE_TOKEN: Address = H160([0xee; 20]);

/// Decimals of the native coin on every supported chain
pub const NATIVE_DECIMALS: u32 = 18;

/// Input amount and the minimum accepted output, both in base units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapAmounts {
    pub amount_in: U256,
    pub min_amount_out: U256,
}

impl SwapAmounts {
    pub fn new(amount: &str, decimals: u32, slippage_percent: f64) -> SubmissionResult<Self> {
        let amount_in = to_base_units(amount, decimals)?;
        let min_amount_out = min_output(amount_in, slippage_percent)?;
        Ok(Self {
            amount_in,
            min_amount_out,
        })
    }
}

pub fn is_native(token: Address) -> bool {
    token == NATIVE_TOKEN
}

fn native_value(token_in: Address, amount_in: U256) -> U256 {
    if is_native(token_in) {
        amount_in
    } else {
        U256::zero()
    }
}

/// `swap` on the network's on-chain router; output and rebate go to `receiver`
pub fn on_chain_swap(
    network: &NetworkConfig,
    token_in: Address,
    token_out: Address,
    amounts: SwapAmounts,
    receiver: Address,
) -> SubmissionResult<ContractCall> {
    if token_in == token_out {
        return Err(SubmissionError::Config(format!(
            "Cannot swap {:?} into itself",
            token_in
        )));
    }

    let data = calls::swap(
        token_in,
        token_out,
        amounts.amount_in,
        amounts.min_amount_out,
        receiver,
        receiver,
    );

    Ok(
        ContractCall::new(network.chain_id, network.on_chain_router, data, "swap")
            .with_value(native_value(token_in, amounts.amount_in)),
    )
}

/// A bridge swap call plus what is needed to quote its messaging fee
#[derive(Debug, Clone)]
pub struct CrossChainSwap {
    pub call: ContractCall,
    pub dst: DstInfos,
    receiver: Address,
}

impl CrossChainSwap {
    /// Read-only call quoting the bridge fee on the source router
    pub fn fee_quote_call(&self) -> ContractCall {
        let data = calls::quote_layer_zero_fee(
            U256::zero(),
            self.receiver,
            self.dst.clone(),
            AggregatorLeg::default(),
        );
        ContractCall::new(self.call.chain_id, self.call.to, data, "quoteLayerZeroFee")
    }

    /// Add the quoted bridge fee to the value sent with the swap
    pub fn with_bridge_fee(mut self, fee: U256) -> Self {
        self.call.value += fee;
        self
    }
}

/// `crossSwap` on the source network's cross-chain router
pub fn cross_chain_swap(
    source: &NetworkConfig,
    destination: &NetworkConfig,
    token_in: Address,
    token_out: Address,
    amounts: SwapAmounts,
    receiver: Address,
) -> SubmissionResult<CrossChainSwap> {
    if source.chain_id == destination.chain_id {
        return Err(SubmissionError::Config(format!(
            "Cross-chain swap needs two different networks, got {} twice",
            source.name
        )));
    }

    let src = SrcInfos {
        from_token: token_in,
        bridge_token: source.bridge_token,
        from_amount: amounts.amount_in,
        min_bridge_amount: amounts.min_amount_out,
    };
    let dst = DstInfos {
        chain_id: destination.destination_bridge_id()?,
        to_token: token_out,
        bridge_token: destination.bridge_token,
        min_to_amount: amounts.min_amount_out,
        airdrop_native_amount: U256::zero(),
        dst_gas_for_call: U256::zero(),
    };

    let data = calls::cross_swap(
        U256::zero(),
        receiver,
        src,
        dst.clone(),
        AggregatorLeg::default(),
        AggregatorLeg::default(),
    );

    let call = ContractCall::new(source.chain_id, source.cross_chain_router, data, "crossSwap")
        .with_value(native_value(token_in, amounts.amount_in));

    Ok(CrossChainSwap {
        call,
        dst,
        receiver,
    })
}
