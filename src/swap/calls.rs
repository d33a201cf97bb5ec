//! ABI encoding for the ERC-20 and WooFi router entry points

use crate::error::{SubmissionError, SubmissionResult};

use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, Bytes, U256};
use ethers::utils::id;

pub const APPROVE: &str = "approve(address,uint256)";
pub const ALLOWANCE: &str = "allowance(address,address)";
pub const DECIMALS: &str = "decimals()";
pub const SWAP: &str = "swap(address,address,uint256,uint256,address,address)";
pub const CROSS_SWAP: &str = "crossSwap(uint256,address,(address,address,uint256,uint256),(uint16,address,address,uint256,uint256,uint256),(address,bytes),(address,bytes))";
pub const QUOTE_LAYER_ZERO_FEE: &str = "quoteLayerZeroFee(uint256,address,(uint16,address,address,uint256,uint256,uint256),(address,bytes))";

fn encode_call(signature: &str, args: &[Token]) -> Bytes {
    let mut data = id(signature).to_vec();
    data.extend(abi::encode(args));
    data.into()
}

/// Source-side parameters of a bridge swap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrcInfos {
    pub from_token: Address,
    pub bridge_token: Address,
    pub from_amount: U256,
    pub min_bridge_amount: U256,
}

impl SrcInfos {
    fn into_token(self) -> Token {
        Token::Tuple(vec![
            Token::Address(self.from_token),
            Token::Address(self.bridge_token),
            Token::Uint(self.from_amount),
            Token::Uint(self.min_bridge_amount),
        ])
    }
}

/// Destination-side parameters of a bridge swap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DstInfos {
    pub chain_id: u16,
    pub to_token: Address,
    pub bridge_token: Address,
    pub min_to_amount: U256,
    pub airdrop_native_amount: U256,
    pub dst_gas_for_call: U256,
}

impl DstInfos {
    fn into_token(self) -> Token {
        Token::Tuple(vec![
            Token::Uint(U256::from(self.chain_id)),
            Token::Address(self.to_token),
            Token::Address(self.bridge_token),
            Token::Uint(self.min_to_amount),
            Token::Uint(self.airdrop_native_amount),
            Token::Uint(self.dst_gas_for_call),
        ])
    }
}

/// Optional aggregator leg; unused legs are the zero address with empty data
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatorLeg {
    pub swap_router: Address,
    pub data: Bytes,
}

impl AggregatorLeg {
    fn into_token(self) -> Token {
        Token::Tuple(vec![
            Token::Address(self.swap_router),
            Token::Bytes(self.data.to_vec()),
        ])
    }
}

pub fn approve(spender: Address, amount: U256) -> Bytes {
    encode_call(APPROVE, &[Token::Address(spender), Token::Uint(amount)])
}

pub fn allowance(owner: Address, spender: Address) -> Bytes {
    encode_call(ALLOWANCE, &[Token::Address(owner), Token::Address(spender)])
}

pub fn decimals() -> Bytes {
    encode_call(DECIMALS, &[])
}

pub fn swap(
    from_token: Address,
    to_token: Address,
    from_amount: U256,
    min_to_amount: U256,
    to: Address,
    rebate_to: Address,
) -> Bytes {
    encode_call(
        SWAP,
        &[
            Token::Address(from_token),
            Token::Address(to_token),
            Token::Uint(from_amount),
            Token::Uint(min_to_amount),
            Token::Address(to),
            Token::Address(rebate_to),
        ],
    )
}

pub fn cross_swap(
    ref_id: U256,
    to: Address,
    src: SrcInfos,
    dst: DstInfos,
    src_leg: AggregatorLeg,
    dst_leg: AggregatorLeg,
) -> Bytes {
    encode_call(
        CROSS_SWAP,
        &[
            Token::Uint(ref_id),
            Token::Address(to),
            src.into_token(),
            dst.into_token(),
            src_leg.into_token(),
            dst_leg.into_token(),
        ],
    )
}

pub fn quote_layer_zero_fee(ref_id: U256, to: Address, dst: DstInfos, dst_leg: AggregatorLeg) -> Bytes {
    encode_call(
        QUOTE_LAYER_ZERO_FEE,
        &[
            Token::Uint(ref_id),
            Token::Address(to),
            dst.into_token(),
            dst_leg.into_token(),
        ],
    )
}

/// Decode the first return word as an unsigned integer
pub fn decode_uint(output: &[u8]) -> SubmissionResult<U256> {
    let tokens = abi::decode(&[ParamType::Uint(256)], output)
        .map_err(|e| SubmissionError::Contract(format!("Bad uint return data: {}", e)))?;
    tokens
        .into_iter()
        .next()
        .and_then(Token::into_uint)
        .ok_or_else(|| SubmissionError::Contract("Empty return data".to_string()))
}

/// Decode `(uint256 nativeAmount, uint256 zroAmount)`
pub fn decode_fee(output: &[u8]) -> SubmissionResult<(U256, U256)> {
    let tokens = abi::decode(&[ParamType::Uint(256), ParamType::Uint(256)], output)
        .map_err(|e| SubmissionError::Contract(format!("Bad fee return data: {}", e)))?;
    let mut values = tokens.into_iter().filter_map(Token::into_uint);
    match (values.next(), values.next()) {
        (Some(native), Some(zro)) => Ok((native, zro)),
        _ => Err(SubmissionError::Contract("Incomplete fee return data".to_string())),
    }
}
