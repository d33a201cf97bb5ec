//! Transaction descriptions and receipts

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionReceipt, H256, U256};
use serde::Serialize;

/// A contract call that still needs a nonce and gas before it can be signed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub chain_id: u64,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    /// Short name for logs, e.g. "approve" or "crossSwap"
    pub label: String,
}

impl ContractCall {
    pub fn new(chain_id: u64, to: Address, data: Bytes, label: &str) -> Self {
        Self {
            chain_id,
            to,
            data,
            value: U256::zero(),
            label: label.to_string(),
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    /// Unsigned transaction used for gas estimation and `eth_call`
    pub fn to_typed(&self, from: Address) -> TypedTransaction {
        TypedTransaction::Legacy(
            ethers::types::TransactionRequest::new()
                .from(from)
                .to(self.to)
                .data(self.data.clone())
                .value(self.value)
                .chain_id(self.chain_id),
        )
    }
}

/// A fully specified transaction, ready to sign
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub chain_id: u64,
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub gas_limit: U256,
    pub gas_price: U256,
    pub nonce: U256,
}

impl TransactionRequest {
    /// Legacy (EIP-155) transaction with every field set
    pub fn to_typed(&self) -> TypedTransaction {
        TypedTransaction::Legacy(
            ethers::types::TransactionRequest::new()
                .from(self.from)
                .to(self.to)
                .data(self.data.clone())
                .value(self.value)
                .gas(self.gas_limit)
                .gas_price(self.gas_price)
                .nonce(self.nonce)
                .chain_id(self.chain_id),
        )
    }
}

/// Outcome of a mined transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxReceipt {
    pub tx_hash: H256,
    pub success: bool,
    pub block_number: u64,
    pub block_hash: Option<H256>,
    pub gas_used: U256,
    pub effective_gas_price: Option<U256>,
}

impl From<&TransactionReceipt> for TxReceipt {
    fn from(receipt: &TransactionReceipt) -> Self {
        Self {
            tx_hash: receipt.transaction_hash,
            success: receipt.status == Some(1.into()),
            block_number: receipt.block_number.map(|b| b.as_u64()).unwrap_or(0),
            block_hash: receipt.block_hash,
            gas_used: receipt.gas_used.unwrap_or_default(),
            effective_gas_price: receipt.effective_gas_price,
        }
    }
}
