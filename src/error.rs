//! Error types for swap submission

use thiserror::Error;

/// Every failure along the swap workflow, from config lookup to the receipt
#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network {0} is not configured")]
    UnknownNetwork(String),

    #[error("Token {token} is not configured on {network}")]
    UnknownToken { network: String, token: String },

    #[error("Chain connection error for chain {chain_id}: {message}")]
    ChainConnection { chain_id: u64, message: String },

    #[error("Chain mismatch: request is for chain {expected}, endpoint serves chain {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid slippage {0}%: must be in [0, 100)")]
    InvalidSlippage(f64),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Gas estimation error: {0}")]
    GasEstimation(String),

    #[error("Contract error: {0}")]
    Contract(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Insufficient funds for gas on chain {chain_id}: have {have} ETH, need {need} ETH")]
    InsufficientFunds {
        chain_id: u64,
        have: String,
        need: String,
    },

    #[error("Transaction {tx_hash} reverted on chain {chain_id}")]
    Reverted { chain_id: u64, tx_hash: String },

    #[error("Timeout waiting for {operation}")]
    Timeout { operation: String },
}

impl SubmissionError {
    /// Human-readable cause, as logged at the call site
    pub fn cause(&self) -> String {
        self.to_string()
    }

    /// Whether the failure happened after a transaction reached the network
    pub fn is_on_chain(&self) -> bool {
        matches!(
            self,
            SubmissionError::Reverted { .. } | SubmissionError::Timeout { .. }
        )
    }
}

/// Result type for swap operations
pub type SubmissionResult<T> = Result<T, SubmissionError>;
