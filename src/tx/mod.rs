//! Transaction submission: request types, signing, gas, nonce lanes

pub mod credential;
mod gas;
mod nonce;
pub mod request;
mod submitter;

pub use credential::Credential;
pub use gas::GasEstimator;
pub use nonce::NonceManager;
pub use request::{ContractCall, TxReceipt};
pub use submitter::TransactionSubmitter;

#[cfg(test)]
pub(crate) use submitter::tests as submitter_tests;
