//! Nonce lanes for reliable transaction submission
//!
//! The nonce is read from the node just before signing. Each (chain, account)
//! pair has one lane; holding the lane from nonce fetch until the receipt
//! arrives keeps two submissions from the same account from racing.

use crate::chain::ChainClient;
use crate::error::SubmissionResult;

use dashmap::DashMap;
use ethers::types::{Address, U256};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// A fetched nonce plus exclusive use of its lane
pub struct NonceReservation {
    pub nonce: U256,
    _lane: OwnedMutexGuard<()>,
}

/// Serializes submissions per (chain, account)
#[derive(Default)]
pub struct NonceManager {
    lanes: DashMap<(u64, Address), Arc<Mutex<()>>>,
}

impl NonceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the lane, then read the account's pending transaction count
    pub async fn reserve(
        &self,
        client: &dyn ChainClient,
        address: Address,
    ) -> SubmissionResult<NonceReservation> {
        let chain_id = client.chain_id();
        let lane = self
            .lanes
            .entry((chain_id, address))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let guard = lane.lock_owned().await;
        let nonce = client.get_transaction_count(address).await?;

        debug!("Reserved nonce {} for {:?} on chain {}", nonce, address, chain_id);
        Ok(NonceReservation {
            nonce,
            _lane: guard,
        })
    }

    /// Number of (chain, account) lanes seen so far
    #[cfg(test)]
    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }
}
