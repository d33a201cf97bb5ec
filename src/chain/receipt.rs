//! Receipt polling with a bounded wait

use super::ChainClient;
use crate::error::{SubmissionError, SubmissionResult};

use ethers::types::{TransactionReceipt, H256};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Waits for a submitted transaction to be mined
#[derive(Debug, Clone)]
pub struct ReceiptWatcher {
    poll_interval: Duration,
    timeout: Duration,
}

impl ReceiptWatcher {
    pub fn new(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval,
            timeout,
        }
    }

    /// Poll until the receipt carries a block number, or give up after the timeout.
    ///
    /// The transaction is already broadcast, so a failed poll is logged and
    /// retried; only the timeout ends the wait.
    pub async fn wait(
        &self,
        client: &dyn ChainClient,
        tx_hash: H256,
    ) -> SubmissionResult<TransactionReceipt> {
        let chain_id = client.chain_id();

        let poll = async {
            loop {
                match client.get_transaction_receipt(tx_hash).await {
                    Ok(Some(receipt)) if receipt.block_number.is_some() => return receipt,
                    Ok(_) => debug!(
                        "Transaction {:?} not mined yet on chain {}",
                        tx_hash, chain_id
                    ),
                    Err(e) => warn!(
                        "Failed to poll receipt of {:?} on chain {}: {}",
                        tx_hash, chain_id, e
                    ),
                }
                sleep(self.poll_interval).await;
            }
        };

        match timeout(self.timeout, poll).await {
            Ok(receipt) => {
                info!(
                    "Transaction {:?} mined on chain {} in block {:?}",
                    tx_hash, chain_id, receipt.block_number
                );
                Ok(receipt)
            }
            Err(_) => Err(SubmissionError::Timeout {
                operation: format!("receipt of {:?} on chain {}", tx_hash, chain_id),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockChainClient;
    use ethers::types::U64;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn watcher() -> ReceiptWatcher {
        ReceiptWatcher::new(Duration::from_millis(5), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_returns_receipt_once_mined() {
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = polls.clone();

        let mut client = MockChainClient::new();
        client.expect_chain_id().return_const(1u64);
        client
            .expect_get_transaction_receipt()
            .returning(move |hash| {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    return Ok(None);
                }
                Ok(Some(TransactionReceipt {
                    transaction_hash: hash,
                    block_number: Some(U64::from(42)),
                    status: Some(U64::from(1)),
                    ..Default::default()
                }))
            });

        let receipt = watcher().wait(&client, H256::repeat_byte(7)).await.unwrap();
        assert_eq!(receipt.block_number, Some(U64::from(42)));
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_times_out_when_never_mined() {
        let mut client = MockChainClient::new();
        client.expect_chain_id().return_const(1u64);
        client
            .expect_get_transaction_receipt()
            .returning(|_| Ok(None));

        let watcher = ReceiptWatcher::new(Duration::from_millis(5), Duration::from_millis(30));
        let err = watcher.wait(&client, H256::zero()).await.unwrap_err();
        assert!(matches!(err, SubmissionError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_keeps_polling_through_rpc_errors() {
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = polls.clone();

        let mut client = MockChainClient::new();
        client.expect_chain_id().return_const(1u64);
        client
            .expect_get_transaction_receipt()
            .returning(move |hash| {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Err(SubmissionError::ChainConnection {
                        chain_id: 1,
                        message: "connection reset".to_string(),
                    });
                }
                Ok(Some(TransactionReceipt {
                    transaction_hash: hash,
                    block_number: Some(U64::from(7)),
                    status: Some(U64::from(1)),
                    ..Default::default()
                }))
            });

        let receipt = watcher().wait(&client, H256::repeat_byte(1)).await.unwrap();
        assert_eq!(receipt.block_number, Some(U64::from(7)));
        assert_eq!(polls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_persistent_rpc_errors_end_as_timeout() {
        let mut client = MockChainClient::new();
        client.expect_chain_id().return_const(1u64);
        client.expect_get_transaction_receipt().returning(|_| {
            Err(SubmissionError::ChainConnection {
                chain_id: 1,
                message: "connection refused".to_string(),
            })
        });

        let watcher = ReceiptWatcher::new(Duration::from_millis(5), Duration::from_millis(30));
        let err = watcher.wait(&client, H256::zero()).await.unwrap_err();
        assert!(matches!(err, SubmissionError::Timeout { .. }));
        assert!(err.is_on_chain());
    }
}
