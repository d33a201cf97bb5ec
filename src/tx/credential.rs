//! Signing key held for the lifetime of the process

use super::request::TransactionRequest;
use crate::error::{SubmissionError, SubmissionResult};

use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Bytes, Signature};
use std::fmt;
use tracing::debug;

/// A local private key and the account it controls
#[derive(Clone)]
pub struct Credential {
    wallet: LocalWallet,
}

// Never print the key
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("address", &self.wallet.address())
            .finish_non_exhaustive()
    }
}

impl Credential {
    /// Parse a hex private key, with or without `0x`
    pub fn from_private_key(key: &str) -> SubmissionResult<Self> {
        let key = key.trim();
        let key = key.strip_prefix("0x").unwrap_or(key);
        let wallet = key
            .parse::<LocalWallet>()
            .map_err(|e| SubmissionError::Wallet(format!("Invalid private key: {}", e)))?;
        Ok(Self { wallet })
    }

    /// Load the key from the named environment variable
    pub fn from_env(var: &str) -> SubmissionResult<Self> {
        let key = std::env::var(var).map_err(|_| {
            SubmissionError::Wallet(format!("No wallet configured. Set {}", var))
        })?;
        Self::from_private_key(&key)
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    /// EIP-155 signature over the request
    pub async fn signature(&self, request: &TransactionRequest) -> SubmissionResult<Signature> {
        let wallet = self.wallet.clone().with_chain_id(request.chain_id);
        wallet
            .sign_transaction(&request.to_typed())
            .await
            .map_err(|e| SubmissionError::Signing(e.to_string()))
    }

    /// RLP-encoded signed transaction, ready for `eth_sendRawTransaction`
    pub async fn sign(&self, request: &TransactionRequest) -> SubmissionResult<Bytes> {
        let signature = self.signature(request).await?;
        let raw = request.to_typed().rlp_signed(&signature);
        debug!(
            "Signed nonce {} for chain {} ({} bytes)",
            request.nonce,
            request.chain_id,
            raw.len()
        );
        Ok(raw)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ethers::types::U256;

    pub(crate) const TEST_KEY: &str =
        "0x0101010101010101010101010101010101010101010101010101010101010101";

    pub(crate) fn test_credential() -> Credential {
        Credential::from_private_key(TEST_KEY).unwrap()
    }

    fn request_for(credential: &Credential, chain_id: u64) -> TransactionRequest {
        TransactionRequest {
            chain_id,
            from: credential.address(),
            to: Address::repeat_byte(0xaa),
            data: Bytes::from(vec![0x09, 0x5e, 0xa7, 0xb3]),
            value: U256::zero(),
            gas_limit: U256::from(50_000),
            gas_price: U256::from(5_000_000_000u64),
            nonce: U256::from(3),
        }
    }

    #[test]
    fn test_key_with_and_without_prefix() {
        let with_prefix = Credential::from_private_key(TEST_KEY).unwrap();
        let without = Credential::from_private_key(&TEST_KEY[2..]).unwrap();
        assert_eq!(with_prefix.address(), without.address());
    }

    #[test]
    fn test_rejects_garbage_key() {
        let err = Credential::from_private_key("not-a-key").unwrap_err();
        assert!(matches!(err, SubmissionError::Wallet(_)));
    }

    #[test]
    fn test_debug_hides_key() {
        let rendered = format!("{:?}", test_credential());
        assert!(rendered.contains("address"));
        assert!(!rendered.contains(&TEST_KEY[2..]));
    }

    #[test]
    fn test_missing_env_var() {
        std::env::remove_var("WOOFI_MISSING_KEY");
        let err = Credential::from_env("WOOFI_MISSING_KEY").unwrap_err();
        assert!(err.cause().contains("WOOFI_MISSING_KEY"));
    }

    #[tokio::test]
    async fn test_signature_recovers_to_signer() {
        let credential = test_credential();
        let request = request_for(&credential, 1);

        let signature = credential.signature(&request).await.unwrap();
        let recovered = signature.recover(request.to_typed().sighash()).unwrap();
        assert_eq!(recovered, credential.address());
        // EIP-155: v = chain_id * 2 + 35 + recovery id
        assert!(signature.v == 37 || signature.v == 38);
    }

    #[tokio::test]
    async fn test_signed_payload_is_rlp_list() {
        let credential = test_credential();
        let raw = credential.sign(&request_for(&credential, 59144)).await.unwrap();
        assert!(raw[0] >= 0xc0);
    }
}
