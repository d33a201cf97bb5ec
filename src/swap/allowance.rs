//! ERC-20 approvals for the routers

use super::calls;
use crate::error::SubmissionResult;
use crate::tx::{ContractCall, Credential, TransactionSubmitter, TxReceipt};

use ethers::types::{Address, U256};
use tracing::info;

/// What `ensure_allowance` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowanceOutcome {
    /// A fresh `approve` was mined
    Approved(TxReceipt),
    /// The existing allowance already covered the amount
    Sufficient { current: U256 },
}

/// Issues approvals through the transaction submitter
pub struct AllowanceManager<'a> {
    submitter: &'a TransactionSubmitter,
    reuse_existing: bool,
}

impl<'a> AllowanceManager<'a> {
    pub fn new(submitter: &'a TransactionSubmitter, reuse_existing: bool) -> Self {
        Self {
            submitter,
            reuse_existing,
        }
    }

    /// Current allowance of `spender` over the credential's tokens
    pub async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> SubmissionResult<U256> {
        let call = ContractCall::new(
            self.submitter.chain_id(),
            token,
            calls::allowance(owner, spender),
            "allowance",
        );
        let output = self.submitter.client().call(&call.to_typed(owner)).await?;
        calls::decode_uint(&output)
    }

    /// Approve exactly `amount` for `spender`; with reuse enabled, skip when already covered
    pub async fn ensure_allowance(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
        credential: &Credential,
    ) -> SubmissionResult<AllowanceOutcome> {
        if self.reuse_existing {
            let current = self
                .allowance(token, credential.address(), spender)
                .await?;
            if current >= amount {
                info!(
                    "Allowance of {:?} on {:?} already {} (need {})",
                    spender, token, current, amount
                );
                return Ok(AllowanceOutcome::Sufficient { current });
            }
        }

        let call = ContractCall::new(
            self.submitter.chain_id(),
            token,
            calls::approve(spender, amount),
            "approve",
        );
        let receipt = self.submitter.execute(&call, credential).await?;

        info!("Approved {} of {:?} for {:?}", amount, token, spender);
        Ok(AllowanceOutcome::Approved(receipt))
    }
}
