//! Write submission and confirmation tracking.
//!
//! ```text
//! submit ──► Submitted ──► Confirmed   (terminal)
//!                     └──► Failed      (terminal, no automatic retry)
//! ```
//!
//! Only one transaction is tracked for display. A transaction submitted under
//! an account that has since been switched away is *detached*: it is still
//! polled until terminal, but it no longer drives the flow.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{FlowError, Result};
use crate::ports::IbtContract;
use crate::proof::ProofCall;
use crate::types::{Address, TxKind, H256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Submitted,
    Confirmed,
    Failed,
}

impl TxStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Submitted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTransaction {
    pub hash: H256,
    pub kind: TxKind,
    pub status: TxStatus,
    /// Account that signed the write.
    pub account: Address,
}

/// One non-blocking receipt check.
pub async fn check_status<C>(contract: &C, hash: H256) -> Result<TxStatus>
where
    C: IbtContract + ?Sized,
{
    Ok(match contract.transaction_receipt(hash).await? {
        None => TxStatus::Submitted,
        Some(true) => TxStatus::Confirmed,
        Some(false) => TxStatus::Failed,
    })
}

#[derive(Debug, Default)]
pub struct TransactionLifecycle {
    current: Option<PendingTransaction>,
    detached: Vec<PendingTransaction>,
}

impl TransactionLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&PendingTransaction> {
        self.current.as_ref()
    }

    pub fn detached(&self) -> &[PendingTransaction] {
        &self.detached
    }

    /// True while the tracked transaction is still `Submitted`.
    pub fn is_in_flight(&self) -> bool {
        matches!(self.current, Some(tx) if tx.status == TxStatus::Submitted)
    }

    /// Send a write. Fails without touching the chain if another transaction
    /// is still in flight, tracked or detached under the signing account.
    pub async fn submit<C>(
        &mut self,
        contract: &C,
        kind: TxKind,
        call: &ProofCall,
        account: Address,
    ) -> Result<H256>
    where
        C: IbtContract + ?Sized,
    {
        if let Some(tx) = self.current.filter(|tx| tx.status == TxStatus::Submitted) {
            return Err(FlowError::TransactionInFlight(tx.hash));
        }
        if let Some(tx) = self.detached.iter().find(|tx| tx.account == account) {
            return Err(FlowError::TransactionInFlight(tx.hash));
        }

        let hash = match kind {
            TxKind::Mint => contract.mint(call).await?,
            TxKind::Reclaim => contract.reclaim(call).await?,
        };
        info!(%kind, ?hash, ?account, "transaction submitted");

        self.current = Some(PendingTransaction {
            hash,
            kind,
            status: TxStatus::Submitted,
            account,
        });
        Ok(hash)
    }

    /// Poll every unfinished transaction once. Returns the new status of the
    /// tracked transaction if it changed during this poll.
    pub async fn poll<C>(&mut self, contract: &C) -> Option<TxStatus>
    where
        C: IbtContract + ?Sized,
    {
        let mut changed = None;

        if let Some(tx) = self.current.as_mut().filter(|tx| !tx.status.is_terminal()) {
            match check_status(contract, tx.hash).await {
                Ok(TxStatus::Submitted) => {}
                Ok(status) => {
                    log_terminal(tx, status);
                    tx.status = status;
                    changed = Some(status);
                }
                Err(err) => debug!(hash = ?tx.hash, error = %err, "receipt lookup failed"),
            }
        }

        let mut still_pending = Vec::with_capacity(self.detached.len());
        for tx in self.detached.drain(..) {
            match check_status(contract, tx.hash).await {
                Ok(TxStatus::Submitted) | Err(_) => still_pending.push(tx),
                Ok(status) => log_terminal(&tx, status),
            }
        }
        self.detached = still_pending;

        changed
    }

    /// Stop displaying the tracked transaction. An in-flight one keeps being polled.
    pub fn detach(&mut self) {
        if let Some(tx) = self.current.take() {
            if tx.status == TxStatus::Submitted {
                info!(hash = ?tx.hash, kind = %tx.kind, "detaching in-flight transaction from flow");
                self.detached.push(tx);
            }
        }
    }

    /// Track again an in-flight transaction `account` signed before it was
    /// switched away. Returns `true` if one was picked up.
    pub fn reattach(&mut self, account: Address) -> bool {
        if self.current.is_some() {
            return false;
        }
        let Some(index) = self.detached.iter().position(|tx| tx.account == account) else {
            return false;
        };

        let tx = self.detached.remove(index);
        info!(hash = ?tx.hash, kind = %tx.kind, "reattaching in-flight transaction to flow");
        self.current = Some(tx);
        true
    }

    /// Forget a terminal transaction. In-flight transactions cannot be cleared.
    pub fn clear(&mut self) -> Result<()> {
        match self.current {
            Some(tx) if tx.status == TxStatus::Submitted => {
                Err(FlowError::TransactionInFlight(tx.hash))
            }
            _ => {
                self.current = None;
                Ok(())
            }
        }
    }
}

fn log_terminal(tx: &PendingTransaction, status: TxStatus) {
    match status {
        TxStatus::Confirmed => info!(hash = ?tx.hash, kind = %tx.kind, "transaction confirmed"),
        TxStatus::Failed => warn!(hash = ?tx.hash, kind = %tx.kind, "transaction failed"),
        TxStatus::Submitted => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TokenId, U256};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Chain where each receipt is `None` until `settle` is called.
    #[derive(Default)]
    struct ReceiptChain {
        receipts: Mutex<HashMap<H256, bool>>,
        nonce: Mutex<u64>,
    }

    impl ReceiptChain {
        fn settle(&self, hash: H256, success: bool) {
            self.receipts.lock().unwrap().insert(hash, success);
        }

        fn next_hash(&self) -> H256 {
            let mut nonce = self.nonce.lock().unwrap();
            *nonce += 1;
            H256::from_low_u64_be(*nonce)
        }
    }

    #[async_trait]
    impl IbtContract for ReceiptChain {
        async fn nullifier_hash_to_token_id(&self, _: U256) -> Result<TokenId> {
            Ok(U256::zero())
        }

        async fn owner_of(&self, _: TokenId) -> Result<Address> {
            Ok(Address::zero())
        }

        async fn address_has_been_used(&self, _: Address) -> Result<bool> {
            Ok(false)
        }

        async fn mint(&self, _: &ProofCall) -> Result<H256> {
            Ok(self.next_hash())
        }

        async fn reclaim(&self, _: &ProofCall) -> Result<H256> {
            Ok(self.next_hash())
        }

        async fn transaction_receipt(&self, hash: H256) -> Result<Option<bool>> {
            Ok(self.receipts.lock().unwrap().get(&hash).copied())
        }
    }

    fn call() -> ProofCall {
        ProofCall {
            merkle_root: U256::one(),
            nullifier_hash: U256::from(2),
            proof: [U256::zero(); 8],
        }
    }

    fn account() -> Address {
        Address::from_low_u64_be(42)
    }

    #[tokio::test]
    async fn submitted_then_confirmed() {
        let chain = ReceiptChain::default();
        let mut lifecycle = TransactionLifecycle::new();

        let hash = lifecycle.submit(&chain, TxKind::Mint, &call(), account()).await.unwrap();
        assert!(lifecycle.is_in_flight());
        assert_eq!(lifecycle.poll(&chain).await, None);

        chain.settle(hash, true);
        assert_eq!(lifecycle.poll(&chain).await, Some(TxStatus::Confirmed));
        assert_eq!(lifecycle.current().unwrap().status, TxStatus::Confirmed);
        assert_eq!(lifecycle.poll(&chain).await, None);
    }

    #[tokio::test]
    async fn second_submit_while_in_flight_is_rejected() {
        let chain = ReceiptChain::default();
        let mut lifecycle = TransactionLifecycle::new();

        let hash = lifecycle.submit(&chain, TxKind::Mint, &call(), account()).await.unwrap();
        let err = lifecycle
            .submit(&chain, TxKind::Reclaim, &call(), account())
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::TransactionInFlight(h) if h == hash));
    }

    #[tokio::test]
    async fn failed_transaction_can_be_replaced() {
        let chain = ReceiptChain::default();
        let mut lifecycle = TransactionLifecycle::new();

        let first = lifecycle.submit(&chain, TxKind::Reclaim, &call(), account()).await.unwrap();
        chain.settle(first, false);
        assert_eq!(lifecycle.poll(&chain).await, Some(TxStatus::Failed));

        let second = lifecycle.submit(&chain, TxKind::Reclaim, &call(), account()).await.unwrap();
        assert_ne!(first, second);
        assert!(lifecycle.is_in_flight());
    }

    #[tokio::test]
    async fn detached_transaction_is_polled_until_terminal() {
        let chain = ReceiptChain::default();
        let mut lifecycle = TransactionLifecycle::new();

        let hash = lifecycle.submit(&chain, TxKind::Mint, &call(), account()).await.unwrap();
        lifecycle.detach();
        assert!(lifecycle.current().is_none());
        assert_eq!(lifecycle.detached().len(), 1);

        lifecycle.poll(&chain).await;
        assert_eq!(lifecycle.detached().len(), 1);

        chain.settle(hash, true);
        assert_eq!(lifecycle.poll(&chain).await, None);
        assert!(lifecycle.detached().is_empty());
    }

    #[tokio::test]
    async fn detached_transaction_blocks_submit_for_its_signer() {
        let chain = ReceiptChain::default();
        let mut lifecycle = TransactionLifecycle::new();
        let other = Address::from_low_u64_be(7);

        let hash = lifecycle.submit(&chain, TxKind::Mint, &call(), account()).await.unwrap();
        lifecycle.detach();

        let err = lifecycle
            .submit(&chain, TxKind::Mint, &call(), account())
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::TransactionInFlight(h) if h == hash));
        assert!(lifecycle.submit(&chain, TxKind::Mint, &call(), other).await.is_ok());
    }

    #[tokio::test]
    async fn reattach_restores_signers_transaction() {
        let chain = ReceiptChain::default();
        let mut lifecycle = TransactionLifecycle::new();

        let hash = lifecycle.submit(&chain, TxKind::Reclaim, &call(), account()).await.unwrap();
        lifecycle.detach();

        assert!(!lifecycle.reattach(Address::from_low_u64_be(7)));
        assert!(lifecycle.reattach(account()));
        assert_eq!(lifecycle.current().map(|tx| tx.hash), Some(hash));
        assert!(lifecycle.detached().is_empty());
        assert!(lifecycle.is_in_flight());
    }

    #[tokio::test]
    async fn in_flight_transaction_cannot_be_cleared() {
        let chain = ReceiptChain::default();
        let mut lifecycle = TransactionLifecycle::new();

        let hash = lifecycle.submit(&chain, TxKind::Mint, &call(), account()).await.unwrap();
        assert!(lifecycle.clear().is_err());

        chain.settle(hash, false);
        lifecycle.poll(&chain).await;
        lifecycle.clear().unwrap();
        assert!(lifecycle.current().is_none());
    }
}
