//! The flow controller: owns the resolvers, the proof cache, the transaction
//! lifecycle and the reclaim intent, and recomputes [`FlowState`] from them.
//!
//! Every method that awaits re-observes the wallet afterwards. An account
//! switch observed mid-read resets the resolvers, which turns the in-flight
//! read's ticket stale so its result is dropped on arrival.

use std::sync::Arc;

use tracing::{debug, info};

use crate::cache::{ProofCache, SessionStore};
use crate::config::FlowConfig;
use crate::eligibility::{has_account_ever_owned, ReclaimEligibility};
use crate::error::{FlowError, Result};
use crate::flow::{derive_state, Action, FlowSnapshot, FlowState};
use crate::network::{chain_info, ChainInfo, NetworkGuard};
use crate::ownership::{resolve_ownership, OwnershipResolver};
use crate::ports::{IbtContract, WalletSession};
use crate::proof::{IdentityProof, VerificationResponse};
use crate::transaction::{TransactionLifecycle, TxStatus};
use crate::types::{Address, ChainId, TxKind, H256};

pub struct FlowController<C: ?Sized, W: ?Sized, S> {
    config: FlowConfig,
    contract: Arc<C>,
    wallet: Arc<W>,
    network: NetworkGuard<W>,
    proofs: ProofCache<S>,
    ownership: OwnershipResolver,
    eligibility: ReclaimEligibility,
    transactions: TransactionLifecycle,
    reclaim_requested: bool,
    observed_account: Option<Address>,
    observed_chain: Option<ChainId>,
}

impl<C, W, S> FlowController<C, W, S>
where
    C: IbtContract + ?Sized,
    W: WalletSession + ?Sized,
    S: SessionStore,
{
    pub fn new(config: FlowConfig, contract: Arc<C>, wallet: Arc<W>, store: S) -> Self {
        let network = NetworkGuard::new(Arc::clone(&wallet), config.required_chain);
        let observed_account = wallet.account();
        let observed_chain = wallet.chain_id();
        Self {
            config,
            contract,
            wallet,
            network,
            proofs: ProofCache::new(store),
            ownership: OwnershipResolver::new(),
            eligibility: ReclaimEligibility::new(),
            transactions: TransactionLifecycle::new(),
            reclaim_requested: false,
            observed_account,
            observed_chain,
        }
    }

    pub fn transactions(&self) -> &TransactionLifecycle {
        &self.transactions
    }

    pub fn is_reclaim_requested(&self) -> bool {
        self.reclaim_requested
    }

    /// Explorer metadata for the required chain.
    pub fn chain(&self) -> Option<ChainInfo> {
        chain_info(self.config.required_chain)
    }

    /// The cached proof for the connected account.
    pub fn cached_proof(&self) -> Option<IdentityProof> {
        let account = self.observed_account?;
        self.proofs.get(self.config.contract_address, account)
    }

    pub fn snapshot(&self) -> FlowSnapshot {
        FlowSnapshot {
            account: self.observed_account,
            chain_id: self.network.current_chain(),
            required_chain: self.config.required_chain,
            has_proof: self.cached_proof().is_some(),
            transaction: self.transactions.current().copied(),
            ownership: self.ownership.resolution(),
            reclaim_used: self.eligibility.resolution(),
            reclaim_requested: self.reclaim_requested,
        }
    }

    pub fn state(&self) -> FlowState {
        derive_state(&self.snapshot())
    }

    /// Pick up an account or network switch. Returns `true` if either changed.
    ///
    /// Both cancel reclaim intent and make every in-flight read stale. An
    /// account switch also detaches the displayed transaction, and picks up
    /// one the new account left in flight earlier.
    pub fn observe_inputs(&mut self) -> bool {
        let account = self.wallet.account();
        let chain_id = self.network.current_chain();
        let account_changed = account != self.observed_account;
        let chain_changed = chain_id != self.observed_chain;
        if !account_changed && !chain_changed {
            return false;
        }

        self.reclaim_requested = false;

        if chain_changed {
            info!(from = ?self.observed_chain, to = ?chain_id, "wallet network changed");
            self.observed_chain = chain_id;
            self.ownership.invalidate();
            self.eligibility.invalidate();
        }

        if account_changed {
            info!(from = ?self.observed_account, to = ?account, "wallet account changed");
            self.observed_account = account;
            self.transactions.detach();
            if let Some(account) = account {
                self.transactions.reattach(account);
            }
            self.ownership.reset();
            self.eligibility.reset();
        }
        true
    }

    /// Re-issue every read the current inputs call for, then recompute.
    pub async fn refresh(&mut self) -> FlowState {
        self.observe_inputs();
        if self.observed_account.is_none() || self.network.is_mismatched() {
            return self.state();
        }

        self.poll_transactions().await;
        self.observe_inputs();

        let Some(account) = self.observed_account else {
            return self.state();
        };
        let Some(proof) = self.cached_proof() else {
            self.ownership.reset();
            return self.state();
        };

        let ticket = self.ownership.begin(proof.nullifier_hash());
        let result = resolve_ownership(self.contract.as_ref(), ticket.key()).await;
        self.observe_inputs();
        self.ownership.complete(ticket, result);

        if self.reclaim_requested {
            if let Some(ticket) = self.eligibility.begin(account) {
                let result = has_account_ever_owned(self.contract.as_ref(), account).await;
                self.observe_inputs();
                self.eligibility.complete(ticket, result);
            }
        }

        let state = self.state();
        debug!(state = state.name(), "flow recomputed");
        state
    }

    /// Verification callback: cache the proof for the connected account.
    ///
    /// Only accepted while the flow asks for a proof. A proof that does not
    /// decode is rejected and nothing is cached.
    pub fn record_verification(&mut self, response: &VerificationResponse) -> Result<FlowState> {
        self.observe_inputs();
        let account = self.observed_account.ok_or(FlowError::NotConnected)?;
        self.require(Action::Verify)?;
        let proof = IdentityProof::from_response(response)?;

        info!(?account, nullifier_hash = ?proof.nullifier_hash(), "identity proof accepted");
        self.proofs.set(self.config.contract_address, account, proof);
        self.ownership.reset();
        Ok(self.state())
    }

    /// Toggle reclaim intent on. Only offered once the token is minted.
    pub fn start_reclaim(&mut self) -> Result<FlowState> {
        self.observe_inputs();
        self.require(Action::StartReclaim)?;
        self.reclaim_requested = true;
        Ok(self.state())
    }

    /// Clear a failed transaction so the underlying state is shown again.
    pub fn dismiss(&mut self) -> Result<FlowState> {
        self.observe_inputs();
        self.require(Action::Dismiss)?;
        self.transactions.clear()?;
        Ok(self.state())
    }

    /// Ask the wallet to switch to the required chain (fire-and-forget).
    pub async fn request_network_switch(&self) {
        self.network.request_switch().await;
    }

    /// Submit a mint or reclaim. Only allowed when the current state offers
    /// exactly that write.
    pub async fn submit(&mut self, kind: TxKind) -> Result<H256> {
        self.observe_inputs();
        if self.transactions.is_in_flight() {
            if let Some(tx) = self.transactions.current() {
                return Err(FlowError::TransactionInFlight(tx.hash));
            }
        }

        let action = match kind {
            TxKind::Mint => Action::SubmitMint,
            TxKind::Reclaim => Action::SubmitReclaim,
        };
        self.require(action)?;

        let account = self.observed_account.ok_or(FlowError::NotConnected)?;
        let proof = self.cached_proof().ok_or(FlowError::NotReady {
            action: action.name(),
            state: "needs-proof",
        })?;

        self.transactions
            .submit(self.contract.as_ref(), kind, &proof.call(), account)
            .await
    }

    /// Poll pending transactions once. A confirmation invalidates the
    /// ownership and eligibility reads so the next refresh re-issues them.
    pub async fn poll_transactions(&mut self) -> Option<TxStatus> {
        let changed = self.transactions.poll(self.contract.as_ref()).await;
        if changed == Some(TxStatus::Confirmed) {
            self.ownership.invalidate();
            self.eligibility.invalidate();
        }
        changed
    }

    /// Poll the tracked transaction until it is terminal, sleeping
    /// `poll_interval` between checks.
    pub async fn wait_for_transaction(&mut self) -> Result<TxStatus> {
        loop {
            let tx = self.transactions.current().copied().ok_or(FlowError::NotReady {
                action: "wait for transaction",
                state: self.state().name(),
            })?;
            if tx.status.is_terminal() {
                return Ok(tx.status);
            }

            if self.poll_transactions().await.is_none() {
                tokio::time::sleep(self.config.poll_interval).await;
            }
        }
    }

    fn require(&self, action: Action) -> Result<()> {
        let state = self.state();
        if state.action() == Some(action) {
            Ok(())
        } else {
            Err(FlowError::NotReady {
                action: action.name(),
                state: state.name(),
            })
        }
    }
}
