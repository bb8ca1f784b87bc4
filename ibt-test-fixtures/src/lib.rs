//! In-memory IBT contract and wallet.
//!
//! `MockContract` follows the on-chain rules the flow relies on: one token per
//! nullifier hash, `ownerOf` reverts for unknown tokens, and an address that
//! has held the token is marked used forever. Writes are signed by whatever
//! account the shared `MockWallet` has connected and only take effect once
//! their receipt is polled past `confirm_after`.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ibt_flow::{
    encode_proof, Address, ChainId, FlowConfig, FlowError, IbtContract, ProofCall, Result,
    TokenId, VerificationResponse, WalletSession, H256, POLYGON_CHAIN_ID, U256,
};

// ═══════════════════════════════════════════════════════════════════════════════
// SAMPLE DATA
// ═══════════════════════════════════════════════════════════════════════════════

/// Deterministic account address.
pub fn account(n: u64) -> Address {
    Address::from_low_u64_be(0x1000 + n)
}

/// Nullifier hash carried by `verification_response(seed)`.
pub fn nullifier_for(seed: u64) -> U256 {
    U256::from(0xdead_0000u64 + seed)
}

fn proof_words(seed: u64) -> [U256; 8] {
    let mut words = [U256::zero(); 8];
    for (i, word) in words.iter_mut().enumerate() {
        *word = U256::from(seed) * U256::from(1_000_003u64) + U256::from(i as u64);
    }
    words
}

/// A well-formed verifier response.
pub fn verification_response(seed: u64) -> VerificationResponse {
    VerificationResponse {
        merkle_root: format!("{:#x}", U256::from(0x5eed_0000u64 + seed)),
        nullifier_hash: format!("{:#x}", nullifier_for(seed)),
        proof: format!("0x{}", hex::encode(encode_proof(&proof_words(seed)))),
    }
}

/// A response whose proof is one word short of `uint256[8]`.
pub fn malformed_response(seed: u64) -> VerificationResponse {
    let mut response = verification_response(seed);
    let proof = encode_proof(&proof_words(seed));
    response.proof = format!("0x{}", hex::encode(&proof[..7 * 32]));
    response
}

/// Default config with a 1ms receipt poll interval.
pub fn test_config() -> FlowConfig {
    FlowConfig {
        poll_interval: Duration::from_millis(1),
        ..FlowConfig::default()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WALLET
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct MockWallet {
    account: Mutex<Option<Address>>,
    chain: Mutex<Option<ChainId>>,
    accept_switch: AtomicBool,
    switch_requests: Mutex<Vec<ChainId>>,
}

impl MockWallet {
    pub fn connected(account: Address, chain_id: ChainId) -> Arc<Self> {
        Arc::new(Self {
            account: Mutex::new(Some(account)),
            chain: Mutex::new(Some(chain_id)),
            accept_switch: AtomicBool::new(true),
            switch_requests: Mutex::new(Vec::new()),
        })
    }

    /// Connected on Polygon.
    pub fn on_polygon(account: Address) -> Arc<Self> {
        Self::connected(account, POLYGON_CHAIN_ID)
    }

    pub fn disconnected() -> Arc<Self> {
        Arc::new(Self {
            account: Mutex::new(None),
            chain: Mutex::new(None),
            accept_switch: AtomicBool::new(true),
            switch_requests: Mutex::new(Vec::new()),
        })
    }

    pub fn set_account(&self, account: Option<Address>) {
        *self.account.lock().expect("wallet poisoned") = account;
    }

    pub fn set_chain(&self, chain_id: Option<ChainId>) {
        *self.chain.lock().expect("wallet poisoned") = chain_id;
    }

    /// Whether `request_switch` is approved by the "user".
    pub fn set_accept_switch(&self, accept: bool) {
        self.accept_switch.store(accept, Ordering::SeqCst);
    }

    pub fn switch_requests(&self) -> Vec<ChainId> {
        self.switch_requests.lock().expect("wallet poisoned").clone()
    }
}

#[async_trait]
impl WalletSession for MockWallet {
    fn account(&self) -> Option<Address> {
        *self.account.lock().expect("wallet poisoned")
    }

    fn chain_id(&self) -> Option<ChainId> {
        *self.chain.lock().expect("wallet poisoned")
    }

    async fn request_switch(&self, chain_id: ChainId) -> Result<()> {
        self.switch_requests
            .lock()
            .expect("wallet poisoned")
            .push(chain_id);
        if self.accept_switch.load(Ordering::SeqCst) {
            self.set_chain(Some(chain_id));
            Ok(())
        } else {
            Err(FlowError::Rpc("user rejected the request".into()))
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONTRACT
// ═══════════════════════════════════════════════════════════════════════════════

/// Number of calls made to each contract method.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallCounts {
    pub token_id: usize,
    pub owner_of: usize,
    pub has_been_used: usize,
    pub mint: usize,
    pub reclaim: usize,
    pub receipts: usize,
}

#[derive(Debug, Clone, Copy)]
enum Effect {
    Mint(U256),
    Reclaim(U256),
}

#[derive(Debug)]
struct MockTx {
    effect: Effect,
    sender: Address,
    polls_left: u32,
    outcome: Option<bool>,
    force_revert: bool,
}

#[derive(Debug, Default)]
struct Ledger {
    token_by_nullifier: HashMap<U256, TokenId>,
    owner_by_token: HashMap<TokenId, Address>,
    used: HashSet<Address>,
    next_token_id: u64,
    nonce: u64,
    txs: HashMap<H256, MockTx>,
    confirm_after: u32,
    revert_next: bool,
    fail_reads: bool,
    switch_on_read: Option<Option<Address>>,
    calls: CallCounts,
}

impl Ledger {
    /// Execute a transaction at mining time. Returns whether it succeeded.
    fn execute(&mut self, effect: Effect, sender: Address) -> bool {
        match effect {
            Effect::Mint(nullifier_hash) => {
                if self.token_by_nullifier.contains_key(&nullifier_hash) {
                    return false;
                }
                self.next_token_id += 1;
                let token_id = U256::from(self.next_token_id);
                self.token_by_nullifier.insert(nullifier_hash, token_id);
                self.owner_by_token.insert(token_id, sender);
                self.used.insert(sender);
                true
            }
            Effect::Reclaim(nullifier_hash) => {
                let Some(token_id) = self.token_by_nullifier.get(&nullifier_hash).copied() else {
                    return false;
                };
                if self.used.contains(&sender) {
                    return false;
                }
                self.owner_by_token.insert(token_id, sender);
                self.used.insert(sender);
                true
            }
        }
    }
}

pub struct MockContract {
    wallet: Arc<MockWallet>,
    ledger: Mutex<Ledger>,
}

impl MockContract {
    pub fn new(wallet: Arc<MockWallet>) -> Arc<Self> {
        Arc::new(Self {
            wallet,
            ledger: Mutex::new(Ledger {
                confirm_after: 1,
                ..Ledger::default()
            }),
        })
    }

    fn ledger(&self) -> std::sync::MutexGuard<'_, Ledger> {
        self.ledger.lock().expect("ledger poisoned")
    }

    /// Mint a token directly, as if it happened before the test.
    pub fn seed_token(&self, nullifier_hash: U256, owner: Address) -> TokenId {
        let mut ledger = self.ledger();
        ledger.execute(Effect::Mint(nullifier_hash), owner);
        ledger.token_by_nullifier[&nullifier_hash]
    }

    pub fn mark_used(&self, account: Address) {
        self.ledger().used.insert(account);
    }

    /// Receipt polls answered with "not mined" before a transaction executes.
    pub fn set_confirm_after(&self, polls: u32) {
        self.ledger().confirm_after = polls;
    }

    /// The next submitted transaction reverts when mined.
    pub fn revert_next_transaction(&self) {
        self.ledger().revert_next = true;
    }

    /// Make every read fail as an RPC error.
    pub fn set_fail_reads(&self, fail: bool) {
        self.ledger().fail_reads = fail;
    }

    /// Switch the wallet to `account` while the next token-id read is in flight.
    pub fn switch_account_during_next_read(&self, account: Option<Address>) {
        self.ledger().switch_on_read = Some(account);
    }

    pub fn calls(&self) -> CallCounts {
        self.ledger().calls
    }

    pub fn owner(&self, token_id: TokenId) -> Option<Address> {
        self.ledger().owner_by_token.get(&token_id).copied()
    }

    pub fn token_for(&self, nullifier_hash: U256) -> Option<TokenId> {
        self.ledger().token_by_nullifier.get(&nullifier_hash).copied()
    }

    fn submit(&self, effect: Effect) -> Result<H256> {
        let sender = self
            .wallet
            .account()
            .ok_or_else(|| FlowError::Submission("no signer connected".into()))?;

        let mut ledger = self.ledger();
        ledger.nonce += 1;
        let hash = H256::from_low_u64_be(ledger.nonce);
        let force_revert = std::mem::take(&mut ledger.revert_next);
        let polls_left = ledger.confirm_after;
        ledger.txs.insert(
            hash,
            MockTx {
                effect,
                sender,
                polls_left,
                outcome: None,
                force_revert,
            },
        );
        Ok(hash)
    }
}

#[async_trait]
impl IbtContract for MockContract {
    async fn nullifier_hash_to_token_id(&self, nullifier_hash: U256) -> Result<TokenId> {
        let switch = {
            let mut ledger = self.ledger();
            ledger.calls.token_id += 1;
            if ledger.fail_reads {
                return Err(FlowError::Rpc("connection refused".into()));
            }
            ledger.switch_on_read.take()
        };
        if let Some(account) = switch {
            self.wallet.set_account(account);
        }

        let ledger = self.ledger();
        Ok(ledger
            .token_by_nullifier
            .get(&nullifier_hash)
            .copied()
            .unwrap_or_default())
    }

    async fn owner_of(&self, token_id: TokenId) -> Result<Address> {
        let mut ledger = self.ledger();
        ledger.calls.owner_of += 1;
        if ledger.fail_reads {
            return Err(FlowError::Rpc("connection refused".into()));
        }
        ledger
            .owner_by_token
            .get(&token_id)
            .copied()
            .ok_or_else(|| FlowError::Rpc("execution reverted: ERC721: invalid token ID".into()))
    }

    async fn address_has_been_used(&self, account: Address) -> Result<bool> {
        let mut ledger = self.ledger();
        ledger.calls.has_been_used += 1;
        if ledger.fail_reads {
            return Err(FlowError::Rpc("connection refused".into()));
        }
        Ok(ledger.used.contains(&account))
    }

    async fn mint(&self, call: &ProofCall) -> Result<H256> {
        self.ledger().calls.mint += 1;
        self.submit(Effect::Mint(call.nullifier_hash))
    }

    async fn reclaim(&self, call: &ProofCall) -> Result<H256> {
        self.ledger().calls.reclaim += 1;
        self.submit(Effect::Reclaim(call.nullifier_hash))
    }

    async fn transaction_receipt(&self, hash: H256) -> Result<Option<bool>> {
        let mut ledger = self.ledger();
        ledger.calls.receipts += 1;

        let Some(mut tx) = ledger.txs.remove(&hash) else {
            return Ok(None);
        };

        let outcome = match tx.outcome {
            Some(outcome) => Some(outcome),
            None if tx.polls_left > 0 => {
                tx.polls_left -= 1;
                None
            }
            None => {
                let success = !tx.force_revert && ledger.execute(tx.effect, tx.sender);
                tx.outcome = Some(success);
                Some(success)
            }
        };

        ledger.txs.insert(hash, tx);
        Ok(outcome)
    }
}
