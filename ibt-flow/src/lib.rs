//! ibt-flow
//!
//! Flow controller for Iris-bound tokens (IBTs): a wallet-holding user proves
//! personhood once, mints a single token bound to that proof, and may later
//! reclaim the token into a fresh wallet.
//!
//! # Architecture
//!
//! ```text
//! wallet ─┐                ┌─ OwnershipResolver   (nullifier → token id → owner)
//! network ┼─ FlowController┼─ ReclaimEligibility  (has this account ever owned it?)
//! proof ──┘                ├─ TransactionLifecycle (submitted → confirmed | failed)
//!                          └─ ProofCache          (one proof per contract/account)
//!
//!                    derive_state(FlowSnapshot) -> FlowState
//! ```
//!
//! `derive_state` is a pure function. Everything asynchronous lives behind the
//! [`IbtContract`] and [`WalletSession`] ports so the controller can be driven
//! against a real chain or against in-memory fakes.

pub mod cache;
pub mod config;
pub mod controller;
pub mod eligibility;
pub mod error;
pub mod flow;
pub mod network;
pub mod ownership;
pub mod ports;
pub mod proof;
pub mod transaction;
pub mod types;

pub use cache::{cache_key, MemoryStore, ProofCache, SessionStore, SledStore};
pub use config::FlowConfig;
pub use controller::FlowController;
pub use eligibility::ReclaimEligibility;
pub use error::{FlowError, Result};
pub use flow::{derive_state, Action, FlowSnapshot, FlowState};
pub use network::{chain_info, ChainInfo, NetworkGuard, ETHEREUM, POLYGON};
pub use ownership::{Ownership, OwnershipResolver, ReadTicket};
pub use ports::{IbtContract, WalletSession};
pub use proof::{decode_proof, encode_proof, IdentityProof, ProofCall, VerificationResponse};
pub use transaction::{PendingTransaction, TransactionLifecycle, TxStatus};
pub use types::{
    Address, ChainId, Resolution, TokenId, TxKind, DEFAULT_CONTRACT_ADDRESS, ETHEREUM_CHAIN_ID,
    H256, POLYGON_CHAIN_ID, U256,
};
