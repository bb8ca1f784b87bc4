//! Two-stage ownership pipeline: nullifier hash → token id → owner.
//!
//! The owner query is only issued for a real token id; `ownerOf` reverts for
//! tokens that do not exist. Results carry the [`ReadTicket`] they were issued
//! under and are dropped if the resolver has moved on since.

use tracing::debug;

use crate::error::Result;
use crate::ports::IbtContract;
use crate::types::{Address, Resolution, TokenId, U256};

/// Mint/ownership status of the token bound to a proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// No token has been minted for this nullifier hash.
    Unminted,
    /// A token exists. `owner` is `None` if the contract reported the zero address.
    Minted {
        token_id: TokenId,
        owner: Option<Address>,
    },
}

/// Identifies one issued read: the input key it was issued for and the
/// resolver generation at the time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadTicket<K> {
    generation: u64,
    key: K,
}

impl<K: Copy> ReadTicket<K> {
    pub(crate) fn new(generation: u64, key: K) -> Self {
        Self { generation, key }
    }

    pub fn key(&self) -> K {
        self.key
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Step 1: `nullifierHashToTokenId`. Zero maps to `None`.
pub async fn resolve_token_id<C>(contract: &C, nullifier_hash: U256) -> Result<Option<TokenId>>
where
    C: IbtContract + ?Sized,
{
    let token_id = contract.nullifier_hash_to_token_id(nullifier_hash).await?;
    Ok((!token_id.is_zero()).then_some(token_id))
}

/// Step 2: `ownerOf`. Zero address maps to `None`.
pub async fn resolve_owner<C>(contract: &C, token_id: TokenId) -> Result<Option<Address>>
where
    C: IbtContract + ?Sized,
{
    let owner = contract.owner_of(token_id).await?;
    Ok((!owner.is_zero()).then_some(owner))
}

/// Run both steps, short-circuiting when no token exists.
pub async fn resolve_ownership<C>(contract: &C, nullifier_hash: U256) -> Result<Ownership>
where
    C: IbtContract + ?Sized,
{
    match resolve_token_id(contract, nullifier_hash).await? {
        None => Ok(Ownership::Unminted),
        Some(token_id) => {
            let owner = resolve_owner(contract, token_id).await?;
            Ok(Ownership::Minted { token_id, owner })
        }
    }
}

/// Latest ownership resolution for the current nullifier hash.
#[derive(Debug, Default)]
pub struct OwnershipResolver {
    generation: u64,
    nullifier_hash: Option<U256>,
    resolution: Resolution<Ownership>,
}

impl OwnershipResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a read for `nullifier_hash`. Switching to a different nullifier
    /// drops the old resolution; re-reading the same one keeps it visible
    /// until the new result lands.
    pub fn begin(&mut self, nullifier_hash: U256) -> ReadTicket<U256> {
        if self.nullifier_hash != Some(nullifier_hash) {
            self.nullifier_hash = Some(nullifier_hash);
            self.resolution = Resolution::Pending;
        }
        self.generation += 1;
        ReadTicket::new(self.generation, nullifier_hash)
    }

    /// Apply a finished read. Returns `false` if the ticket is stale or the
    /// read failed; the previous resolution is kept in both cases.
    pub fn complete(&mut self, ticket: ReadTicket<U256>, result: Result<Ownership>) -> bool {
        if ticket.generation != self.generation || self.nullifier_hash != Some(ticket.key) {
            debug!(
                generation = ticket.generation,
                current = self.generation,
                "discarding superseded ownership read"
            );
            return false;
        }

        match result {
            Ok(ownership) => {
                debug!(?ownership, "ownership resolved");
                self.resolution = Resolution::Resolved(ownership);
                true
            }
            Err(err) => {
                debug!(error = %err, "ownership read failed, will retry");
                false
            }
        }
    }

    /// Keep the nullifier but force a fresh read (e.g. after a confirmed write).
    pub fn invalidate(&mut self) {
        self.generation += 1;
        self.resolution = Resolution::Pending;
    }

    /// Forget everything; in-flight reads become stale.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.nullifier_hash = None;
        self.resolution = Resolution::Pending;
    }

    pub fn resolution(&self) -> Resolution<Ownership> {
        self.resolution
    }

    pub fn nullifier_hash(&self) -> Option<U256> {
        self.nullifier_hash
    }
}
