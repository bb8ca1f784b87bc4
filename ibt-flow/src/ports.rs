//! Injected collaborators: the IBT contract and the connected wallet.

use async_trait::async_trait;

use crate::error::Result;
use crate::proof::ProofCall;
use crate::types::{Address, ChainId, TokenId, H256, U256};

/// The IBT contract on the required chain.
///
/// Reads are idempotent and may be re-issued freely. Writes are signed by the
/// connected wallet and return the transaction hash as soon as the node
/// accepts them.
#[async_trait]
pub trait IbtContract: Send + Sync {
    /// `nullifierHashToTokenId(uint256) -> uint256`; zero means unminted.
    async fn nullifier_hash_to_token_id(&self, nullifier_hash: U256) -> Result<TokenId>;

    /// `ownerOf(uint256) -> address`
    async fn owner_of(&self, token_id: TokenId) -> Result<Address>;

    /// `addressHasBeenUsed(address) -> bool`
    async fn address_has_been_used(&self, account: Address) -> Result<bool>;

    /// `mint(uint256, uint256, uint256[8])`
    async fn mint(&self, call: &ProofCall) -> Result<H256>;

    /// `reclaim(uint256, uint256, uint256[8])`
    async fn reclaim(&self, call: &ProofCall) -> Result<H256>;

    /// Receipt lookup: `None` while unmined, otherwise whether execution succeeded.
    async fn transaction_receipt(&self, hash: H256) -> Result<Option<bool>>;
}

/// The connected wallet as seen by the flow.
#[async_trait]
pub trait WalletSession: Send + Sync {
    /// Connected account, if any.
    fn account(&self) -> Option<Address>;

    /// Chain the wallet reports as active, if it has reported one.
    fn chain_id(&self) -> Option<ChainId>;

    /// Ask the wallet to change network. The outcome is observed through
    /// [`WalletSession::chain_id`].
    async fn request_switch(&self, chain_id: ChainId) -> Result<()>;
}
