//! The IBT contract over JSON-RPC.

use std::sync::Arc;

use async_trait::async_trait;
use ethers::prelude::*;
use ibt_flow::{FlowError, IbtContract, ProofCall, Result, TokenId};
use tracing::debug;

abigen!(
    IrisBoundToken,
    r#"[
        function nullifierHashToTokenId(uint256 nullifierHash) external view returns (uint256)
        function ownerOf(uint256 tokenId) external view returns (address)
        function addressHasBeenUsed(address account) external view returns (bool)
        function mint(uint256 root, uint256 nullifierHash, uint256[8] proof) external
        function reclaim(uint256 root, uint256 nullifierHash, uint256[8] proof) external
    ]"#
);

fn rpc_error(err: impl std::fmt::Display) -> FlowError {
    FlowError::Rpc(err.to_string())
}

fn submission_error(err: impl std::fmt::Display) -> FlowError {
    FlowError::Submission(err.to_string())
}

/// [`IbtContract`] over any ethers middleware. Writes are signed by the
/// middleware's signer.
pub struct EvmContract<M> {
    contract: IrisBoundToken<M>,
}

impl<M: Middleware + 'static> EvmContract<M> {
    pub fn new(address: Address, client: Arc<M>) -> Self {
        Self {
            contract: IrisBoundToken::new(address, client),
        }
    }
}

#[async_trait]
impl<M: Middleware + 'static> IbtContract for EvmContract<M> {
    async fn nullifier_hash_to_token_id(&self, nullifier_hash: U256) -> Result<TokenId> {
        self.contract
            .nullifier_hash_to_token_id(nullifier_hash)
            .call()
            .await
            .map_err(rpc_error)
    }

    async fn owner_of(&self, token_id: TokenId) -> Result<Address> {
        self.contract
            .owner_of(token_id)
            .call()
            .await
            .map_err(rpc_error)
    }

    async fn address_has_been_used(&self, account: Address) -> Result<bool> {
        self.contract
            .address_has_been_used(account)
            .call()
            .await
            .map_err(rpc_error)
    }

    async fn mint(&self, call: &ProofCall) -> Result<H256> {
        let tx = self
            .contract
            .mint(call.merkle_root, call.nullifier_hash, call.proof);
        let pending = tx.send().await.map_err(submission_error)?;
        debug!(hash = ?pending.tx_hash(), "mint accepted by node");
        Ok(pending.tx_hash())
    }

    async fn reclaim(&self, call: &ProofCall) -> Result<H256> {
        let tx = self
            .contract
            .reclaim(call.merkle_root, call.nullifier_hash, call.proof);
        let pending = tx.send().await.map_err(submission_error)?;
        debug!(hash = ?pending.tx_hash(), "reclaim accepted by node");
        Ok(pending.tx_hash())
    }

    async fn transaction_receipt(&self, hash: H256) -> Result<Option<bool>> {
        let receipt = self
            .contract
            .client()
            .get_transaction_receipt(hash)
            .await
            .map_err(rpc_error)?;
        Ok(receipt.map(|receipt| receipt.status == Some(U64::one())))
    }
}
