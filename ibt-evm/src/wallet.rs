//! Wallet session backed by a JSON-RPC endpoint and an optional local key.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ethers::prelude::*;
use ibt_flow::{ChainId, FlowError, Result, WalletSession};
use serde_json::json;
use tracing::debug;

/// Chain id 0 is never a real chain; it marks "not reported yet".
const UNKNOWN_CHAIN: u64 = 0;

/// The connected account is the local signer's address, or `None` when no
/// key was configured. The active chain is whatever the endpoint last
/// reported through [`RpcSession::sync`].
pub struct RpcSession<M> {
    client: Arc<M>,
    account: Option<Address>,
    chain_id: AtomicU64,
}

impl<M: Middleware + 'static> RpcSession<M> {
    pub fn new(client: Arc<M>, account: Option<Address>) -> Self {
        Self {
            client,
            account,
            chain_id: AtomicU64::new(UNKNOWN_CHAIN),
        }
    }

    /// Re-read the endpoint's chain id.
    pub async fn sync(&self) -> Result<ChainId> {
        let chain_id = self
            .client
            .get_chainid()
            .await
            .map_err(|err| FlowError::Rpc(err.to_string()))?
            .as_u64();
        self.chain_id.store(chain_id, Ordering::SeqCst);
        debug!(chain_id, "endpoint chain observed");
        Ok(chain_id)
    }
}

#[async_trait]
impl<M: Middleware + 'static> WalletSession for RpcSession<M> {
    fn account(&self) -> Option<Address> {
        self.account
    }

    fn chain_id(&self) -> Option<ChainId> {
        match self.chain_id.load(Ordering::SeqCst) {
            UNKNOWN_CHAIN => None,
            chain_id => Some(chain_id),
        }
    }

    async fn request_switch(&self, chain_id: ChainId) -> Result<()> {
        let params = [json!({ "chainId": format!("{chain_id:#x}") })];
        self.client
            .provider()
            .request::<_, serde_json::Value>("wallet_switchEthereumChain", params)
            .await
            .map_err(|err| FlowError::Rpc(err.to_string()))?;
        self.sync().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::providers::{MockProvider, Provider};

    fn session(mock: MockProvider, account: Option<Address>) -> RpcSession<Provider<MockProvider>> {
        RpcSession::new(Arc::new(Provider::new(mock)), account)
    }

    #[tokio::test]
    async fn chain_is_unknown_until_synced() {
        let mock = MockProvider::new();
        mock.push::<U256, _>(U256::from(137)).unwrap();
        let session = session(mock, None);

        assert_eq!(session.chain_id(), None);
        assert_eq!(session.sync().await.unwrap(), 137);
        assert_eq!(session.chain_id(), Some(137));
    }

    #[tokio::test]
    async fn account_is_the_configured_signer() {
        let account = Address::from_low_u64_be(42);
        assert_eq!(session(MockProvider::new(), Some(account)).account(), Some(account));
        assert_eq!(session(MockProvider::new(), None).account(), None);
    }

    #[tokio::test]
    async fn rejected_switch_keeps_previous_chain() {
        let mock = MockProvider::new();
        mock.push::<U256, _>(U256::from(1)).unwrap();
        let session = session(mock, None);
        session.sync().await.unwrap();

        // no response queued for wallet_switchEthereumChain
        assert!(session.request_switch(137).await.is_err());
        assert_eq!(session.chain_id(), Some(1));
    }
}
