//! Required-network gate and the chain registry used for explorer links.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::ports::WalletSession;
use crate::types::{ChainId, ETHEREUM_CHAIN_ID, H256, POLYGON_CHAIN_ID};

/// Display metadata for a supported chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainInfo {
    pub chain_id: ChainId,
    pub display_name: &'static str,
    pub explorer_name: &'static str,
    pub explorer_url: &'static str,
}

impl ChainInfo {
    /// Block-explorer link for a transaction.
    pub fn tx_url(&self, hash: H256) -> String {
        format!("{}/tx/{:?}", self.explorer_url, hash)
    }
}

/// Polygon PoS
pub const POLYGON: ChainInfo = ChainInfo {
    chain_id: POLYGON_CHAIN_ID,
    display_name: "Polygon",
    explorer_name: "PolygonScan",
    explorer_url: "https://polygonscan.com",
};

/// Ethereum mainnet
pub const ETHEREUM: ChainInfo = ChainInfo {
    chain_id: ETHEREUM_CHAIN_ID,
    display_name: "Ethereum",
    explorer_name: "Etherscan",
    explorer_url: "https://etherscan.io",
};

/// Get info for a known chain
pub fn chain_info(chain_id: ChainId) -> Option<ChainInfo> {
    match chain_id {
        POLYGON_CHAIN_ID => Some(POLYGON),
        ETHEREUM_CHAIN_ID => Some(ETHEREUM),
        _ => None,
    }
}

/// Compares the wallet's active chain with the required one.
pub struct NetworkGuard<W: ?Sized> {
    wallet: Arc<W>,
    required: ChainId,
}

impl<W: WalletSession + ?Sized> NetworkGuard<W> {
    pub fn new(wallet: Arc<W>, required: ChainId) -> Self {
        Self { wallet, required }
    }

    pub fn current_chain(&self) -> Option<ChainId> {
        self.wallet.chain_id()
    }

    pub fn required_chain(&self) -> ChainId {
        self.required
    }

    pub fn is_required(&self, chain_id: ChainId) -> bool {
        chain_id == self.required
    }

    /// True only when the wallet reports a chain and it is not the required one.
    pub fn is_mismatched(&self) -> bool {
        matches!(self.current_chain(), Some(chain_id) if !self.is_required(chain_id))
    }

    /// Ask the wallet to move to the required chain. A declined or failed
    /// request is logged and otherwise ignored.
    pub async fn request_switch(&self) {
        debug!(chain_id = self.required, "requesting network switch");
        if let Err(err) = self.wallet.request_switch(self.required).await {
            warn!(chain_id = self.required, error = %err, "network switch request failed");
        }
    }
}
