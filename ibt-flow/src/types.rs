//! Primitive types shared across the flow.

use std::fmt;

use ethers_core::types::H160;
use serde::{Deserialize, Serialize};

pub use ethers_core::types::{Address, H256, U256};

/// EIP-155 chain identifier.
pub type ChainId = u64;

/// Token id as returned by `nullifierHashToTokenId`. Zero means "not minted".
pub type TokenId = U256;

/// Polygon PoS mainnet
pub const POLYGON_CHAIN_ID: ChainId = 137;

/// Ethereum mainnet
pub const ETHEREUM_CHAIN_ID: ChainId = 1;

/// IBT contract deployed on Polygon mainnet (0x41e727A4c19EEA4B7D0A079688268F3E74D4F6F0).
pub const DEFAULT_CONTRACT_ADDRESS: Address = H160([
    0x41, 0xe7, 0x27, 0xa4, 0xc1, 0x9e, 0xea, 0x4b, 0x7d, 0x0a, 0x07, 0x96, 0x88, 0x26, 0x8f,
    0x3e, 0x74, 0xd4, 0xf6, 0xf0,
]);

/// Which write a transaction carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    Mint,
    Reclaim,
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mint => f.write_str("mint"),
            Self::Reclaim => f.write_str("reclaim"),
        }
    }
}

/// Outcome of an asynchronous read as seen by the state machine.
///
/// Failed reads stay `Pending`; they are retried on the next refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<T> {
    Pending,
    Resolved(T),
}

impl<T> Default for Resolution<T> {
    fn default() -> Self {
        Self::Pending
    }
}

impl<T> Resolution<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn resolved(&self) -> Option<&T> {
        match self {
            Self::Pending => None,
            Self::Resolved(value) => Some(value),
        }
    }
}
