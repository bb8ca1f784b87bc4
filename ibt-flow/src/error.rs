//! Error types for the IBT flow controller.

use thiserror::Error;

use crate::types::H256;

/// Result type alias for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;

/// Errors raised by the flow controller and its ports.
///
/// Read failures (`Rpc`) never reach the user as failure text: the resolvers
/// keep their previous resolution and the next refresh re-issues the read.
#[derive(Debug, Error)]
pub enum FlowError {
    /// A read-only contract call or receipt lookup failed
    #[error("rpc error: {0}")]
    Rpc(String),

    /// The wallet or node rejected a write
    #[error("transaction submission failed: {0}")]
    Submission(String),

    /// Proof bytes from the verifier are not a `uint256[8]`
    #[error("malformed identity proof: {0}")]
    ProofDecode(String),

    /// The requested action is not offered in the current state
    #[error("{action} is not available while the flow is {state}")]
    NotReady {
        action: &'static str,
        state: &'static str,
    },

    /// A previous write has not reached a terminal status yet
    #[error("transaction {0:?} is still pending")]
    TransactionInFlight(H256),

    /// No wallet account is connected
    #[error("no wallet account connected")]
    NotConnected,

    /// Session storage failed
    #[error("session store error: {0}")]
    Store(String),

    /// JSON (de)serialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<sled::Error> for FlowError {
    fn from(err: sled::Error) -> Self {
        Self::Store(err.to_string())
    }
}
