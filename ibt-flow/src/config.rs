//! Flow configuration.

use std::time::Duration;

use crate::types::{Address, ChainId, DEFAULT_CONTRACT_ADDRESS, POLYGON_CHAIN_ID};

/// Default interval between transaction receipt polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Static parameters of a flow instance.
#[derive(Clone, Debug)]
pub struct FlowConfig {
    /// IBT contract address; also the namespace of cached proofs.
    pub contract_address: Address,
    /// The only chain reads and writes are issued against.
    pub required_chain: ChainId,
    /// Delay between receipt polls while a transaction is pending.
    pub poll_interval: Duration,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            contract_address: DEFAULT_CONTRACT_ADDRESS,
            required_chain: POLYGON_CHAIN_ID,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}
