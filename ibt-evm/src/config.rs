//! `ibt` configuration.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use ibt_flow::{
    Address, ChainId, FlowConfig, DEFAULT_CONTRACT_ADDRESS, POLYGON_CHAIN_ID,
};

const DEFAULT_SESSION_DIR: &str = ".ibt-session";
const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;

#[derive(Clone, Debug)]
pub struct EvmConfig {
    /// JSON-RPC endpoint of the required chain.
    pub rpc_url: String,
    /// IBT contract address.
    pub contract_address: Address,
    /// Chain the contract is deployed on.
    pub chain_id: ChainId,
    /// Hex private key of the account to act as. Absent means disconnected.
    pub private_key: Option<String>,
    /// Directory of the on-disk proof cache.
    pub session_dir: PathBuf,
    /// Receipt polling interval.
    pub poll_interval: Duration,
}

impl EvmConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, one variable at a time.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let rpc_url = lookup("IBT_RPC_URL").context("IBT_RPC_URL must be set")?;

        let contract_address = match lookup("IBT_CONTRACT_ADDRESS") {
            Some(raw) => raw
                .parse::<Address>()
                .ok()
                .with_context(|| format!("invalid IBT_CONTRACT_ADDRESS: {raw}"))?,
            None => DEFAULT_CONTRACT_ADDRESS,
        };

        let chain_id = match lookup("IBT_CHAIN_ID") {
            Some(raw) => raw
                .parse::<ChainId>()
                .with_context(|| format!("invalid IBT_CHAIN_ID: {raw}"))?,
            None => POLYGON_CHAIN_ID,
        };

        let private_key = lookup("IBT_PRIVATE_KEY").filter(|key| !key.trim().is_empty());

        let session_dir = lookup("IBT_SESSION_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSION_DIR));

        let poll_interval_ms: u64 = lookup("IBT_POLL_INTERVAL_MS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_POLL_INTERVAL_MS);

        Ok(Self {
            rpc_url,
            contract_address,
            chain_id,
            private_key,
            session_dir,
            poll_interval: Duration::from_millis(poll_interval_ms),
        })
    }

    pub fn flow_config(&self) -> FlowConfig {
        FlowConfig {
            contract_address: self.contract_address,
            required_chain: self.chain_id,
            poll_interval: self.poll_interval,
        }
    }
}
