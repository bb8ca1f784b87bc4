//! ethers-backed implementations of the flow's contract and wallet ports,
//! environment configuration, and text rendering for the `ibt` binary.

pub mod config;
pub mod contract;
pub mod render;
pub mod wallet;

pub use config::EvmConfig;
pub use contract::{EvmContract, IrisBoundToken};
pub use render::{describe, short_address};
pub use wallet::RpcSession;
