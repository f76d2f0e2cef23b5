pub mod accounts;
pub mod client;
pub mod error;
pub mod orchestrator;
pub mod rpc;
pub mod store;

pub use accounts::{is_valid_address, resolve_accounts, resolve_role};
pub use client::*;
pub use error::*;
pub use orchestrator::*;
pub use rpc::{JsonRpcClient, JsonRpcConnector};
pub use store::DeploymentStore;
