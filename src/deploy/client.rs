use super::NetworkError;
use crate::types::NetworkProfile;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployTransaction {
    pub from: String,
    /// `0x`-prefixed creation bytecode followed by constructor arguments.
    pub data: String,
    pub gas: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub success: bool,
    pub contract_address: Option<String>,
    pub block_number: u64,
}

/// The calls the orchestrator needs from a network. Signing happens on the
/// other side: `accounts` is the key set indices refer into.
#[async_trait]
pub trait NetworkClient: Send + Sync {
    async fn accounts(&self) -> Result<Vec<String>, NetworkError>;

    /// Broadcasts a contract creation and returns its transaction hash.
    async fn send_deployment(&self, tx: &DeployTransaction) -> Result<String, NetworkError>;

    /// `None` while the transaction is still pending.
    async fn transaction_receipt(
        &self,
        tx_hash: &str,
    ) -> Result<Option<TransactionReceipt>, NetworkError>;
}

/// Opens a client for a network profile.
pub trait NetworkConnector: Send + Sync {
    fn connect(&self, network: &NetworkProfile) -> Result<Arc<dyn NetworkClient>, NetworkError>;
}
