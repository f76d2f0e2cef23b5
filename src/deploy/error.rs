use thiserror::Error;

/// Fatal for the network it occurs on: no transaction is sent.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccountResolutionError {
    #[error("Role '{role}' is not bound on network {network_id}")]
    UnknownRole { network_id: String, role: String },

    #[error("Role '{role}' on network {network_id} uses index {index} but the key set has {available} accounts")]
    IndexOutOfRange {
        network_id: String,
        role: String,
        index: usize,
        available: usize,
    },

    #[error("Role '{role}' on network {network_id} resolves to malformed address '{address}'")]
    MalformedAddress {
        network_id: String,
        role: String,
        address: String,
    },
}

/// Failure talking to a network endpoint.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum DeployError {
    #[error(transparent)]
    Accounts(#[from] AccountResolutionError),

    #[error("Network {network_id}: {source}")]
    Network {
        network_id: String,
        #[source]
        source: NetworkError,
    },

    #[error("Transaction {tx_hash} for {contract} on {network_id} not confirmed after {attempts} attempts")]
    Timeout {
        network_id: String,
        contract: String,
        tx_hash: String,
        attempts: u32,
    },

    #[error("Transaction {tx_hash} for {contract} on {network_id} reverted")]
    Reverted {
        network_id: String,
        contract: String,
        tx_hash: String,
    },

    #[error("Contract {contract} was not compiled")]
    NotCompiled { contract: String },

    #[error("Deployment store I/O error at {path}: {source}")]
    Store {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Deployment store at {path} is corrupt: {reason}")]
    StoreFormat { path: String, reason: String },
}

pub type Result<T> = std::result::Result<T, DeployError>;
