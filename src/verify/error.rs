use crate::config::ConfigError;
use thiserror::Error;

/// What a backend call failed with. Only transient errors are retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("transient: {0}")]
    Transient(String),

    #[error("{0}")]
    Permanent(String),
}

impl BackendError {
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Transient(_))
    }
}

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("Verification of {contract} on {network_id} rejected: {reason}")]
    Rejected {
        network_id: String,
        contract: String,
        reason: String,
    },

    #[error("Verification of {contract} on {network_id} gave up after {attempts} attempts: {reason}")]
    Exhausted {
        network_id: String,
        contract: String,
        attempts: u32,
        reason: String,
    },

    #[error("Network {network_id} has no verification backend")]
    NotConfigured { network_id: String },

    #[error("Verification backend for {network_id}: {source}")]
    Credentials {
        network_id: String,
        #[source]
        source: ConfigError,
    },

    #[error("Verification backend for {network_id} could not be created: {reason}")]
    Backend { network_id: String, reason: String },
}
