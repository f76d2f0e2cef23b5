use super::{BackendError, VerificationError};
use crate::config::SecretSource;
use crate::types::NetworkProfile;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Everything a backend needs to verify one deployed contract.
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    pub network_id: String,
    pub contract_name: String,
    /// `path/To/Source.sol:Contract`
    pub fully_qualified_name: String,
    pub address: String,
    /// Long form, e.g. `v0.8.16+commit.07a7930e`.
    pub compiler_version: String,
    pub standard_input: Arc<Value>,
    /// Hex, no `0x` prefix.
    pub constructor_args: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted { guid: String },
    AlreadyVerified,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusOutcome {
    Pending,
    Verified,
    Failed(String),
}

#[async_trait]
pub trait VerificationBackend: Send + Sync {
    async fn submit(&self, request: &VerificationRequest) -> Result<SubmitOutcome, BackendError>;

    async fn check_status(&self, guid: &str) -> Result<StatusOutcome, BackendError>;

    fn name(&self) -> &'static str;
}

/// Builds the backend for a network that declares one. Credentials are
/// resolved here, once per run.
pub trait BackendFactory: Send + Sync {
    fn backend_for(
        &self,
        network: &NetworkProfile,
        secrets: &dyn SecretSource,
    ) -> Result<Arc<dyn VerificationBackend>, VerificationError>;
}
