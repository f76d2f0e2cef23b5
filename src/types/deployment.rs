use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted fact that a contract's compiled output lives at `address`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub network_id: String,
    pub contract_name: String,
    pub address: String,
    pub compiled_artifact_hash: String,
    pub block_number: u64,
    pub tx_hash: String,
    pub deployed_at: DateTime<Utc>,
}

/// Lifecycle of one (network, contract) pair within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentState {
    NotDeployed,
    Deploying,
    Deployed,
    Failed { error: String },
}

impl DeploymentState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeploymentState::Deployed | DeploymentState::Failed { .. })
    }

    /// Returns the next state, or `None` when the transition is not allowed.
    pub fn transition(&self, next: DeploymentState) -> Option<DeploymentState> {
        let allowed = matches!(
            (self, &next),
            (DeploymentState::NotDeployed, DeploymentState::Deploying)
                | (DeploymentState::NotDeployed, DeploymentState::Deployed)
                | (DeploymentState::Deploying, DeploymentState::Deployed)
                | (DeploymentState::Deploying, DeploymentState::Failed { .. })
                | (DeploymentState::NotDeployed, DeploymentState::Failed { .. })
        );
        allowed.then_some(next)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationStatus {
    Pending,
    Verified,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub network_id: String,
    pub contract_name: String,
    pub address: String,
    pub status: VerificationStatus,
    pub attempts: u32,
    pub message: Option<String>,
}
