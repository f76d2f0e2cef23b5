use crate::config::SecretRef;
use crate::routing::PathPattern;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// Optimizer settings handed to the compiler for one profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OptimizerSettings {
    pub enabled: bool,
    pub runs: u32,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            runs: 200,
        }
    }
}

/// A named compiler version plus the optimizer configuration it builds with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerProfile {
    pub id: String,
    pub version: Version,
    pub optimizer: OptimizerSettings,
    pub default: bool,
    /// Explicit toolchain binary; looked up on PATH when absent.
    pub compiler_path: Option<std::path::PathBuf>,
}

/// Redirects artifacts matching `pattern` to `profile_id`.
#[derive(Debug, Clone)]
pub struct OverrideRule {
    pub pattern: PathPattern,
    pub profile_id: String,
}

/// How a logical account role is bound on one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountRef {
    /// Index into the network's key set.
    Index(usize),
    /// A literal address, validated at resolution time.
    Address(String),
}

impl std::fmt::Display for AccountRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountRef::Index(index) => write!(f, "#{index}"),
            AccountRef::Address(address) => write!(f, "{address}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GasSetting {
    #[default]
    Auto,
    Limit(u64),
}

impl GasSetting {
    pub fn limit(&self) -> Option<u64> {
        match self {
            GasSetting::Auto => None,
            GasSetting::Limit(limit) => Some(*limit),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationConfig {
    pub api_url: Url,
    pub api_key: Option<SecretRef>,
}

/// One deployment target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkProfile {
    pub id: String,
    pub endpoint: Url,
    pub accounts: BTreeMap<String, AccountRef>,
    pub verification: Option<VerificationConfig>,
    /// Non-live networks are throwaway dev chains; they are never verified.
    pub live: bool,
    pub save_deployments: bool,
    pub gas: GasSetting,
}

impl NetworkProfile {
    pub fn verifies(&self) -> bool {
        self.live && self.verification.is_some()
    }
}

/// A contract the operator wants deployed, with the role that signs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledDeployment {
    pub contract: String,
    pub from_role: String,
    /// ABI-encoded constructor arguments as lowercase hex, no `0x` prefix.
    pub constructor_args: Option<String>,
    pub networks: Option<Vec<String>>,
}

impl ScheduledDeployment {
    pub fn targets(&self, network_id: &str) -> bool {
        match &self.networks {
            Some(networks) => networks.iter().any(|n| n == network_id),
            None => true,
        }
    }
}
