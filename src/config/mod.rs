//! On-disk project configuration.
//!
//! These types mirror the file one-to-one. The
//! [`ProfileRegistry`](crate::registry::ProfileRegistry) turns them into
//! validated profiles. Unknown keys are rejected here.

pub mod error;
pub mod secrets;

pub use error::*;
pub use secrets::*;

use crate::retry::RetryPolicy;
use crate::types::OptimizerSettings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
    Auto,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    #[serde(default = "default_sources")]
    pub sources: PathBuf,
    /// Extra source roots compiled alongside `sources`, e.g. vendored libraries.
    #[serde(default)]
    pub dependency_sources: Vec<PathBuf>,
    #[serde(default)]
    pub default_network: Option<String>,
    pub compilers: Vec<CompilerConfig>,
    #[serde(default)]
    pub overrides: Vec<OverrideConfig>,
    #[serde(default)]
    pub named_accounts: BTreeMap<String, NamedAccountConfig>,
    #[serde(default)]
    pub networks: Vec<NetworkConfig>,
    #[serde(default)]
    pub deployments: Vec<DeploymentConfig>,
    #[serde(default)]
    pub etherscan: Option<EtherscanConfig>,
    #[serde(default)]
    pub settings: RunSettings,
}

fn default_sources() -> PathBuf {
    PathBuf::from("contracts")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompilerConfig {
    /// Defaults to the version string when omitted.
    #[serde(default)]
    pub id: Option<String>,
    pub version: String,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub compiler_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptimizerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_runs")]
    pub runs: u32,
}

fn default_runs() -> u32 {
    200
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            runs: default_runs(),
        }
    }
}

impl From<&OptimizerConfig> for OptimizerSettings {
    fn from(config: &OptimizerConfig) -> Self {
        Self {
            enabled: config.enabled,
            runs: config.runs,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverrideConfig {
    pub pattern: String,
    pub profile: String,
}

/// `deployer: 0`, `deployer: "0xabc…"`, or `{index: 0}` / `{address: "0x…"}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AccountConfig {
    Index(usize),
    Address(String),
    Explicit(ExplicitAccount),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExplicitAccount {
    #[serde(default)]
    pub index: Option<usize>,
    #[serde(default)]
    pub address: Option<String>,
}

/// A role bound across networks: either one binding everywhere or a
/// per-network table with an optional fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NamedAccountConfig {
    Everywhere(AccountConfig),
    PerNetwork(PerNetworkAccount),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PerNetworkAccount {
    #[serde(default)]
    pub default: Option<AccountConfig>,
    #[serde(default)]
    pub networks: BTreeMap<String, AccountConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkConfig {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub accounts: BTreeMap<String, AccountConfig>,
    #[serde(default)]
    pub verify: Option<VerifyConfig>,
    #[serde(default = "default_true")]
    pub live: bool,
    #[serde(default = "default_true")]
    pub save_deployments: bool,
    #[serde(default)]
    pub gas: Option<GasConfig>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GasConfig {
    Limit(u64),
    Keyword(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyConfig {
    #[serde(default)]
    pub api_url: String,
    #[serde(default)]
    pub api_key: Option<SecretRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EtherscanConfig {
    #[serde(default)]
    pub api_key: Option<SecretRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeploymentConfig {
    pub contract: String,
    #[serde(default = "default_role")]
    pub from: String,
    #[serde(default)]
    pub args: Option<String>,
    #[serde(default)]
    pub networks: Option<Vec<String>>,
}

fn default_role() -> String {
    "deployer".to_string()
}

/// Runtime knobs. CLI flags override these.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunSettings {
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,
    #[serde(default = "RetryPolicy::confirmation_default")]
    pub confirmation: RetryPolicy,
    #[serde(default = "RetryPolicy::verification_default")]
    pub verification: RetryPolicy,
    #[serde(default = "default_verification_concurrency")]
    pub verification_concurrency: usize,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("deployments")
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("artifacts")
}

fn default_verification_concurrency() -> usize {
    2
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            workers: None,
            state_dir: default_state_dir(),
            artifacts_dir: default_artifacts_dir(),
            confirmation: RetryPolicy::confirmation_default(),
            verification: RetryPolicy::verification_default(),
            verification_concurrency: default_verification_concurrency(),
        }
    }
}

impl RunSettings {
    pub fn worker_limit(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get).max(1)
    }
}

impl ProjectConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let format = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => ConfigFormat::Json,
            Some("yaml") | Some("yml") => ConfigFormat::Yaml,
            _ => ConfigFormat::Auto,
        };

        debug!("Loading project config from {}", path.display());
        Self::parse(&content, format)
    }

    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self> {
        let format = match format {
            ConfigFormat::Auto => detect_format(content),
            format => format,
        };

        match format {
            ConfigFormat::Json => {
                serde_json::from_str(content).map_err(|e| ConfigError::InvalidJson {
                    reason: e.to_string(),
                })
            }
            _ => serde_yaml::from_str(content).map_err(|e| ConfigError::InvalidYaml {
                reason: e.to_string(),
            }),
        }
    }
}

fn detect_format(content: &str) -> ConfigFormat {
    if content.trim_start().starts_with('{') {
        ConfigFormat::Json
    } else {
        ConfigFormat::Yaml
    }
}
