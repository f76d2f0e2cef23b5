use crate::config::{
    AccountConfig, ConfigError, GasConfig, NamedAccountConfig, NetworkConfig, ProjectConfig,
    Result, RunSettings,
};
use crate::routing::PathPattern;
use crate::types::{
    AccountRef, CompilerProfile, GasSetting, NetworkProfile, OverrideRule, ScheduledDeployment,
    VerificationConfig,
};
use semver::Version;
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use tracing::{debug, info};
use url::Url;

const LOCAL_ENDPOINT: &str = "http://127.0.0.1:8545";

/// Validated, read-only view of the project configuration.
///
/// Built once per process by [`ProfileRegistry::load`] and passed by reference
/// to every component.
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    pub(crate) compilers: Vec<CompilerProfile>,
    pub(crate) default_profile: usize,
    pub(crate) overrides: Vec<OverrideRule>,
    pub(crate) networks: BTreeMap<String, NetworkProfile>,
    pub(crate) deployments: Vec<ScheduledDeployment>,
    pub(crate) default_network: Option<String>,
    pub(crate) source_roots: Vec<PathBuf>,
    pub(crate) settings: RunSettings,
}

impl ProfileRegistry {
    pub fn load(config: &ProjectConfig) -> Result<Self> {
        let compilers = load_compilers(config)?;
        let default_profile = pick_default_profile(&compilers)?;
        let overrides = load_overrides(config, &compilers)?;
        let mut networks = load_networks(config)?;
        apply_named_accounts(config, &mut networks)?;

        if let Some(network_id) = &config.default_network {
            if !networks.contains_key(network_id) {
                return Err(ConfigError::UnknownNetwork {
                    context: "default_network".to_string(),
                    network_id: network_id.clone(),
                });
            }
        }

        let deployments = load_deployments(config, &networks)?;

        let mut source_roots = vec![config.sources.clone()];
        source_roots.extend(config.dependency_sources.iter().cloned());

        let registry = Self {
            compilers,
            default_profile,
            overrides,
            networks,
            deployments,
            default_network: config.default_network.clone(),
            source_roots,
            settings: config.settings.clone(),
        };

        info!(
            "Loaded {} compiler profiles (default {}), {} overrides, {} networks",
            registry.compilers.len(),
            registry.resolve_default_profile().id,
            registry.overrides.len(),
            registry.networks.len()
        );
        Ok(registry)
    }

    /// The profile flagged `default: true`, otherwise the one with the highest
    /// semantic version. Equal versions resolve to the first declared.
    pub fn resolve_default_profile(&self) -> &CompilerProfile {
        &self.compilers[self.default_profile]
    }

    pub fn compiler_profiles(&self) -> &[CompilerProfile] {
        &self.compilers
    }

    pub fn compiler_profile(&self, id: &str) -> Option<&CompilerProfile> {
        self.compilers.iter().find(|profile| profile.id == id)
    }

    /// Declaration index, used to order batches.
    pub fn profile_position(&self, id: &str) -> Option<usize> {
        self.compilers.iter().position(|profile| profile.id == id)
    }

    pub fn override_rules(&self) -> &[OverrideRule] {
        &self.overrides
    }

    pub fn network(&self, id: &str) -> Option<&NetworkProfile> {
        self.networks.get(id)
    }

    pub fn networks(&self) -> impl Iterator<Item = &NetworkProfile> {
        self.networks.values()
    }

    pub fn default_network(&self) -> Option<&str> {
        self.default_network.as_deref()
    }

    pub fn deployments(&self) -> &[ScheduledDeployment] {
        &self.deployments
    }

    pub fn deployments_for(&self, network_id: &str) -> Vec<&ScheduledDeployment> {
        self.deployments
            .iter()
            .filter(|deployment| deployment.targets(network_id))
            .collect()
    }

    pub fn source_roots(&self) -> &[PathBuf] {
        &self.source_roots
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }
}

fn load_compilers(config: &ProjectConfig) -> Result<Vec<CompilerProfile>> {
    if config.compilers.is_empty() {
        return Err(ConfigError::NoProfiles);
    }

    let mut seen = HashSet::new();
    let mut compilers = Vec::with_capacity(config.compilers.len());

    for compiler in &config.compilers {
        let id = compiler
            .id
            .clone()
            .unwrap_or_else(|| compiler.version.clone());

        if !seen.insert(id.clone()) {
            return Err(ConfigError::DuplicateProfile { id });
        }

        let version =
            Version::parse(compiler.version.trim()).map_err(|e| ConfigError::InvalidVersion {
                profile_id: id.clone(),
                version: compiler.version.clone(),
                reason: e.to_string(),
            })?;

        compilers.push(CompilerProfile {
            id,
            version,
            optimizer: (&compiler.optimizer).into(),
            default: compiler.default,
            compiler_path: compiler.compiler_path.clone(),
        });
    }

    Ok(compilers)
}

fn pick_default_profile(compilers: &[CompilerProfile]) -> Result<usize> {
    let flagged: Vec<usize> = compilers
        .iter()
        .enumerate()
        .filter(|(_, profile)| profile.default)
        .map(|(index, _)| index)
        .collect();

    match flagged.as_slice() {
        [index] => Ok(*index),
        [] => {
            let mut best = 0;
            for (index, profile) in compilers.iter().enumerate().skip(1) {
                // Strictly greater keeps the earlier declaration on ties
                if profile.version > compilers[best].version {
                    best = index;
                }
            }
            debug!(
                "No default compiler flagged, using highest version {}",
                compilers[best].version
            );
            Ok(best)
        }
        _ => Err(ConfigError::MultipleDefaults {
            ids: flagged.iter().map(|&i| compilers[i].id.clone()).collect(),
        }),
    }
}

fn load_overrides(
    config: &ProjectConfig,
    compilers: &[CompilerProfile],
) -> Result<Vec<OverrideRule>> {
    config
        .overrides
        .iter()
        .map(|rule| {
            let pattern =
                PathPattern::new(&rule.pattern).map_err(|e| ConfigError::InvalidPattern {
                    pattern: e.pattern,
                    reason: e.reason,
                })?;

            if !compilers.iter().any(|profile| profile.id == rule.profile) {
                return Err(ConfigError::UnknownProfile {
                    pattern: rule.pattern.clone(),
                    profile_id: rule.profile.clone(),
                });
            }

            Ok(OverrideRule {
                pattern,
                profile_id: rule.profile.clone(),
            })
        })
        .collect()
}

fn load_networks(config: &ProjectConfig) -> Result<BTreeMap<String, NetworkProfile>> {
    let fallback_api_key = config
        .etherscan
        .as_ref()
        .and_then(|etherscan| etherscan.api_key.clone());

    let mut networks = BTreeMap::new();
    for network in &config.networks {
        if networks.contains_key(&network.id) {
            return Err(ConfigError::DuplicateNetwork {
                id: network.id.clone(),
            });
        }
        let profile = load_network(network, fallback_api_key.as_ref())?;
        networks.insert(network.id.clone(), profile);
    }
    Ok(networks)
}

fn load_network(
    network: &NetworkConfig,
    fallback_api_key: Option<&crate::config::SecretRef>,
) -> Result<NetworkProfile> {
    let endpoint = match (&network.url, network.live) {
        (Some(url), _) => parse_url(&network.id, "url", url)?,
        (None, false) => parse_url(&network.id, "url", LOCAL_ENDPOINT)?,
        (None, true) => {
            return Err(ConfigError::InvalidUrl {
                network_id: network.id.clone(),
                field: "url",
                reason: "live networks need an explicit url".to_string(),
            })
        }
    };

    let mut accounts = BTreeMap::new();
    for (role, account) in &network.accounts {
        accounts.insert(role.clone(), account_ref(&network.id, role, account)?);
    }

    let verification = match &network.verify {
        None => None,
        Some(verify) => {
            if verify.api_url.trim().is_empty() {
                return Err(ConfigError::EmptyVerificationUrl {
                    network_id: network.id.clone(),
                });
            }
            Some(VerificationConfig {
                api_url: parse_url(&network.id, "verify.api_url", &verify.api_url)?,
                api_key: verify.api_key.clone().or_else(|| fallback_api_key.cloned()),
            })
        }
    };

    let gas = match &network.gas {
        None => GasSetting::Auto,
        Some(GasConfig::Limit(limit)) => GasSetting::Limit(*limit),
        Some(GasConfig::Keyword(keyword)) if keyword.eq_ignore_ascii_case("auto") => {
            GasSetting::Auto
        }
        Some(GasConfig::Keyword(keyword)) => {
            return Err(ConfigError::InvalidGas {
                network_id: network.id.clone(),
                value: keyword.clone(),
            })
        }
    };

    Ok(NetworkProfile {
        id: network.id.clone(),
        endpoint,
        accounts,
        verification,
        live: network.live,
        save_deployments: network.save_deployments,
        gas,
    })
}

fn parse_url(network_id: &str, field: &'static str, value: &str) -> Result<Url> {
    Url::parse(value.trim()).map_err(|e| ConfigError::InvalidUrl {
        network_id: network_id.to_string(),
        field,
        reason: e.to_string(),
    })
}

/// Index and address are mutually exclusive; supplying both is ambiguous.
fn account_ref(network_id: &str, role: &str, account: &AccountConfig) -> Result<AccountRef> {
    match account {
        AccountConfig::Index(index) => Ok(AccountRef::Index(*index)),
        AccountConfig::Address(address) => Ok(AccountRef::Address(address.clone())),
        AccountConfig::Explicit(explicit) => match (explicit.index, &explicit.address) {
            (Some(index), None) => Ok(AccountRef::Index(index)),
            (None, Some(address)) => Ok(AccountRef::Address(address.clone())),
            (Some(_), Some(_)) => Err(ConfigError::AmbiguousAccount {
                network_id: network_id.to_string(),
                role: role.to_string(),
            }),
            (None, None) => Err(ConfigError::EmptyAccount {
                network_id: network_id.to_string(),
                role: role.to_string(),
            }),
        },
    }
}

fn apply_named_accounts(
    config: &ProjectConfig,
    networks: &mut BTreeMap<String, NetworkProfile>,
) -> Result<()> {
    for (role, binding) in &config.named_accounts {
        if let NamedAccountConfig::PerNetwork(per_network) = binding {
            if let Some(unknown) = per_network
                .networks
                .keys()
                .find(|id| !networks.contains_key(*id))
            {
                return Err(ConfigError::UnknownNetwork {
                    context: format!("named account {role}"),
                    network_id: unknown.clone(),
                });
            }
        }

        for (network_id, network) in networks.iter_mut() {
            let account = match binding {
                NamedAccountConfig::Everywhere(account) => Some(account),
                NamedAccountConfig::PerNetwork(per_network) => per_network
                    .networks
                    .get(network_id)
                    .or(per_network.default.as_ref()),
            };

            let Some(account) = account else {
                continue;
            };

            if network.accounts.contains_key(role) {
                return Err(ConfigError::ConflictingNamedAccount {
                    network_id: network_id.clone(),
                    role: role.clone(),
                });
            }
            network
                .accounts
                .insert(role.clone(), account_ref(network_id, role, account)?);
        }
    }
    Ok(())
}

fn load_deployments(
    config: &ProjectConfig,
    networks: &BTreeMap<String, NetworkProfile>,
) -> Result<Vec<ScheduledDeployment>> {
    let mut seen = HashSet::new();
    let mut deployments = Vec::with_capacity(config.deployments.len());

    for deployment in &config.deployments {
        if !seen.insert(deployment.contract.clone()) {
            return Err(ConfigError::DuplicateDeployment {
                contract: deployment.contract.clone(),
            });
        }

        if let Some(targets) = &deployment.networks {
            if let Some(unknown) = targets.iter().find(|id| !networks.contains_key(*id)) {
                return Err(ConfigError::UnknownNetwork {
                    context: format!("deployment of {}", deployment.contract),
                    network_id: unknown.clone(),
                });
            }
        }

        let constructor_args = match &deployment.args {
            None => None,
            Some(args) => {
                let hex = args.trim().trim_start_matches("0x").to_ascii_lowercase();
                if hex.len() % 2 != 0 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(ConfigError::InvalidConstructorArgs {
                        contract: deployment.contract.clone(),
                    });
                }
                Some(hex).filter(|hex| !hex.is_empty())
            }
        };

        deployments.push(ScheduledDeployment {
            contract: deployment.contract.clone(),
            from_role: deployment.from.clone(),
            constructor_args,
            networks: deployment.networks.clone(),
        });
    }

    Ok(deployments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFormat;

    fn load(yaml: &str) -> Result<ProfileRegistry> {
        let config = ProjectConfig::parse(yaml, ConfigFormat::Yaml)?;
        ProfileRegistry::load(&config)
    }

    #[test]
    fn test_default_profile_is_highest_version() {
        let registry = load(
            r#"
compilers:
  - version: 0.6.12
  - version: 0.8.16
  - version: 0.7.6
"#,
        )
        .unwrap();
        assert_eq!(registry.resolve_default_profile().id, "0.8.16");
    }

    #[test]
    fn test_default_profile_tie_goes_to_first_declared() {
        let registry = load(
            r#"
compilers:
  - id: fast
    version: 0.8.9
    optimizer: { enabled: true, runs: 200 }
  - id: small
    version: 0.8.9
    optimizer: { enabled: true, runs: 1 }
"#,
        )
        .unwrap();
        assert_eq!(registry.resolve_default_profile().id, "fast");
    }

    #[test]
    fn test_explicit_default_wins_over_version() {
        let registry = load(
            r#"
compilers:
  - version: 0.8.16
  - version: 0.6.12
    default: true
"#,
        )
        .unwrap();
        assert_eq!(registry.resolve_default_profile().id, "0.6.12");
    }

    #[test]
    fn test_two_explicit_defaults_rejected() {
        let err = load(
            r#"
compilers:
  - version: 0.8.16
    default: true
  - version: 0.6.12
    default: true
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MultipleDefaults { .. }));
    }

    #[test]
    fn test_duplicate_profile_id_rejected() {
        let err = load(
            r#"
compilers:
  - id: v1
    version: 0.8.16
  - id: v1
    version: 0.6.12
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateProfile { id } if id == "v1"));
    }

    #[test]
    fn test_invalid_version_rejected() {
        let err = load("compilers:\n  - id: v1\n    version: \"0.8\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidVersion { .. }));
    }

    #[test]
    fn test_override_to_unknown_profile_rejected() {
        let err = load(
            r#"
compilers:
  - version: 0.8.16
overrides:
  - pattern: contracts/Old.sol
    profile: 0.4.18
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProfile { .. }));
    }

    #[test]
    fn test_account_with_index_and_address_rejected() {
        let err = load(
            r#"
compilers:
  - version: 0.8.16
networks:
  - id: bartio
    url: https://bartio.rpc.berachain.com
    accounts:
      deployer:
        index: 0
        address: "0x00000000000000000000000000000000000000aa"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::AmbiguousAccount { role, .. } if role == "deployer"));
    }

    #[test]
    fn test_named_accounts_merge_per_network() {
        let registry = load(
            r#"
compilers:
  - version: 0.8.16
named_accounts:
  deployer:
    default: 0
    networks:
      bartio: 1
networks:
  - id: hardhat
    live: false
    save_deployments: false
  - id: bartio
    url: https://bartio.rpc.berachain.com
"#,
        )
        .unwrap();
        assert_eq!(
            registry.network("bartio").unwrap().accounts["deployer"],
            AccountRef::Index(1)
        );
        let hardhat = registry.network("hardhat").unwrap();
        assert_eq!(hardhat.accounts["deployer"], AccountRef::Index(0));
        assert_eq!(hardhat.endpoint.as_str(), "http://127.0.0.1:8545/");
    }

    #[test]
    fn test_named_account_conflict_rejected() {
        let err = load(
            r#"
compilers:
  - version: 0.8.16
named_accounts:
  deployer: 0
networks:
  - id: bartio
    url: https://bartio.rpc.berachain.com
    accounts:
      deployer: 1
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::ConflictingNamedAccount { .. }));
    }

    #[test]
    fn test_verification_falls_back_to_global_key() {
        let registry = load(
            r#"
compilers:
  - version: 0.8.16
etherscan:
  api_key: { env: BARTIO_API_KEY }
networks:
  - id: bartio
    url: https://bartio.rpc.berachain.com
    verify:
      api_url: https://api.routescan.io/v2/network/testnet/evm/80084/etherscan
"#,
        )
        .unwrap();
        let verification = registry
            .network("bartio")
            .unwrap()
            .verification
            .clone()
            .unwrap();
        assert_eq!(
            verification.api_key,
            Some(crate::config::SecretRef::Env {
                env: "BARTIO_API_KEY".to_string()
            })
        );
    }

    #[test]
    fn test_empty_verification_url_rejected() {
        let err = load(
            r#"
compilers:
  - version: 0.8.16
networks:
  - id: bartio
    url: https://bartio.rpc.berachain.com
    verify:
      api_key: x
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyVerificationUrl { .. }));
    }

    #[test]
    fn test_deployment_schedule_validation() {
        let err = load(
            r#"
compilers:
  - version: 0.8.16
deployments:
  - contract: Token
    networks: [mainnet]
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownNetwork { .. }));

        let err = load(
            r#"
compilers:
  - version: 0.8.16
deployments:
  - contract: Token
    args: "0xzz"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConstructorArgs { .. }));
    }

    #[test]
    fn test_gas_keyword() {
        let registry = load(
            r#"
compilers:
  - version: 0.8.16
networks:
  - id: bartio
    url: https://bartio.rpc.berachain.com
    gas: auto
  - id: fixed
    url: https://rpc.example.org
    gas: 3000000
"#,
        )
        .unwrap();
        assert_eq!(registry.network("bartio").unwrap().gas, GasSetting::Auto);
        assert_eq!(registry.network("fixed").unwrap().gas.limit(), Some(3_000_000));
    }
}
