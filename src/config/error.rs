use thiserror::Error;

/// Load-time configuration failures. Any of these aborts the run before work starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML config: {reason}")]
    InvalidYaml { reason: String },

    #[error("Invalid JSON config: {reason}")]
    InvalidJson { reason: String },

    #[error("No compiler profiles declared")]
    NoProfiles,

    #[error("Duplicate compiler profile id: {id}")]
    DuplicateProfile { id: String },

    #[error("Compiler profile {profile_id} has invalid version '{version}': {reason}")]
    InvalidVersion {
        profile_id: String,
        version: String,
        reason: String,
    },

    #[error("More than one compiler profile is flagged default: {ids:?}")]
    MultipleDefaults { ids: Vec<String> },

    #[error("Override '{pattern}' references unknown compiler profile {profile_id}")]
    UnknownProfile { pattern: String, profile_id: String },

    #[error("Invalid override pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Duplicate network id: {id}")]
    DuplicateNetwork { id: String },

    #[error("Network {network_id} has invalid {field}: {reason}")]
    InvalidUrl {
        network_id: String,
        field: &'static str,
        reason: String,
    },

    #[error("Network {network_id} declares verification without an api_url")]
    EmptyVerificationUrl { network_id: String },

    #[error("Account role {role} on network {network_id} sets both index and address")]
    AmbiguousAccount { network_id: String, role: String },

    #[error("Account role {role} on network {network_id} sets neither index nor address")]
    EmptyAccount { network_id: String, role: String },

    #[error("Account role {role} is bound both in named_accounts and on network {network_id}")]
    ConflictingNamedAccount { network_id: String, role: String },

    #[error("Network {network_id} has invalid gas setting '{value}'")]
    InvalidGas { network_id: String, value: String },

    #[error("{context} references unknown network {network_id}")]
    UnknownNetwork { context: String, network_id: String },

    #[error("Contract {contract} is scheduled more than once")]
    DuplicateDeployment { contract: String },

    #[error("Constructor arguments for {contract} are not valid hex")]
    InvalidConstructorArgs { contract: String },

    #[error("Secret {name} is not set")]
    MissingSecret { name: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
