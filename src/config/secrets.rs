use super::{ConfigError, Result};
use serde::{Deserialize, Serialize};

/// Where a credential comes from. Config files hold references, never resolved values.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SecretRef {
    Env { env: String },
    Literal(String),
}

impl std::fmt::Debug for SecretRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretRef::Env { env } => write!(f, "SecretRef::Env({env})"),
            SecretRef::Literal(_) => write!(f, "SecretRef::Literal([redacted])"),
        }
    }
}

/// A resolved credential. Renders as `[redacted]` everywhere except [`Secret::expose`].
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret([redacted])")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[redacted]")
    }
}

pub trait SecretSource: Send + Sync {
    fn resolve(&self, reference: &SecretRef) -> Result<Secret>;
}

/// Resolves `{env: NAME}` references from the process environment.
#[derive(Debug, Default, Clone)]
pub struct EnvSecretSource;

impl SecretSource for EnvSecretSource {
    fn resolve(&self, reference: &SecretRef) -> Result<Secret> {
        match reference {
            SecretRef::Literal(value) => Ok(Secret::new(value.clone())),
            SecretRef::Env { env } => std::env::var(env)
                .ok()
                .filter(|value| !value.is_empty())
                .map(Secret::new)
                .ok_or_else(|| ConfigError::MissingSecret { name: env.clone() }),
        }
    }
}
