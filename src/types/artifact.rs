use super::profile::OptimizerSettings;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A source file as read by the scanner. Immutable for the duration of a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceArtifact {
    /// Project-relative path with forward slashes, e.g. `contracts/Token.sol`.
    pub path: String,
    pub content_hash: String,
    #[serde(skip)]
    pub content: Arc<str>,
    /// Project-relative paths of the artifacts this one imports.
    #[serde(default)]
    pub imports: Vec<String>,
    /// Non-relative import strings that name a different project path, e.g.
    /// `@openzeppelin/...` found under a dependency root. Keyed by the string
    /// as written.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub import_aliases: BTreeMap<String, String>,
}

impl SourceArtifact {
    pub fn new(path: impl Into<String>, content: impl Into<Arc<str>>) -> Self {
        let content = content.into();
        let content_hash = format!("{:x}", Sha256::digest(content.as_bytes()));
        Self {
            path: path.into(),
            content_hash,
            content,
            imports: Vec::new(),
            import_aliases: BTreeMap::new(),
        }
    }

    pub fn with_imports(mut self, imports: Vec<String>) -> Self {
        self.imports = imports;
        self
    }

    pub fn with_import_aliases(mut self, aliases: BTreeMap<String, String>) -> Self {
        self.import_aliases = aliases;
        self
    }

    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    pub fn file_stem(&self) -> &str {
        let name = self.file_name();
        name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(name)
    }
}

/// The profile chosen for one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    pub artifact: SourceArtifact,
    pub profile_id: String,
}

/// One contract produced by compiling a source artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledArtifact {
    pub artifact_path: String,
    pub profile_id: String,
    pub contract_name: String,
    pub compiler_version: String,
    pub optimizer: OptimizerSettings,
    /// Creation bytecode as hex, no `0x` prefix.
    pub bytecode: String,
    pub bytecode_hash: String,
    pub deployed_size: usize,
    pub abi: serde_json::Value,
    pub abi_digest: String,
    /// The standard-JSON input the batch was compiled from, shared by every
    /// contract of that batch. Needed for source verification.
    #[serde(skip)]
    pub standard_input: Arc<serde_json::Value>,
}

impl CompiledArtifact {
    pub fn fully_qualified_name(&self) -> String {
        format!("{}:{}", self.artifact_path, self.contract_name)
    }

    /// Interfaces and abstract contracts compile to empty bytecode.
    pub fn is_deployable(&self) -> bool {
        !self.bytecode.is_empty()
    }

    /// Identity used for deployment idempotence: the bytecode hash, folded
    /// together with constructor arguments when any are supplied.
    pub fn deployment_hash(&self, constructor_args: Option<&str>) -> String {
        match constructor_args {
            None | Some("") => self.bytecode_hash.clone(),
            Some(args) => {
                let mut hasher = Sha256::new();
                hasher.update(self.bytecode_hash.as_bytes());
                hasher.update(b":");
                hasher.update(args.as_bytes());
                format!("{:x}", hasher.finalize())
            }
        }
    }
}
