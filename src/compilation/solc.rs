use super::{CompilationError, CompilerToolchain, ToolchainError, ToolchainOutput};
use crate::planner::CompilationBatch;
use crate::types::{CompiledArtifact, CompilerProfile, SourceArtifact};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

static VERSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Version:\s*(\d+\.\d+\.\d+)(\+commit\.[0-9a-f]+)?").expect("version pattern is valid")
});

/// Runs `solc --standard-json` for each batch.
///
/// The binary for a profile is, in order: the profile's `compiler_path`,
/// `solc-<version>` on `PATH`, or a plain `solc` whose `--version` matches.
#[derive(Debug, Clone)]
pub struct SolcToolchain {
    project_root: PathBuf,
}

#[derive(Debug, Clone)]
struct LocatedCompiler {
    binary: PathBuf,
    long_version: String,
}

impl SolcToolchain {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
        }
    }

    async fn locate(&self, profile: &CompilerProfile) -> Result<LocatedCompiler, ToolchainError> {
        let expected = profile.version.to_string();

        if let Some(path) = &profile.compiler_path {
            let binary = if path.is_absolute() {
                path.clone()
            } else {
                self.project_root.join(path)
            };
            if !binary.exists() {
                return Err(ToolchainError::NotFound { version: expected });
            }
            let long_version = self.query_version(&binary, &expected).await?;
            return Ok(LocatedCompiler {
                binary,
                long_version,
            });
        }

        if let Ok(binary) = which::which(format!("solc-{expected}")) {
            let long_version = self.query_version(&binary, &expected).await?;
            return Ok(LocatedCompiler {
                binary,
                long_version,
            });
        }

        if let Ok(binary) = which::which("solc") {
            match self.query_version(&binary, &expected).await {
                Ok(long_version) => {
                    return Ok(LocatedCompiler {
                        binary,
                        long_version,
                    })
                }
                Err(e) => warn!("Ignoring {}: {}", binary.display(), e),
            }
        }

        Err(ToolchainError::NotFound { version: expected })
    }

    async fn query_version(&self, binary: &Path, expected: &str) -> Result<String, ToolchainError> {
        let output = tokio::process::Command::new(binary)
            .arg("--version")
            .output()
            .await
            .map_err(|source| ToolchainError::Spawn {
                binary: binary.display().to_string(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let (version, long_version) =
            parse_version(&stdout).ok_or_else(|| ToolchainError::MalformedOutput {
                reason: format!("{} --version printed no version", binary.display()),
            })?;

        if version != expected {
            return Err(ToolchainError::VersionMismatch {
                binary: binary.display().to_string(),
                expected: expected.to_string(),
                found: version,
            });
        }
        Ok(long_version)
    }

    async fn run(&self, binary: &Path, input: &Value) -> Result<Value, ToolchainError> {
        let binary_name = binary.display().to_string();
        let payload = serde_json::to_vec(input).map_err(|e| ToolchainError::MalformedOutput {
            reason: e.to_string(),
        })?;

        let mut child = tokio::process::Command::new(binary)
            .arg("--standard-json")
            .arg("--allow-paths")
            .arg(&self.project_root)
            .current_dir(&self.project_root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ToolchainError::Spawn {
                binary: binary_name.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&payload)
                .await
                .map_err(|source| ToolchainError::Spawn {
                    binary: binary_name.clone(),
                    source,
                })?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|source| ToolchainError::Spawn {
                binary: binary_name.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ToolchainError::ExitStatus {
                binary: binary_name,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        serde_json::from_slice(&output.stdout).map_err(|e| ToolchainError::MalformedOutput {
            reason: format!("stdout is not JSON: {e}"),
        })
    }
}

#[async_trait]
impl CompilerToolchain for SolcToolchain {
    async fn compile(
        &self,
        profile: &CompilerProfile,
        batch: &CompilationBatch,
    ) -> Result<ToolchainOutput, ToolchainError> {
        let compiler = self.locate(profile).await?;
        info!(
            "Compiling {} artifacts ({} dependencies) with {} ({})",
            batch.artifacts.len(),
            batch.dependencies.len(),
            compiler.binary.display(),
            compiler.long_version
        );

        let input = Arc::new(standard_input(profile, &batch.artifacts, &batch.dependencies));
        let output = self.run(&compiler.binary, &input).await?;
        parse_output(profile, &compiler.long_version, input, &output)
    }

    fn name(&self) -> &'static str {
        "solc"
    }
}

/// Returns `(version, long_version)`, e.g. `("0.8.16", "v0.8.16+commit.07a7930e")`.
pub fn parse_version(stdout: &str) -> Option<(String, String)> {
    let captures = VERSION_RE.captures(stdout)?;
    let version = captures[1].to_string();
    let commit = captures.get(2).map(|m| m.as_str()).unwrap_or("");
    Some((version.clone(), format!("v{version}{commit}")))
}

/// Standard-JSON input for one batch. `dependencies` are included as sources
/// so the input is self-contained, but output is selected only for
/// `artifacts`. Non-relative imports that name a different project path are
/// mapped with `remappings`.
pub fn standard_input(
    profile: &CompilerProfile,
    artifacts: &[SourceArtifact],
    dependencies: &[SourceArtifact],
) -> Value {
    let mut sources = Map::new();
    let mut selection = Map::new();
    let mut remappings: BTreeMap<&str, &str> = BTreeMap::new();
    for artifact in artifacts.iter().chain(dependencies) {
        sources.insert(
            artifact.path.clone(),
            json!({ "content": &*artifact.content }),
        );
        for (literal, path) in &artifact.import_aliases {
            remappings.entry(literal.as_str()).or_insert(path.as_str());
        }
    }
    for artifact in artifacts {
        selection.insert(
            artifact.path.clone(),
            json!({ "*": ["abi", "evm.bytecode.object", "evm.deployedBytecode.object"] }),
        );
    }

    let mut settings = json!({
        "optimizer": {
            "enabled": profile.optimizer.enabled,
            "runs": profile.optimizer.runs,
        },
        "outputSelection": selection,
    });
    if !remappings.is_empty() {
        settings["remappings"] = remappings
            .into_iter()
            .map(|(literal, path)| Value::String(format!("{literal}={path}")))
            .collect();
    }

    json!({
        "language": "Solidity",
        "sources": sources,
        "settings": settings,
    })
}

pub fn parse_output(
    profile: &CompilerProfile,
    long_version: &str,
    input: Arc<Value>,
    output: &Value,
) -> Result<ToolchainOutput, ToolchainError> {
    let mut result = ToolchainOutput::default();

    for error in output["errors"].as_array().into_iter().flatten() {
        let message = error["formattedMessage"]
            .as_str()
            .or_else(|| error["message"].as_str())
            .unwrap_or("unknown compiler error")
            .trim()
            .to_string();
        let file = error["sourceLocation"]["file"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| format!("<{}>", profile.id));

        if error["severity"].as_str() == Some("error") {
            result.diagnostics.push(CompilationError {
                artifact_path: file,
                diagnostic: message,
            });
        } else {
            debug!("{}: {}", file, message);
        }
    }

    if !result.succeeded() {
        return Ok(result);
    }

    let contracts = match output.get("contracts") {
        Some(Value::Object(contracts)) => contracts,
        Some(_) => {
            return Err(ToolchainError::MalformedOutput {
                reason: "'contracts' is not an object".to_string(),
            })
        }
        None => return Ok(result),
    };

    for (source_path, by_name) in contracts {
        let Some(by_name) = by_name.as_object() else {
            continue;
        };
        for (contract_name, contract) in by_name {
            let bytecode = strip_hex(contract["evm"]["bytecode"]["object"].as_str().unwrap_or(""));
            let deployed = strip_hex(
                contract["evm"]["deployedBytecode"]["object"]
                    .as_str()
                    .unwrap_or(""),
            );
            let abi = contract.get("abi").cloned().unwrap_or(Value::Array(Vec::new()));

            result.contracts.push(CompiledArtifact {
                artifact_path: source_path.clone(),
                profile_id: profile.id.clone(),
                contract_name: contract_name.clone(),
                compiler_version: long_version.to_string(),
                optimizer: profile.optimizer,
                bytecode_hash: sha256_hex(bytecode.as_bytes()),
                deployed_size: deployed.len() / 2,
                abi_digest: sha256_hex(abi.to_string().as_bytes()),
                bytecode: bytecode.to_string(),
                abi,
                standard_input: input.clone(),
            });
        }
    }

    Ok(result)
}

fn strip_hex(value: &str) -> &str {
    value.strip_prefix("0x").unwrap_or(value)
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
