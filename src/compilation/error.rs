use serde::Serialize;
use thiserror::Error;

/// A diagnostic the compiler reported against one source artifact. Never
/// retried; fails only the batch that produced it.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[error("{artifact_path}: {diagnostic}")]
pub struct CompilationError {
    pub artifact_path: String,
    pub diagnostic: String,
}

/// Infrastructure failure around the compiler. Fatal to the run.
#[derive(Debug, Error)]
pub enum ToolchainError {
    #[error("No solc binary found for version {version}")]
    NotFound { version: String },

    #[error("Compiler binary {binary} reports version {found}, expected {expected}")]
    VersionMismatch {
        binary: String,
        expected: String,
        found: String,
    },

    #[error("Failed to run {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{binary} exited with status {status}: {stderr}")]
    ExitStatus {
        binary: String,
        status: String,
        stderr: String,
    },

    #[error("Malformed compiler output: {reason}")]
    MalformedOutput { reason: String },

    #[error("Failed to write artifact {path}: {source}")]
    ArtifactWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
