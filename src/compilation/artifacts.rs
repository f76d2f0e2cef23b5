use super::ToolchainError;
use crate::types::CompiledArtifact;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Writes compiled contracts as pretty JSON to
/// `<root>/<profile>/<source path>/<Contract>.json`.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    root: PathBuf,
}

impl ArtifactWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, artifact: &CompiledArtifact) -> PathBuf {
        let mut path = self.root.join(&artifact.profile_id);
        for segment in artifact.artifact_path.split('/').filter(|s| !s.is_empty() && *s != "..") {
            path.push(segment);
        }
        path.join(format!("{}.json", artifact.contract_name))
    }

    pub async fn write_all(&self, artifacts: &[CompiledArtifact]) -> Result<Vec<PathBuf>, ToolchainError> {
        let mut written = Vec::with_capacity(artifacts.len());
        for artifact in artifacts {
            written.push(self.write(artifact).await?);
        }
        debug!("Wrote {} artifacts under {}", written.len(), self.root.display());
        Ok(written)
    }

    pub async fn write(&self, artifact: &CompiledArtifact) -> Result<PathBuf, ToolchainError> {
        let path = self.path_for(artifact);
        let write_error = |source| ToolchainError::ArtifactWrite {
            path: path.display().to_string(),
            source,
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(write_error)?;
        }
        let json = serde_json::to_vec_pretty(artifact)
            .map_err(|e| write_error(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        tokio::fs::write(&path, json).await.map_err(write_error)?;
        Ok(path)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
