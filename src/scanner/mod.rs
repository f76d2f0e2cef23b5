//! Source tree scanning.
//!
//! The pipeline treats the scanner as a pure producer called once per run.
//! [`FsSourceScanner`] is the default: it walks the configured source roots,
//! hashes every `.sol` file and records its project-local imports.

use crate::types::SourceArtifact;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

static IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^\s*import\s+(?:[^'";]*?\s+from\s+)?["']([^"']+)["']"#)
        .expect("import pattern is valid")
});

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Source root not found: {path}")]
    MissingRoot { path: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Scanner task failed: {0}")]
    Join(String),
}

#[async_trait]
pub trait SourceScanner: Send + Sync {
    async fn scan(&self) -> Result<Vec<SourceArtifact>, ScanError>;
}

#[derive(Debug, Clone)]
pub struct FsSourceScanner {
    project_root: PathBuf,
    source_roots: Vec<PathBuf>,
    extension: String,
}

impl FsSourceScanner {
    /// `source_roots` are relative to `project_root`. The first root must
    /// exist; the rest are dependency roots and are skipped when absent.
    pub fn new(project_root: impl Into<PathBuf>, source_roots: Vec<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            source_roots,
            extension: "sol".to_string(),
        }
    }

    fn scan_blocking(&self) -> Result<Vec<SourceArtifact>, ScanError> {
        let mut files: BTreeMap<String, String> = BTreeMap::new();

        for (index, root) in self.source_roots.iter().enumerate() {
            let absolute = self.project_root.join(root);
            if !absolute.is_dir() {
                if index == 0 {
                    return Err(ScanError::MissingRoot {
                        path: absolute.display().to_string(),
                    });
                }
                warn!("Dependency source root {} not found, skipping", absolute.display());
                continue;
            }

            for entry in WalkDir::new(&absolute).sort_by_file_name() {
                let entry = entry.map_err(|e| ScanError::Io {
                    path: absolute.display().to_string(),
                    source: e.into(),
                })?;
                let path = entry.path();
                if !entry.file_type().is_file()
                    || path.extension().and_then(|ext| ext.to_str()) != Some(&self.extension)
                {
                    continue;
                }

                let content = std::fs::read_to_string(path).map_err(|source| ScanError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                files.insert(self.relative_path(path), content);
            }
        }

        let known: BTreeSet<String> = files.keys().cloned().collect();
        let artifacts: Vec<SourceArtifact> = files
            .into_iter()
            .map(|(path, content)| {
                let resolved = resolve_imports(&path, &content, &known, &self.source_roots);
                let imports: BTreeSet<String> = resolved.iter().map(|i| i.path.clone()).collect();
                let aliases: BTreeMap<String, String> = resolved
                    .into_iter()
                    .filter(|i| !i.is_relative() && i.literal != i.path)
                    .map(|i| (i.literal, i.path))
                    .collect();
                SourceArtifact::new(path, content)
                    .with_imports(imports.into_iter().collect())
                    .with_import_aliases(aliases)
            })
            .collect();

        info!(
            "Scanned {} source artifacts under {}",
            artifacts.len(),
            self.project_root.display()
        );
        Ok(artifacts)
    }

    fn relative_path(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.project_root).unwrap_or(path);
        relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

#[async_trait]
impl SourceScanner for FsSourceScanner {
    async fn scan(&self) -> Result<Vec<SourceArtifact>, ScanError> {
        let scanner = self.clone();
        tokio::task::spawn_blocking(move || scanner.scan_blocking())
            .await
            .map_err(|e| ScanError::Join(e.to_string()))?
    }
}

/// An import statement that resolved to a scanned artifact.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ResolvedImport {
    /// The import string as written in the source.
    pub literal: String,
    /// Project-relative path of the imported artifact.
    pub path: String,
}

impl ResolvedImport {
    pub fn is_relative(&self) -> bool {
        self.literal.starts_with("./") || self.literal.starts_with("../")
    }
}

/// Imports that resolve to a scanned artifact, sorted and deduplicated.
/// Package imports (`@openzeppelin/...`) found under no source root are
/// dropped.
pub fn resolve_imports(
    importer: &str,
    content: &str,
    known: &BTreeSet<String>,
    source_roots: &[PathBuf],
) -> Vec<ResolvedImport> {
    let importer_dir = importer.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
    let mut imports = BTreeSet::new();

    for capture in IMPORT_RE.captures_iter(content) {
        let target = &capture[1];
        let candidates: Vec<String> = if target.starts_with("./") || target.starts_with("../") {
            vec![normalize(&format!("{importer_dir}/{target}"))]
        } else {
            let mut candidates = vec![normalize(target)];
            for root in source_roots {
                let root = root.to_string_lossy().replace('\\', "/");
                candidates.push(normalize(&format!("{root}/{target}")));
            }
            candidates
        };

        match candidates.into_iter().find(|candidate| known.contains(candidate)) {
            Some(resolved) if resolved != importer => {
                imports.insert(ResolvedImport {
                    literal: target.to_string(),
                    path: resolved,
                });
            }
            Some(_) => {}
            None => debug!("{importer}: import '{target}' is outside the project"),
        }
    }

    imports.into_iter().collect()
}

/// Paths of [`resolve_imports`], deduplicated.
pub fn extract_imports(
    importer: &str,
    content: &str,
    known: &BTreeSet<String>,
    source_roots: &[PathBuf],
) -> Vec<String> {
    resolve_imports(importer, content, known, source_roots)
        .into_iter()
        .map(|import| import.path)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn normalize(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }
    segments.join("/")
}
