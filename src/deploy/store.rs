use super::{DeployError, Result};
use crate::types::{DeploymentRecord, NetworkProfile};
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

type NetworkRecords = BTreeMap<String, DeploymentRecord>;

/// Deployment records, one JSON file per network at
/// `<state_dir>/<network>.json`.
///
/// Each file is a map keyed by contract name. Writes replace the file through
/// a temp file and rename. A per-network lock serializes read-modify-write on
/// one file; different networks never contend. Networks with
/// `save_deployments: false` are kept in memory only.
#[derive(Clone)]
pub struct DeploymentStore {
    state_dir: PathBuf,
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
    memory: Arc<RwLock<HashMap<String, NetworkRecords>>>,
}

impl DeploymentStore {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            locks: Arc::new(Mutex::new(HashMap::new())),
            memory: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn path_for(&self, network_id: &str) -> PathBuf {
        self.state_dir.join(format!("{network_id}.json"))
    }

    pub async fn records(&self, network: &NetworkProfile) -> Result<NetworkRecords> {
        if !network.save_deployments {
            let memory = self.memory.read().await;
            return Ok(memory.get(&network.id).cloned().unwrap_or_default());
        }

        let lock = self.lock_for(&network.id).await;
        let _guard = lock.lock().await;
        self.read_file(&network.id).await
    }

    pub async fn get(
        &self,
        network: &NetworkProfile,
        contract_name: &str,
    ) -> Result<Option<DeploymentRecord>> {
        Ok(self.records(network).await?.remove(contract_name))
    }

    /// Inserts or replaces the record for `(record.network_id, record.contract_name)`.
    pub async fn put(&self, network: &NetworkProfile, record: DeploymentRecord) -> Result<()> {
        if !network.save_deployments {
            let mut memory = self.memory.write().await;
            memory
                .entry(network.id.clone())
                .or_default()
                .insert(record.contract_name.clone(), record);
            return Ok(());
        }

        let lock = self.lock_for(&network.id).await;
        let _guard = lock.lock().await;

        let mut records = self.read_file(&network.id).await?;
        debug!(
            "Recording {} at {} on {}",
            record.contract_name, record.address, network.id
        );
        records.insert(record.contract_name.clone(), record);
        self.write_file(&network.id, &records).await
    }

    async fn lock_for(&self, network_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(network_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn read_file(&self, network_id: &str) -> Result<NetworkRecords> {
        let path = self.path_for(network_id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(NetworkRecords::new()),
            Err(source) => {
                return Err(DeployError::Store {
                    path: path.display().to_string(),
                    source,
                })
            }
        };

        serde_json::from_str(&content).map_err(|e| DeployError::StoreFormat {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    async fn write_file(&self, network_id: &str, records: &NetworkRecords) -> Result<()> {
        let path = self.path_for(network_id);
        let json = serde_json::to_vec_pretty(records).map_err(|e| DeployError::StoreFormat {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let dir = self.state_dir.clone();
        let target = path.clone();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            std::fs::create_dir_all(&dir)?;
            let mut temp = tempfile::NamedTempFile::new_in(&dir)?;
            temp.write_all(&json)?;
            temp.write_all(b"\n")?;
            temp.as_file().sync_all()?;
            temp.persist(&target).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| DeployError::Store {
            path: path.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::Other, e),
        })?
        .map_err(|source| DeployError::Store {
            path: path.display().to_string(),
            source,
        })?;

        info!("Saved {} deployment records to {}", records.len(), path.display());
        Ok(())
    }
}
