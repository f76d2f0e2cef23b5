#![allow(dead_code)]

use async_trait::async_trait;
use contract_deploy::compilation::solc::standard_input;
use contract_deploy::compilation::{
    CompilationError, CompilerToolchain, ToolchainError, ToolchainOutput,
};
use contract_deploy::config::{ConfigFormat, ProjectConfig, SecretSource};
use contract_deploy::deploy::{
    DeployTransaction, NetworkClient, NetworkConnector, NetworkError, TransactionReceipt,
};
use contract_deploy::pipeline::{CancellationSignal, Pipeline};
use contract_deploy::planner::CompilationBatch;
use contract_deploy::registry::ProfileRegistry;
use contract_deploy::scanner::{ScanError, SourceScanner};
use contract_deploy::types::{CompiledArtifact, CompilerProfile, NetworkProfile, SourceArtifact};
use contract_deploy::verify::{
    BackendError, BackendFactory, StatusOutcome, SubmitOutcome, VerificationBackend,
    VerificationError, VerificationRequest,
};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const DEPLOYER: &str = "0x1111111111111111111111111111111111111111";
pub const OPERATOR: &str = "0x2222222222222222222222222222222222222222";

pub fn registry(yaml: &str) -> ProfileRegistry {
    let config = ProjectConfig::parse(yaml, ConfigFormat::Yaml).expect("config parses");
    ProfileRegistry::load(&config).expect("config is valid")
}

pub fn source(path: &str, content: &str) -> SourceArtifact {
    SourceArtifact::new(path, content.to_string())
}

/// A pipeline over in-memory sources and mock collaborators, writing state
/// under `state_dir` and no artifact files.
pub fn pipeline<'a>(
    registry: &'a ProfileRegistry,
    sources: Vec<SourceArtifact>,
    toolchain: Arc<MockToolchain>,
    connector: Arc<MockConnector>,
    state_dir: &Path,
) -> Pipeline<'a> {
    Pipeline::new(registry, state_dir)
        .with_scanner(Arc::new(MockScanner { sources }))
        .with_toolchain(toolchain)
        .with_connector(connector)
        .with_state_dir(state_dir)
        .with_artifacts_dir(None)
        .with_workers(4)
}

pub struct MockScanner {
    pub sources: Vec<SourceArtifact>,
}

#[async_trait]
impl SourceScanner for MockScanner {
    async fn scan(&self) -> Result<Vec<SourceArtifact>, ScanError> {
        Ok(self.sources.clone())
    }
}

/// Compiles every source to one contract named after its file stem. The
/// bytecode is derived from the source content, so editing a source changes
/// its deployment hash. The standard input is the one `solc` would receive.
#[derive(Default)]
pub struct MockToolchain {
    /// Sources that produce an error diagnostic.
    pub broken: HashSet<String>,
    /// Profiles whose compiler cannot be run.
    pub missing_profiles: HashSet<String>,
    pub delay: Duration,
    /// Cancelled as soon as the first batch starts compiling.
    pub cancel_on_compile: Option<CancellationSignal>,
    pub calls: Mutex<Vec<String>>,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl MockToolchain {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompilerToolchain for MockToolchain {
    async fn compile(
        &self,
        profile: &CompilerProfile,
        batch: &CompilationBatch,
    ) -> Result<ToolchainOutput, ToolchainError> {
        self.calls.lock().unwrap().push(profile.id.clone());
        if let Some(cancel) = &self.cancel_on_compile {
            cancel.cancel();
        }

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.missing_profiles.contains(&profile.id) {
            return Err(ToolchainError::NotFound {
                version: profile.version.to_string(),
            });
        }

        let input = Arc::new(standard_input(profile, &batch.artifacts, &batch.dependencies));
        let mut output = ToolchainOutput::default();
        for artifact in &batch.artifacts {
            if self.broken.contains(&artifact.path) {
                output.diagnostics.push(CompilationError {
                    artifact_path: artifact.path.clone(),
                    diagnostic: "ParserError: Expected ';' but got '}'".to_string(),
                });
                continue;
            }

            let bytecode = format!("{:x}", Sha256::digest(artifact.content.as_bytes()));
            output.contracts.push(CompiledArtifact {
                artifact_path: artifact.path.clone(),
                profile_id: profile.id.clone(),
                contract_name: artifact.file_stem().to_string(),
                compiler_version: format!("v{}+commit.00000000", profile.version),
                optimizer: profile.optimizer,
                bytecode_hash: format!("{:x}", Sha256::digest(bytecode.as_bytes())),
                deployed_size: bytecode.len() / 2,
                bytecode,
                abi: serde_json::json!([]),
                abi_digest: String::new(),
                standard_input: input.clone(),
            });
        }
        Ok(output)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptMode {
    Confirm,
    NeverConfirm,
    Revert,
}

pub struct MockNetwork {
    pub key_set: Vec<String>,
    pub mode: Mutex<ReceiptMode>,
    pub sent: Mutex<Vec<DeployTransaction>>,
    pub receipt_queries: AtomicUsize,
    /// Cancelled right after the first transaction is sent.
    pub cancel_after_send: Option<CancellationSignal>,
}

impl MockNetwork {
    pub fn new(mode: ReceiptMode) -> Self {
        Self {
            key_set: vec![DEPLOYER.to_string(), OPERATOR.to_string()],
            mode: Mutex::new(mode),
            sent: Mutex::new(Vec::new()),
            receipt_queries: AtomicUsize::new(0),
            cancel_after_send: None,
        }
    }

    pub fn sent(&self) -> Vec<DeployTransaction> {
        self.sent.lock().unwrap().clone()
    }

    pub fn set_mode(&self, mode: ReceiptMode) {
        *self.mode.lock().unwrap() = mode;
    }
}

#[async_trait]
impl NetworkClient for MockNetwork {
    async fn accounts(&self) -> Result<Vec<String>, NetworkError> {
        Ok(self.key_set.clone())
    }

    async fn send_deployment(&self, tx: &DeployTransaction) -> Result<String, NetworkError> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(tx.clone());
        if let Some(cancel) = &self.cancel_after_send {
            cancel.cancel();
        }
        Ok(format!("0x{:064x}", sent.len()))
    }

    async fn transaction_receipt(
        &self,
        tx_hash: &str,
    ) -> Result<Option<TransactionReceipt>, NetworkError> {
        self.receipt_queries.fetch_add(1, Ordering::SeqCst);
        let nonce = u64::from_str_radix(tx_hash.trim_start_matches("0x"), 16)
            .map_err(|e| NetworkError::InvalidResponse(e.to_string()))?;

        Ok(match *self.mode.lock().unwrap() {
            ReceiptMode::Confirm => Some(TransactionReceipt {
                success: true,
                contract_address: Some(format!("0x{:040x}", 0xc0de_0000 + nonce)),
                block_number: 100 + nonce,
            }),
            ReceiptMode::NeverConfirm => None,
            ReceiptMode::Revert => Some(TransactionReceipt {
                success: false,
                contract_address: None,
                block_number: 100 + nonce,
            }),
        })
    }
}

#[derive(Default)]
pub struct MockConnector {
    pub networks: HashMap<String, Arc<MockNetwork>>,
}

impl MockConnector {
    pub fn with(mut self, network_id: &str, network: Arc<MockNetwork>) -> Self {
        self.networks.insert(network_id.to_string(), network);
        self
    }
}

impl NetworkConnector for MockConnector {
    fn connect(&self, network: &NetworkProfile) -> Result<Arc<dyn NetworkClient>, NetworkError> {
        self.networks
            .get(&network.id)
            .cloned()
            .map(|client| client as Arc<dyn NetworkClient>)
            .ok_or_else(|| NetworkError::Transport(format!("no mock for {}", network.id)))
    }
}

/// Replays scripted backend responses. Once a script runs dry, submissions
/// report `AlreadyVerified` and status checks report `Verified`.
#[derive(Default)]
pub struct MockBackend {
    pub submissions: Mutex<VecDeque<Result<SubmitOutcome, BackendError>>>,
    pub statuses: Mutex<VecDeque<Result<StatusOutcome, BackendError>>>,
    pub submit_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub requests: Mutex<Vec<VerificationRequest>>,
    /// Time each submission takes.
    pub delay: Duration,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl MockBackend {
    pub fn scripted(
        submissions: Vec<Result<SubmitOutcome, BackendError>>,
        statuses: Vec<Result<StatusOutcome, BackendError>>,
    ) -> Self {
        Self {
            submissions: Mutex::new(submissions.into()),
            statuses: Mutex::new(statuses.into()),
            ..Self::default()
        }
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<VerificationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl VerificationBackend for MockBackend {
    async fn submit(&self, request: &VerificationRequest) -> Result<SubmitOutcome, BackendError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.submissions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(SubmitOutcome::AlreadyVerified))
    }

    async fn check_status(&self, _guid: &str) -> Result<StatusOutcome, BackendError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(StatusOutcome::Verified))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

pub struct MockBackendFactory {
    pub backend: Arc<MockBackend>,
}

impl BackendFactory for MockBackendFactory {
    fn backend_for(
        &self,
        _network: &NetworkProfile,
        _secrets: &dyn SecretSource,
    ) -> Result<Arc<dyn VerificationBackend>, VerificationError> {
        let backend: Arc<dyn VerificationBackend> = self.backend.clone();
        Ok(backend)
    }
}
