//! One run of the engine: scan, route, plan, compile, deploy, verify.

pub mod cancel;

pub use cancel::CancellationSignal;

use crate::compilation::{
    ArtifactWriter, BuildReport, CompilationExecutor, CompilerToolchain, SolcToolchain,
    ToolchainError,
};
use crate::config::{ConfigError, EnvSecretSource, SecretSource};
use crate::deploy::{
    AccountResolutionError, DeployAction, DeployError, DeploymentOrchestrator, DeploymentStore,
    JsonRpcConnector, NetworkClient, NetworkConnector, NetworkDeployReport,
};
use crate::planner::{BuildPlan, BuildPlanner, PlanError};
use crate::registry::ProfileRegistry;
use crate::routing::{RouteTable, RoutingError, RoutingResolver};
use crate::scanner::{FsSourceScanner, ScanError, SourceScanner};
use crate::types::{NetworkProfile, VerificationResult, VerificationStatus};
use crate::verify::{
    BackendFactory, EtherscanFactory, VerificationDispatcher, VerificationRequest,
    VerificationTarget,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Errors that stop a run before or during the build. Per-contract and
/// per-network failures are reported in [`RunSummary`] instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Toolchain(#[from] ToolchainError),

    #[error("Unknown network: {0}")]
    UnknownNetwork(String),

    #[error("No network given and no default_network configured")]
    NoNetworks,
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Clone)]
pub struct PlannedBuild {
    pub routes: RouteTable,
    pub plan: BuildPlan,
}

#[derive(Debug)]
pub struct NetworkRun {
    pub network_id: String,
    pub deployment: std::result::Result<NetworkDeployReport, DeployError>,
}

#[derive(Debug)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub build: BuildReport,
    pub networks: Vec<NetworkRun>,
    pub verifications: Vec<VerificationResult>,
}

impl RunSummary {
    pub fn account_errors(&self) -> Vec<&AccountResolutionError> {
        self.networks
            .iter()
            .filter_map(|run| match &run.deployment {
                Err(DeployError::Accounts(e)) => Some(e),
                _ => None,
            })
            .collect()
    }

    /// True when contracts were attempted and not one of them ended deployed
    /// or unchanged. Contracts skipped by cancellation were not attempted.
    pub fn all_failed(&self) -> bool {
        let mut scheduled = 0;
        let mut succeeded = 0;
        for run in &self.networks {
            match &run.deployment {
                Ok(report) => {
                    scheduled += report.outcomes.len() - report.count(DeployAction::Cancelled);
                    succeeded += report.count(DeployAction::Deployed)
                        + report.count(DeployAction::Unchanged);
                }
                Err(_) => scheduled += 1,
            }
        }
        scheduled > 0 && succeeded == 0
    }

    pub fn transactions(&self) -> usize {
        self.networks
            .iter()
            .filter_map(|run| run.deployment.as_ref().ok())
            .map(|report| report.transactions)
            .sum()
    }
}

/// Wires the components for one run. Every collaborator has a production
/// default and can be swapped out.
pub struct Pipeline<'a> {
    registry: &'a ProfileRegistry,
    scanner: Arc<dyn SourceScanner>,
    toolchain: Arc<dyn CompilerToolchain>,
    connector: Arc<dyn NetworkConnector>,
    verifiers: Arc<dyn BackendFactory>,
    secrets: Arc<dyn SecretSource>,
    cancel: CancellationSignal,
    workers: usize,
    state_dir: PathBuf,
    artifacts_dir: Option<PathBuf>,
}

impl<'a> Pipeline<'a> {
    pub fn new(registry: &'a ProfileRegistry, project_root: impl Into<PathBuf>) -> Self {
        let project_root = project_root.into();
        let settings = registry.settings();
        Self {
            registry,
            scanner: Arc::new(FsSourceScanner::new(
                project_root.clone(),
                registry.source_roots().to_vec(),
            )),
            toolchain: Arc::new(SolcToolchain::new(project_root.clone())),
            connector: Arc::new(JsonRpcConnector),
            verifiers: Arc::new(EtherscanFactory),
            secrets: Arc::new(EnvSecretSource),
            cancel: CancellationSignal::new(),
            workers: settings.worker_limit(),
            state_dir: project_root.join(&settings.state_dir),
            artifacts_dir: Some(project_root.join(&settings.artifacts_dir)),
        }
    }

    pub fn with_scanner(mut self, scanner: Arc<dyn SourceScanner>) -> Self {
        self.scanner = scanner;
        self
    }

    pub fn with_toolchain(mut self, toolchain: Arc<dyn CompilerToolchain>) -> Self {
        self.toolchain = toolchain;
        self
    }

    pub fn with_connector(mut self, connector: Arc<dyn NetworkConnector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn with_verifiers(mut self, verifiers: Arc<dyn BackendFactory>) -> Self {
        self.verifiers = verifiers;
        self
    }

    pub fn with_secrets(mut self, secrets: Arc<dyn SecretSource>) -> Self {
        self.secrets = secrets;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationSignal) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_state_dir(mut self, state_dir: impl Into<PathBuf>) -> Self {
        self.state_dir = state_dir.into();
        self
    }

    /// `None` keeps compiled artifacts in memory only.
    pub fn with_artifacts_dir(mut self, artifacts_dir: Option<PathBuf>) -> Self {
        self.artifacts_dir = artifacts_dir;
        self
    }

    pub fn cancellation(&self) -> &CancellationSignal {
        &self.cancel
    }

    pub async fn plan(&self) -> Result<PlannedBuild> {
        let artifacts = self.scanner.scan().await?;
        let routes = RoutingResolver::new(self.registry).resolve(&artifacts)?;
        let plan = BuildPlanner::new(self.registry).plan(&routes)?;
        Ok(PlannedBuild { routes, plan })
    }

    pub async fn build(&self) -> Result<(PlannedBuild, BuildReport)> {
        let planned = self.plan().await?;
        let executor = CompilationExecutor::new(self.toolchain.clone(), self.workers);
        let report = executor
            .execute(self.registry, &planned.plan, &self.cancel)
            .await?;

        if let Some(dir) = &self.artifacts_dir {
            ArtifactWriter::new(dir).write_all(&report.compiled).await?;
        }
        Ok((planned, report))
    }

    /// Builds, then deploys to `network_ids` (the default network when
    /// empty), then verifies on live networks when `verify` is set.
    pub async fn deploy(&self, network_ids: &[String], verify: bool) -> Result<RunSummary> {
        let networks = self.select_networks(network_ids)?;
        let run_id = Uuid::new_v4();
        info!(
            "Run {}: deploying to {}",
            run_id,
            networks.iter().map(|n| n.id.as_str()).collect::<Vec<_>>().join(", ")
        );

        let (_, build) = self.build().await?;

        let mut runs = Vec::new();
        let mut targets: Vec<(NetworkProfile, Arc<dyn NetworkClient>)> = Vec::new();
        for network in networks {
            match self.connector.connect(network) {
                Ok(client) => targets.push((network.clone(), client)),
                Err(source) => {
                    error!("Cannot connect to {}: {}", network.id, source);
                    runs.push(NetworkRun {
                        network_id: network.id.clone(),
                        deployment: Err(DeployError::Network {
                            network_id: network.id.clone(),
                            source,
                        }),
                    });
                }
            }
        }

        let orchestrator = DeploymentOrchestrator::new(
            DeploymentStore::new(&self.state_dir),
            self.registry.settings().confirmation.clone(),
        );
        let results = orchestrator
            .deploy_networks(self.registry, targets, &build, &self.cancel)
            .await;
        runs.extend(
            results
                .into_iter()
                .map(|(network_id, deployment)| NetworkRun {
                    network_id,
                    deployment,
                }),
        );

        let verifications = if verify && !self.cancel.is_cancelled() {
            self.verify(&runs, &build).await
        } else {
            Vec::new()
        };

        Ok(RunSummary {
            run_id,
            build,
            networks: runs,
            verifications,
        })
    }

    fn select_networks(&self, network_ids: &[String]) -> Result<Vec<&'a NetworkProfile>> {
        let ids: Vec<String> = if network_ids.is_empty() {
            vec![self
                .registry
                .default_network()
                .ok_or(PipelineError::NoNetworks)?
                .to_string()]
        } else {
            network_ids.to_vec()
        };

        let mut selected: Vec<&'a NetworkProfile> = Vec::with_capacity(ids.len());
        for id in ids {
            let network = self
                .registry
                .network(&id)
                .ok_or_else(|| PipelineError::UnknownNetwork(id.clone()))?;
            if !selected.iter().any(|n| n.id == network.id) {
                selected.push(network);
            }
        }
        Ok(selected)
    }

    async fn verify(&self, runs: &[NetworkRun], build: &BuildReport) -> Vec<VerificationResult> {
        let compiled = build.by_contract_name();
        let mut results = Vec::new();
        let mut targets = Vec::new();

        for run in runs {
            let Ok(report) = &run.deployment else {
                continue;
            };
            let Some(network) = self.registry.network(&run.network_id) else {
                continue;
            };
            let Some(verification) = network.verification.as_ref() else {
                continue;
            };
            if !network.verifies() {
                continue;
            }

            let constructor_args: BTreeMap<&str, Option<String>> = self
                .registry
                .deployments_for(&network.id)
                .into_iter()
                .map(|d| (d.contract.as_str(), d.constructor_args.clone()))
                .collect();

            let requests: Vec<VerificationRequest> = report
                .records()
                .filter_map(|record| {
                    let artifact = compiled.get(record.contract_name.as_str())?;
                    Some(VerificationRequest {
                        network_id: network.id.clone(),
                        contract_name: record.contract_name.clone(),
                        fully_qualified_name: artifact.fully_qualified_name(),
                        address: record.address.clone(),
                        compiler_version: artifact.compiler_version.clone(),
                        standard_input: artifact.standard_input.clone(),
                        constructor_args: constructor_args
                            .get(record.contract_name.as_str())
                            .cloned()
                            .flatten(),
                    })
                })
                .collect();
            if requests.is_empty() {
                continue;
            }

            match self.verifiers.backend_for(network, self.secrets.as_ref()) {
                Ok(backend) => targets.push(VerificationTarget {
                    network_id: network.id.clone(),
                    backend_id: verification.api_url.to_string(),
                    backend,
                    requests,
                }),
                Err(e) => {
                    warn!("Skipping verification on {}: {}", network.id, e);
                    results.extend(requests.into_iter().map(|request| VerificationResult {
                        network_id: request.network_id,
                        contract_name: request.contract_name,
                        address: request.address,
                        status: VerificationStatus::Failed,
                        attempts: 0,
                        message: Some(e.to_string()),
                    }));
                }
            }
        }

        let settings = self.registry.settings();
        let dispatcher = VerificationDispatcher::new(
            settings.verification.clone(),
            settings.verification_concurrency,
        );
        results.extend(dispatcher.dispatch(targets).await);
        results
    }
}
