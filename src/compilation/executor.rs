use super::{CompilationError, CompilerToolchain, ToolchainError};
use crate::pipeline::CancellationSignal;
use crate::planner::{BuildPlan, CompilationBatch};
use crate::registry::ProfileRegistry;
use crate::types::CompiledArtifact;
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// EIP-170 cap on deployed contract code.
pub const MAX_DEPLOYED_SIZE: usize = 24_576;

#[derive(Debug, Clone, Serialize)]
pub struct OversizedContract {
    pub name: String,
    pub deployed_size: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    pub compiled: Vec<CompiledArtifact>,
    pub failures: Vec<CompilationError>,
    pub failed_batches: Vec<String>,
    pub cancelled_batches: Vec<String>,
    pub oversized: Vec<OversizedContract>,
    pub duration: Duration,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.failed_batches.is_empty() && self.cancelled_batches.is_empty()
    }

    /// Deployable contracts by name. When two sources define the same
    /// contract name, the one compiled first wins.
    pub fn by_contract_name(&self) -> BTreeMap<&str, &CompiledArtifact> {
        let mut index = BTreeMap::new();
        for artifact in self.compiled.iter().filter(|a| a.is_deployable()) {
            if let Some(existing) = index.insert(artifact.contract_name.as_str(), artifact) {
                warn!(
                    "Contract name {} is defined by both {} and {}, using the former",
                    artifact.contract_name, existing.artifact_path, artifact.artifact_path
                );
                index.insert(existing.contract_name.as_str(), existing);
            }
        }
        index
    }
}

enum BatchOutcome {
    Compiled(Vec<CompiledArtifact>),
    Failed(Vec<CompilationError>),
    Cancelled,
    Fatal(ToolchainError),
}

/// Runs the batches of a [`BuildPlan`] through a [`CompilerToolchain`].
///
/// Batches run concurrently up to the worker limit. A batch either yields all
/// of its contracts or none. A [`ToolchainError`] stops new batches from
/// starting, lets in-flight ones finish and is returned once they have.
pub struct CompilationExecutor {
    toolchain: Arc<dyn CompilerToolchain>,
    workers: usize,
}

impl CompilationExecutor {
    pub fn new(toolchain: Arc<dyn CompilerToolchain>, workers: usize) -> Self {
        Self {
            toolchain,
            workers: workers.max(1),
        }
    }

    pub async fn execute(
        &self,
        registry: &ProfileRegistry,
        plan: &BuildPlan,
        cancel: &CancellationSignal,
    ) -> Result<BuildReport, ToolchainError> {
        let started = Instant::now();
        let semaphore = Semaphore::new(self.workers);
        let aborted = AtomicBool::new(false);

        info!(
            "Compiling {} batches with {} (workers: {})",
            plan.batches.len(),
            self.toolchain.name(),
            self.workers
        );

        let runs = plan
            .batches
            .iter()
            .map(|batch| self.run_batch(registry, batch, &semaphore, &aborted, cancel));
        let outcomes = join_all(runs).await;

        let mut report = BuildReport::default();
        let mut fatal = None;
        for (batch, outcome) in plan.batches.iter().zip(outcomes) {
            match outcome {
                BatchOutcome::Compiled(contracts) => report.compiled.extend(contracts),
                BatchOutcome::Failed(diagnostics) => {
                    report.failed_batches.push(batch.profile_id.clone());
                    report.failures.extend(diagnostics);
                }
                BatchOutcome::Cancelled => report.cancelled_batches.push(batch.profile_id.clone()),
                BatchOutcome::Fatal(e) => {
                    if fatal.is_none() {
                        fatal = Some(e);
                    } else {
                        error!("Additional toolchain failure in batch {}: {}", batch.profile_id, e);
                    }
                }
            }
        }

        if let Some(e) = fatal {
            return Err(e);
        }

        report.oversized = report
            .compiled
            .iter()
            .filter(|c| c.deployed_size > MAX_DEPLOYED_SIZE)
            .map(|c| OversizedContract {
                name: c.fully_qualified_name(),
                deployed_size: c.deployed_size,
            })
            .collect();
        for contract in &report.oversized {
            warn!(
                "{} deployed size {} bytes exceeds the {} byte limit",
                contract.name, contract.deployed_size, MAX_DEPLOYED_SIZE
            );
        }

        report.duration = started.elapsed();
        info!(
            "Build finished: {} contracts, {} diagnostics, {} cancelled batches in {:?}",
            report.compiled.len(),
            report.failures.len(),
            report.cancelled_batches.len(),
            report.duration
        );
        Ok(report)
    }

    async fn run_batch(
        &self,
        registry: &ProfileRegistry,
        batch: &CompilationBatch,
        semaphore: &Semaphore,
        aborted: &AtomicBool,
        cancel: &CancellationSignal,
    ) -> BatchOutcome {
        let Ok(_permit) = semaphore.acquire().await else {
            return BatchOutcome::Cancelled;
        };

        if cancel.is_cancelled() || aborted.load(Ordering::SeqCst) {
            info!("Batch {} not started", batch.profile_id);
            return BatchOutcome::Cancelled;
        }

        let Some(profile) = registry.compiler_profile(&batch.profile_id) else {
            return BatchOutcome::Fatal(ToolchainError::NotFound {
                version: batch.profile_id.clone(),
            });
        };

        match self.toolchain.compile(profile, batch).await {
            Ok(output) if output.succeeded() => {
                info!(
                    "Batch {} produced {} contracts",
                    batch.profile_id,
                    output.contracts.len()
                );
                BatchOutcome::Compiled(output.contracts)
            }
            Ok(output) => {
                for diagnostic in &output.diagnostics {
                    error!("[{}] {}", batch.profile_id, diagnostic);
                }
                BatchOutcome::Failed(output.diagnostics)
            }
            Err(e) => {
                error!("Toolchain failure in batch {}: {}", batch.profile_id, e);
                aborted.store(true, Ordering::SeqCst);
                BatchOutcome::Fatal(e)
            }
        }
    }
}
