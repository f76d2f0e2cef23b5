use super::accounts::resolve_role;
use super::{DeployError, DeployTransaction, DeploymentStore, NetworkClient, Result};
use crate::compilation::BuildReport;
use crate::pipeline::CancellationSignal;
use crate::registry::ProfileRegistry;
use crate::retry::{Backoff, RetryPolicy};
use crate::types::{
    AccountRef, CompiledArtifact, DeploymentRecord, DeploymentState, NetworkProfile,
    ScheduledDeployment,
};
use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployAction {
    /// A transaction was sent and confirmed.
    Deployed,
    /// The stored record already matches the compiled output.
    Unchanged,
    Failed,
    /// Not attempted because the run was cancelled.
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContractOutcome {
    pub contract_name: String,
    pub action: DeployAction,
    pub state: DeploymentState,
    pub record: Option<DeploymentRecord>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkDeployReport {
    pub network_id: String,
    pub outcomes: Vec<ContractOutcome>,
    pub transactions: usize,
    pub duration: Duration,
}

impl NetworkDeployReport {
    /// Records that are current after this run, deployed or unchanged.
    pub fn records(&self) -> impl Iterator<Item = &DeploymentRecord> {
        self.outcomes.iter().filter_map(|o| o.record.as_ref())
    }

    pub fn count(&self, action: DeployAction) -> usize {
        self.outcomes.iter().filter(|o| o.action == action).count()
    }
}

/// Brings each network's deployments in line with the compiled output.
///
/// Networks are processed concurrently. Within a network, contracts are
/// deployed one at a time in schedule order, and a contract whose stored
/// record carries the same deployment hash is never resubmitted.
pub struct DeploymentOrchestrator {
    store: DeploymentStore,
    confirmation: RetryPolicy,
}

impl DeploymentOrchestrator {
    pub fn new(store: DeploymentStore, confirmation: RetryPolicy) -> Self {
        Self {
            store,
            confirmation,
        }
    }

    pub fn store(&self) -> &DeploymentStore {
        &self.store
    }

    pub async fn deploy_networks(
        &self,
        registry: &ProfileRegistry,
        targets: Vec<(NetworkProfile, Arc<dyn NetworkClient>)>,
        build: &BuildReport,
        cancel: &CancellationSignal,
    ) -> Vec<(String, Result<NetworkDeployReport>)> {
        let runs = targets.iter().map(|(network, client)| async move {
            let scheduled = registry.deployments_for(&network.id);
            let result = self
                .deploy_network(network, client.as_ref(), &scheduled, build, cancel)
                .await;
            (network.id.clone(), result)
        });
        join_all(runs).await
    }

    pub async fn deploy_network(
        &self,
        network: &NetworkProfile,
        client: &dyn NetworkClient,
        scheduled: &[&ScheduledDeployment],
        build: &BuildReport,
        cancel: &CancellationSignal,
    ) -> Result<NetworkDeployReport> {
        let started = Instant::now();
        info!("Deploying {} contracts to {}", scheduled.len(), network.id);

        // Resolve every signer before the first transaction.
        let needs_key_set = network
            .accounts
            .values()
            .any(|binding| matches!(binding, AccountRef::Index(_)));
        let key_set = if needs_key_set {
            client.accounts().await.map_err(|source| DeployError::Network {
                network_id: network.id.clone(),
                source,
            })?
        } else {
            Vec::new()
        };
        let mut signers = BTreeMap::new();
        for deployment in scheduled {
            if !signers.contains_key(&deployment.from_role) {
                let address = resolve_role(network, &deployment.from_role, &key_set)?;
                signers.insert(deployment.from_role.clone(), address);
            }
        }

        let compiled = build.by_contract_name();
        let mut report = NetworkDeployReport {
            network_id: network.id.clone(),
            outcomes: Vec::with_capacity(scheduled.len()),
            transactions: 0,
            duration: Duration::ZERO,
        };

        for deployment in scheduled {
            if cancel.is_cancelled() {
                info!("Cancelled before deploying {} to {}", deployment.contract, network.id);
                report.outcomes.push(ContractOutcome {
                    contract_name: deployment.contract.clone(),
                    action: DeployAction::Cancelled,
                    state: DeploymentState::NotDeployed,
                    record: None,
                    error: None,
                });
                continue;
            }

            let from = &signers[&deployment.from_role];
            let outcome = self
                .deploy_contract(
                    network,
                    client,
                    deployment,
                    compiled.get(deployment.contract.as_str()).copied(),
                    from,
                    &mut report.transactions,
                )
                .await;
            report.outcomes.push(outcome);
        }

        report.duration = started.elapsed();
        info!(
            "{}: {} deployed, {} unchanged, {} failed, {} cancelled",
            network.id,
            report.count(DeployAction::Deployed),
            report.count(DeployAction::Unchanged),
            report.count(DeployAction::Failed),
            report.count(DeployAction::Cancelled)
        );
        Ok(report)
    }

    async fn deploy_contract(
        &self,
        network: &NetworkProfile,
        client: &dyn NetworkClient,
        deployment: &ScheduledDeployment,
        artifact: Option<&CompiledArtifact>,
        from: &str,
        transactions: &mut usize,
    ) -> ContractOutcome {
        let state = DeploymentState::NotDeployed;
        let name = deployment.contract.clone();

        let Some(artifact) = artifact else {
            let error = DeployError::NotCompiled {
                contract: name.clone(),
            };
            warn!("{}: {}", network.id, error);
            return failed(name, &state, error.to_string());
        };

        let deployment_hash = artifact.deployment_hash(deployment.constructor_args.as_deref());
        match self.store.get(network, &name).await {
            Ok(Some(record)) if record.compiled_artifact_hash == deployment_hash => {
                debug!("{} on {} is up to date at {}", name, network.id, record.address);
                return ContractOutcome {
                    contract_name: name,
                    action: DeployAction::Unchanged,
                    state: advance(&state, DeploymentState::Deployed),
                    record: Some(record),
                    error: None,
                };
            }
            Ok(Some(record)) => info!(
                "{} on {} changed since block {}, redeploying",
                name, network.id, record.block_number
            ),
            Ok(None) => {}
            Err(e) => return failed(name, &state, e.to_string()),
        }

        let state = advance(&state, DeploymentState::Deploying);
        let tx = DeployTransaction {
            from: from.to_string(),
            data: format!(
                "0x{}{}",
                artifact.bytecode,
                deployment.constructor_args.as_deref().unwrap_or("")
            ),
            gas: network.gas.limit(),
        };

        let tx_hash = match client.send_deployment(&tx).await {
            Ok(hash) => hash,
            Err(source) => {
                let error = DeployError::Network {
                    network_id: network.id.clone(),
                    source,
                };
                error!("Failed to submit {}: {}", name, error);
                return failed(name, &state, error.to_string());
            }
        };
        *transactions += 1;
        info!("Submitted {} to {} in {}", name, network.id, tx_hash);

        let record = match self.await_receipt(network, client, &name, &tx_hash).await {
            Ok((address, block_number)) => DeploymentRecord {
                network_id: network.id.clone(),
                contract_name: name.clone(),
                address,
                compiled_artifact_hash: deployment_hash,
                block_number,
                tx_hash,
                deployed_at: Utc::now(),
            },
            Err(e) => {
                error!("{}", e);
                return failed(name, &state, e.to_string());
            }
        };

        if let Err(e) = self.store.put(network, record.clone()).await {
            error!("Deployed {} but could not record it: {}", name, e);
            return failed(name, &state, e.to_string());
        }

        info!("Deployed {} to {} at {}", name, network.id, record.address);
        ContractOutcome {
            contract_name: name,
            action: DeployAction::Deployed,
            state: advance(&state, DeploymentState::Deployed),
            record: Some(record),
            error: None,
        }
    }

    /// Polls for the receipt until it arrives or the confirmation budget is
    /// spent. Returns the contract address and block number.
    async fn await_receipt(
        &self,
        network: &NetworkProfile,
        client: &dyn NetworkClient,
        contract: &str,
        tx_hash: &str,
    ) -> Result<(String, u64)> {
        let mut backoff = Backoff::new(self.confirmation.clone());
        loop {
            match client.transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => {
                    return match (receipt.success, receipt.contract_address) {
                        (true, Some(address)) => Ok((address, receipt.block_number)),
                        _ => Err(DeployError::Reverted {
                            network_id: network.id.clone(),
                            contract: contract.to_string(),
                            tx_hash: tx_hash.to_string(),
                        }),
                    };
                }
                Ok(None) => debug!("{} still pending", tx_hash),
                Err(e) => warn!("Receipt query for {} failed: {}", tx_hash, e),
            }

            if !backoff.wait().await {
                return Err(DeployError::Timeout {
                    network_id: network.id.clone(),
                    contract: contract.to_string(),
                    tx_hash: tx_hash.to_string(),
                    attempts: backoff.attempts(),
                });
            }
        }
    }
}

fn advance(state: &DeploymentState, next: DeploymentState) -> DeploymentState {
    match state.transition(next.clone()) {
        Some(state) => state,
        None => {
            warn!("Ignoring invalid transition {:?} -> {:?}", state, next);
            state.clone()
        }
    }
}

fn failed(contract_name: String, state: &DeploymentState, error: String) -> ContractOutcome {
    ContractOutcome {
        contract_name,
        action: DeployAction::Failed,
        state: advance(state, DeploymentState::Failed { error: error.clone() }),
        record: None,
        error: Some(error),
    }
}
