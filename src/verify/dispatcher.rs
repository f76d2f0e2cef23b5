use super::{
    BackendError, StatusOutcome, SubmitOutcome, VerificationBackend, VerificationError,
    VerificationRequest,
};
use crate::retry::{Backoff, RetryPolicy};
use crate::types::{VerificationResult, VerificationStatus};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// The requests one network sends to its backend.
pub struct VerificationTarget {
    pub network_id: String,
    /// Identifies the backend service, normally its API URL. Networks that
    /// share an explorer share its concurrency cap.
    pub backend_id: String,
    pub backend: Arc<dyn VerificationBackend>,
    pub requests: Vec<VerificationRequest>,
}

/// Submits deployed contracts to their verification backends.
///
/// Transient backend errors are retried on the configured schedule, permanent
/// ones end that request at once. Each backend gets its own concurrency cap.
pub struct VerificationDispatcher {
    policy: RetryPolicy,
    concurrency: usize,
}

impl VerificationDispatcher {
    pub fn new(policy: RetryPolicy, concurrency: usize) -> Self {
        Self {
            policy,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn dispatch(&self, targets: Vec<VerificationTarget>) -> Vec<VerificationResult> {
        let mut semaphores: HashMap<String, Arc<Semaphore>> = HashMap::new();
        let runs: Vec<_> = targets
            .into_iter()
            .map(|target| {
                let semaphore = semaphores
                    .entry(target.backend_id.clone())
                    .or_insert_with(|| Arc::new(Semaphore::new(self.concurrency)))
                    .clone();
                async move {
                    info!(
                        "Verifying {} contracts on {} via {} ({})",
                        target.requests.len(),
                        target.network_id,
                        target.backend.name(),
                        target.backend_id
                    );
                    let verifications = target
                        .requests
                        .iter()
                        .map(|request| self.verify(target.backend.as_ref(), &semaphore, request));
                    join_all(verifications).await
                }
            })
            .collect();

        join_all(runs).await.into_iter().flatten().collect()
    }

    pub async fn verify(
        &self,
        backend: &dyn VerificationBackend,
        semaphore: &Semaphore,
        request: &VerificationRequest,
    ) -> VerificationResult {
        let mut attempts = 0;
        let outcome = self
            .submit_and_poll(backend, semaphore, request, &mut attempts)
            .await;

        let (status, message) = match outcome {
            Ok(status) => (status, None),
            Err(e) => {
                warn!("{}", e);
                (VerificationStatus::Failed, Some(e.to_string()))
            }
        };

        if status == VerificationStatus::Verified {
            info!("Verified {} on {}", request.contract_name, request.network_id);
        }

        VerificationResult {
            network_id: request.network_id.clone(),
            contract_name: request.contract_name.clone(),
            address: request.address.clone(),
            status,
            attempts,
            message: message.or_else(|| {
                (status == VerificationStatus::Pending)
                    .then(|| "verification still pending at the backend".to_string())
            }),
        }
    }

    async fn submit_and_poll(
        &self,
        backend: &dyn VerificationBackend,
        semaphore: &Semaphore,
        request: &VerificationRequest,
        attempts: &mut u32,
    ) -> Result<VerificationStatus, VerificationError> {
        let mut backoff = Backoff::new(self.policy.clone());
        let guid = loop {
            *attempts += 1;
            let submitted = {
                let _permit = semaphore.acquire().await;
                backend.submit(request).await
            };
            match submitted {
                Ok(SubmitOutcome::AlreadyVerified) => return Ok(VerificationStatus::Verified),
                Ok(SubmitOutcome::Accepted { guid }) => break guid,
                Err(e) => self.retry_or_fail(&mut backoff, request, e).await?,
            }
        };

        debug!("{} submitted as {}", request.contract_name, guid);
        let mut backoff = Backoff::new(self.policy.clone());
        loop {
            *attempts += 1;
            let status = {
                let _permit = semaphore.acquire().await;
                backend.check_status(&guid).await
            };
            match status {
                Ok(StatusOutcome::Verified) => return Ok(VerificationStatus::Verified),
                Ok(StatusOutcome::Failed(reason)) => {
                    return Err(VerificationError::Rejected {
                        network_id: request.network_id.clone(),
                        contract: request.contract_name.clone(),
                        reason,
                    })
                }
                Ok(StatusOutcome::Pending) => {
                    if !backoff.wait().await {
                        return Ok(VerificationStatus::Pending);
                    }
                }
                Err(e) => self.retry_or_fail(&mut backoff, request, e).await?,
            }
        }
    }

    /// Waits out a transient error, or converts the error into the final one.
    async fn retry_or_fail(
        &self,
        backoff: &mut Backoff,
        request: &VerificationRequest,
        error: BackendError,
    ) -> Result<(), VerificationError> {
        match error {
            BackendError::Permanent(reason) => Err(VerificationError::Rejected {
                network_id: request.network_id.clone(),
                contract: request.contract_name.clone(),
                reason,
            }),
            BackendError::Transient(reason) => {
                debug!("Retrying {} after: {}", request.contract_name, reason);
                if backoff.wait().await {
                    Ok(())
                } else {
                    Err(VerificationError::Exhausted {
                        network_id: request.network_id.clone(),
                        contract: request.contract_name.clone(),
                        attempts: backoff.attempts(),
                        reason,
                    })
                }
            }
        }
    }
}
