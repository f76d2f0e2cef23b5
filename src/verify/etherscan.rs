use super::{
    BackendError, BackendFactory, StatusOutcome, SubmitOutcome, VerificationBackend,
    VerificationError, VerificationRequest,
};
use crate::config::{Secret, SecretSource};
use crate::types::NetworkProfile;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Etherscan-compatible verification API (`module=contract`).
pub struct EtherscanBackend {
    http: reqwest::Client,
    api_url: Url,
    api_key: Option<Secret>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: String,
}

impl EtherscanBackend {
    pub fn new(api_url: Url, api_key: Option<Secret>) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| BackendError::Permanent(e.to_string()))?;
        Ok(Self {
            http,
            api_url,
            api_key,
        })
    }

    fn api_key(&self) -> &str {
        self.api_key.as_ref().map(Secret::expose).unwrap_or("")
    }

    async fn read(response: reqwest::Response) -> Result<ApiResponse, BackendError> {
        classify_http(response.status())?;
        response
            .json::<ApiResponse>()
            .await
            .map_err(|e| BackendError::Transient(format!("unreadable response: {e}")))
    }
}

#[async_trait]
impl VerificationBackend for EtherscanBackend {
    async fn submit(&self, request: &VerificationRequest) -> Result<SubmitOutcome, BackendError> {
        let source = serde_json::to_string(request.standard_input.as_ref())
            .map_err(|e| BackendError::Permanent(e.to_string()))?;
        let constructor_args = request.constructor_args.clone().unwrap_or_default();

        let form = [
            ("apikey", self.api_key()),
            ("module", "contract"),
            ("action", "verifysourcecode"),
            ("contractaddress", request.address.as_str()),
            ("sourceCode", source.as_str()),
            ("codeformat", "solidity-standard-json-input"),
            ("contractname", request.fully_qualified_name.as_str()),
            ("compilerversion", request.compiler_version.as_str()),
            // Misspelled in the upstream API.
            ("constructorArguements", constructor_args.as_str()),
        ];

        debug!(
            "Submitting {} at {} to {}",
            request.fully_qualified_name,
            request.address,
            self.api_url.host_str().unwrap_or("verifier")
        );
        let response = self
            .http
            .post(self.api_url.clone())
            .form(&form)
            .send()
            .await
            .map_err(|e| BackendError::Transient(e.to_string()))?;

        classify_submit(Self::read(response).await?)
    }

    async fn check_status(&self, guid: &str) -> Result<StatusOutcome, BackendError> {
        let query = [
            ("apikey", self.api_key()),
            ("module", "contract"),
            ("action", "checkverifystatus"),
            ("guid", guid),
        ];
        let response = self
            .http
            .get(self.api_url.clone())
            .query(&query)
            .send()
            .await
            .map_err(|e| BackendError::Transient(e.to_string()))?;

        classify_status(Self::read(response).await?)
    }

    fn name(&self) -> &'static str {
        "etherscan"
    }
}

fn classify_http(status: StatusCode) -> Result<(), BackendError> {
    if status.is_success() {
        Ok(())
    } else if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Err(BackendError::Transient(format!("HTTP {status}")))
    } else {
        Err(BackendError::Permanent(format!("HTTP {status}")))
    }
}

fn is_rate_limited(text: &str) -> bool {
    text.contains("rate limit")
}

fn classify_submit(response: ApiResponse) -> Result<SubmitOutcome, BackendError> {
    if response.status == "1" {
        return Ok(SubmitOutcome::Accepted {
            guid: response.result,
        });
    }

    let text = response.result.to_lowercase();
    if text.contains("already verified") {
        Ok(SubmitOutcome::AlreadyVerified)
    } else if is_rate_limited(&text) || text.contains("unable to locate contractcode") {
        // The explorer may not have indexed a fresh deployment yet.
        Err(BackendError::Transient(response.result))
    } else if response.result.is_empty() {
        Err(BackendError::Permanent(response.message))
    } else {
        Err(BackendError::Permanent(response.result))
    }
}

fn classify_status(response: ApiResponse) -> Result<StatusOutcome, BackendError> {
    let text = response.result.to_lowercase();
    if text.contains("pending") {
        Ok(StatusOutcome::Pending)
    } else if text.contains("already verified") || text.starts_with("pass") {
        Ok(StatusOutcome::Verified)
    } else if is_rate_limited(&text) {
        Err(BackendError::Transient(response.result))
    } else if response.status == "1" {
        Ok(StatusOutcome::Verified)
    } else if text.starts_with("fail") {
        Ok(StatusOutcome::Failed(response.result))
    } else {
        Err(BackendError::Permanent(response.result))
    }
}

/// Builds an [`EtherscanBackend`] from a network's `verify` block.
#[derive(Debug, Clone, Default)]
pub struct EtherscanFactory;

impl BackendFactory for EtherscanFactory {
    fn backend_for(
        &self,
        network: &NetworkProfile,
        secrets: &dyn SecretSource,
    ) -> Result<Arc<dyn VerificationBackend>, VerificationError> {
        let config = network
            .verification
            .as_ref()
            .ok_or_else(|| VerificationError::NotConfigured {
                network_id: network.id.clone(),
            })?;

        let api_key = config
            .api_key
            .as_ref()
            .map(|reference| secrets.resolve(reference))
            .transpose()
            .map_err(|source| VerificationError::Credentials {
                network_id: network.id.clone(),
                source,
            })?;

        let backend = EtherscanBackend::new(config.api_url.clone(), api_key).map_err(|e| {
            VerificationError::Backend {
                network_id: network.id.clone(),
                reason: e.to_string(),
            }
        })?;
        Ok(Arc::new(backend))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: &str, result: &str) -> ApiResponse {
        ApiResponse {
            status: status.to_string(),
            message: if status == "1" { "OK" } else { "NOTOK" }.to_string(),
            result: result.to_string(),
        }
    }

    #[test]
    fn test_submit_classification() {
        assert_eq!(
            classify_submit(response("1", "abc123")).unwrap(),
            SubmitOutcome::Accepted {
                guid: "abc123".to_string()
            }
        );
        assert_eq!(
            classify_submit(response("0", "Contract source code already verified")).unwrap(),
            SubmitOutcome::AlreadyVerified
        );
        assert!(classify_submit(response("0", "Max rate limit reached"))
            .unwrap_err()
            .is_transient());
        assert!(!classify_submit(response("0", "Invalid API Key"))
            .unwrap_err()
            .is_transient());
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(
            classify_status(response("0", "Pending in queue")).unwrap(),
            StatusOutcome::Pending
        );
        assert_eq!(
            classify_status(response("1", "Pass - Verified")).unwrap(),
            StatusOutcome::Verified
        );
        assert_eq!(
            classify_status(response("0", "Already Verified")).unwrap(),
            StatusOutcome::Verified
        );
        assert_eq!(
            classify_status(response("0", "Fail - Unable to verify")).unwrap(),
            StatusOutcome::Failed("Fail - Unable to verify".to_string())
        );
    }

    #[test]
    fn test_http_classification() {
        assert!(classify_http(StatusCode::OK).is_ok());
        assert!(classify_http(StatusCode::BAD_GATEWAY).unwrap_err().is_transient());
        assert!(classify_http(StatusCode::TOO_MANY_REQUESTS)
            .unwrap_err()
            .is_transient());
        assert!(!classify_http(StatusCode::FORBIDDEN).unwrap_err().is_transient());
    }
}
