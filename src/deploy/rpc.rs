use super::{DeployTransaction, NetworkClient, NetworkConnector, NetworkError, TransactionReceipt};
use crate::types::NetworkProfile;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

/// Ethereum JSON-RPC over HTTP, against a node or signing proxy that holds
/// the deployer keys.
pub struct JsonRpcClient {
    http: reqwest::Client,
    endpoint: Url,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReceipt {
    status: Option<String>,
    contract_address: Option<String>,
    block_number: Option<String>,
}

impl JsonRpcClient {
    pub fn new(endpoint: Url) -> Result<Self, NetworkError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| NetworkError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            endpoint,
            next_id: AtomicU64::new(1),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, NetworkError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        trace!("{} -> {} (id {})", self.endpoint, method, id);

        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params }))
            .send()
            .await
            .map_err(|e| NetworkError::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| NetworkError::Transport(e.to_string()))?
            .json::<RpcResponse>()
            .await
            .map_err(|e| NetworkError::InvalidResponse(e.to_string()))?;

        decode_response(response)
    }
}

fn decode_response<T: DeserializeOwned>(response: RpcResponse) -> Result<T, NetworkError> {
    if let Some(error) = response.error {
        return Err(NetworkError::Rpc {
            code: error.code,
            message: error.message,
        });
    }
    serde_json::from_value(response.result.unwrap_or(Value::Null))
        .map_err(|e| NetworkError::InvalidResponse(e.to_string()))
}

fn parse_quantity(value: &str) -> Result<u64, NetworkError> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    u64::from_str_radix(digits, 16)
        .map_err(|_| NetworkError::InvalidResponse(format!("invalid quantity '{value}'")))
}

fn convert_receipt(raw: RawReceipt) -> Result<TransactionReceipt, NetworkError> {
    let block_number = match raw.block_number.as_deref() {
        Some(block) => parse_quantity(block)?,
        None => 0,
    };
    // Pre-Byzantium receipts carry no status; treat them as successful.
    let success = match raw.status.as_deref() {
        Some(status) => parse_quantity(status)? == 1,
        None => true,
    };
    Ok(TransactionReceipt {
        success,
        contract_address: raw.contract_address,
        block_number,
    })
}

#[async_trait]
impl NetworkClient for JsonRpcClient {
    async fn accounts(&self) -> Result<Vec<String>, NetworkError> {
        self.call("eth_accounts", json!([])).await
    }

    async fn send_deployment(&self, tx: &DeployTransaction) -> Result<String, NetworkError> {
        let mut params = json!({ "from": tx.from, "data": tx.data });
        if let Some(gas) = tx.gas {
            params["gas"] = json!(format!("0x{gas:x}"));
        }
        let hash: String = self.call("eth_sendTransaction", json!([params])).await?;
        debug!("Broadcast deployment from {}: {}", tx.from, hash);
        Ok(hash)
    }

    async fn transaction_receipt(
        &self,
        tx_hash: &str,
    ) -> Result<Option<TransactionReceipt>, NetworkError> {
        let raw: Option<RawReceipt> = self
            .call("eth_getTransactionReceipt", json!([tx_hash]))
            .await?;
        raw.map(convert_receipt).transpose()
    }
}

/// Connects every network through [`JsonRpcClient`].
#[derive(Debug, Clone, Default)]
pub struct JsonRpcConnector;

impl NetworkConnector for JsonRpcConnector {
    fn connect(&self, network: &NetworkProfile) -> Result<Arc<dyn NetworkClient>, NetworkError> {
        Ok(Arc::new(JsonRpcClient::new(network.endpoint.clone())?))
    }
}
