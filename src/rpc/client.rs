use anyhow::{Context, Result};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::warn;

static REQUEST_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a, P: Serialize> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: &'a P,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: serde_json::Value,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Retry policy for transient RPC failures
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt (0 = no retries)
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (1-based), capped at `max_delay_ms`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        let delay = (self.initial_delay_ms as f64 * factor).min(self.max_delay_ms as f64);
        Duration::from_millis(delay as u64)
    }
}

/// Outcome of one attempt: node-reported errors are not retried
enum CallError {
    Transport(anyhow::Error),
    Rpc(anyhow::Error),
}

#[derive(Clone)]
pub struct RpcClient {
    client: Client,
    endpoint: String,
    retry: RetryConfig,
}

impl RpcClient {
    /// Create a new RPC client with custom timeout in milliseconds
    pub fn with_timeout(endpoint: &str, timeout_ms: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            endpoint: endpoint.to_string(),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Call `method`, retrying transport failures with exponential backoff
    pub async fn call<P, R>(&self, method: &str, params: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let mut attempt = 0;
        loop {
            match self.call_once(method, &params).await {
                Ok(result) => return Ok(result),
                Err(CallError::Rpc(e)) => return Err(e),
                Err(CallError::Transport(e)) if attempt >= self.retry.max_retries => {
                    return Err(e.context(format!(
                        "{} failed after {} attempts",
                        method,
                        attempt + 1
                    )));
                }
                Err(CallError::Transport(e)) => {
                    attempt += 1;
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        "RPC {} failed ({:#}), retry {}/{} in {:?}",
                        method, e, attempt, self.retry.max_retries, delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn call_once<P, R>(&self, method: &str, params: &P) -> Result<R, CallError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: REQUEST_ID.fetch_add(1, Ordering::SeqCst),
            method,
            params,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .context("Failed to send RPC request")
            .map_err(CallError::Transport)?;

        let rpc_response: JsonRpcResponse = response
            .json()
            .await
            .context("Failed to parse RPC response")
            .map_err(CallError::Transport)?;

        if let Some(error) = rpc_response.error {
            return Err(CallError::Rpc(anyhow::anyhow!(
                "RPC error {}: {}",
                error.code,
                error.message
            )));
        }

        // A null result only decodes into an `Option<_>` target
        serde_json::from_value(rpc_response.result)
            .with_context(|| format!("Unexpected {} result", method))
            .map_err(CallError::Rpc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let retry = RetryConfig {
            max_retries: 5,
            initial_delay_ms: 100,
            max_delay_ms: 350,
            backoff_multiplier: 2.0,
        };
        assert_eq!(retry.delay_for(1), Duration::from_millis(100));
        assert_eq!(retry.delay_for(2), Duration::from_millis(200));
        assert_eq!(retry.delay_for(3), Duration::from_millis(350));
        assert_eq!(retry.delay_for(4), Duration::from_millis(350));
    }

    #[test]
    fn test_request_serializes_as_json_rpc() {
        let params = ("0xabc",);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 7,
            method: "state_getStorage",
            params: &params,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({"jsonrpc": "2.0", "id": 7, "method": "state_getStorage", "params": ["0xabc"]})
        );
    }

    #[test]
    fn test_null_result_decodes_only_as_option() {
        let response: JsonRpcResponse =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"result":null}"#).unwrap();
        assert!(response.error.is_none());
        assert_eq!(
            serde_json::from_value::<Option<String>>(response.result.clone()).unwrap(),
            None
        );
        assert!(serde_json::from_value::<String>(response.result).is_err());
    }

    #[test]
    fn test_error_response() {
        let response: JsonRpcResponse = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"Method not found"}}"#,
        )
        .unwrap();
        let error = response.error.unwrap();
        assert_eq!(error.code, -32601);
        assert_eq!(error.message, "Method not found");
    }
}
