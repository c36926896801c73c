//! Chain RPC client with timeout and error handling.
//!
//! # Responsibilities
//! - Define the `ChainApi` capability the session, resolver and co-signing
//!   wrapper depend on
//! - Implement it over the node's HTTP JSON-RPC endpoints
//! - Bound every call with the configured timeout

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use url::Url;

use crate::blockchain::transaction::PackedTransaction;
use crate::blockchain::types::{Abi, ChainError, ChainInfo, ChainResult, PushResponse};

/// Chain operations the rest of the crate relies on.
#[async_trait]
pub trait ChainApi: Send + Sync {
    /// Current chain state, used to derive transaction headers.
    async fn get_info(&self) -> ChainResult<ChainInfo>;

    /// Interface definition of `account`, `None` if it has no contract.
    async fn get_abi(&self, account: &str) -> ChainResult<Option<Abi>>;

    /// Broadcast a signed, packed transaction.
    async fn push_transaction(&self, trx: &PackedTransaction) -> ChainResult<PushResponse>;

    /// Account names controlled by `public_key` according to the history index.
    async fn get_key_accounts(&self, public_key: &str) -> ChainResult<Vec<String>>;
}

#[derive(Deserialize)]
struct GetAbiResponse {
    #[serde(default)]
    abi: Option<Abi>,
}

#[derive(Deserialize)]
struct KeyAccountsResponse {
    #[serde(default)]
    account_names: Vec<String>,
}

#[derive(Serialize)]
struct AccountNameRequest<'a> {
    account_name: &'a str,
}

#[derive(Serialize)]
struct PublicKeyRequest<'a> {
    public_key: &'a str,
}

/// HTTP JSON-RPC implementation of [`ChainApi`].
#[derive(Clone)]
pub struct RpcChainClient {
    http: reqwest::Client,
    base_url: Url,
    timeout_duration: Duration,
}

impl RpcChainClient {
    /// Create a client for `endpoint` (e.g. `https://node.example.net:443`).
    pub fn new(endpoint: &str, timeout_secs: u64) -> ChainResult<Self> {
        let base_url: Url = endpoint
            .parse()
            .map_err(|e| ChainError::Rpc(format!("Invalid RPC URL '{}': {}", endpoint, e)))?;

        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            timeout_duration: Duration::from_secs(timeout_secs),
        })
    }

    /// Base endpoint this client talks to.
    pub fn endpoint(&self) -> &Url {
        &self.base_url
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> ChainResult<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| ChainError::Rpc(format!("Invalid RPC path '{}': {}", path, e)))?;

        let request = async {
            let response = self
                .http
                .post(url)
                .json(body)
                .send()
                .await
                .map_err(|e| ChainError::Rpc(e.to_string()))?;

            let status = response.status();
            let text = response.text().await.map_err(|e| ChainError::Rpc(e.to_string()))?;
            if !status.is_success() {
                return Err(ChainError::Http {
                    path: path.to_string(),
                    status: status.as_u16(),
                    body: text,
                });
            }
            serde_json::from_str(&text).map_err(|e| ChainError::Decode(format!("{}: {}", path, e)))
        };

        match timeout(self.timeout_duration, request).await {
            Ok(result) => {
                if let Err(e) = &result {
                    tracing::warn!(path = path, error = %e, "RPC call failed");
                }
                result
            }
            Err(_) => {
                tracing::warn!(path = path, "RPC timeout");
                Err(ChainError::Timeout(self.timeout_duration.as_secs()))
            }
        }
    }
}

#[async_trait]
impl ChainApi for RpcChainClient {
    async fn get_info(&self) -> ChainResult<ChainInfo> {
        self.post("/v1/chain/get_info", &serde_json::json!({})).await
    }

    async fn get_abi(&self, account: &str) -> ChainResult<Option<Abi>> {
        let response: GetAbiResponse = self
            .post("/v1/chain/get_abi", &AccountNameRequest { account_name: account })
            .await?;
        Ok(response.abi)
    }

    async fn push_transaction(&self, trx: &PackedTransaction) -> ChainResult<PushResponse> {
        let response: PushResponse = self.post("/v1/chain/push_transaction", trx).await?;
        tracing::info!(transaction_id = %response.transaction_id, "Transaction pushed");
        Ok(response)
    }

    async fn get_key_accounts(&self, public_key: &str) -> ChainResult<Vec<String>> {
        let response: KeyAccountsResponse = self
            .post("/v1/history/get_key_accounts", &PublicKeyRequest { public_key })
            .await?;
        Ok(response.account_names)
    }
}

impl std::fmt::Debug for RpcChainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcChainClient")
            .field("endpoint", &self.base_url.as_str())
            .field("timeout_secs", &self.timeout_duration.as_secs())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = RpcChainClient::new("https://node.example.net:443", 5).unwrap();
        assert_eq!(client.endpoint().host_str(), Some("node.example.net"));
    }

    #[test]
    fn test_invalid_url() {
        let err = RpcChainClient::new("not a url", 5).unwrap_err();
        assert!(err.to_string().contains("Invalid RPC URL"));
    }

    #[tokio::test]
    async fn test_unreachable_node_is_an_rpc_error() {
        // Port 9 (discard) is almost never listening locally.
        let client = RpcChainClient::new("http://127.0.0.1:9", 2).unwrap();
        let result = client.get_info().await;
        assert!(matches!(result, Err(ChainError::Rpc(_)) | Err(ChainError::Timeout(_))));
    }
}
