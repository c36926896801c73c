//! HTTP client for the resource provider.

use std::time::Duration;

use tokio::time::timeout;

use crate::blockchain::{PackedTransaction, PermissionLevel};
use crate::fuel::types::{CoSignError, CoSignRequest, ResourceProviderResponse};

const REQUEST_PATH: &str = "/v1/resource_provider/request_transaction";

#[derive(Clone, Debug)]
pub struct ResourceProviderClient {
    http: reqwest::Client,
    base_url: String,
    endpoint: String,
    timeout_duration: Duration,
}

impl ResourceProviderClient {
    pub fn new(rpc_endpoint: &str, timeout_secs: u64) -> Self {
        let base_url = rpc_endpoint.trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            endpoint: format!("{}{}", base_url, REQUEST_PATH),
            base_url,
            timeout_duration: Duration::from_secs(timeout_secs),
        }
    }

    /// Full URL of the co-sign endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// `true` if the base URL answers 200. Any failure means unavailable.
    pub async fn is_available(&self) -> bool {
        match timeout(self.timeout_duration, self.http.get(&self.base_url).send()).await {
            Ok(Ok(response)) => {
                let available = response.status().as_u16() == 200;
                if !available {
                    tracing::info!(
                        endpoint = %self.base_url,
                        status = response.status().as_u16(),
                        "Resource provider unavailable"
                    );
                }
                available
            }
            Ok(Err(e)) => {
                tracing::warn!(endpoint = %self.base_url, error = %e, "Resource provider probe failed");
                false
            }
            Err(_) => {
                tracing::warn!(endpoint = %self.base_url, "Resource provider probe timed out");
                false
            }
        }
    }

    /// Ask the provider to co-sign `packed` on behalf of `signer`.
    ///
    /// The body carries the outcome in its `code` field, so it is decoded
    /// whatever the HTTP status.
    pub async fn request_transaction(
        &self,
        signer: &PermissionLevel,
        packed: &PackedTransaction,
    ) -> Result<ResourceProviderResponse, CoSignError> {
        let body = CoSignRequest {
            signer,
            packed_transaction: packed,
        };

        let request = async {
            let response = self
                .http
                .post(&self.endpoint)
                .json(&body)
                .send()
                .await
                .map_err(|e| CoSignError::Http(e.to_string()))?;
            let text = response.text().await.map_err(|e| CoSignError::Http(e.to_string()))?;
            serde_json::from_str::<ResourceProviderResponse>(&text)
                .map_err(|e| CoSignError::MalformedResponse(e.to_string()))
        };

        match timeout(self.timeout_duration, request).await {
            Ok(result) => result,
            Err(_) => Err(CoSignError::Http(format!(
                "timeout after {} seconds",
                self.timeout_duration.as_secs()
            ))),
        }
    }
}
