//! Account creation and the caller-supplied selection hooks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::accounts::types::{AccountError, AccountResult};

const CREATION_TIMEOUT: Duration = Duration::from_secs(30);

/// The key and email an account should be created for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccountRequest {
    pub public_key: String,
    pub email: String,
}

/// Creates an on-chain account for a wallet key.
#[async_trait]
pub trait AccountCreator: Send + Sync {
    /// Returns the created account name.
    async fn create_account(&self, request: &NewAccountRequest, suggested_name: Option<&str>) -> AccountResult<String>;
}

/// Picks one of several accounts controlled by the same key.
#[async_trait]
pub trait AccountSelector: Send + Sync {
    async fn select_account(&self, accounts: &[String]) -> String;
}

/// Suggests a name for an account about to be created.
#[async_trait]
pub trait AccountNameSuggester: Send + Sync {
    async fn suggest_name(&self, request: &NewAccountRequest) -> Option<String>;
}

#[async_trait]
impl<F> AccountSelector for F
where
    F: Fn(&[String]) -> String + Send + Sync,
{
    async fn select_account(&self, accounts: &[String]) -> String {
        self(accounts)
    }
}

#[async_trait]
impl<F> AccountNameSuggester for F
where
    F: Fn(&NewAccountRequest) -> Option<String> + Send + Sync,
{
    async fn suggest_name(&self, request: &NewAccountRequest) -> Option<String> {
        self(request)
    }
}

/// Fallback selection: the first known name.
pub fn default_selection(accounts: &[String]) -> Option<String> {
    accounts.first().cloned()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EndpointRequest<'a> {
    owner_key: &'a str,
    active_key: &'a str,
    jwt: &'a str,
    suggested_name: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EndpointResponse {
    account_name: String,
}

/// Creates accounts through an HTTP endpoint.
#[derive(Clone, Debug)]
pub struct EndpointCreator {
    http: reqwest::Client,
    endpoint: String,
}

impl EndpointCreator {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// `POST {endpoint}` with the key as owner and active key.
    pub async fn create(&self, request: &NewAccountRequest, jwt: &str, suggested_name: Option<&str>) -> AccountResult<String> {
        let body = EndpointRequest {
            owner_key: &request.public_key,
            active_key: &request.public_key,
            jwt,
            suggested_name,
        };

        let call = async {
            let response = self
                .http
                .post(&self.endpoint)
                .json(&body)
                .send()
                .await
                .map_err(|e| AccountError::Creation(e.to_string()))?;
            let status = response.status();
            let text = response.text().await.map_err(|e| AccountError::Creation(e.to_string()))?;
            if !status.is_success() {
                return Err(AccountError::Creation(format!("HTTP {}: {}", status.as_u16(), text)));
            }
            serde_json::from_str::<EndpointResponse>(&text)
                .map(|r| r.account_name)
                .map_err(|e| AccountError::Creation(format!("unexpected response: {}", e)))
        };

        match tokio::time::timeout(CREATION_TIMEOUT, call).await {
            Ok(result) => result,
            Err(_) => Err(AccountError::Creation(format!("{} timed out", self.endpoint))),
        }
    }
}

/// How a missing account gets created.
#[derive(Clone, Default)]
pub enum AccountCreation {
    #[default]
    Disabled,
    Endpoint(EndpointCreator),
    Creator(Arc<dyn AccountCreator>),
}

impl AccountCreation {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, AccountCreation::Disabled)
    }
}

impl std::fmt::Debug for AccountCreation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountCreation::Disabled => f.write_str("Disabled"),
            AccountCreation::Endpoint(creator) => f.debug_tuple("Endpoint").field(&creator.endpoint).finish(),
            AccountCreation::Creator(_) => f.write_str("Creator"),
        }
    }
}
