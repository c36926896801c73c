//! Session types and error definitions.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::accounts::AccountError;
use crate::blockchain::PackedTransaction;
use crate::config::ConfigError;
use crate::events::EventBus;
use crate::session::identity::IdentityError;
use crate::storage::StorageError;
use crate::wallet::{SignError, SignResponse};

/// Store key of the persisted session.
pub const LOGGED_KEY: &str = "cloud-wallet.logged";

/// Step budget of a login (three advances).
pub const LOGIN_STEPS: u32 = 2;

/// Step budget of a transaction (eight advances).
pub const TRANSACTION_STEPS: u32 = 7;

/// Errors surfaced by `CloudSession`.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Account(#[from] AccountError),

    #[error(transparent)]
    Sign(#[from] SignError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// A required builder component was not supplied.
    #[error("Missing session component: {0}")]
    MissingComponent(&'static str),

    #[error("No user is logged in")]
    NotAuthenticated,

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// The signed-in identity as persisted and announced on the login bus.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggedUser {
    #[serde(default)]
    pub account: String,
    #[serde(default = "default_permission")]
    pub permission: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub keys: Vec<String>,
}

fn default_permission() -> String {
    "active".to_string()
}

impl LoggedUser {
    /// `true` when the record is enough to resume a session.
    pub fn is_resumable(&self) -> bool {
        !self.account.is_empty() && !self.email.is_empty()
    }
}

/// Result of `CloudSession::transact`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactResponse {
    pub was_broadcast: bool,
    pub transaction_id: String,
    pub status: String,
    pub transaction: PackedTransaction,
}

impl From<SignResponse> for TransactResponse {
    fn from(response: SignResponse) -> Self {
        Self {
            was_broadcast: response.was_broadcast,
            transaction_id: response.transaction_id,
            status: response.status,
            transaction: response.transaction,
        }
    }
}

/// Buses a session publishes on.
#[derive(Debug)]
pub struct SessionEvents {
    pub login: EventBus<LoggedUser>,
    pub logout: EventBus<()>,
    /// Step progress in `[0, 1]`, or `-1` to hide.
    pub progress: Arc<EventBus<f64>>,
    pub transaction: EventBus<TransactResponse>,
}

impl SessionEvents {
    pub fn new() -> Self {
        Self {
            login: EventBus::new("login"),
            logout: EventBus::new("logout"),
            progress: Arc::new(EventBus::new("progress")),
            transaction: EventBus::new("transaction"),
        }
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logged_user_storage_shape() {
        let raw = r#"{"account":"alice","email":"a@b.com","keys":["EOS7abc"]}"#;
        let logged: LoggedUser = serde_json::from_str(raw).unwrap();
        assert_eq!(logged.permission, "active");
        assert!(logged.is_resumable());

        let provisional = LoggedUser {
            email: "a@b.com".to_string(),
            ..Default::default()
        };
        assert!(!provisional.is_resumable());
    }
}
