//! Account resolution types and error definitions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::blockchain::ChainError;
use crate::storage::StorageError;
use crate::wallet::WalletError;

/// Errors from resolving or creating an account.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("An email is required to resolve an account")]
    NoEmail,

    #[error("No account found and no account creation method is configured")]
    NoCreationMethod,

    /// The key → accounts lookup failed.
    #[error("Account lookup failed: {0}")]
    Lookup(#[from] ChainError),

    #[error("Account creation failed: {0}")]
    Creation(String),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result type for account operations.
pub type AccountResult<T> = Result<T, AccountError>;

/// What a login hands to the resolver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    #[serde(default)]
    pub jwt: String,
    /// Known account name, e.g. from a resume URL.
    #[serde(default)]
    pub account: Option<String>,
}

impl Credentials {
    pub fn new(email: impl Into<String>, jwt: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            jwt: jwt.into(),
            account: None,
        }
    }

    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }
}

/// Outcome of a resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAccount {
    pub account: String,
    /// Wallet public key; empty when the wallet was never queried.
    pub public_key: String,
}
