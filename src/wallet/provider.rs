//! Wallet-provider capability.
//!
//! The provider SDK is opaque to this crate: it can report the addresses it
//! holds for a user and sign a payload after showing the user a reason.

use std::sync::Arc;

use async_trait::async_trait;

use crate::wallet::types::{SigningRequest, WalletAddresses, WalletResult};

/// A wallet bound to one signed-in user.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Addresses issued to the user.
    async fn get_wallet(&self) -> WalletResult<WalletAddresses>;

    /// Sign `request`, prompting the user with `reason`. Returns the signature.
    async fn sign_transaction(&self, request: &SigningRequest, reason: &str) -> WalletResult<String>;
}

/// Opens wallet-provider sessions for a given user.
pub trait WalletConnector: Send + Sync {
    fn connect(&self, app_id: &str, email: &str) -> Arc<dyn WalletProvider>;
}
