//! Wallet types and error definitions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::blockchain::{ChainError, ChainId, PackedTransaction, Transaction};
use crate::fuel::CoSignError;

/// Errors reported by the wallet provider.
#[derive(Debug, Error)]
pub enum WalletError {
    /// The user declined the signing prompt.
    #[error("Request denied by the user")]
    Denied,

    #[error("Wallet provider error: {0}")]
    Provider(String),
}

/// Result type for wallet-provider calls.
pub type WalletResult<T> = Result<T, WalletError>;

/// Errors from signing a transaction through a `User`.
#[derive(Debug, Error)]
pub enum SignError {
    #[error("Transaction canceled by the user")]
    Canceled,

    #[error("Failed to send transaction: {0}")]
    Failed(String),

    #[error("{0} is not supported by this wallet")]
    Unsupported(&'static str),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    CoSign(#[from] CoSignError),
}

impl From<WalletError> for SignError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::Denied => SignError::Canceled,
            WalletError::Provider(msg) => SignError::Failed(msg),
        }
    }
}

/// Result type for signing operations.
pub type SignResult<T> = Result<T, SignError>;

/// Addresses the wallet provider issues for one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletAddresses {
    pub eos_address: String,
    #[serde(default)]
    pub sol_address: String,
    #[serde(default)]
    pub eth_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtraSigningData {
    pub chain_id: ChainId,
}

/// Payload handed to the wallet provider for signing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningRequest {
    pub raw_transaction: Transaction,
    pub extra_signing_data: ExtraSigningData,
}

/// Options for `User::sign_transaction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignOptions {
    pub broadcast: bool,
}

impl SignOptions {
    pub fn broadcast() -> Self {
        Self { broadcast: true }
    }

    pub fn sign_only() -> Self {
        Self { broadcast: false }
    }
}

/// Outcome of `User::sign_transaction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignResponse {
    pub was_broadcast: bool,
    pub transaction_id: String,
    pub status: String,
    pub transaction: PackedTransaction,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_error_mapping() {
        assert!(matches!(SignError::from(WalletError::Denied), SignError::Canceled));
        let err = SignError::from(WalletError::Provider("offline".into()));
        assert_eq!(err.to_string(), "Failed to send transaction: offline");
    }

    #[test]
    fn test_addresses_camel_case() {
        let json = r#"{"eosAddress":"EOS6abc","solAddress":"sol","ethAddress":"0x1"}"#;
        let addresses: WalletAddresses = serde_json::from_str(json).unwrap();
        assert_eq!(addresses.eos_address, "EOS6abc");
    }
}
