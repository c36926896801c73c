//! Chain-specific types and error definitions.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hex chain id for strong typing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(pub String);

impl From<&str> for ChainId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors that can occur during chain operations.
#[derive(Debug, Error)]
pub enum ChainError {
    /// RPC connection or request failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// RPC request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// The node answered with a non-success HTTP status.
    #[error("RPC {path} returned HTTP {status}: {body}")]
    Http { path: String, status: u16, body: String },

    /// Response body did not match the expected shape.
    #[error("Failed to decode RPC response: {0}")]
    Decode(String),

    /// Transaction or action data could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Structured action data for a contract whose ABI is unknown.
    #[error("No ABI available for contract '{0}'")]
    MissingAbi(String),
}

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;

/// `actor@permission` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionLevel {
    pub actor: String,
    pub permission: String,
}

impl PermissionLevel {
    pub fn new(actor: impl Into<String>, permission: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            permission: permission.into(),
        }
    }
}

/// Action payload: already-packed hex bytes or structured fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionData {
    Packed(String),
    Fields(serde_json::Map<String, serde_json::Value>),
}

impl ActionData {
    pub fn is_packed(&self) -> bool {
        matches!(self, ActionData::Packed(_))
    }
}

/// A single contract action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub account: String,
    pub name: String,
    pub authorization: Vec<PermissionLevel>,
    pub data: ActionData,
}

/// Transaction header fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionHeader {
    /// `YYYY-MM-DDTHH:MM:SS`, UTC.
    pub expiration: String,
    pub ref_block_num: u16,
    pub ref_block_prefix: u32,
    #[serde(default)]
    pub max_net_usage_words: u32,
    #[serde(default)]
    pub max_cpu_usage_ms: u8,
    #[serde(default)]
    pub delay_sec: u32,
}

/// Subset of `/v1/chain/get_info` used to build headers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainInfo {
    pub chain_id: String,
    pub head_block_num: u32,
    pub head_block_time: String,
    pub last_irreversible_block_num: u32,
    pub last_irreversible_block_id: String,
}

/// Receipt of a pushed transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushResponse {
    pub transaction_id: String,
    #[serde(default)]
    pub processed: Processed,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Processed {
    #[serde(default)]
    pub receipt: Option<Receipt>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub status: String,
}

impl PushResponse {
    /// Receipt status, empty when the node did not report one.
    pub fn status(&self) -> String {
        self.processed
            .receipt
            .as_ref()
            .map(|r| r.status.clone())
            .unwrap_or_default()
    }
}

/// Contract interface definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Abi {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub types: Vec<AbiTypeDef>,
    #[serde(default)]
    pub structs: Vec<AbiStruct>,
    #[serde(default)]
    pub actions: Vec<AbiAction>,
    #[serde(default)]
    pub variants: Vec<AbiVariant>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbiTypeDef {
    pub new_type_name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbiStruct {
    pub name: String,
    #[serde(default)]
    pub base: String,
    pub fields: Vec<AbiField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbiField {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbiAction {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbiVariant {
    pub name: String,
    pub types: Vec<String>,
}

/// ABIs keyed by contract account.
pub type AbiSet = HashMap<String, Abi>;
