//! Transaction building, ABI collection, and packing.
//!
//! # Responsibilities
//! - Derive transaction headers from chain info
//! - Collect contract ABIs concurrently
//! - Assemble, ABI-encode and pack transactions for transport

use std::collections::BTreeSet;

use chrono::Duration;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};

use crate::blockchain::client::ChainApi;
use crate::blockchain::serializer::{encode_transaction, AbiEncoder};
use crate::blockchain::types::{AbiSet, Action, ActionData, ChainError, ChainInfo, ChainResult, TransactionHeader};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionExtension {
    #[serde(rename = "type")]
    pub kind: u16,
    pub data: String,
}

/// A fully specified transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(flatten)]
    pub header: TransactionHeader,
    #[serde(default)]
    pub context_free_actions: Vec<Action>,
    pub actions: Vec<Action>,
    #[serde(default)]
    pub transaction_extensions: Vec<TransactionExtension>,
}

/// A transaction together with the signatures collected so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedTransaction {
    #[serde(flatten)]
    pub transaction: Transaction,
    #[serde(default)]
    pub signatures: Vec<String>,
    #[serde(default)]
    pub context_free_data: Vec<String>,
}

/// Transport envelope accepted by `push_transaction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackedTransaction {
    pub signatures: Vec<String>,
    pub compression: u8,
    pub packed_context_free_data: String,
    pub packed_trx: String,
}

/// What callers hand to `transact`: actions, optionally with a fixed header
/// and signatures gathered from other parties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionRequest {
    #[serde(default)]
    pub header: Option<TransactionHeader>,
    pub actions: Vec<Action>,
    #[serde(default)]
    pub context_free_actions: Vec<Action>,
    #[serde(default)]
    pub transaction_extensions: Vec<TransactionExtension>,
    #[serde(default)]
    pub signatures: Vec<String>,
}

impl TransactionRequest {
    pub fn from_actions(actions: Vec<Action>) -> Self {
        Self {
            actions,
            ..Default::default()
        }
    }
}

impl From<SignedTransaction> for TransactionRequest {
    fn from(signed: SignedTransaction) -> Self {
        Self {
            header: Some(signed.transaction.header),
            actions: signed.transaction.actions,
            context_free_actions: signed.transaction.context_free_actions,
            transaction_extensions: signed.transaction.transaction_extensions,
            signatures: signed.signatures,
        }
    }
}

impl ChainInfo {
    /// Header referencing the last irreversible block, expiring
    /// `expire_secs` after the head block time.
    pub fn transaction_header(&self, expire_secs: u32) -> ChainResult<TransactionHeader> {
        let head_time = chrono::NaiveDateTime::parse_from_str(
            self.head_block_time.trim_end_matches('Z'),
            "%Y-%m-%dT%H:%M:%S%.f",
        )
        .map_err(|e| ChainError::Decode(format!("head_block_time '{}': {}", self.head_block_time, e)))?;
        let expiration = head_time + Duration::seconds(expire_secs as i64);

        let block_id = hex::decode(&self.last_irreversible_block_id)
            .map_err(|e| ChainError::Decode(format!("last_irreversible_block_id: {}", e)))?;
        if block_id.len() < 12 {
            return Err(ChainError::Decode("last_irreversible_block_id too short".to_string()));
        }
        let ref_block_prefix = u32::from_le_bytes([block_id[8], block_id[9], block_id[10], block_id[11]]);

        Ok(TransactionHeader {
            expiration: expiration.format("%Y-%m-%dT%H:%M:%S").to_string(),
            ref_block_num: (self.last_irreversible_block_num & 0xffff) as u16,
            ref_block_prefix,
            max_net_usage_words: 0,
            max_cpu_usage_ms: 0,
            delay_sec: 0,
        })
    }
}

/// Distinct contracts referenced by `actions`, in sorted order.
pub fn distinct_contracts(actions: &[Action]) -> Vec<String> {
    actions
        .iter()
        .map(|a| a.account.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Distinct contracts whose actions still carry structured data.
pub fn contracts_needing_abi(actions: &[Action]) -> Vec<String> {
    let pending: Vec<Action> = actions.iter().filter(|a| !a.data.is_packed()).cloned().collect();
    distinct_contracts(&pending)
}

/// Fetch ABIs for `contracts` in parallel.
///
/// A contract whose ABI cannot be fetched (or has none) is left out of the
/// returned set rather than failing the whole collection.
pub async fn collect_abis(chain: &dyn ChainApi, contracts: &[String]) -> AbiSet {
    let lookups = contracts.iter().map(|contract| async move {
        match chain.get_abi(contract).await {
            Ok(abi) => (contract.clone(), abi),
            Err(e) => {
                tracing::warn!(contract = %contract, error = %e, "ABI lookup failed, treating as undefined");
                (contract.clone(), None)
            }
        }
    });

    join_all(lookups)
        .await
        .into_iter()
        .filter_map(|(contract, abi)| abi.map(|abi| (contract, abi)))
        .collect()
}

impl Transaction {
    /// Assemble a transaction from a header and caller actions.
    pub fn new(header: TransactionHeader, request: &TransactionRequest) -> Self {
        Self {
            header,
            context_free_actions: request.context_free_actions.clone(),
            actions: request.actions.clone(),
            transaction_extensions: request.transaction_extensions.clone(),
        }
    }

    /// Replace structured action data with its ABI-encoded hex form.
    pub fn encode_actions(mut self, abis: &AbiSet) -> ChainResult<Self> {
        for action in self.context_free_actions.iter_mut().chain(self.actions.iter_mut()) {
            if let ActionData::Fields(fields) = &action.data {
                let abi = abis
                    .get(&action.account)
                    .ok_or_else(|| ChainError::MissingAbi(action.account.clone()))?;
                let value = serde_json::Value::Object(fields.clone());
                let bytes = AbiEncoder::new(abi).encode_action_data(&action.name, &value)?;
                action.data = ActionData::Packed(hex::encode(bytes));
            }
        }
        Ok(self)
    }
}

impl PackedTransaction {
    /// Pack `trx` with the given signatures.
    pub fn from_transaction(trx: &Transaction, signatures: Vec<String>) -> ChainResult<Self> {
        Ok(Self {
            signatures,
            compression: 0,
            packed_context_free_data: String::new(),
            packed_trx: hex::encode(encode_transaction(trx)?),
        })
    }
}
