//! Resource provider wire types and error definitions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::blockchain::{PackedTransaction, PermissionLevel, SignedTransaction};

/// Errors from the co-signing pipeline.
#[derive(Debug, Error)]
pub enum CoSignError {
    /// The provider answered with a code the pipeline does not handle.
    #[error("Code {code} not expected from resource provider endpoint: {endpoint}")]
    Protocol { code: u16, endpoint: String },

    /// The wallet produced no signature for the co-signed transaction.
    #[error("Wallet returned no signatures for the co-signed transaction")]
    SigningIncomplete,

    /// A granting response did not carry a transaction.
    #[error("Malformed resource provider response: {0}")]
    MalformedResponse(String),

    #[error("Resource provider request failed: {0}")]
    Http(String),
}

/// Body of the co-sign request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoSignRequest<'a> {
    pub signer: &'a PermissionLevel,
    pub packed_transaction: &'a PackedTransaction,
}

/// Body of the co-sign response.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceProviderResponse {
    pub code: u16,
    #[serde(default)]
    pub data: Option<GrantData>,
}

/// Payload of a granting response.
#[derive(Debug, Clone, Deserialize)]
pub struct GrantData {
    /// `["transaction", {...}]`
    pub request: (serde_json::Value, SignedTransaction),
    #[serde(default)]
    pub signatures: Vec<String>,
}

/// A co-signed transaction ready for the user's own signature.
#[derive(Debug, Clone)]
pub struct Grant {
    pub transaction: SignedTransaction,
    pub signatures: Vec<String>,
}

/// How the provider answered a co-sign request.
#[derive(Debug, Clone)]
pub enum CoSignOutcome {
    /// Co-signed at no cost (200).
    FreeGranted(Grant),
    /// Co-signed with a fee action prepended (402).
    FeeGranted(Grant),
    /// Declined (400); the user pays for their own resources.
    Refused,
    Unrecognized(u16),
}

impl CoSignOutcome {
    /// Classify a response. With `accept_fee_charged` off a 402 counts as a refusal.
    pub fn from_response(response: ResourceProviderResponse, accept_fee_charged: bool) -> Result<Self, CoSignError> {
        let grant = |data: Option<GrantData>| {
            data.map(|data| Grant {
                transaction: data.request.1,
                signatures: data.signatures,
            })
            .ok_or_else(|| CoSignError::MalformedResponse(format!("code {} without data", response.code)))
        };

        match response.code {
            200 => Ok(CoSignOutcome::FreeGranted(grant(response.data)?)),
            402 if accept_fee_charged => Ok(CoSignOutcome::FeeGranted(grant(response.data)?)),
            402 | 400 => Ok(CoSignOutcome::Refused),
            code => Ok(CoSignOutcome::Unrecognized(code)),
        }
    }

    /// Bounded label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            CoSignOutcome::FreeGranted(_) => "free",
            CoSignOutcome::FeeGranted(_) => "fee",
            CoSignOutcome::Refused => "refused",
            CoSignOutcome::Unrecognized(_) => "unrecognized",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn granting(code: u16) -> ResourceProviderResponse {
        serde_json::from_value(serde_json::json!({
            "code": code,
            "data": {
                "request": ["transaction", {
                    "expiration": "2024-01-01T01:00:00",
                    "ref_block_num": 1,
                    "ref_block_prefix": 2,
                    "actions": [],
                    "signatures": []
                }],
                "signatures": ["SIG_K1_provider"]
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_classify_codes() {
        assert!(matches!(
            CoSignOutcome::from_response(granting(200), true).unwrap(),
            CoSignOutcome::FreeGranted(g) if g.signatures == vec!["SIG_K1_provider"]
        ));
        assert!(matches!(
            CoSignOutcome::from_response(granting(402), true).unwrap(),
            CoSignOutcome::FeeGranted(_)
        ));
        assert!(matches!(
            CoSignOutcome::from_response(granting(402), false).unwrap(),
            CoSignOutcome::Refused
        ));

        let refused: ResourceProviderResponse = serde_json::from_str(r#"{"code":400}"#).unwrap();
        assert!(matches!(CoSignOutcome::from_response(refused, true).unwrap(), CoSignOutcome::Refused));

        let conflict: ResourceProviderResponse = serde_json::from_str(r#"{"code":409}"#).unwrap();
        assert!(matches!(
            CoSignOutcome::from_response(conflict, true).unwrap(),
            CoSignOutcome::Unrecognized(409)
        ));
    }

    #[test]
    fn test_grant_without_data_is_malformed() {
        let response: ResourceProviderResponse = serde_json::from_str(r#"{"code":200}"#).unwrap();
        assert!(matches!(
            CoSignOutcome::from_response(response, true),
            Err(CoSignError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_protocol_error_message() {
        let err = CoSignError::Protocol {
            code: 409,
            endpoint: "https://fuel.example/v1/resource_provider/request_transaction".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Code 409 not expected from resource provider endpoint: https://fuel.example/v1/resource_provider/request_transaction"
        );
    }
}
