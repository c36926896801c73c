//! `User` wrapper that routes transactions through the resource provider.
//!
//! # Pipeline
//! ```text
//! CheckAvailability ──unavailable──→ inner.sign_transaction
//!   → FetchHeader → CollectABIs → BuildTransaction → RequestCoSign
//!       ├─ 200/402 → LocalCoSign → MergeSignatures → Broadcast
//!       ├─ 400     → inner.sign_transaction
//!       └─ other   → CoSignError::Protocol
//! ```
//!
//! Every state advances the step tracker once.

use std::sync::Arc;

use async_trait::async_trait;

use crate::blockchain::transaction::{collect_abis, distinct_contracts};
use crate::blockchain::{ChainApi, ChainId, PackedTransaction, PermissionLevel, Transaction, TransactionRequest};
use crate::config::FuelConfig;
use crate::fuel::client::ResourceProviderClient;
use crate::fuel::types::{CoSignError, CoSignOutcome, Grant};
use crate::observability::metrics;
use crate::progress::StepTracker;
use crate::wallet::{SignOptions, SignResponse, SignResult, User};

/// Step advances of a fully co-signed transaction.
pub const COSIGN_STEPS: u32 = 8;

pub struct FuelUser {
    inner: Arc<dyn User>,
    provider: ResourceProviderClient,
    chain: Arc<dyn ChainApi>,
    steps: Arc<StepTracker>,
    available: bool,
    expire_secs: u32,
    accept_fee_charged: bool,
}

impl FuelUser {
    /// Wrap `inner`, probing the provider once.
    pub async fn init(
        inner: Arc<dyn User>,
        config: &FuelConfig,
        chain: Arc<dyn ChainApi>,
        steps: Arc<StepTracker>,
    ) -> Self {
        let provider = ResourceProviderClient::new(&config.rpc_endpoint, config.request_timeout_secs);
        let available = provider.is_available().await;
        metrics::record_provider_available(available);
        tracing::info!(
            account = %inner.account_name(),
            endpoint = %config.rpc_endpoint,
            available = available,
            "Resource provider wrapper initialized"
        );

        Self {
            inner,
            provider,
            chain,
            steps,
            available,
            expire_secs: config.expire_secs,
            accept_fee_charged: config.accept_fee_charged,
        }
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    /// The wrapped user.
    pub fn inner(&self) -> &Arc<dyn User> {
        &self.inner
    }

    async fn build(&self, request: &TransactionRequest) -> SignResult<PackedTransaction> {
        let header = self.chain.get_info().await?.transaction_header(self.expire_secs)?;
        self.steps.advance();

        let abis = collect_abis(self.chain.as_ref(), &distinct_contracts(&request.actions)).await;
        self.steps.advance();

        let transaction = Transaction::new(header, request).encode_actions(&abis)?;
        let packed = PackedTransaction::from_transaction(&transaction, Vec::new())?;
        self.steps.advance();
        Ok(packed)
    }

    async fn finish(&self, grant: Grant, options: SignOptions) -> SignResult<SignResponse> {
        let mut working = grant.transaction;
        working.signatures = grant.signatures.clone();

        let local = self
            .inner
            .sign_transaction(TransactionRequest::from(working), SignOptions::sign_only())
            .await?;
        self.steps.advance();
        let mut signatures: Vec<String> = local
            .transaction
            .signatures
            .into_iter()
            .filter(|s| !s.trim().is_empty())
            .collect();
        if signatures.is_empty() {
            return Err(CoSignError::SigningIncomplete.into());
        }

        signatures.extend(grant.signatures);
        let packed = PackedTransaction {
            signatures,
            ..local.transaction
        };
        self.steps.advance();

        if !options.broadcast {
            return Ok(SignResponse {
                was_broadcast: false,
                transaction_id: String::new(),
                status: String::new(),
                transaction: packed,
            });
        }

        let pushed = self.chain.push_transaction(&packed).await?;
        self.steps.advance();
        tracing::info!(
            account = %self.inner.account_name(),
            transaction_id = %pushed.transaction_id,
            "Co-signed transaction broadcast"
        );

        Ok(SignResponse {
            was_broadcast: true,
            transaction_id: pushed.transaction_id.clone(),
            status: pushed.status(),
            transaction: packed,
        })
    }
}

#[async_trait]
impl User for FuelUser {
    async fn sign_transaction(&self, request: TransactionRequest, options: SignOptions) -> SignResult<SignResponse> {
        self.steps.advance();
        if !self.available {
            return self.inner.sign_transaction(request, options).await;
        }

        let packed = self.build(&request).await?;

        let signer = PermissionLevel::new(self.inner.account_name(), self.inner.permission());
        let response = self.provider.request_transaction(&signer, &packed).await?;
        let outcome = CoSignOutcome::from_response(response, self.accept_fee_charged)?;
        metrics::record_cosign_outcome(outcome.label());
        self.steps.advance();

        match outcome {
            CoSignOutcome::FreeGranted(grant) | CoSignOutcome::FeeGranted(grant) => self.finish(grant, options).await,
            CoSignOutcome::Refused => {
                tracing::info!(account = %signer.actor, "Resource provider declined; signing without co-signature");
                self.inner.sign_transaction(request, options).await
            }
            CoSignOutcome::Unrecognized(code) => Err(CoSignError::Protocol {
                code,
                endpoint: self.provider.endpoint().to_string(),
            }
            .into()),
        }
    }

    fn account_name(&self) -> &str {
        self.inner.account_name()
    }

    fn permission(&self) -> &str {
        self.inner.permission()
    }

    fn keys(&self) -> Vec<String> {
        self.inner.keys()
    }

    fn chain_id(&self) -> &ChainId {
        self.inner.chain_id()
    }

    async fn verify_key_ownership(&self, challenge: &str) -> SignResult<bool> {
        self.inner.verify_key_ownership(challenge).await
    }

    async fn sign_arbitrary(&self, public_key: &str, data: &str, help_text: &str) -> SignResult<String> {
        self.inner.sign_arbitrary(public_key, data, help_text).await
    }
}

impl std::fmt::Debug for FuelUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FuelUser")
            .field("account_name", &self.inner.account_name())
            .field("endpoint", &self.provider.endpoint())
            .field("available", &self.available)
            .finish()
    }
}
