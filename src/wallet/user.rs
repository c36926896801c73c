//! The `User` capability and its wallet-provider implementation.

use std::sync::Arc;

use async_trait::async_trait;

use crate::blockchain::transaction::{collect_abis, contracts_needing_abi};
use crate::blockchain::{ChainApi, ChainId, PackedTransaction, Transaction, TransactionRequest};
use crate::wallet::provider::WalletProvider;
use crate::wallet::types::{ExtraSigningData, SignError, SignOptions, SignResponse, SignResult, SigningRequest};

/// Expiration window for transactions the wallet signs on its own.
pub const WALLET_EXPIRE_SECS: u32 = 120;

const DEFAULT_REASON: &str = "sign this transaction";

/// Produces the reason shown to the user when a transaction is signed.
pub type ReasonCallback = Arc<dyn Fn(&TransactionRequest) -> String + Send + Sync>;

/// A signed-in identity that can sign transactions.
#[async_trait]
pub trait User: Send + Sync {
    /// Sign `request` and, if `options.broadcast`, push it to the chain.
    async fn sign_transaction(&self, request: TransactionRequest, options: SignOptions) -> SignResult<SignResponse>;

    fn account_name(&self) -> &str;

    fn permission(&self) -> &str;

    fn keys(&self) -> Vec<String>;

    fn chain_id(&self) -> &ChainId;

    async fn verify_key_ownership(&self, challenge: &str) -> SignResult<bool>;

    async fn sign_arbitrary(&self, public_key: &str, data: &str, help_text: &str) -> SignResult<String>;
}

/// `User` backed by the wallet provider.
pub struct WalletUser {
    account_name: String,
    permission: String,
    public_key: String,
    chain_id: ChainId,
    chain: Arc<dyn ChainApi>,
    wallet: Arc<dyn WalletProvider>,
    reason: Option<ReasonCallback>,
}

impl WalletUser {
    pub fn new(
        account_name: impl Into<String>,
        public_key: impl Into<String>,
        chain_id: ChainId,
        chain: Arc<dyn ChainApi>,
        wallet: Arc<dyn WalletProvider>,
    ) -> Self {
        let user = Self {
            account_name: account_name.into(),
            permission: "active".to_string(),
            public_key: public_key.into(),
            chain_id,
            chain,
            wallet,
            reason: None,
        };
        tracing::debug!(account = %user.account_name, chain_id = %user.chain_id, "Wallet user created");
        user
    }

    pub fn with_reason_callback(mut self, reason: Option<ReasonCallback>) -> Self {
        self.reason = reason;
        self
    }

    async fn build(&self, request: &TransactionRequest) -> SignResult<Transaction> {
        let header = match &request.header {
            Some(header) => header.clone(),
            None => self.chain.get_info().await?.transaction_header(WALLET_EXPIRE_SECS)?,
        };

        let mut pending = request.actions.clone();
        pending.extend(request.context_free_actions.iter().cloned());
        let abis = collect_abis(self.chain.as_ref(), &contracts_needing_abi(&pending)).await;

        Ok(Transaction::new(header, request).encode_actions(&abis)?)
    }
}

#[async_trait]
impl User for WalletUser {
    async fn sign_transaction(&self, request: TransactionRequest, options: SignOptions) -> SignResult<SignResponse> {
        tracing::debug!(
            account = %self.account_name,
            actions = request.actions.len(),
            broadcast = options.broadcast,
            "Signing transaction with wallet"
        );

        let transaction = self.build(&request).await?;
        let reason = match &self.reason {
            Some(callback) => callback(&request),
            None => DEFAULT_REASON.to_string(),
        };

        let signing_request = SigningRequest {
            raw_transaction: transaction.clone(),
            extra_signing_data: ExtraSigningData {
                chain_id: self.chain_id.clone(),
            },
        };
        let signature = self.wallet.sign_transaction(&signing_request, &reason).await?;
        let signatures = if signature.trim().is_empty() {
            tracing::warn!(account = %self.account_name, "Wallet returned an empty signature");
            Vec::new()
        } else {
            vec![signature]
        };
        let packed = PackedTransaction::from_transaction(&transaction, signatures)?;

        if !options.broadcast {
            return Ok(SignResponse {
                was_broadcast: false,
                transaction_id: String::new(),
                status: String::new(),
                transaction: packed,
            });
        }

        let pushed = self.chain.push_transaction(&packed).await?;
        Ok(SignResponse {
            was_broadcast: true,
            transaction_id: pushed.transaction_id.clone(),
            status: pushed.status(),
            transaction: packed,
        })
    }

    fn account_name(&self) -> &str {
        &self.account_name
    }

    fn permission(&self) -> &str {
        &self.permission
    }

    fn keys(&self) -> Vec<String> {
        if self.public_key.is_empty() {
            Vec::new()
        } else {
            vec![self.public_key.clone()]
        }
    }

    fn chain_id(&self) -> &ChainId {
        &self.chain_id
    }

    async fn verify_key_ownership(&self, _challenge: &str) -> SignResult<bool> {
        Ok(true)
    }

    async fn sign_arbitrary(&self, _public_key: &str, _data: &str, _help_text: &str) -> SignResult<String> {
        Err(SignError::Unsupported("signArbitrary"))
    }
}

impl std::fmt::Debug for WalletUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletUser")
            .field("account_name", &self.account_name)
            .field("permission", &self.permission)
            .field("chain_id", &self.chain_id)
            .finish()
    }
}
