//! Credentials → on-chain account name.
//!
//! # Resolution order
//! ```text
//! explicit account in credentials → seed cache
//! cached names ──some──→ select
//!      │ none
//!      ↓
//! wallet addresses → key → accounts index ──some──→ cache all, select
//!      │ none
//!      ↓
//! create (endpoint | creator) → cache, select
//! ```
//!
//! The cache is saved after every resolution.

use std::sync::{Arc, Mutex};

use crate::accounts::cache::AccountCache;
use crate::accounts::creation::{
    default_selection, AccountCreation, AccountNameSuggester, AccountSelector, NewAccountRequest,
};
use crate::accounts::types::{AccountError, AccountResult, Credentials, ResolvedAccount};
use crate::blockchain::{ChainApi, ChainId};
use crate::wallet::WalletProvider;

pub struct AccountResolver {
    chain_id: ChainId,
    chain: Arc<dyn ChainApi>,
    cache: Arc<AccountCache>,
    creation: Mutex<AccountCreation>,
    selector: Mutex<Option<Arc<dyn AccountSelector>>>,
    suggester: Mutex<Option<Arc<dyn AccountNameSuggester>>>,
}

impl AccountResolver {
    pub fn new(chain_id: ChainId, chain: Arc<dyn ChainApi>, cache: Arc<AccountCache>) -> Self {
        Self {
            chain_id,
            chain,
            cache,
            creation: Mutex::new(AccountCreation::Disabled),
            selector: Mutex::new(None),
            suggester: Mutex::new(None),
        }
    }

    pub fn with_creation(self, creation: AccountCreation) -> Self {
        self.set_creation(creation);
        self
    }

    pub fn set_creation(&self, creation: AccountCreation) {
        *self.creation.lock().unwrap_or_else(|p| p.into_inner()) = creation;
    }

    /// Install a selector consulted once, on the next multi-account choice.
    pub fn set_account_selector(&self, selector: Arc<dyn AccountSelector>) {
        *self.selector.lock().unwrap_or_else(|p| p.into_inner()) = Some(selector);
    }

    pub fn set_name_suggester(&self, suggester: Arc<dyn AccountNameSuggester>) {
        *self.suggester.lock().unwrap_or_else(|p| p.into_inner()) = Some(suggester);
    }

    pub fn cache(&self) -> &Arc<AccountCache> {
        &self.cache
    }

    pub fn chain_id(&self) -> &ChainId {
        &self.chain_id
    }

    pub async fn resolve(&self, credentials: &Credentials, wallet: &dyn WalletProvider) -> AccountResult<ResolvedAccount> {
        let email = credentials.email.as_str();
        if email.is_empty() {
            return Err(AccountError::NoEmail);
        }

        if let Some(account) = credentials.account.as_deref().filter(|a| !a.is_empty()) {
            self.cache.select(email, &self.chain_id, account);
        }

        let resolved = self.resolve_uncached(credentials, wallet).await?;
        self.cache.select(email, &self.chain_id, &resolved.account);
        self.cache.set_logged(Some(email.to_string()));
        self.cache.save()?;

        tracing::info!(email = %email, account = %resolved.account, chain_id = %self.chain_id, "Account resolved");
        Ok(resolved)
    }

    /// Record an account resolved elsewhere (a remote login frame) as the
    /// selected account for `email`.
    pub fn record_external(&self, email: &str, account: &str) -> AccountResult<()> {
        if email.is_empty() {
            return Err(AccountError::NoEmail);
        }
        self.cache.select(email, &self.chain_id, account);
        self.cache.set_logged(Some(email.to_string()));
        self.cache.save()?;
        tracing::info!(email = %email, account = %account, chain_id = %self.chain_id, "External account recorded");
        Ok(())
    }

    async fn resolve_uncached(&self, credentials: &Credentials, wallet: &dyn WalletProvider) -> AccountResult<ResolvedAccount> {
        let email = credentials.email.as_str();

        let cached = self.cache.accounts(email, &self.chain_id);
        if !cached.is_empty() {
            let account = self.choose(email, &cached, credentials.account.as_deref()).await;
            let public_key = match self.cache.wallet(email, &self.chain_id) {
                Some(addresses) => addresses.eos_address,
                None => self.fetch_public_key(email, wallet).await?,
            };
            tracing::debug!(email = %email, account = %account, "Using cached account");
            return Ok(ResolvedAccount { account, public_key });
        }

        let public_key = self.fetch_public_key(email, wallet).await?;
        let names = self.chain.get_key_accounts(&public_key).await?;
        if !names.is_empty() {
            self.cache.add_accounts(email, &self.chain_id, &names);
            let account = self.choose(email, &names, None).await;
            return Ok(ResolvedAccount { account, public_key });
        }

        let request = NewAccountRequest {
            public_key: public_key.clone(),
            email: email.to_string(),
        };
        let account = self.create(&request, &credentials.jwt).await?;
        self.cache.add_accounts(email, &self.chain_id, std::slice::from_ref(&account));
        Ok(ResolvedAccount { account, public_key })
    }

    async fn fetch_public_key(&self, email: &str, wallet: &dyn WalletProvider) -> AccountResult<String> {
        let addresses = wallet.get_wallet().await?;
        let public_key = addresses.eos_address.clone();
        self.cache.set_wallet(email, &self.chain_id, addresses);
        Ok(public_key)
    }

    async fn choose(&self, email: &str, accounts: &[String], explicit: Option<&str>) -> String {
        if let Some(account) = explicit.filter(|a| accounts.iter().any(|n| n == a)) {
            return account.to_string();
        }
        if accounts.len() == 1 {
            return accounts[0].clone();
        }

        let selector = self.selector.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(selector) = selector {
            return selector.select_account(accounts).await;
        }
        self.cache
            .selected(email, &self.chain_id)
            .filter(|s| accounts.contains(s))
            .or_else(|| default_selection(accounts))
            .unwrap_or_default()
    }

    async fn create(&self, request: &NewAccountRequest, jwt: &str) -> AccountResult<String> {
        let creation = self.creation.lock().unwrap_or_else(|p| p.into_inner()).clone();
        if !creation.is_enabled() {
            return Err(AccountError::NoCreationMethod);
        }

        let suggester = self.suggester.lock().unwrap_or_else(|p| p.into_inner()).clone();
        let suggestion = match suggester {
            Some(suggester) => suggester.suggest_name(request).await,
            None => None,
        };

        tracing::info!(email = %request.email, suggested = ?suggestion, "Creating account");
        match creation {
            AccountCreation::Endpoint(endpoint) => endpoint.create(request, jwt, suggestion.as_deref()).await,
            AccountCreation::Creator(creator) => creator.create_account(request, suggestion.as_deref()).await,
            AccountCreation::Disabled => Err(AccountError::NoCreationMethod),
        }
    }
}

impl std::fmt::Debug for AccountResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountResolver")
            .field("chain_id", &self.chain_id)
            .field("cache", &self.cache)
            .finish()
    }
}
