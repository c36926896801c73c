//! Account name caching and persistence.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::accounts::types::AccountResult;
use crate::blockchain::ChainId;
use crate::storage::KeyValueStore;
use crate::wallet::WalletAddresses;

/// Store key of the persisted cache.
pub const ACCOUNTS_KEY: &str = "cloud-wallet.accounts";

/// Known accounts of one email on one chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountEntry {
    #[serde(default)]
    pub accounts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet: Option<WalletAddresses>,
}

impl AccountEntry {
    /// Append `name` unless already known.
    pub fn add(&mut self, name: &str) -> bool {
        if self.accounts.iter().any(|a| a == name) {
            return false;
        }
        self.accounts.push(name.to_string());
        true
    }

    /// Select `name`, adding it first if needed.
    pub fn select(&mut self, name: &str) {
        self.add(name);
        self.selected = Some(name.to_string());
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Persisted {
    #[serde(default)]
    logged: Option<String>,
    /// email → chain id → entry
    #[serde(default)]
    accounts: HashMap<String, HashMap<String, AccountEntry>>,
}

/// Thread-safe account cache keyed by `(email, chain id)`.
///
/// Entries are never removed and account lists only grow.
pub struct AccountCache {
    inner: DashMap<(String, String), AccountEntry>,
    logged: Mutex<Option<String>>,
    store: Arc<dyn KeyValueStore>,
}

impl AccountCache {
    /// Create an empty cache that persists into `store`.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            inner: DashMap::new(),
            logged: Mutex::new(None),
            store,
        }
    }

    /// Load the cache from `store`. Unreadable contents start an empty cache.
    pub fn load(store: Arc<dyn KeyValueStore>) -> AccountResult<Self> {
        let cache = Self::new(store);
        let Some(raw) = cache.store.get(ACCOUNTS_KEY)? else {
            return Ok(cache);
        };

        match serde_json::from_str::<Persisted>(&raw) {
            Ok(persisted) => {
                for (email, chains) in persisted.accounts {
                    for (chain, entry) in chains {
                        cache.inner.insert((email.clone(), chain), entry);
                    }
                }
                *cache.logged_slot() = persisted.logged;
                tracing::info!("Loaded {} account entries from store", cache.inner.len());
            }
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable account cache");
            }
        }
        Ok(cache)
    }

    /// Write the whole cache to the store.
    pub fn save(&self) -> AccountResult<()> {
        let mut persisted = Persisted {
            logged: self.logged(),
            accounts: HashMap::new(),
        };
        for r in self.inner.iter() {
            let (email, chain) = r.key().clone();
            persisted
                .accounts
                .entry(email)
                .or_default()
                .insert(chain, r.value().clone());
        }

        let raw = serde_json::to_string(&persisted).map_err(crate::storage::StorageError::from)?;
        self.store.set(ACCOUNTS_KEY, &raw)?;
        tracing::debug!("Saved {} account entries", self.inner.len());
        Ok(())
    }

    fn key(email: &str, chain: &ChainId) -> (String, String) {
        (email.to_string(), chain.0.clone())
    }

    fn logged_slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.logged.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn entry(&self, email: &str, chain: &ChainId) -> Option<AccountEntry> {
        self.inner.get(&Self::key(email, chain)).map(|r| r.value().clone())
    }

    pub fn accounts(&self, email: &str, chain: &ChainId) -> Vec<String> {
        self.entry(email, chain).map(|e| e.accounts).unwrap_or_default()
    }

    pub fn selected(&self, email: &str, chain: &ChainId) -> Option<String> {
        self.entry(email, chain).and_then(|e| e.selected)
    }

    pub fn wallet(&self, email: &str, chain: &ChainId) -> Option<WalletAddresses> {
        self.entry(email, chain).and_then(|e| e.wallet)
    }

    pub fn add_accounts(&self, email: &str, chain: &ChainId, names: &[String]) {
        let mut entry = self.inner.entry(Self::key(email, chain)).or_default();
        for name in names {
            entry.add(name);
        }
    }

    pub fn select(&self, email: &str, chain: &ChainId, name: &str) {
        self.inner.entry(Self::key(email, chain)).or_default().select(name);
    }

    pub fn set_wallet(&self, email: &str, chain: &ChainId, wallet: WalletAddresses) {
        self.inner.entry(Self::key(email, chain)).or_default().wallet = Some(wallet);
    }

    /// Last logged email.
    pub fn logged(&self) -> Option<String> {
        self.logged_slot().clone()
    }

    pub fn set_logged(&self, email: Option<String>) {
        *self.logged_slot() = email;
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl std::fmt::Debug for AccountCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountCache")
            .field("entries", &self.inner.len())
            .field("logged", &self.logged())
            .finish()
    }
}
