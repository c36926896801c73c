//! Account resolution subsystem.
//!
//! # Data Flow
//! ```text
//! Credentials (email, jwt, account?)
//!     → resolver.rs (cache → key index → creation)
//!     → cache.rs (per email and chain, persisted through KeyValueStore)
//!     → ResolvedAccount (account name + wallet public key)
//! ```

pub mod cache;
pub mod creation;
pub mod resolver;
pub mod types;

pub use cache::{AccountCache, AccountEntry, ACCOUNTS_KEY};
pub use creation::{
    AccountCreation, AccountCreator, AccountNameSuggester, AccountSelector, EndpointCreator, NewAccountRequest,
};
pub use resolver::AccountResolver;
pub use types::{AccountError, AccountResult, Credentials, ResolvedAccount};
