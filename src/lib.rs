//! Cloud wallet session library.
//!
//! Logs a user in through a wallet provider, resolves the on-chain account
//! the wallet key controls, and signs transactions, optionally with a
//! resource provider co-signing and paying for them.

// Core subsystems
pub mod accounts;
pub mod blockchain;
pub mod fuel;
pub mod session;
pub mod wallet;

// Shared plumbing
pub mod capability;
pub mod config;
pub mod events;
pub mod observability;
pub mod progress;
pub mod storage;

pub use accounts::Credentials;
pub use config::CloudConfig;
pub use session::{CloudSession, LoggedUser, SessionError, TransactResponse};
