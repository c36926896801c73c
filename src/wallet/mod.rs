//! Wallet-provider integration.
//!
//! # Data Flow
//! ```text
//! WalletConnector::connect(app_id, email)
//!     → WalletProvider (addresses, payload signing)
//!     → WalletUser (User capability: build, sign, pack, broadcast)
//!     → optionally wrapped by fuel::FuelUser
//! ```
//!
//! # Security Constraints
//! - Private keys never reach this crate; only signatures do
//! - Signing payloads are logged by action count only

pub mod provider;
pub mod types;
pub mod user;

pub use provider::{WalletConnector, WalletProvider};
pub use types::{SignError, SignOptions, SignResponse, SignResult, SigningRequest, WalletAddresses, WalletError};
pub use user::{ReasonCallback, User, WalletUser};
