//! Chain integration subsystem.
//!
//! # Data Flow
//! ```text
//! CloudConfig.chain / CloudConfig.fuel
//!     → client.rs (ChainApi capability, HTTP JSON-RPC implementation)
//!     → transaction.rs (header, ABI collection, assemble, pack)
//!     → serializer.rs (names, ABI-driven action data, transaction envelope)
//! ```
//!
//! # Constraints
//! - Every RPC call is bounded by the configured timeout
//! - Nothing here retries; callers decide how to degrade
//! - Signing never happens here; signatures come from the wallet provider
//!   or the resource provider

pub mod client;
pub mod serializer;
pub mod transaction;
pub mod types;

pub use client::{ChainApi, RpcChainClient};
pub use transaction::{PackedTransaction, SignedTransaction, Transaction, TransactionRequest};
pub use types::{Action, ActionData, ChainError, ChainId, ChainResult, PermissionLevel, TransactionHeader};
