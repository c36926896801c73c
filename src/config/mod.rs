//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → CloudConfig (validated, immutable)
//!     → shared via Arc with the session, resolver and co-signing wrapper
//! ```
//!
//! # Design Decisions
//! - Config is immutable once a session is built; `CloudSession::reset` rebuilds
//!   derived state from the same config
//! - All fields have defaults to allow minimal configs
//! - Exactly one login strategy must be configured; the check runs when the
//!   strategy is first needed so a session can still be built and inspected

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    ChainConfig, CloudConfig, FuelConfig, IdentityConfig, IframeLoginConfig, LocalLoginConfig,
    LoginConfig, LoginStrategy, ObservabilityConfig, RedirectLoginConfig, WalletConfig,
};
