//! Session orchestration.
//!
//! # Data Flow
//! ```text
//! login(credentials?)
//!     → strategy: local (credentials | identity widget) / redirect / iframe
//!     → accounts::AccountResolver (account name + key)
//!     → WalletUser, wrapped by fuel::FuelUser when a provider is configured
//!     → LoggedUser persisted under `cloud-wallet.logged`, login event
//!
//! transact(request)
//!     → bound User (sign, co-sign, broadcast)
//!     → TransactResponse, transaction event
//! ```
//!
//! # Design Decisions
//! - External collaborators (wallet, host page, widget, store) are injected
//!   through the builder; the session owns them for its whole life
//! - Redirect transports suspend with `std::future::pending` once the page
//!   has been told to navigate away
//! - Resumed logins run with progress reporting switched off

pub mod host;
pub mod identity;
pub mod orchestrator;
pub mod types;

pub use host::{FrameContainer, FrameHandle, FrameMessage, FrameRequest, HostPage, LoginMessage};
pub use identity::{CredentialCallback, IdentityController, IdentityError, IdentityWidget};
pub use orchestrator::{CloudSession, CloudSessionBuilder, RedirectAccountCreator};
pub use types::{
    LoggedUser, SessionError, SessionEvents, SessionResult, TransactResponse, LOGGED_KEY, LOGIN_STEPS,
    TRANSACTION_STEPS,
};
