//! Resource provider ("fuel") co-signing.
//!
//! A `FuelUser` wraps any `User`: when the provider grants, it pays the
//! transaction's resources and contributes a signature; otherwise the
//! wrapped user signs alone.

pub mod client;
pub mod types;
pub mod wrapper;

pub use client::ResourceProviderClient;
pub use types::{CoSignError, CoSignOutcome, Grant, ResourceProviderResponse};
pub use wrapper::{FuelUser, COSIGN_STEPS};
