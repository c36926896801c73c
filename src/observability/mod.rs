//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters and gauges through the `metrics` facade)
//!
//! Consumers:
//!     → whatever subscriber / recorder the embedding application installs
//! ```
//!
//! # Design Decisions
//! - The library never installs a metrics recorder; the facade is a no-op until
//!   the host installs one
//! - Credentials and JWTs are never logged, only their presence

pub mod logging;
pub mod metrics;
