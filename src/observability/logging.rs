//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber for binaries and demos
//! - Map the config's log level / trace flag onto an `EnvFilter`
//!
//! `RUST_LOG` always wins over the configured level.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Build the filter directive for the given observability settings.
pub fn filter_directive(config: &ObservabilityConfig) -> String {
    if config.trace {
        "cloud_wallet=trace".to_string()
    } else {
        format!("cloud_wallet={}", config.log_level)
    }
}

/// Install a global fmt subscriber. Safe to call more than once.
pub fn init_logging(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| filter_directive(config).into());

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
