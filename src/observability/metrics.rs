//! Metrics collection.
//!
//! # Metrics
//! - `cloud_logins_total` (counter): completed logins by transport
//! - `cloud_cosign_outcomes_total` (counter): resource provider outcomes
//! - `cloud_transactions_total` (counter): transactions by result
//! - `cloud_resource_provider_available` (gauge): 1=available, 0=unavailable
//!
//! # Design Decisions
//! - Low-overhead metric updates through the `metrics` facade
//! - Labels carry only bounded values (transport, outcome, result)

/// Record a completed login.
pub fn record_login(transport: &'static str) {
    metrics::counter!("cloud_logins_total", "transport" => transport).increment(1);
}

/// Record a resource provider response outcome.
pub fn record_cosign_outcome(outcome: &'static str) {
    metrics::counter!("cloud_cosign_outcomes_total", "outcome" => outcome).increment(1);
}

/// Record the end of a `transact` call.
pub fn record_transaction(success: bool) {
    let result = if success { "success" } else { "failure" };
    metrics::counter!("cloud_transactions_total", "result" => result).increment(1);
}

/// Record the availability probe result.
pub fn record_provider_available(available: bool) {
    metrics::gauge!("cloud_resource_provider_available").set(if available { 1.0 } else { 0.0 });
}
