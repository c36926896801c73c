//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate endpoint URLs and required identifiers
//! - Validate value ranges (timeouts > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: CloudConfig → Result<(), Vec<ValidationError>>
//! - Login-strategy cardinality is checked by `CloudConfig::login_strategy`

use std::fmt;

use url::Url;

use crate::config::schema::CloudConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate everything except login-strategy cardinality.
pub fn validate_config(config: &CloudConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.chain.chain_id.trim().is_empty() {
        errors.push(ValidationError::new("chain.chain_id", "must not be empty"));
    }
    check_url(&mut errors, "chain.rpc_endpoint", &config.chain.rpc_endpoint);
    if config.chain.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("chain.rpc_timeout_secs", "must be greater than 0"));
    }

    if config.wallet.app_id.trim().is_empty() {
        errors.push(ValidationError::new("wallet.app_id", "missing wallet-provider app id"));
    }

    if let Some(fuel) = &config.fuel {
        check_url(&mut errors, "fuel.rpc_endpoint", &fuel.rpc_endpoint);
        check_url(&mut errors, "fuel.hyperion_endpoint", &fuel.hyperion_endpoint);
        if fuel.expire_secs == 0 {
            errors.push(ValidationError::new("fuel.expire_secs", "must be greater than 0"));
        }
    }

    if let Some(local) = &config.login.local {
        if let Some(identity) = &local.identity {
            if identity.client_id.trim().is_empty() {
                errors.push(ValidationError::new("login.local.identity.client_id", "must not be empty"));
            }
        }
        if let Some(endpoint) = &local.account_creation_endpoint {
            check_url(&mut errors, "login.local.account_creation_endpoint", endpoint);
        }
        if let Some(page) = &local.account_creation_redirect {
            check_url(&mut errors, "login.local.account_creation_redirect", page);
        }
    }
    if let Some(redirect) = &config.login.redirect {
        check_url(&mut errors, "login.redirect.url", &redirect.url);
        if let Some(callback) = &redirect.callback {
            check_url(&mut errors, "login.redirect.callback", callback);
        }
    }
    if let Some(iframe) = &config.login.iframe {
        check_url(&mut errors, "login.iframe.url", &iframe.url);
        if !iframe.modal && iframe.container.is_none() {
            errors.push(ValidationError::new(
                "login.iframe.container",
                "required when login.iframe.modal is false",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if let Err(e) = Url::parse(value) {
        errors.push(ValidationError::new(field, format!("invalid URL '{}': {}", value, e)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{FuelConfig, IframeLoginConfig};

    fn valid_config() -> CloudConfig {
        let mut config = CloudConfig::default();
        config.chain.chain_id = "abc".into();
        config.wallet.app_id = "app".into();
        config
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_app_id() {
        let mut config = valid_config();
        config.wallet.app_id.clear();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "wallet.app_id");
    }

    #[test]
    fn test_fuel_endpoints_checked() {
        let mut config = valid_config();
        config.fuel = Some(FuelConfig {
            rpc_endpoint: "fuel".into(),
            hyperion_endpoint: "https://history.example.net".into(),
            ..Default::default()
        });
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().starts_with("fuel.rpc_endpoint"));
    }

    #[test]
    fn test_inline_iframe_needs_container() {
        let mut config = valid_config();
        config.login.iframe = Some(IframeLoginConfig {
            url: "https://wallet.example.net".into(),
            ..Default::default()
        });
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "login.iframe.container");
    }
}
