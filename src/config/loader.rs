//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::CloudConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading and login-strategy selection.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    /// None of `login.local`, `login.redirect`, `login.iframe` is set.
    #[error("No login strategy configured: set one of login.local, login.redirect or login.iframe")]
    MissingLoginStrategy,

    /// More than one login strategy is set.
    #[error("Conflicting login strategies configured: {0}")]
    ConflictingLoginStrategies(String),

    /// Widget login requested but `login.local.identity` is absent.
    #[error("Login without credentials requires login.local.identity to be configured")]
    MissingIdentityWidget,
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<CloudConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<CloudConfig, ConfigError> {
    let config: CloudConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    config.login_strategy()?;
    Ok(config)
}
