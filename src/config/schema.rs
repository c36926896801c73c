//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for a cloud wallet
//! session. All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::config::loader::ConfigError;

/// Root configuration for a cloud wallet session.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CloudConfig {
    /// Application name shown by the wallet provider.
    pub app_name: String,

    /// Chain the session acts on.
    pub chain: ChainConfig,

    /// Wallet-provider settings.
    pub wallet: WalletConfig,

    /// Optional resource provider that co-signs and pays for transactions.
    pub fuel: Option<FuelConfig>,

    /// Login strategy selection. Exactly one entry must be set.
    pub login: LoginConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            app_name: "CloudWallet".to_string(),
            chain: ChainConfig::default(),
            wallet: WalletConfig::default(),
            fuel: None,
            login: LoginConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Chain reference.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Hex chain id.
    pub chain_id: String,

    /// JSON-RPC endpoint URL (e.g. "https://mainnet.example.net:443").
    pub rpc_endpoint: String,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: String::new(),
            rpc_endpoint: "http://127.0.0.1:8888".to_string(),
            rpc_timeout_secs: 10,
        }
    }
}

/// Wallet-provider settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct WalletConfig {
    /// Application id registered with the wallet provider.
    pub app_id: String,
}

/// Resource provider endpoints.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FuelConfig {
    /// Resource provider base URL; probed for availability.
    pub rpc_endpoint: String,

    /// Chain API used while building co-signed transactions.
    pub hyperion_endpoint: String,

    /// Expiration window applied to co-signed transactions.
    pub expire_secs: u32,

    /// Accept co-signatures the provider charges a fee for (code 402).
    pub accept_fee_charged: bool,

    /// Timeout for the availability probe and co-sign request.
    pub request_timeout_secs: u64,
}

impl Default for FuelConfig {
    fn default() -> Self {
        Self {
            rpc_endpoint: String::new(),
            hyperion_endpoint: String::new(),
            expire_secs: 3600,
            accept_fee_charged: true,
            request_timeout_secs: 10,
        }
    }
}

/// Login strategy selection.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LoginConfig {
    pub local: Option<LocalLoginConfig>,
    pub redirect: Option<RedirectLoginConfig>,
    pub iframe: Option<IframeLoginConfig>,
}

/// Direct credentials or identity-widget login.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LocalLoginConfig {
    /// Identity widget; required for `login(None)`.
    pub identity: Option<IdentityConfig>,

    /// Endpoint that creates an account for a new wallet key.
    pub account_creation_endpoint: Option<String>,

    /// Page that creates an account and redirects back with `account`/`email`.
    pub account_creation_redirect: Option<String>,
}

/// Identity widget settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// OAuth client id the widget is initialized with.
    pub client_id: String,

    /// Element id the sign-in button renders into.
    pub button_id: String,

    pub theme: String,
    pub size: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            button_id: "google_btn".to_string(),
            theme: "outline".to_string(),
            size: "large".to_string(),
        }
    }
}

/// Full-page redirect to a remote login page.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RedirectLoginConfig {
    /// Remote login page.
    pub url: String,

    /// Return URL; defaults to the current page.
    pub callback: Option<String>,
}

/// Embedded frame pointed at a remote login page.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct IframeLoginConfig {
    /// Remote login page.
    pub url: String,

    /// Element id to mount the frame into when not using the modal.
    pub container: Option<String>,

    /// Show the frame inside the session-managed modal chrome.
    pub modal: bool,

    /// Re-open the login frame when the remote wallet logs out.
    pub sync_with_wallet: bool,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Verbose per-call tracing; also forwarded to the login frame.
    pub trace: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            trace: false,
        }
    }
}

/// The single configured login transport.
#[derive(Debug, Clone, Copy)]
pub enum LoginStrategy<'a> {
    Local(&'a LocalLoginConfig),
    Redirect(&'a RedirectLoginConfig),
    Iframe(&'a IframeLoginConfig),
}

impl LoginStrategy<'_> {
    /// Label used in logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            LoginStrategy::Local(_) => "local",
            LoginStrategy::Redirect(_) => "redirect",
            LoginStrategy::Iframe(_) => "iframe",
        }
    }
}

impl CloudConfig {
    /// Select the configured login strategy.
    ///
    /// Fails unless exactly one of `login.local`, `login.redirect` and
    /// `login.iframe` is set.
    pub fn login_strategy(&self) -> Result<LoginStrategy<'_>, ConfigError> {
        let mut found = Vec::new();
        if let Some(local) = &self.login.local {
            found.push(LoginStrategy::Local(local));
        }
        if let Some(redirect) = &self.login.redirect {
            found.push(LoginStrategy::Redirect(redirect));
        }
        if let Some(iframe) = &self.login.iframe {
            found.push(LoginStrategy::Iframe(iframe));
        }

        match found.len() {
            0 => Err(ConfigError::MissingLoginStrategy),
            1 => Ok(found[0]),
            _ => Err(ConfigError::ConflictingLoginStrategies(
                found.iter().map(|s| s.name()).collect::<Vec<_>>().join(", "),
            )),
        }
    }

    /// Iframe settings when the iframe strategy keeps in sync with the wallet.
    pub fn synced_iframe(&self) -> Option<&IframeLoginConfig> {
        match self.login_strategy() {
            Ok(LoginStrategy::Iframe(iframe)) if iframe.sync_with_wallet => Some(iframe),
            _ => None,
        }
    }
}
