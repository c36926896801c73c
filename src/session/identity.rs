//! Identity-provider widget capability.
//!
//! The widget renders a sign-in button and calls back once with a JWT; the
//! controller extracts the `email` claim and publishes `Credentials` on a
//! watch channel.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::accounts::Credentials;
use crate::capability::{Capability, CapabilityState};
use crate::config::IdentityConfig;

/// Interval between render attempts.
pub const RENDER_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Render attempts stop after this long.
pub const RENDER_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Failed to load identity widget: {0}")]
    Load(String),

    #[error("Invalid identity token: {0}")]
    InvalidToken(String),

    #[error("Identity widget did not render into '{0}'")]
    RenderTimeout(String),
}

/// Receives the raw JWT once the user signs in.
pub type CredentialCallback = Arc<dyn Fn(String) + Send + Sync>;

/// The identity-provider widget.
#[async_trait]
pub trait IdentityWidget: Send + Sync {
    async fn load(&self) -> Result<(), IdentityError>;

    fn initialize(&self, client_id: &str, callback: CredentialCallback);

    /// Render the button. `false` if `target` is not present yet.
    fn render_button(&self, target: &str, theme: &str, size: &str) -> bool;

    fn disable_auto_select(&self);
}

/// Extract the `email` claim of a JWT without verifying it.
pub fn email_from_jwt(jwt: &str) -> Result<String, IdentityError> {
    let payload = jwt
        .split('.')
        .nth(1)
        .ok_or_else(|| IdentityError::InvalidToken("missing payload segment".to_string()))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| IdentityError::InvalidToken(e.to_string()))?;
    let claims: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|e| IdentityError::InvalidToken(e.to_string()))?;
    claims
        .get("email")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| IdentityError::InvalidToken("no email claim".to_string()))
}

pub struct IdentityController {
    widget: Arc<dyn IdentityWidget>,
    capability: Capability<dyn IdentityWidget>,
    credentials: Arc<watch::Sender<Option<Credentials>>>,
}

impl IdentityController {
    pub fn new(widget: Arc<dyn IdentityWidget>) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            widget,
            capability: Capability::new("identity-widget"),
            credentials: Arc::new(tx),
        }
    }

    pub fn state(&self) -> CapabilityState {
        self.capability.state()
    }

    /// Load and initialize the widget. No-op once loading has started.
    pub async fn init(&self, config: &IdentityConfig) -> Result<(), IdentityError> {
        if !self.capability.begin_loading() {
            return Ok(());
        }
        if let Err(e) = self.widget.load().await {
            self.capability.reset();
            return Err(e);
        }

        let credentials = self.credentials.clone();
        self.widget.initialize(
            &config.client_id,
            Arc::new(move |jwt: String| match email_from_jwt(&jwt) {
                Ok(email) => {
                    credentials.send_replace(Some(Credentials::new(email, jwt)));
                }
                Err(e) => tracing::warn!(error = %e, "Ignoring identity credential"),
            }),
        );
        self.capability.set_ready(self.widget.clone());
        Ok(())
    }

    /// Receiver that only sees credentials published from now on.
    pub fn subscribe(&self) -> watch::Receiver<Option<Credentials>> {
        self.credentials.subscribe()
    }

    /// Render the button, retrying until the target exists or time runs out.
    pub async fn render_button(&self, config: &IdentityConfig) -> Result<(), IdentityError> {
        let deadline = Instant::now() + RENDER_TIMEOUT;
        loop {
            if let Some(widget) = self.capability.get() {
                if widget.render_button(&config.button_id, &config.theme, &config.size) {
                    tracing::debug!(target_id = %config.button_id, "Identity button rendered");
                    return Ok(());
                }
            }
            if Instant::now() >= deadline {
                return Err(IdentityError::RenderTimeout(config.button_id.clone()));
            }
            tokio::time::sleep(RENDER_RETRY_INTERVAL).await;
        }
    }

    /// Wait for the next credentials. Never completes if none arrive.
    pub async fn next_credentials(&self, mut rx: watch::Receiver<Option<Credentials>>) -> Credentials {
        loop {
            if rx.changed().await.is_err() {
                return std::future::pending().await;
            }
            if let Some(credentials) = rx.borrow_and_update().clone() {
                return credentials;
            }
        }
    }

    pub fn logout(&self) {
        if let Some(widget) = self.capability.get() {
            widget.disable_auto_select();
        }
        self.credentials.send_replace(None);
    }

    pub fn reset(&self) {
        self.capability.reset();
        self.credentials.send_replace(None);
    }
}

impl std::fmt::Debug for IdentityController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityController")
            .field("state", &self.capability.state())
            .finish()
    }
}
