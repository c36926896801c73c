//! Host page capability and the frame message protocol.
//!
//! # Frame messages
//! ```text
//! {"account": "...", "email"?, "keys"?, "permission"?}  → Login
//! {"logout": true} | {"type": "logout"}                 → Logout
//! anything else                                         → ignored
//! ```

use serde::Deserialize;
use serde_json::Value;
use url::Url;

/// The page embedding the session.
pub trait HostPage: Send + Sync {
    fn current_url(&self) -> String;

    /// Leave the page. The session does not expect to keep running.
    fn navigate(&self, url: &str);

    fn mount_frame(&self, request: &FrameRequest) -> FrameHandle;

    fn remove_frame(&self, handle: FrameHandle);
}

/// Where a frame goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameContainer {
    /// Inside the element with this id.
    Inline(String),
    /// Inside session-managed modal chrome.
    Modal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRequest {
    pub url: String,
    pub container: FrameContainer,
}

/// Identifies a mounted frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

/// Login announced by the remote login page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginMessage {
    pub account: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub permission: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameMessage {
    Login(LoginMessage),
    Logout,
}

impl FrameMessage {
    /// Parse a raw frame message. `None` for anything unrecognized.
    pub fn parse(raw: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(raw).ok()?;
        let object = value.as_object()?;

        if object.get("account").is_some_and(Value::is_string) {
            return serde_json::from_value(value).ok().map(FrameMessage::Login);
        }
        let logout_flag = object.get("logout").and_then(Value::as_bool) == Some(true);
        let logout_type = object.get("type").and_then(Value::as_str) == Some("logout");
        if logout_flag || logout_type {
            return Some(FrameMessage::Logout);
        }
        None
    }
}

/// `base` with `params` appended to its query. Unparseable bases get a raw suffix.
pub fn with_query(base: &str, params: &[(&str, &str)]) -> String {
    match Url::parse(base) {
        Ok(mut url) => {
            url.query_pairs_mut().extend_pairs(params.iter().copied());
            url.to_string()
        }
        Err(_) => {
            let query = params
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("&");
            let separator = if base.contains('?') { '&' } else { '?' };
            format!("{}{}{}", base, separator, query)
        }
    }
}

/// `scheme://host[:port]` of `page`.
pub fn origin_of(page: &str) -> String {
    Url::parse(page)
        .map(|url| url.origin().ascii_serialization())
        .unwrap_or_default()
}

/// `(account, email)` when the URL carries both resume parameters.
pub fn resume_params(page: &str) -> Option<(String, String)> {
    let url = Url::parse(page).ok()?;
    let mut account = None;
    let mut email = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "account" if !value.is_empty() => account = Some(value.into_owned()),
            "email" if !value.is_empty() => email = Some(value.into_owned()),
            _ => {}
        }
    }
    Some((account?, email?))
}
