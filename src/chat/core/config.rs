//! Configuration for the support-chat client.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::chat::core::errors::{ChatError, ChatResult};

/// Environment variable for the API base URL (e.g. `https://helpdesk.example.com/api`).
pub const API_URL_ENV: &str = "HELPDESK_API_URL";
/// Environment variable for the bearer token.
pub const TOKEN_ENV: &str = "HELPDESK_TOKEN";
/// Environment variable for the channel tag.
pub const CHANNEL_ENV: &str = "HELPDESK_CHANNEL";
/// Environment variable for the request timeout in seconds.
pub const TIMEOUT_ENV: &str = "HELPDESK_TIMEOUT_SECS";

/// Default API base URL.
const DEFAULT_API_URL: &str = "http://127.0.0.1:5000/api";
/// Default channel tag sent on session creation.
const DEFAULT_CHANNEL: &str = "web";
/// Default bot acknowledgment used when the server omits the reply.
pub const DEFAULT_FALLBACK_REPLY: &str = "I received your message.";
/// Default user-message content for attachment-only sends.
pub const DEFAULT_ATTACHMENT_PLACEHOLDER: &str = "File attachment";

/// Configuration for one chat client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatConfig {
    /// API base URL, including the `/api` prefix.
    pub api_base_url: String,
    /// Bearer token sent with every request.
    pub auth_token: Option<String>,
    /// Origin tag sent on session creation.
    pub channel: String,
    /// Request timeout.
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,
    /// Connection timeout.
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,
    /// Prefix for attachment links.
    pub uploads_prefix: String,
    /// Prefix for ticket links.
    pub tickets_prefix: String,
    /// Best-effort bot reply used when the server omits one.
    pub fallback_reply: String,
    /// User-message content for attachment-only sends.
    pub attachment_placeholder: String,
    /// Maximum number of sessions requested from the history endpoint.
    pub history_limit: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            auth_token: None,
            channel: DEFAULT_CHANNEL.to_string(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            uploads_prefix: "/api/uploads".to_string(),
            tickets_prefix: "/tickets".to_string(),
            fallback_reply: DEFAULT_FALLBACK_REPLY.to_string(),
            attachment_placeholder: DEFAULT_ATTACHMENT_PLACEHOLDER.to_string(),
            history_limit: 50,
        }
    }
}

impl ChatConfig {
    /// Create a new config with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the config from `HELPDESK_*` environment variables.
    ///
    /// # Errors
    /// Returns an error if a variable holds an invalid value.
    pub fn from_env() -> ChatResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load the config through an arbitrary key lookup.
    ///
    /// # Errors
    /// Returns an error if a value is invalid.
    pub fn from_lookup<F>(lookup: F) -> ChatResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(API_URL_ENV) {
            config.api_base_url = url;
        }
        config.auth_token = lookup(TOKEN_ENV).filter(|token| !token.trim().is_empty());
        if let Some(channel) = lookup(CHANNEL_ENV) {
            config.channel = channel;
        }
        if let Some(raw) = lookup(TIMEOUT_ENV) {
            let secs = raw.trim().parse::<u64>().map_err(|err| {
                ChatError::InvalidConfig(format!("{TIMEOUT_ENV} must be a number of seconds: {err}"))
            })?;
            config.request_timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the API base URL.
    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Set the bearer token.
    #[must_use]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Set the channel tag.
    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the best-effort fallback reply.
    #[must_use]
    pub fn with_fallback_reply(mut self, reply: impl Into<String>) -> Self {
        self.fallback_reply = reply.into();
        self
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> ChatResult<()> {
        let base = self.api_base()?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ChatError::InvalidConfig(format!(
                "api_base_url must use http or https, got {}",
                base.scheme()
            )));
        }

        if self.channel.trim().is_empty() {
            return Err(ChatError::InvalidConfig(
                "channel must not be empty".to_string(),
            ));
        }

        if self.request_timeout.is_zero() || self.connect_timeout.is_zero() {
            return Err(ChatError::InvalidConfig(
                "timeouts must be > 0".to_string(),
            ));
        }

        if self.history_limit == 0 {
            return Err(ChatError::InvalidConfig(
                "history_limit must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Parsed API base, always ending with `/` so relative joins keep the prefix.
    ///
    /// # Errors
    /// Returns an error if `api_base_url` is not a valid URL.
    pub fn api_base(&self) -> ChatResult<Url> {
        let mut base = Url::parse(self.api_base_url.trim())?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(base)
    }
}

/// Serde module for Duration serialization.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
