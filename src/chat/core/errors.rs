//! Error types for the support-chat client.

use std::sync::Arc;

use thiserror::Error;

/// Fallback text when a 401 response carries no message.
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired. Please login again.";

/// Fallback text when a failed response carries no message.
pub const REQUEST_FAILED_MESSAGE: &str = "Request failed";

/// Text shown when the server cannot be reached at all.
pub const NETWORK_ERROR_MESSAGE: &str =
    "Network error: Unable to connect to server. Please check your connection and try again.";

/// Errors produced by the transport and surfaced by the widget.
#[derive(Debug, Error)]
pub enum ChatError {
    /// HTTP request failed for a reason not covered by a more specific variant.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server could not be reached.
    #[error("network error: {0}")]
    Network(String),

    /// Timeout waiting for the server.
    #[error("request timed out")]
    Timeout,

    /// The bearer token was rejected (HTTP 401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The server answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response body.
        message: String,
    },

    /// The response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// The response decoded but lacks a required field.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// A URL could not be built from the configuration.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Invalid configuration values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// More files than the server accepts in one message.
    #[error("too many attachments: {count} (at most {max} per message)")]
    TooManyAttachments {
        /// Files in the rejected send.
        count: usize,
        /// Server limit.
        max: usize,
    },

    /// I/O error (reading an attachment from disk).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A failure observed by several concurrent callers of the same request.
    #[error("{0}")]
    Shared(Arc<ChatError>),
}

impl ChatError {
    /// Check if retrying the same call later may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout | Self::Http(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Shared(inner) => inner.is_retryable(),
            _ => false,
        }
    }

    /// Take back ownership of a shared error, wrapping it if still shared.
    #[must_use]
    pub fn from_shared(err: Arc<Self>) -> Self {
        Arc::try_unwrap(err).unwrap_or_else(Self::Shared)
    }

    /// Human-readable text for the error banner and notifications.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => NETWORK_ERROR_MESSAGE.to_string(),
            Self::Timeout => "The server took too long to respond. Please try again.".to_string(),
            Self::Unauthorized(message) | Self::Api { message, .. } => message.clone(),
            Self::Io(err) => format!("Could not read attachment: {err}"),
            Self::TooManyAttachments { max, .. } => {
                format!("You can attach at most {max} files per message.")
            }
            Self::Malformed(_) | Self::Decode(_) => {
                "Unexpected response from the support server.".to_string()
            }
            Self::Shared(inner) => inner.user_message(),
            other => other.to_string(),
        }
    }
}

/// Convenience result alias for chat operations.
pub type ChatResult<T> = Result<T, ChatError>;
