// File: src/chat/core/ids.rs

//! Identifier types for the support-chat client.
//!
//! Two families live here:
//! - client-generated UUID newtypes (`WidgetId`, `SendId`) used as correlation
//!   keys in logs;
//! - the server-issued, opaque [`SessionId`], validated but never interpreted.
//!
//! ## Cargo features used by this module
//! - `uuid_v7`: enables `UUIDv7` generation via `uuid/v7`.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generate a time-ordered ID when `uuid_v7` is enabled, a random one otherwise.
#[inline]
#[must_use]
fn uuid_time_ordered() -> Uuid {
    #[cfg(feature = "uuid_v7")]
    {
        Uuid::now_v7()
    }
    #[cfg(not(feature = "uuid_v7"))]
    {
        Uuid::new_v4()
    }
}

/// Declare a UUID newtype with a consistent API.
macro_rules! define_uuid_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[repr(transparent)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl Default for $name {
            #[inline]
            fn default() -> Self {
                Self::new()
            }
        }

        impl $name {
            /// Create a new identifier.
            #[inline]
            #[must_use]
            pub fn new() -> Self {
                Self(uuid_time_ordered())
            }

            /// Wrap an existing UUID.
            #[inline]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Borrow the underlying UUID.
            #[inline]
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            #[inline]
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            #[inline]
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

define_uuid_id!(
    /// Identifier of one chat widget instance.
    ///
    /// Every log line emitted by a widget carries it, so two widgets on the same
    /// page can be told apart.
    WidgetId
);

define_uuid_id!(
    /// Correlation identifier for one pipeline send (one user+bot exchange).
    SendId
);

// ===== Server-issued IDs ====================================================

/// Errors returned when validating a [`SessionId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionIdError {
    /// Empty (or whitespace-only) identifier.
    Empty,
    /// Exceeds the maximum accepted length.
    TooLong {
        /// Maximum allowed length.
        max: usize,
        /// Actual length received.
        got: usize,
    },
    /// Contains a control character.
    ControlChar {
        /// The index where it was found.
        index: usize,
    },
}

impl fmt::Display for SessionIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "session id must not be empty"),
            Self::TooLong { max, got } => write!(f, "session id too long: got {got}, max {max}"),
            Self::ControlChar { index } => {
                write!(f, "session id contains a control character at index {index}")
            }
        }
    }
}

impl std::error::Error for SessionIdError {}

/// Server-issued conversation identifier (e.g. `chat_1718000000000_k3j9x0a1b`).
///
/// Opaque to the client: it is only carried back to the server.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Hard ceiling to prevent pathological payloads.
    pub const MAX_LEN: usize = 256;

    /// Build a validated `SessionId`.
    ///
    /// # Errors
    /// Returns `SessionIdError` if the input is empty, too long, or contains control characters.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, SessionIdError> {
        let s = raw.as_ref().trim();

        if s.is_empty() {
            return Err(SessionIdError::Empty);
        }
        if s.len() > Self::MAX_LEN {
            return Err(SessionIdError::TooLong {
                max: Self::MAX_LEN,
                got: s.len(),
            });
        }
        if let Some(index) = s.chars().position(char::is_control) {
            return Err(SessionIdError::ControlChar { index });
        }

        Ok(Self(s.to_owned()))
    }

    /// Borrow as `&str`.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionId {
    type Err = SessionIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl From<SessionId> for String {
    fn from(value: SessionId) -> Self {
        value.0
    }
}

impl TryFrom<String> for SessionId {
    type Error = SessionIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_trims_and_validates() {
        let id = SessionId::new("  chat_1_abc  ");
        assert_eq!(id.map(String::from), Ok("chat_1_abc".to_string()));
        assert_eq!(SessionId::new("   "), Err(SessionIdError::Empty));
        assert_eq!(
            SessionId::new("a\u{7}b"),
            Err(SessionIdError::ControlChar { index: 1 })
        );
    }

    #[test]
    fn test_session_id_rejects_oversized_input() {
        let raw = "x".repeat(SessionId::MAX_LEN + 1);
        assert!(matches!(
            SessionId::new(raw),
            Err(SessionIdError::TooLong { got, .. }) if got == SessionId::MAX_LEN + 1
        ));
    }

    #[test]
    fn test_session_id_serde_is_transparent() {
        let parsed: Result<SessionId, _> = serde_json::from_str("\"chat_42\"");
        assert_eq!(parsed.ok().map(|id| id.to_string()), Some("chat_42".to_string()));

        let rejected: Result<SessionId, _> = serde_json::from_str("\"\"");
        assert!(rejected.is_err());
    }

    #[test]
    fn test_widget_ids_are_unique() {
        assert_ne!(WidgetId::new(), WidgetId::new());
        let id = SendId::new();
        assert_eq!(id.to_string().parse::<SendId>().ok(), Some(id));
    }
}
