//! Conversation session model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::core::ids::SessionId;
use crate::chat::core::message::Message;

/// Server-owned session status, shown as-is by the client.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Conversation with the assistant is ongoing.
    Active,
    /// Handed over to a technician.
    Escalated,
    /// Issue resolved.
    Resolved,
    /// Closed by the server.
    Closed,
    /// Any status this client version does not know.
    Unknown,
}

impl SessionStatus {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Escalated => "escalated",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a wire status, mapping unrecognized values to `Unknown`.
    #[must_use]
    pub fn from_wire(value: &str) -> Self {
        value.parse().unwrap_or(Self::Unknown)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "escalated" => Ok(Self::Escalated),
            "resolved" => Ok(Self::Resolved),
            "closed" => Ok(Self::Closed),
            _ => Err(value.to_string()),
        }
    }
}

/// One conversational context, issued by the server.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Server-issued identifier.
    pub session_id: SessionId,
    /// Origin tag the session was requested with.
    pub channel: String,
    /// Server-owned status.
    pub status: SessionStatus,
    /// Support ticket created from this conversation, if any.
    pub ticket_id: Option<String>,
    /// Creation time reported by the server.
    pub created_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Build an active session with no ticket.
    #[must_use]
    pub fn new(session_id: SessionId, channel: impl Into<String>) -> Self {
        Self {
            session_id,
            channel: channel.into(),
            status: SessionStatus::Active,
            ticket_id: None,
            created_at: None,
        }
    }
}

/// A session together with the transcript the server holds for it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionEnvelope {
    /// The session.
    pub session: Session,
    /// Stored transcript in server order.
    pub messages: Vec<Message>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_wire() {
        assert_eq!(SessionStatus::from_wire("escalated"), SessionStatus::Escalated);
        assert_eq!(SessionStatus::from_wire("archived"), SessionStatus::Unknown);
    }

    #[test]
    fn test_new_session_is_active() {
        let id = SessionId::new("chat_1").map_err(|e| e.to_string());
        let session = id.map(|id| Session::new(id, "web"));
        assert_eq!(session.map(|s| s.status), Ok(SessionStatus::Active));
    }
}
