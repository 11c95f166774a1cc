//! Transcript message model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Author of a transcript entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    /// The person using the widget.
    User,
    /// The backend assistant.
    Bot,
    /// A human technician after escalation.
    Technician,
}

impl Sender {
    /// Stable string form used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Bot => "bot",
            Self::Technician => "technician",
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Sender {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "bot" => Ok(Self::Bot),
            "technician" => Ok(Self::Technician),
            _ => Err(value.to_string()),
        }
    }
}

/// A file carried by a message, as stored by the server.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    /// Display name.
    pub filename: String,
    /// Server-side path, resolved under the uploads prefix.
    pub path: String,
}

impl Attachment {
    /// Build an attachment whose path is its filename (local echo of a sent file).
    #[must_use]
    pub fn local(filename: impl Into<String>) -> Self {
        let filename = filename.into();
        Self {
            path: filename.clone(),
            filename,
        }
    }

    /// Link under which the view renders this attachment.
    #[must_use]
    pub fn url(&self, uploads_prefix: &str) -> String {
        format!(
            "{}/{}",
            uploads_prefix.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        )
    }
}

/// Open key/value bag attached to a message.
///
/// Only `ticketId` is interpreted; everything else is carried through.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageMetadata(pub Map<String, Value>);

impl MessageMetadata {
    /// Key holding the related ticket number.
    pub const TICKET_ID_KEY: &'static str = "ticketId";

    /// Ticket reference, accepting both numeric and string encodings.
    #[must_use]
    pub fn ticket_id(&self) -> Option<String> {
        match self.0.get(Self::TICKET_ID_KEY)? {
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        }
    }

    /// Whether the bag holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for MessageMetadata {
    fn from(value: Map<String, Value>) -> Self {
        Self(value)
    }
}

/// One transcript entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Author.
    pub sender: Sender,
    /// Text body; may be empty when attachments are present.
    pub content: String,
    /// Display timestamp; never used for ordering.
    pub created_at: DateTime<Utc>,
    /// Files carried by the message.
    pub attachments: Vec<Attachment>,
    /// Quick-action tokens offered with this message.
    pub quick_actions: Vec<String>,
    /// Open metadata bag.
    pub metadata: MessageMetadata,
}

impl Message {
    /// Build a plain text message stamped now.
    #[must_use]
    pub fn text(sender: Sender, content: impl Into<String>) -> Self {
        Self {
            sender,
            content: content.into(),
            created_at: Utc::now(),
            attachments: Vec::new(),
            quick_actions: Vec::new(),
            metadata: MessageMetadata::default(),
        }
    }

    /// Link to the ticket referenced in the metadata, if any.
    #[must_use]
    pub fn ticket_link(&self, tickets_prefix: &str) -> Option<String> {
        self.metadata
            .ticket_id()
            .map(|id| format!("{}/{id}", tickets_prefix.trim_end_matches('/')))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sender_round_trips_through_str() {
        for sender in [Sender::User, Sender::Bot, Sender::Technician] {
            assert_eq!(sender.as_str().parse::<Sender>(), Ok(sender));
        }
        assert!("system".parse::<Sender>().is_err());
    }

    #[test]
    fn test_attachment_url_joins_prefix() {
        let attachment = Attachment {
            filename: "report.pdf".to_string(),
            path: "uploads/123-report.pdf".to_string(),
        };
        assert_eq!(
            attachment.url("/api/uploads/"),
            "/api/uploads/uploads/123-report.pdf"
        );
        assert_eq!(Attachment::local("f.png").path, "f.png");
    }

    #[test]
    fn test_ticket_id_accepts_number_and_string() {
        let numeric = MessageMetadata::from(
            json!({ "ticketId": 1042 }).as_object().cloned().unwrap_or_default(),
        );
        assert_eq!(numeric.ticket_id().as_deref(), Some("1042"));

        let text = MessageMetadata::from(
            json!({ "ticketId": "77" }).as_object().cloned().unwrap_or_default(),
        );
        assert_eq!(text.ticket_id().as_deref(), Some("77"));

        assert_eq!(MessageMetadata::default().ticket_id(), None);
    }

    #[test]
    fn test_ticket_link() {
        let mut message = Message::text(Sender::Bot, "Ticket created");
        assert_eq!(message.ticket_link("/tickets"), None);
        message
            .metadata
            .0
            .insert("ticketId".to_string(), json!(9));
        assert_eq!(message.ticket_link("/tickets/").as_deref(), Some("/tickets/9"));
    }
}
