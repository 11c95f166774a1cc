//! Wire DTOs for the chatbot endpoints.
//!
//! Server documents carry far more than the client model (`_id`, `senderId`,
//! `intent`, `confidence`, populated references...). Every field is optional
//! here and unknown keys are ignored; conversion into the core model applies
//! the defaults.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::chat::core::errors::{ChatError, ChatResult};
use crate::chat::core::ids::SessionId;
use crate::chat::core::message::{Attachment, Message, MessageMetadata, Sender};
use crate::chat::core::session::{Session, SessionEnvelope, SessionStatus};
use crate::chat::quick_actions::Priority;

use super::CreatedTicket;

/// Attachment as stored by the server.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireAttachment {
    /// Display name.
    pub filename: Option<String>,
    /// Storage path.
    pub path: Option<String>,
    /// MIME type.
    pub mimetype: Option<String>,
    /// Size in bytes.
    pub size: Option<u64>,
}

impl WireAttachment {
    /// Convert, falling back between filename and path when one is missing.
    #[must_use]
    pub fn into_attachment(self) -> Attachment {
        let path = self.path.or_else(|| self.filename.clone()).unwrap_or_default();
        let filename = self.filename.unwrap_or_else(|| {
            path.rsplit(['/', '\\'])
                .next()
                .unwrap_or_default()
                .to_string()
        });
        Attachment { filename, path }
    }
}

/// Message as returned by the server; any field may be missing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    /// Server document id.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// `user`, `bot`, `technician` (or something newer).
    pub sender: Option<String>,
    /// Text body.
    pub content: Option<String>,
    /// Creation time (RFC 3339 or epoch milliseconds).
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub created_at: Option<DateTime<Utc>>,
    /// Stored attachments.
    pub attachments: Option<Vec<WireAttachment>>,
    /// Quick actions offered with a bot reply.
    pub quick_actions: Option<Vec<String>>,
    /// Open metadata bag.
    pub metadata: Option<Map<String, Value>>,
    /// Server-side message classification.
    pub message_type: Option<String>,
}

impl WireMessage {
    /// Parsed sender, if present and recognized.
    #[must_use]
    pub fn parsed_sender(&self) -> Option<Sender> {
        self.sender.as_deref().and_then(|s| s.parse().ok())
    }

    /// Non-empty content, if any.
    #[must_use]
    pub fn non_empty_content(&self) -> Option<&str> {
        self.content.as_deref().filter(|c| !c.is_empty())
    }

    /// Convert a stored message, defaulting every missing field.
    #[must_use]
    pub fn into_message(self, default_sender: Sender) -> Message {
        Message {
            sender: self.parsed_sender().unwrap_or(default_sender),
            content: self.content.unwrap_or_default(),
            created_at: self.created_at.unwrap_or_else(Utc::now),
            attachments: self
                .attachments
                .unwrap_or_default()
                .into_iter()
                .map(WireAttachment::into_attachment)
                .collect(),
            quick_actions: self.quick_actions.unwrap_or_default(),
            metadata: self.metadata.map(MessageMetadata::from).unwrap_or_default(),
        }
    }
}

/// Reporting metadata stored with a session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireSessionMetadata {
    /// Origin platform (`web`, `mobile`).
    pub platform: Option<String>,
}

/// Session as returned by the server.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireSession {
    /// Server-issued identifier.
    pub session_id: Option<String>,
    /// Server-owned status.
    pub status: Option<String>,
    /// Ticket number or id.
    pub ticket_id: Option<Value>,
    /// Creation time.
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub created_at: Option<DateTime<Utc>>,
    /// Reporting metadata.
    pub metadata: Option<WireSessionMetadata>,
}

impl WireSession {
    /// Convert into a core session.
    ///
    /// # Errors
    /// Returns `Malformed` if the session id is missing or invalid.
    pub fn into_session(self, fallback_channel: &str) -> ChatResult<Session> {
        let raw_id = self
            .session_id
            .ok_or_else(|| ChatError::Malformed("session without sessionId".to_string()))?;
        let session_id = SessionId::new(&raw_id)
            .map_err(|err| ChatError::Malformed(format!("invalid sessionId {raw_id:?}: {err}")))?;

        let channel = self
            .metadata
            .and_then(|m| m.platform)
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| fallback_channel.to_string());

        Ok(Session {
            session_id,
            channel,
            status: self
                .status
                .as_deref()
                .map_or(SessionStatus::Active, SessionStatus::from_wire),
            ticket_id: ticket_reference(self.ticket_id),
            created_at: self.created_at,
        })
    }
}

/// `{ session, messages }` body of the session endpoints.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WireSessionEnvelope {
    /// The session.
    pub session: Option<WireSession>,
    /// Stored transcript.
    pub messages: Option<Vec<WireMessage>>,
}

impl WireSessionEnvelope {
    /// Convert into a core envelope.
    ///
    /// # Errors
    /// Returns `Malformed` if the session is missing or invalid.
    pub fn into_envelope(self, fallback_channel: &str) -> ChatResult<SessionEnvelope> {
        let session = self
            .session
            .ok_or_else(|| ChatError::Malformed("response without session".to_string()))?
            .into_session(fallback_channel)?;
        let messages = self
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|m| m.into_message(Sender::Bot))
            .collect();
        Ok(SessionEnvelope { session, messages })
    }
}

/// `{ session, message }` body of the escalation endpoint.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WireEscalation {
    /// Updated session.
    pub session: Option<WireSession>,
    /// System notice.
    pub message: Option<WireMessage>,
}

/// Ticket as returned by the create-ticket endpoint.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTicket {
    /// Sequential ticket number.
    pub ticket_id: Option<Value>,
    /// Title.
    pub title: Option<String>,
    /// Priority literal.
    pub priority: Option<String>,
    /// Status literal.
    pub status: Option<String>,
}

/// `{ ticket, message }` body of the create-ticket endpoint.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WireTicketCreated {
    /// The stored ticket.
    pub ticket: Option<WireTicket>,
    /// Confirmation appended to the transcript.
    pub message: Option<WireMessage>,
}

impl WireTicketCreated {
    /// Convert into a created ticket. The ticket number falls back to the
    /// confirmation's `ticketId` metadata.
    ///
    /// # Errors
    /// Returns `Malformed` if no ticket number can be found.
    pub fn into_created(self) -> ChatResult<CreatedTicket> {
        let ticket = self.ticket.unwrap_or_default();
        let message = self.message.map(|m| m.into_message(Sender::Bot));
        let ticket_id = ticket_reference(ticket.ticket_id)
            .or_else(|| message.as_ref().and_then(|m| m.metadata.ticket_id()))
            .ok_or_else(|| ChatError::Malformed("ticket without ticketId".to_string()))?;

        Ok(CreatedTicket {
            ticket_id,
            title: ticket.title.unwrap_or_default(),
            priority: ticket.priority.as_deref().and_then(Priority::from_label),
            status: ticket.status,
            message,
        })
    }
}

/// Combined response of the send endpoint; any subset may be absent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    /// Echo of the stored user message.
    pub user_message: Option<WireMessage>,
    /// Generated bot reply.
    pub bot_message: Option<WireMessage>,
    /// Flat reply text used by older servers.
    pub content: Option<String>,
    /// Flat quick actions used by older servers.
    pub quick_actions: Option<Vec<String>>,
    /// Flat metadata used by older servers.
    pub metadata: Option<Map<String, Value>>,
}

impl SendResponse {
    /// Response carrying only a flat reply text.
    #[must_use]
    pub fn with_content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }
}

/// Ticket numbers arrive as numbers or strings.
fn ticket_reference(value: Option<Value>) -> Option<String> {
    match value? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s),
        _ => None,
    }
}

/// Accept RFC 3339 strings or epoch milliseconds; anything else becomes `None`.
fn lenient_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_server_message_decodes_and_ignores_extras() {
        let raw = json!({
            "_id": "65f0",
            "session": "65ef",
            "sender": "bot",
            "senderId": null,
            "content": "How can I help?",
            "messageType": "text",
            "intent": "greeting",
            "confidence": 0.9,
            "createdAt": "2024-03-12T10:15:00.000Z",
            "attachments": [],
            "quickActions": ["Create Ticket", "FAQ"],
            "metadata": { "ticketId": 12 }
        });
        let wire: Result<WireMessage, _> = serde_json::from_value(raw);
        let message = wire.map(|w| w.into_message(Sender::User));
        let message = message.map_err(|e| e.to_string());
        assert!(message.is_ok());
        if let Ok(message) = message {
            assert_eq!(message.sender, Sender::Bot);
            assert_eq!(message.quick_actions, vec!["Create Ticket", "FAQ"]);
            assert_eq!(message.metadata.ticket_id().as_deref(), Some("12"));
            assert_eq!(message.created_at.timestamp(), 1_710_238_500);
        }
    }

    #[test]
    fn test_lenient_dates() {
        let millis: Result<WireMessage, _> =
            serde_json::from_value(json!({ "createdAt": 1_700_000_000_000_i64 }));
        assert_eq!(
            millis.ok().and_then(|m| m.created_at).map(|d| d.timestamp()),
            Some(1_700_000_000)
        );

        let garbage: Result<WireMessage, _> =
            serde_json::from_value(json!({ "createdAt": "yesterday-ish" }));
        assert_eq!(garbage.ok().map(|m| m.created_at), Some(None));
    }

    #[test]
    fn test_unknown_sender_uses_default() {
        let wire = WireMessage {
            sender: Some("system".to_string()),
            content: Some("Escalated".to_string()),
            ..WireMessage::default()
        };
        assert_eq!(wire.into_message(Sender::Bot).sender, Sender::Bot);
    }

    #[test]
    fn test_attachment_fallbacks() {
        let only_path = WireAttachment {
            path: Some("uploads/171-f.png".to_string()),
            ..WireAttachment::default()
        };
        assert_eq!(
            only_path.into_attachment(),
            Attachment {
                filename: "171-f.png".to_string(),
                path: "uploads/171-f.png".to_string()
            }
        );

        let only_name = WireAttachment {
            filename: Some("f.png".to_string()),
            ..WireAttachment::default()
        };
        assert_eq!(only_name.into_attachment(), Attachment::local("f.png"));
    }

    #[test]
    fn test_session_envelope_conversion() {
        let raw = json!({
            "session": {
                "_id": "65ef",
                "sessionId": "chat_1710238500000_abc123def",
                "status": "escalated",
                "ticketId": 1042,
                "assignedTo": { "name": "Dana" },
                "createdAt": "2024-03-12T10:15:00Z"
            },
            "messages": [
                { "sender": "user", "content": "hi" },
                { "sender": "bot", "content": "hello" }
            ]
        });
        let envelope = serde_json::from_value::<WireSessionEnvelope>(raw)
            .map_err(ChatError::from)
            .and_then(|w| w.into_envelope("web"));
        assert!(envelope.is_ok());
        if let Ok(envelope) = envelope {
            assert_eq!(envelope.session.session_id.as_str(), "chat_1710238500000_abc123def");
            assert_eq!(envelope.session.status, SessionStatus::Escalated);
            assert_eq!(envelope.session.ticket_id.as_deref(), Some("1042"));
            assert_eq!(envelope.session.channel, "web");
            assert_eq!(envelope.messages.len(), 2);
            assert_eq!(envelope.messages[0].sender, Sender::User);
        }
    }

    #[test]
    fn test_ticket_created_conversion() {
        let raw = json!({
            "ticket": {
                "_id": "6601",
                "ticketId": 1043,
                "title": "VPN down",
                "priority": "high",
                "status": "open",
                "slaDueDate": "2024-03-13T10:15:00Z"
            },
            "message": {
                "sender": "bot",
                "content": "Ticket #1043 has been created successfully!",
                "messageType": "ticket_created",
                "metadata": { "ticketId": 1043 }
            }
        });
        let created = serde_json::from_value::<WireTicketCreated>(raw)
            .map_err(ChatError::from)
            .and_then(WireTicketCreated::into_created);
        assert!(created.is_ok());
        if let Ok(created) = created {
            assert_eq!(created.ticket_id, "1043");
            assert_eq!(created.priority, Some(Priority::High));
            assert_eq!(created.status.as_deref(), Some("open"));
            assert_eq!(
                created.message.and_then(|m| m.metadata.ticket_id()).as_deref(),
                Some("1043")
            );
        }
    }

    #[test]
    fn test_ticket_number_falls_back_to_message_metadata() {
        let raw = json!({
            "ticket": { "title": "Printer" },
            "message": { "content": "Created", "metadata": { "ticketId": "77" } }
        });
        let created = serde_json::from_value::<WireTicketCreated>(raw)
            .map_err(ChatError::from)
            .and_then(WireTicketCreated::into_created);
        assert_eq!(created.ok().map(|c| c.ticket_id).as_deref(), Some("77"));

        let missing = WireTicketCreated::default().into_created();
        assert!(matches!(missing, Err(ChatError::Malformed(_))));
    }

    #[test]
    fn test_session_without_id_is_malformed() {
        let result = WireSessionEnvelope {
            session: Some(WireSession::default()),
            messages: None,
        }
        .into_envelope("web");
        assert!(matches!(result, Err(ChatError::Malformed(_))));

        let missing = WireSessionEnvelope::default().into_envelope("web");
        assert!(matches!(missing, Err(ChatError::Malformed(_))));
    }
}
