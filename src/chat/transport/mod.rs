//! Transport collaborator: the seam between the chat core and the REST backend.
//!
//! The core only ever talks to a [`ChatTransport`]. Two implementations ship:
//! - [`http::HttpChatTransport`] for the helpdesk API;
//! - [`memory::ScriptedTransport`], a recording fake used to drive widgets
//!   without a server.

pub mod http;
pub mod memory;
pub mod wire;

pub use http::HttpChatTransport;
pub use memory::{ScriptedTransport, TransportCall};
pub use wire::{SendResponse, WireAttachment, WireMessage, WireSession, WireTicketCreated};

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use serde::Serialize;

use crate::chat::core::errors::{ChatError, ChatResult};
use crate::chat::core::ids::SessionId;
use crate::chat::core::message::Message;
use crate::chat::core::session::{Session, SessionEnvelope};
use crate::chat::quick_actions::Priority;

/// Files the message endpoint accepts per request.
pub const MAX_ATTACHMENTS: usize = 5;

/// Boxed future type for transport operations.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A file the user is sending.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OutboundAttachment {
    /// Name shown to the user and sent as the multipart filename.
    pub filename: String,
    /// MIME type, if known.
    pub content_type: Option<String>,
    /// File contents.
    pub bytes: Vec<u8>,
}

impl OutboundAttachment {
    /// Build an attachment, guessing the MIME type from the extension.
    #[must_use]
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        let filename = filename.into();
        let content_type = mime_guess::from_path(&filename)
            .first_raw()
            .map(str::to_string);
        Self {
            filename,
            content_type,
            bytes,
        }
    }

    /// Override the MIME type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Read an attachment from disk.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or has no file name.
    pub async fn from_path(path: impl AsRef<Path>) -> ChatResult<Self> {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .and_then(std::ffi::OsStr::to_str)
            .ok_or_else(|| ChatError::InvalidConfig(format!("not a file path: {}", path.display())))?
            .to_string();
        let bytes = tokio::fs::read(path).await?;
        Ok(Self::new(filename, bytes))
    }
}

/// One outbound chat message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OutboundMessage {
    /// Trimmed text; empty for attachment-only sends.
    pub text: String,
    /// Session the message belongs to.
    pub session_id: SessionId,
    /// Files sent with the message.
    pub attachments: Vec<OutboundAttachment>,
}

/// Filter for the session history endpoint.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct HistoryQuery {
    /// Restrict to one user (honoured for staff accounts only).
    pub user_id: Option<String>,
    /// Maximum number of sessions.
    pub limit: Option<u32>,
}

/// Result of handing a session over to a technician.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Escalation {
    /// Server-updated session.
    pub session: Session,
    /// System notice the server attached, if any.
    pub notice: Option<String>,
}

/// Ticket fields submitted from a chat session.
///
/// Title and description are required by the server; the rest fall back to
/// server defaults (`medium`, `General`).
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct TicketDraft {
    /// Short summary.
    pub title: String,
    /// Problem description.
    pub description: String,
    /// Requested priority.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// Ticket category.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Target department id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}

impl TicketDraft {
    /// Draft with the two required fields.
    #[must_use]
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    /// Set the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Set the category.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set the department.
    #[must_use]
    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }
}

/// Ticket opened from a chat session.
#[derive(Clone, Debug, PartialEq)]
pub struct CreatedTicket {
    /// Ticket number shown to the user.
    pub ticket_id: String,
    /// Stored title.
    pub title: String,
    /// Stored priority, if recognized.
    pub priority: Option<Priority>,
    /// Stored status (`open` for a new ticket).
    pub status: Option<String>,
    /// Confirmation the server appended to the transcript; its metadata
    /// carries the ticket reference.
    pub message: Option<Message>,
}

/// Transport collaborator consumed by the chat core.
pub trait ChatTransport: Send + Sync {
    /// Create (or resume) the current user's session.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response lacks a session.
    fn create_session(&self, channel: &str) -> TransportFuture<'_, ChatResult<SessionEnvelope>>;

    /// Send one message and receive the combined user+bot response.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    fn send_message(&self, message: OutboundMessage)
    -> TransportFuture<'_, ChatResult<SendResponse>>;

    /// List past sessions.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    fn get_history(&self, query: HistoryQuery) -> TransportFuture<'_, ChatResult<Vec<Session>>>;

    /// Load one session with its transcript.
    ///
    /// # Errors
    /// Returns an error if the request fails or the session does not exist.
    fn get_session(&self, session_id: &SessionId)
    -> TransportFuture<'_, ChatResult<SessionEnvelope>>;

    /// Escalate a session to a technician.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    fn escalate(
        &self,
        session_id: &SessionId,
        department_id: Option<&str>,
    ) -> TransportFuture<'_, ChatResult<Escalation>>;

    /// Open a ticket from a session.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response lacks a ticket.
    fn create_ticket(
        &self,
        session_id: &SessionId,
        draft: TicketDraft,
    ) -> TransportFuture<'_, ChatResult<CreatedTicket>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_inferred_from_extension() {
        let mime = |name: &str| OutboundAttachment::new(name, Vec::new()).content_type;
        assert_eq!(mime("f.PNG").as_deref(), Some("image/png"));
        assert_eq!(mime("data.csv").as_deref(), Some("text/csv"));
        assert_eq!(mime("logs.zip").as_deref(), Some("application/zip"));
        assert_eq!(mime("clip.mp4").as_deref(), Some("video/mp4"));
        assert!(mime("invoice.docx").is_some_and(|m| m.contains("word")));
        assert!(mime("sheet.xlsx").is_some_and(|m| m.contains("spreadsheet")));
        assert_eq!(mime("README"), None);
    }

    #[test]
    fn test_outbound_attachment_builder() {
        let attachment = OutboundAttachment::new("scan.pdf", vec![1, 2, 3])
            .with_content_type("application/x-custom");
        assert_eq!(attachment.filename, "scan.pdf");
        assert_eq!(attachment.content_type.as_deref(), Some("application/x-custom"));
    }

    #[test]
    fn test_ticket_draft_omits_unset_fields() {
        let body = serde_json::to_value(
            TicketDraft::new("VPN down", "Cannot connect since 9am").with_priority(Priority::High),
        )
        .ok();
        assert_eq!(
            body,
            Some(serde_json::json!({
                "title": "VPN down",
                "description": "Cannot connect since 9am",
                "priority": "high"
            }))
        );
    }

    #[tokio::test]
    async fn test_from_path_missing_file_is_io_error() {
        let result = OutboundAttachment::from_path("/definitely/not/here.png").await;
        assert!(matches!(result, Err(ChatError::Io(_))));
    }
}
