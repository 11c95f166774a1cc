//! Message pipeline: resolve a session, submit one message, normalize the reply.

pub mod normalize;

pub use normalize::{NormalizedExchange, Normalizer, SentParts};

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::chat::core::config::ChatConfig;
use crate::chat::core::errors::{ChatError, ChatResult};
use crate::chat::core::ids::WidgetId;
use crate::chat::core::session::Session;
use crate::chat::quick_actions::Priority;
use crate::chat::session::{EnsuredSession, SessionManager};
use crate::chat::transport::{
    ChatTransport, CreatedTicket, MAX_ATTACHMENTS, OutboundAttachment, OutboundMessage,
    TicketDraft,
};

/// Text and files the user asked to send.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SendRequest {
    /// Raw text as typed or resolved from a quick action.
    pub text: String,
    /// Files to upload with the message.
    pub attachments: Vec<OutboundAttachment>,
}

impl SendRequest {
    /// Build a request.
    #[must_use]
    pub fn new(text: impl Into<String>, attachments: Vec<OutboundAttachment>) -> Self {
        Self {
            text: text.into(),
            attachments,
        }
    }

    /// The text that goes on the wire.
    #[must_use]
    pub fn trimmed_text(&self) -> &str {
        self.text.trim()
    }

    /// Blank text and no files: nothing to send.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.trimmed_text().is_empty() && self.attachments.is_empty()
    }

    /// Names of the attached files, in order.
    #[must_use]
    pub fn attachment_names(&self) -> Vec<String> {
        self.attachments.iter().map(|a| a.filename.clone()).collect()
    }
}

/// Sends messages on behalf of one widget.
pub struct MessagePipeline {
    transport: Arc<dyn ChatTransport>,
    sessions: Arc<SessionManager>,
    normalizer: Normalizer,
    widget_id: WidgetId,
}

impl MessagePipeline {
    /// Create a pipeline over a transport and the widget's session manager.
    #[must_use]
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        sessions: Arc<SessionManager>,
        config: &ChatConfig,
        widget_id: WidgetId,
    ) -> Self {
        Self {
            transport,
            sessions,
            normalizer: Normalizer::new(config),
            widget_id,
        }
    }

    /// Step 1: the live session, created lazily.
    ///
    /// # Errors
    /// Returns the session-creation error.
    pub async fn resolve_session(&self) -> ChatResult<EnsuredSession> {
        self.sessions.ensure_session().await
    }

    /// Steps 2 and 3: submit the request and complete the response.
    ///
    /// # Errors
    /// Returns `TooManyAttachments` before any request is made when the files
    /// exceed [`MAX_ATTACHMENTS`], otherwise the transport error; a partial
    /// response is not an error.
    pub async fn submit(
        &self,
        session: &Session,
        request: SendRequest,
    ) -> ChatResult<NormalizedExchange> {
        if request.attachments.len() > MAX_ATTACHMENTS {
            return Err(ChatError::TooManyAttachments {
                count: request.attachments.len(),
                max: MAX_ATTACHMENTS,
            });
        }

        let text = request.trimmed_text().to_string();
        let attachment_names = request.attachment_names();
        debug!(
            widget_id = %self.widget_id,
            session_id = %session.session_id,
            chars = text.len(),
            attachments = attachment_names.len(),
            "submitting message"
        );

        let sent_at = Utc::now();
        let response = self
            .transport
            .send_message(OutboundMessage {
                text: text.clone(),
                session_id: session.session_id.clone(),
                attachments: request.attachments,
            })
            .await?;

        let exchange = self.normalizer.normalize(
            response,
            SentParts {
                text: &text,
                attachment_names: &attachment_names,
                sent_at,
            },
        );
        if exchange.degraded {
            warn!(
                widget_id = %self.widget_id,
                session_id = %session.session_id,
                "reply missing from send response, using fallback acknowledgment"
            );
        }
        Ok(exchange)
    }

    /// Open a ticket from the session.
    ///
    /// # Errors
    /// Returns the transport error.
    pub async fn create_ticket(
        &self,
        session: &Session,
        draft: TicketDraft,
    ) -> ChatResult<CreatedTicket> {
        debug!(
            widget_id = %self.widget_id,
            session_id = %session.session_id,
            priority = draft.priority.map(Priority::as_str),
            "creating ticket"
        );
        self.transport
            .create_ticket(&session.session_id, draft)
            .await
    }
}
