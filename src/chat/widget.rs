//! One embedded chat widget: the facade a front-end drives.
//!
//! Network calls never run under the state lock, so the view can keep reading
//! snapshots while a session is created or a message is in flight.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::chat::core::config::ChatConfig;
use crate::chat::core::errors::{ChatError, ChatResult};
use crate::chat::core::ids::{SendId, WidgetId};
use crate::chat::core::message::{Attachment, Message};
use crate::chat::core::session::Session;
use crate::chat::pipeline::{MessagePipeline, SendRequest};
use crate::chat::presentation::{Notice, Phase, PipelineEvent, UiState, reduce};
use crate::chat::quick_actions;
use crate::chat::session::{EnsuredSession, SessionManager};
use crate::chat::transport::{
    ChatTransport, CreatedTicket, HttpChatTransport, OutboundAttachment, TicketDraft,
};

/// Result of one send attempt.
#[derive(Debug)]
pub enum SendOutcome {
    /// The pair was appended.
    Delivered {
        /// The bot half is the fallback acknowledgment.
        degraded: bool,
    },
    /// Blank text and no attachments; nothing happened.
    NoOp,
    /// Another send is in flight; nothing happened.
    Busy,
    /// The session or the send failed; the error is also in the UI state.
    Failed(ChatError),
}

impl SendOutcome {
    /// The pair was appended.
    #[must_use]
    pub const fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// A chat widget bound to one transport.
pub struct ChatWidget {
    id: WidgetId,
    config: ChatConfig,
    sessions: Arc<SessionManager>,
    pipeline: MessagePipeline,
    state: Mutex<UiState>,
}

impl ChatWidget {
    /// Create a closed widget with no session.
    #[must_use]
    pub fn new(transport: Arc<dyn ChatTransport>, config: ChatConfig) -> Self {
        let id = WidgetId::new();
        let sessions = Arc::new(SessionManager::new(
            Arc::clone(&transport),
            config.channel.clone(),
            id,
        ));
        let pipeline = MessagePipeline::new(transport, Arc::clone(&sessions), &config, id);
        debug!(widget_id = %id, channel = %config.channel, "widget created");
        Self {
            id,
            config,
            sessions,
            pipeline,
            state: Mutex::new(UiState::new()),
        }
    }

    /// Create a widget talking to the helpdesk API.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn connect(config: ChatConfig) -> ChatResult<Self> {
        config.validate()?;
        let transport = HttpChatTransport::new(&config)?;
        Ok(Self::new(Arc::new(transport), config))
    }

    /// Instance identifier used in logs.
    #[must_use]
    pub const fn id(&self) -> WidgetId {
        self.id
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Open the window, establishing a session if there is none.
    ///
    /// # Errors
    /// Returns the session-creation error; it is also recorded in the UI state
    /// and the window stays open.
    pub async fn open(&self) -> ChatResult<()> {
        let needs_session = {
            let mut state = self.state.lock().await;
            self.apply_locked(&mut state, PipelineEvent::Opened);
            state.session.is_none()
        };
        if needs_session {
            self.establish_session().await?;
        }
        Ok(())
    }

    /// Close the window. Session and transcript are kept.
    pub async fn close(&self) {
        self.apply(PipelineEvent::Closed).await;
    }

    /// Collapse or expand the open window.
    pub async fn toggle_minimized(&self) {
        self.apply(PipelineEvent::MinimizeToggled).await;
    }

    /// Replace the compose box contents.
    pub async fn set_compose(&self, text: impl Into<String>) {
        self.apply(PipelineEvent::ComposeEdited(text.into())).await;
    }

    /// Current compose box contents.
    pub async fn compose(&self) -> String {
        self.state.lock().await.compose.clone()
    }

    /// Retry session creation after a failure. No-op with a live session.
    ///
    /// # Errors
    /// Returns the session-creation error.
    pub async fn retry_session(&self) -> ChatResult<()> {
        self.establish_session().await.map(|_| ())
    }

    /// Send text and files.
    ///
    /// `None` sends the compose box contents; without new files it also
    /// resends the files kept from a failed send. Blank text without files, or
    /// a send while another is in flight, changes nothing.
    pub async fn send(
        &self,
        text: Option<&str>,
        attachments: Vec<OutboundAttachment>,
    ) -> SendOutcome {
        let send_id = SendId::new();
        let request = {
            let mut state = self.state.lock().await;
            let request = match text {
                Some(text) => SendRequest::new(text, attachments),
                None if attachments.is_empty() => SendRequest::new(
                    state.compose.clone(),
                    state.pending_attachments.clone(),
                ),
                None => SendRequest::new(state.compose.clone(), attachments),
            };
            if request.is_blank() {
                debug!(widget_id = %self.id, %send_id, "blank send ignored");
                return SendOutcome::NoOp;
            }
            if state.loading {
                debug!(widget_id = %self.id, %send_id, "send ignored, another is in flight");
                return SendOutcome::Busy;
            }
            self.apply_locked(
                &mut state,
                PipelineEvent::SendStarted {
                    attachments: request.attachments.clone(),
                },
            );
            request
        };

        let session = match self.pipeline.resolve_session().await {
            Ok(ensured) => {
                let session = ensured.session.clone();
                self.adopt(ensured).await;
                session
            }
            Err(err) => {
                warn!(widget_id = %self.id, %send_id, error = %err, "send aborted, no session");
                self.apply(PipelineEvent::SessionFailed {
                    message: err.user_message(),
                })
                .await;
                return SendOutcome::Failed(err);
            }
        };

        match self.pipeline.submit(&session, request).await {
            Ok(exchange) => {
                info!(
                    widget_id = %self.id,
                    %send_id,
                    session_id = %session.session_id,
                    degraded = exchange.degraded,
                    "message delivered"
                );
                self.apply(PipelineEvent::SendSucceeded {
                    user: exchange.user,
                    bot: exchange.bot,
                })
                .await;
                SendOutcome::Delivered {
                    degraded: exchange.degraded,
                }
            }
            Err(err) => {
                warn!(widget_id = %self.id, %send_id, error = %err, "send failed");
                self.apply(PipelineEvent::SendFailed {
                    message: err.user_message(),
                })
                .await;
                SendOutcome::Failed(err)
            }
        }
    }

    /// Trigger a quick action; its text goes through [`Self::send`].
    pub async fn dispatch(&self, token: &str) -> SendOutcome {
        let text = quick_actions::resolve(token);
        debug!(widget_id = %self.id, token, resolved = %text, "quick action");
        self.send(Some(&text), Vec::new()).await
    }

    /// Hand the conversation over to a technician.
    ///
    /// # Errors
    /// Returns the session or escalation error; it is also recorded in the UI
    /// state.
    pub async fn escalate(&self, department_id: Option<&str>) -> ChatResult<Session> {
        let session = self.live_session().await?;

        match self.sessions.escalate(&session.session_id, department_id).await {
            Ok(escalation) => {
                let updated = escalation.session.clone();
                self.apply(PipelineEvent::Escalated {
                    session: escalation.session,
                    notice: escalation.notice,
                })
                .await;
                Ok(updated)
            }
            Err(err) => {
                warn!(widget_id = %self.id, error = %err, "escalation failed");
                self.apply(PipelineEvent::EscalationFailed {
                    message: err.user_message(),
                })
                .await;
                Err(err)
            }
        }
    }

    /// Open a ticket from the conversation. The server's confirmation is
    /// appended to the transcript and links to the ticket.
    ///
    /// # Errors
    /// Returns the session or ticket error; it is also recorded in the UI
    /// state.
    pub async fn create_ticket(&self, draft: TicketDraft) -> ChatResult<CreatedTicket> {
        let session = self.live_session().await?;

        match self.pipeline.create_ticket(&session, draft).await {
            Ok(ticket) => {
                info!(
                    widget_id = %self.id,
                    session_id = %session.session_id,
                    ticket_id = %ticket.ticket_id,
                    "ticket created"
                );
                self.apply(PipelineEvent::TicketCreated {
                    ticket_id: ticket.ticket_id.clone(),
                    confirmation: ticket.message.clone(),
                })
                .await;
                Ok(ticket)
            }
            Err(err) => {
                warn!(widget_id = %self.id, error = %err, "ticket creation failed");
                self.apply(PipelineEvent::TicketFailed {
                    message: err.user_message(),
                })
                .await;
                Err(err)
            }
        }
    }

    /// Copy of the whole UI state.
    pub async fn snapshot(&self) -> UiState {
        self.state.lock().await.clone()
    }

    /// Position in the widget state machine.
    pub async fn phase(&self) -> Phase {
        self.state.lock().await.phase()
    }

    /// Transcript in insertion order.
    pub async fn transcript(&self) -> Vec<Message> {
        self.state.lock().await.transcript.clone()
    }

    /// Quick actions offered under the last message.
    pub async fn visible_quick_actions(&self) -> Vec<String> {
        self.state.lock().await.visible_quick_actions().to_vec()
    }

    /// Drain pending notifications.
    pub async fn take_notices(&self) -> Vec<Notice> {
        self.state.lock().await.notices.drain(..).collect()
    }

    /// Link under which an attachment is served.
    #[must_use]
    pub fn attachment_url(&self, attachment: &Attachment) -> String {
        attachment.url(&self.config.uploads_prefix)
    }

    /// Link to the ticket a message refers to.
    #[must_use]
    pub fn ticket_link(&self, message: &Message) -> Option<String> {
        message.ticket_link(&self.config.tickets_prefix)
    }

    async fn live_session(&self) -> ChatResult<Session> {
        match self.sessions.current().await {
            Some(session) => Ok(session),
            None => self.establish_session().await,
        }
    }

    async fn establish_session(&self) -> ChatResult<Session> {
        self.apply(PipelineEvent::SessionRequested).await;
        match self.pipeline.resolve_session().await {
            Ok(ensured) => {
                let session = ensured.session.clone();
                self.adopt(ensured).await;
                Ok(session)
            }
            Err(err) => {
                self.apply(PipelineEvent::SessionFailed {
                    message: err.user_message(),
                })
                .await;
                Err(err)
            }
        }
    }

    async fn adopt(&self, ensured: EnsuredSession) {
        let mut state = self.state.lock().await;
        if ensured.created || state.session.is_none() {
            self.apply_locked(
                &mut state,
                PipelineEvent::SessionEstablished {
                    session: ensured.session,
                    history: ensured.history,
                },
            );
        }
    }

    async fn apply(&self, event: PipelineEvent) {
        let mut state = self.state.lock().await;
        self.apply_locked(&mut state, event);
    }

    fn apply_locked(&self, state: &mut UiState, event: PipelineEvent) {
        let before = state.phase();
        let name = event.name();
        reduce(state, event);
        let after = state.phase();
        if before == after {
            debug!(widget_id = %self.id, event = name, phase = %after, "event applied");
        } else {
            debug!(widget_id = %self.id, event = name, from = %before, to = %after, "phase changed");
        }
    }
}
