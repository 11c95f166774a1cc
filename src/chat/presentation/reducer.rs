//! Pipeline events and the reducer that folds them into [`UiState`].

use crate::chat::core::message::Message;
use crate::chat::core::session::Session;
use crate::chat::transport::OutboundAttachment;

use super::state::{Lifecycle, Notice, UiState, Visibility};

/// Something that happened to the widget.
#[derive(Clone, Debug, PartialEq)]
pub enum PipelineEvent {
    /// Window opened (un-minimized).
    Opened,
    /// Window closed; session and transcript are kept.
    Closed,
    /// Minimize button pressed.
    MinimizeToggled,
    /// Compose box edited.
    ComposeEdited(String),
    /// Session creation requested.
    SessionRequested,
    /// Session available.
    SessionEstablished {
        /// The session.
        session: Session,
        /// Transcript stored on the server (reconnect case).
        history: Vec<Message>,
    },
    /// Session creation failed.
    SessionFailed {
        /// Text for the error banner.
        message: String,
    },
    /// A send passed the guard.
    SendStarted {
        /// Files going out with it.
        attachments: Vec<OutboundAttachment>,
    },
    /// A send completed; the normalized pair.
    SendSucceeded {
        /// User half.
        user: Message,
        /// Bot half.
        bot: Message,
    },
    /// A send failed after the session was resolved.
    SendFailed {
        /// Text for the error banner.
        message: String,
    },
    /// The session was handed to a technician.
    Escalated {
        /// Updated session.
        session: Session,
        /// Notice from the server.
        notice: Option<String>,
    },
    /// Escalation failed.
    EscalationFailed {
        /// Text for the error banner.
        message: String,
    },
    /// A ticket was opened from the chat.
    TicketCreated {
        /// Ticket number.
        ticket_id: String,
        /// Confirmation appended by the server.
        confirmation: Option<Message>,
    },
    /// Ticket creation failed.
    TicketFailed {
        /// Text for the error banner.
        message: String,
    },
}

impl PipelineEvent {
    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Opened => "opened",
            Self::Closed => "closed",
            Self::MinimizeToggled => "minimize_toggled",
            Self::ComposeEdited(_) => "compose_edited",
            Self::SessionRequested => "session_requested",
            Self::SessionEstablished { .. } => "session_established",
            Self::SessionFailed { .. } => "session_failed",
            Self::SendStarted { .. } => "send_started",
            Self::SendSucceeded { .. } => "send_succeeded",
            Self::SendFailed { .. } => "send_failed",
            Self::Escalated { .. } => "escalated",
            Self::EscalationFailed { .. } => "escalation_failed",
            Self::TicketCreated { .. } => "ticket_created",
            Self::TicketFailed { .. } => "ticket_failed",
        }
    }
}

/// Apply one event.
pub fn reduce(state: &mut UiState, event: PipelineEvent) {
    match event {
        PipelineEvent::Opened => {
            state.visibility = Visibility::Open { minimized: false };
        }
        PipelineEvent::Closed => {
            state.visibility = Visibility::Closed;
        }
        PipelineEvent::MinimizeToggled => {
            if let Visibility::Open { minimized } = state.visibility {
                state.visibility = Visibility::Open {
                    minimized: !minimized,
                };
            }
        }
        PipelineEvent::ComposeEdited(text) => state.compose = text,
        PipelineEvent::SessionRequested => {
            if state.session.is_none() && !state.loading {
                state.lifecycle = Lifecycle::SessionPending;
            }
        }
        PipelineEvent::SessionEstablished { session, history } => {
            if state.session.is_none() && !history.is_empty() {
                let appended = std::mem::replace(&mut state.transcript, history);
                state.transcript.extend(appended);
            }
            state.session = Some(session);
            state.error = None;
            state.lifecycle = if state.loading {
                Lifecycle::Sending
            } else {
                Lifecycle::Ready
            };
        }
        PipelineEvent::SessionFailed { message } => {
            // Several callers can observe one failed creation; notify once.
            let leaving_pending = state.lifecycle == Lifecycle::SessionPending;
            state.lifecycle = if state.session.is_some() {
                Lifecycle::Ready
            } else {
                Lifecycle::Idle
            };
            state.loading = false;
            state.typing = false;
            if leaving_pending {
                state.notices.push_back(Notice::error(message.clone()));
            }
            state.error = Some(message);
        }
        PipelineEvent::SendStarted { attachments } => {
            state.pending_attachments = attachments;
            state.loading = true;
            state.typing = true;
            state.lifecycle = if state.session.is_some() {
                Lifecycle::Sending
            } else {
                Lifecycle::SessionPending
            };
        }
        PipelineEvent::SendSucceeded { user, bot } => {
            state.transcript.extend([user, bot]);
            state.compose.clear();
            state.pending_attachments.clear();
            state.loading = false;
            state.typing = false;
            state.error = None;
            state.lifecycle = Lifecycle::Ready;
        }
        PipelineEvent::SendFailed { message } => {
            state.loading = false;
            state.typing = false;
            state.lifecycle = Lifecycle::Ready;
            state.notices.push_back(Notice::error(message.clone()));
            state.error = Some(message);
        }
        PipelineEvent::Escalated { session, notice } => {
            state.session = Some(session);
            if let Some(text) = notice {
                state.notices.push_back(Notice::info(text));
            }
        }
        PipelineEvent::TicketCreated {
            ticket_id,
            confirmation,
        } => {
            if let Some(session) = state.session.as_mut() {
                session.ticket_id = Some(ticket_id.clone());
            }
            match confirmation {
                Some(message) => state.transcript.push(message),
                None => state
                    .notices
                    .push_back(Notice::info(format!("Ticket #{ticket_id} created."))),
            }
            state.error = None;
        }
        PipelineEvent::EscalationFailed { message } | PipelineEvent::TicketFailed { message } => {
            state.notices.push_back(Notice::error(message.clone()));
            state.error = Some(message);
        }
    }
}
