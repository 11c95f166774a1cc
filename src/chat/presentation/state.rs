//! Widget UI state and the views derived from it.

use std::collections::VecDeque;
use std::fmt;

use crate::chat::core::message::Message;
use crate::chat::core::session::Session;
use crate::chat::transport::OutboundAttachment;

/// Whether the widget window is shown.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Visibility {
    /// Only the launcher is shown.
    #[default]
    Closed,
    /// The window is shown, possibly collapsed to its header.
    Open {
        /// Collapsed to the header bar.
        minimized: bool,
    },
}

/// Conversation progress, independent of visibility.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Lifecycle {
    /// No session.
    #[default]
    Idle,
    /// Session creation in flight.
    SessionPending,
    /// Session available, nothing in flight.
    Ready,
    /// A send is in flight.
    Sending,
}

/// Combined state-machine position.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Phase {
    /// Window closed.
    Closed,
    /// Open without a session.
    Idle,
    /// Open, waiting for a session.
    SessionPending,
    /// Open and ready to send.
    Ready,
    /// Open with a send in flight.
    Sending,
}

impl Phase {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Idle => "idle",
            Self::SessionPending => "session_pending",
            Self::Ready => "ready",
            Self::Sending => "sending",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the transcript area is drawn.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TranscriptView {
    /// No messages and nothing pending: the welcome prompt.
    Empty,
    /// No messages yet, session being established.
    Initializing,
    /// At least one message.
    Populated,
}

/// Severity of a transient notification.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NoticeLevel {
    /// Informational (escalation accepted).
    Info,
    /// A failure.
    Error,
}

/// Transient notification shown once by the view.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Human-readable text.
    pub text: String,
}

impl Notice {
    /// Error notification.
    #[must_use]
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }

    /// Informational notification.
    #[must_use]
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }
}

/// Everything the view renders. Mutated only by [`super::reduce`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UiState {
    /// Window visibility.
    pub visibility: Visibility,
    /// Conversation progress.
    pub lifecycle: Lifecycle,
    /// Copy of the established session, for display.
    pub session: Option<Session>,
    /// Append-only transcript.
    pub transcript: Vec<Message>,
    /// Compose box contents (the pending send).
    pub compose: String,
    /// Files of the pending send; kept after a failure for a retry.
    pub pending_attachments: Vec<OutboundAttachment>,
    /// A send is in flight.
    pub loading: bool,
    /// The bot reply is awaited.
    pub typing: bool,
    /// Last session or send failure, cleared by the next success.
    pub error: Option<String>,
    /// Undelivered notifications.
    pub notices: VecDeque<Notice>,
}

impl UiState {
    /// Closed widget, no session, empty transcript.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Window shown.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self.visibility, Visibility::Open { .. })
    }

    /// Window collapsed.
    #[must_use]
    pub const fn is_minimized(&self) -> bool {
        matches!(self.visibility, Visibility::Open { minimized: true })
    }

    /// Position in the widget state machine.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        match (self.visibility, self.lifecycle) {
            (Visibility::Closed, _) => Phase::Closed,
            (Visibility::Open { .. }, Lifecycle::Idle) => Phase::Idle,
            (Visibility::Open { .. }, Lifecycle::SessionPending) => Phase::SessionPending,
            (Visibility::Open { .. }, Lifecycle::Ready) => Phase::Ready,
            (Visibility::Open { .. }, Lifecycle::Sending) => Phase::Sending,
        }
    }

    /// Transcript display variant.
    #[must_use]
    pub fn transcript_view(&self) -> TranscriptView {
        if !self.transcript.is_empty() {
            TranscriptView::Populated
        } else if self.lifecycle == Lifecycle::SessionPending {
            TranscriptView::Initializing
        } else {
            TranscriptView::Empty
        }
    }

    /// Quick actions of the last message; older lists are never shown.
    #[must_use]
    pub fn visible_quick_actions(&self) -> &[String] {
        self.transcript
            .last()
            .map(|message| message.quick_actions.as_slice())
            .unwrap_or_default()
    }

    /// The error banner should offer a session retry.
    #[must_use]
    pub const fn can_retry_session(&self) -> bool {
        self.error.is_some() && self.session.is_none()
    }
}
