//! Support-chat session orchestration.
//!
//! Layers, bottom-up:
//! - `core`: configuration, errors, identifiers and the message/session model;
//! - `transport`: the REST collaborator and a scripted in-memory stand-in;
//! - `session`: lazy, single-flight session creation;
//! - `pipeline`: outbound send and response normalization;
//! - `quick_actions`: button token to outbound text mapping;
//! - `presentation`: widget state machine and derived view state;
//! - `widget`: the facade a front-end drives.

pub mod core;
pub mod pipeline;
pub mod presentation;
pub mod quick_actions;
pub mod session;
pub mod transport;
pub mod widget;

pub use self::core::{
    Attachment, ChatConfig, ChatError, ChatResult, Message, MessageMetadata, Sender, Session,
    SessionEnvelope, SessionId, SessionStatus, WidgetId,
};
pub use pipeline::{MessagePipeline, NormalizedExchange, SendRequest};
pub use presentation::{Lifecycle, Notice, NoticeLevel, Phase, TranscriptView, UiState, Visibility};
pub use quick_actions::{Priority, QuickAction};
pub use session::{EnsuredSession, SessionManager};
pub use transport::{
    ChatTransport, CreatedTicket, HttpChatTransport, OutboundAttachment, ScriptedTransport,
    TicketDraft,
};
pub use widget::{ChatWidget, SendOutcome};
