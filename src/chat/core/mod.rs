//! Core chat types: identifiers, errors, configuration, messages and sessions.

pub mod config;
pub mod errors;
pub mod ids;
pub mod message;
pub mod session;

pub use config::ChatConfig;
pub use errors::{ChatError, ChatResult};
pub use ids::{SendId, SessionId, SessionIdError, WidgetId};
pub use message::{Attachment, Message, MessageMetadata, Sender};
pub use session::{Session, SessionEnvelope, SessionStatus};
