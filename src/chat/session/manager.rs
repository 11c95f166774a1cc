//! Single-flight session creation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::chat::core::errors::{ChatError, ChatResult};
use crate::chat::core::ids::{SessionId, WidgetId};
use crate::chat::core::message::Message;
use crate::chat::core::session::{Session, SessionEnvelope};
use crate::chat::transport::{ChatTransport, Escalation};

type CreationOutcome = Result<SessionEnvelope, Arc<ChatError>>;
type SharedCreation = Shared<BoxFuture<'static, CreationOutcome>>;

enum Slot {
    Empty,
    Creating {
        attempt: u64,
        request: SharedCreation,
    },
    Ready(Session),
}

/// Session handed back by [`SessionManager::ensure_session`].
#[derive(Clone, Debug, PartialEq)]
pub struct EnsuredSession {
    /// The live session.
    pub session: Session,
    /// Stored transcript, only filled for the caller that installed the session.
    pub history: Vec<Message>,
    /// Whether this call established the session.
    pub created: bool,
}

impl EnsuredSession {
    const fn existing(session: Session) -> Self {
        Self {
            session,
            history: Vec::new(),
            created: false,
        }
    }
}

/// Owns the widget's session.
///
/// Creation is lazy and single-flight: concurrent callers join the request
/// already in progress and observe its result. A failed creation leaves the
/// manager without a session so the next call starts over.
pub struct SessionManager {
    transport: Arc<dyn ChatTransport>,
    channel: String,
    widget_id: WidgetId,
    slot: Mutex<Slot>,
    attempts: AtomicU64,
}

impl SessionManager {
    /// Create a manager with no session.
    #[must_use]
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        channel: impl Into<String>,
        widget_id: WidgetId,
    ) -> Self {
        Self {
            transport,
            channel: channel.into(),
            widget_id,
            slot: Mutex::new(Slot::Empty),
            attempts: AtomicU64::new(0),
        }
    }

    /// The established session, if any.
    pub async fn current(&self) -> Option<Session> {
        match &*self.slot.lock().await {
            Slot::Ready(session) => Some(session.clone()),
            Slot::Empty | Slot::Creating { .. } => None,
        }
    }

    /// Whether a creation request is in flight.
    pub async fn is_creating(&self) -> bool {
        matches!(&*self.slot.lock().await, Slot::Creating { .. })
    }

    /// Return the live session, creating it if needed.
    ///
    /// # Errors
    /// Returns the creation error; every caller that joined the same request
    /// receives it.
    pub async fn ensure_session(&self) -> ChatResult<EnsuredSession> {
        let (attempt, request) = {
            let mut slot = self.slot.lock().await;
            let joined = match &*slot {
                Slot::Ready(session) => return Ok(EnsuredSession::existing(session.clone())),
                Slot::Creating { attempt, request } => Some((*attempt, request.clone())),
                Slot::Empty => None,
            };
            if let Some((attempt, request)) = joined {
                debug!(widget_id = %self.widget_id, attempt, "joining session creation");
                (attempt, request)
            } else {
                let attempt = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;
                let request = self.start_creation();
                debug!(
                    widget_id = %self.widget_id,
                    attempt,
                    channel = %self.channel,
                    "creating session"
                );
                *slot = Slot::Creating {
                    attempt,
                    request: request.clone(),
                };
                (attempt, request)
            }
        };

        let outcome = request.await;

        let mut slot = self.slot.lock().await;
        let owns_slot = matches!(&*slot, Slot::Creating { attempt: current, .. } if *current == attempt);
        match outcome {
            Ok(envelope) if owns_slot => {
                info!(
                    widget_id = %self.widget_id,
                    session_id = %envelope.session.session_id,
                    history = envelope.messages.len(),
                    "session established"
                );
                *slot = Slot::Ready(envelope.session.clone());
                Ok(EnsuredSession {
                    session: envelope.session,
                    history: envelope.messages,
                    created: true,
                })
            }
            Ok(envelope) => {
                let session = match &*slot {
                    Slot::Ready(installed) => installed.clone(),
                    Slot::Empty | Slot::Creating { .. } => envelope.session,
                };
                Ok(EnsuredSession::existing(session))
            }
            Err(err) => {
                if owns_slot {
                    warn!(widget_id = %self.widget_id, attempt, error = %err, "session creation failed");
                    *slot = Slot::Empty;
                }
                Err(ChatError::from_shared(err))
            }
        }
    }

    /// Hand the session over to a technician and adopt the updated session.
    ///
    /// # Errors
    /// Returns an error if the escalation request fails.
    pub async fn escalate(
        &self,
        session_id: &SessionId,
        department_id: Option<&str>,
    ) -> ChatResult<Escalation> {
        let escalation = self.transport.escalate(session_id, department_id).await?;

        let mut slot = self.slot.lock().await;
        if matches!(&*slot, Slot::Ready(current) if current.session_id == *session_id) {
            *slot = Slot::Ready(escalation.session.clone());
        }
        info!(
            widget_id = %self.widget_id,
            session_id = %session_id,
            status = %escalation.session.status,
            "session escalated"
        );
        Ok(escalation)
    }

    fn start_creation(&self) -> SharedCreation {
        let transport = Arc::clone(&self.transport);
        let channel = self.channel.clone();
        async move { transport.create_session(&channel).await.map_err(Arc::new) }
            .boxed()
            .shared()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::chat::core::message::Sender;
    use crate::chat::core::session::SessionStatus;
    use crate::chat::transport::ScriptedTransport;

    fn manager_over(transport: &Arc<ScriptedTransport>) -> SessionManager {
        SessionManager::new(transport.clone(), "web", WidgetId::new())
    }

    #[tokio::test]
    async fn test_ensure_session_is_idempotent() -> ChatResult<()> {
        let transport = Arc::new(ScriptedTransport::new());
        let manager = manager_over(&transport);

        let first = manager.ensure_session().await?;
        let second = manager.ensure_session().await?;

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.session.session_id, second.session.session_id);
        assert_eq!(transport.create_session_calls().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_request() -> ChatResult<()> {
        let transport = Arc::new(ScriptedTransport::new().with_latency(Duration::from_millis(30)));
        let manager = manager_over(&transport);

        let (a, b) = tokio::join!(manager.ensure_session(), manager.ensure_session());
        let (a, b) = (a?, b?);

        assert_eq!(a.session.session_id, b.session.session_id);
        assert_eq!(u8::from(a.created) + u8::from(b.created), 1);
        assert_eq!(transport.create_session_calls().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_failure_leaves_session_unset() -> ChatResult<()> {
        let transport = Arc::new(
            ScriptedTransport::new().with_session(Err(ChatError::Network("refused".to_string()))),
        );
        let manager = manager_over(&transport);

        assert!(matches!(
            manager.ensure_session().await,
            Err(ChatError::Network(_))
        ));
        assert!(manager.current().await.is_none());
        assert!(!manager.is_creating().await);

        let retried = manager.ensure_session().await?;
        assert!(retried.created);
        assert_eq!(transport.create_session_calls().await, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_callers_observe_same_failure() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .with_latency(Duration::from_millis(30))
                .with_session(Err(ChatError::Timeout)),
        );
        let manager = manager_over(&transport);

        let (a, b) = tokio::join!(manager.ensure_session(), manager.ensure_session());

        assert!(a.is_err_and(|e| e.is_retryable()));
        assert!(b.is_err_and(|e| e.is_retryable()));
        assert_eq!(transport.create_session_calls().await, 1);
        assert!(manager.current().await.is_none());
    }

    #[tokio::test]
    async fn test_history_returned_to_creator_only() -> ChatResult<()> {
        let session_id = SessionId::new("chat_resumed").map_err(|e| ChatError::Malformed(e.to_string()))?;
        let transport = Arc::new(ScriptedTransport::new().with_session(Ok(SessionEnvelope {
            session: Session::new(session_id, "web"),
            messages: vec![
                Message::text(Sender::User, "printer is jammed"),
                Message::text(Sender::Bot, "Let me help with that."),
            ],
        })));
        let manager = manager_over(&transport);

        let first = manager.ensure_session().await?;
        assert_eq!(first.history.len(), 2);
        assert_eq!(first.session.session_id.as_str(), "chat_resumed");

        let again = manager.ensure_session().await?;
        assert!(again.history.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_escalate_adopts_updated_session() -> ChatResult<()> {
        let transport = Arc::new(ScriptedTransport::new());
        let manager = manager_over(&transport);
        let session = manager.ensure_session().await?.session;

        let escalation = manager.escalate(&session.session_id, None).await?;

        assert_eq!(escalation.session.status, SessionStatus::Escalated);
        assert_eq!(
            manager.current().await.map(|s| s.status),
            Some(SessionStatus::Escalated)
        );
        Ok(())
    }
}
