//! In-memory transport that replays scripted outcomes and records every call.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;

use crate::chat::core::errors::{ChatError, ChatResult};
use crate::chat::core::ids::SessionId;
use crate::chat::core::message::{Message, MessageMetadata, Sender};
use crate::chat::core::session::{Session, SessionEnvelope, SessionStatus};

use super::wire::{SendResponse, WireMessage};
use super::{
    ChatTransport, CreatedTicket, Escalation, HistoryQuery, OutboundMessage, TicketDraft,
    TransportFuture,
};

/// First ticket number handed out by the default script.
const FIRST_TICKET_NUMBER: u64 = 1000;

/// One recorded call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TransportCall {
    /// `create_session(channel)`.
    CreateSession {
        /// Requested channel.
        channel: String,
    },
    /// `send_message(..)`.
    SendMessage {
        /// Outbound text.
        text: String,
        /// Target session.
        session_id: SessionId,
        /// Names of the attached files.
        attachment_names: Vec<String>,
    },
    /// `get_history(..)`.
    GetHistory(HistoryQuery),
    /// `get_session(..)`.
    GetSession(SessionId),
    /// `escalate(..)`.
    Escalate {
        /// Target session.
        session_id: SessionId,
        /// Requested department.
        department_id: Option<String>,
    },
    /// `create_ticket(..)`.
    CreateTicket {
        /// Target session.
        session_id: SessionId,
        /// Submitted draft.
        draft: TicketDraft,
    },
}

/// Scripted transport.
///
/// Queued outcomes are consumed in order; once a queue is empty the transport
/// falls back to a well-behaved default (fresh session, echoed reply).
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    latency: Duration,
    calls: Mutex<Vec<TransportCall>>,
    sessions: Mutex<VecDeque<ChatResult<SessionEnvelope>>>,
    replies: Mutex<VecDeque<ChatResult<SendResponse>>>,
    escalations: Mutex<VecDeque<ChatResult<Escalation>>>,
    tickets: Mutex<VecDeque<ChatResult<CreatedTicket>>>,
    created: Mutex<Vec<Session>>,
    session_counter: AtomicU64,
    ticket_counter: AtomicU64,
}

impl ScriptedTransport {
    /// Create a transport with empty scripts and no latency.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency` before answering.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Queue a session-creation outcome.
    #[must_use]
    pub fn with_session(mut self, outcome: ChatResult<SessionEnvelope>) -> Self {
        self.sessions.get_mut().push_back(outcome);
        self
    }

    /// Queue a send outcome.
    #[must_use]
    pub fn with_reply(mut self, outcome: ChatResult<SendResponse>) -> Self {
        self.replies.get_mut().push_back(outcome);
        self
    }

    /// Queue an escalation outcome.
    #[must_use]
    pub fn with_escalation(mut self, outcome: ChatResult<Escalation>) -> Self {
        self.escalations.get_mut().push_back(outcome);
        self
    }

    /// Queue a ticket-creation outcome.
    #[must_use]
    pub fn with_ticket(mut self, outcome: ChatResult<CreatedTicket>) -> Self {
        self.tickets.get_mut().push_back(outcome);
        self
    }

    /// Every call received so far, in order.
    pub async fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().await.clone()
    }

    /// Number of session-creation requests received.
    pub async fn create_session_calls(&self) -> usize {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|c| matches!(c, TransportCall::CreateSession { .. }))
            .count()
    }

    /// Texts of every send received, in order.
    pub async fn sent_texts(&self) -> Vec<String> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|c| match c {
                TransportCall::SendMessage { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    async fn record(&self, call: TransportCall) {
        self.calls.lock().await.push(call);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn next_session_id(&self) -> ChatResult<SessionId> {
        let n = self.session_counter.fetch_add(1, Ordering::Relaxed) + 1;
        SessionId::new(format!("chat_scripted_{n}"))
            .map_err(|err| ChatError::Malformed(err.to_string()))
    }
}

/// Ticket for a draft, confirmed the way the server does it.
fn confirm_ticket(number: u64, draft: TicketDraft) -> CreatedTicket {
    let mut metadata = MessageMetadata::default();
    metadata
        .0
        .insert(MessageMetadata::TICKET_ID_KEY.to_string(), number.into());
    let mut message = Message::text(
        Sender::Bot,
        format!("Ticket #{number} has been created successfully!"),
    );
    message.metadata = metadata;

    CreatedTicket {
        ticket_id: number.to_string(),
        title: draft.title,
        priority: draft.priority,
        status: Some("open".to_string()),
        message: Some(message),
    }
}

/// Full, well-formed reply echoing the outbound text.
fn echo_reply(text: &str) -> SendResponse {
    SendResponse {
        user_message: Some(WireMessage {
            sender: Some("user".to_string()),
            content: Some(text.to_string()),
            ..WireMessage::default()
        }),
        bot_message: Some(WireMessage {
            sender: Some("bot".to_string()),
            content: Some(format!("You said: {text}")),
            ..WireMessage::default()
        }),
        ..SendResponse::default()
    }
}

impl ChatTransport for ScriptedTransport {
    fn create_session(&self, channel: &str) -> TransportFuture<'_, ChatResult<SessionEnvelope>> {
        let channel = channel.to_string();
        Box::pin(async move {
            self.record(TransportCall::CreateSession {
                channel: channel.clone(),
            })
            .await;

            let scripted = self.sessions.lock().await.pop_front();
            let outcome = match scripted {
                Some(outcome) => outcome,
                None => Ok(SessionEnvelope {
                    session: Session::new(self.next_session_id()?, channel),
                    messages: Vec::new(),
                }),
            };

            if let Ok(envelope) = &outcome {
                self.created.lock().await.push(envelope.session.clone());
            }
            outcome
        })
    }

    fn send_message(
        &self,
        message: OutboundMessage,
    ) -> TransportFuture<'_, ChatResult<SendResponse>> {
        Box::pin(async move {
            self.record(TransportCall::SendMessage {
                text: message.text.clone(),
                session_id: message.session_id.clone(),
                attachment_names: message
                    .attachments
                    .iter()
                    .map(|a| a.filename.clone())
                    .collect(),
            })
            .await;

            let scripted = self.replies.lock().await.pop_front();
            scripted.unwrap_or_else(|| Ok(echo_reply(&message.text)))
        })
    }

    fn get_history(&self, query: HistoryQuery) -> TransportFuture<'_, ChatResult<Vec<Session>>> {
        Box::pin(async move {
            let limit = query.limit.map_or(usize::MAX, |l| l as usize);
            self.record(TransportCall::GetHistory(query)).await;
            let created = self.created.lock().await;
            Ok(created.iter().rev().take(limit).cloned().collect())
        })
    }

    fn get_session(
        &self,
        session_id: &SessionId,
    ) -> TransportFuture<'_, ChatResult<SessionEnvelope>> {
        let session_id = session_id.clone();
        Box::pin(async move {
            self.record(TransportCall::GetSession(session_id.clone())).await;
            let created = self.created.lock().await;
            created
                .iter()
                .find(|s| s.session_id == session_id)
                .map(|session| SessionEnvelope {
                    session: session.clone(),
                    messages: Vec::new(),
                })
                .ok_or_else(|| ChatError::Api {
                    status: 404,
                    message: "Session not found".to_string(),
                })
        })
    }

    fn escalate(
        &self,
        session_id: &SessionId,
        department_id: Option<&str>,
    ) -> TransportFuture<'_, ChatResult<Escalation>> {
        let session_id = session_id.clone();
        let department_id = department_id.map(str::to_string);
        Box::pin(async move {
            self.record(TransportCall::Escalate {
                session_id: session_id.clone(),
                department_id,
            })
            .await;

            if let Some(outcome) = self.escalations.lock().await.pop_front() {
                return outcome;
            }

            let mut created = self.created.lock().await;
            let session = created
                .iter_mut()
                .find(|s| s.session_id == session_id)
                .ok_or_else(|| ChatError::Api {
                    status: 404,
                    message: "Session not found".to_string(),
                })?;
            session.status = SessionStatus::Escalated;

            Ok(Escalation {
                session: session.clone(),
                notice: Some(
                    "Your conversation has been escalated to a technician.".to_string(),
                ),
            })
        })
    }

    fn create_ticket(
        &self,
        session_id: &SessionId,
        draft: TicketDraft,
    ) -> TransportFuture<'_, ChatResult<CreatedTicket>> {
        let session_id = session_id.clone();
        Box::pin(async move {
            self.record(TransportCall::CreateTicket {
                session_id: session_id.clone(),
                draft: draft.clone(),
            })
            .await;

            if let Some(outcome) = self.tickets.lock().await.pop_front() {
                return outcome;
            }

            let mut created = self.created.lock().await;
            let session = created
                .iter_mut()
                .find(|s| s.session_id == session_id)
                .ok_or_else(|| ChatError::Api {
                    status: 404,
                    message: "Chat session not found".to_string(),
                })?;
            let number = FIRST_TICKET_NUMBER + self.ticket_counter.fetch_add(1, Ordering::Relaxed);
            session.ticket_id = Some(number.to_string());

            Ok(confirm_ticket(number, draft))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_sessions_are_fresh() -> ChatResult<()> {
        let transport = ScriptedTransport::new();
        let first = transport.create_session("web").await?;
        let second = transport.create_session("web").await?;
        assert_ne!(first.session.session_id, second.session.session_id);
        assert_eq!(transport.create_session_calls().await, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_scripted_failures_are_replayed_in_order() -> ChatResult<()> {
        let transport = ScriptedTransport::new()
            .with_reply(Err(ChatError::Timeout))
            .with_reply(Ok(SendResponse::with_content("second")));
        let session_id = transport.create_session("web").await?.session.session_id;
        let outbound = OutboundMessage {
            text: "hi".to_string(),
            session_id,
            attachments: Vec::new(),
        };

        assert!(matches!(
            transport.send_message(outbound.clone()).await,
            Err(ChatError::Timeout)
        ));
        let second = transport.send_message(outbound.clone()).await?;
        assert_eq!(second.content.as_deref(), Some("second"));
        let third = transport.send_message(outbound).await?;
        assert!(third.bot_message.is_some());
        assert_eq!(transport.sent_texts().await, vec!["hi", "hi", "hi"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_escalate_and_lookup() -> ChatResult<()> {
        let transport = ScriptedTransport::new();
        let session_id = transport.create_session("web").await?.session.session_id;

        let escalation = transport.escalate(&session_id, Some("dept-1")).await?;
        assert_eq!(escalation.session.status, SessionStatus::Escalated);

        let envelope = transport.get_session(&session_id).await?;
        assert_eq!(envelope.session.status, SessionStatus::Escalated);

        let history = transport.get_history(HistoryQuery::default()).await?;
        assert_eq!(history.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_default_tickets_are_numbered_and_linked() -> ChatResult<()> {
        let transport = ScriptedTransport::new();
        let session_id = transport.create_session("web").await?.session.session_id;

        let first = transport
            .create_ticket(&session_id, TicketDraft::new("VPN", "down"))
            .await?;
        let second = transport
            .create_ticket(&session_id, TicketDraft::new("Printer", "jammed"))
            .await?;

        assert_eq!(first.ticket_id, "1000");
        assert_eq!(second.ticket_id, "1001");
        assert_eq!(
            second.message.and_then(|m| m.metadata.ticket_id()).as_deref(),
            Some("1001")
        );
        let envelope = transport.get_session(&session_id).await?;
        assert_eq!(envelope.session.ticket_id.as_deref(), Some("1001"));
        Ok(())
    }

    #[tokio::test]
    async fn test_ticket_for_unknown_session_is_not_found() -> ChatResult<()> {
        let transport = ScriptedTransport::new();
        let unknown = SessionId::new("chat_missing").map_err(|e| ChatError::Malformed(e.to_string()))?;
        let result = transport.create_ticket(&unknown, TicketDraft::new("a", "b")).await;
        assert!(matches!(result, Err(ChatError::Api { status: 404, .. })));
        Ok(())
    }
}
