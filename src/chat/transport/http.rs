//! `reqwest` implementation of the transport against the helpdesk REST API.

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use crate::chat::core::config::ChatConfig;
use crate::chat::core::errors::{
    ChatError, ChatResult, REQUEST_FAILED_MESSAGE, SESSION_EXPIRED_MESSAGE,
};
use crate::chat::core::ids::SessionId;
use crate::chat::core::session::{Session, SessionEnvelope};

use super::wire::{
    SendResponse, WireEscalation, WireSession, WireSessionEnvelope, WireTicketCreated,
};
use super::{
    ChatTransport, CreatedTicket, Escalation, HistoryQuery, OutboundMessage, TicketDraft,
    TransportFuture,
};

/// Error body returned by the API (`{ "message": "..." }`).
#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Body of the create-ticket endpoint.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TicketRequest<'a> {
    session_id: &'a SessionId,
    #[serde(flatten)]
    draft: &'a TicketDraft,
}

/// HTTP transport for the `/chatbot` endpoints.
#[derive(Clone, Debug)]
pub struct HttpChatTransport {
    client: reqwest::Client,
    base: Url,
    auth_token: Option<String>,
    channel: String,
    history_limit: u32,
}

impl HttpChatTransport {
    /// Build a transport from the client configuration.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the HTTP client cannot be built.
    pub fn new(config: &ChatConfig) -> ChatResult<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Ok(agent) =
            HeaderValue::from_str(&format!("helpdesk-chat/{}", env!("CARGO_PKG_VERSION")))
        {
            headers.insert(USER_AGENT, agent);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            base: config.api_base()?,
            auth_token: config.auth_token.clone(),
            channel: config.channel.clone(),
            history_limit: config.history_limit,
        })
    }

    /// Start a request against a path relative to the API base.
    fn request(&self, method: Method, path: &str) -> ChatResult<RequestBuilder> {
        let url = self.base.join(path)?;
        let builder = self.client.request(method, url);
        Ok(match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    /// Send a request and map transport and status failures.
    async fn execute(builder: RequestBuilder) -> ChatResult<Response> {
        let response = builder.send().await.map_err(map_send_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message)
            .filter(|m| !m.trim().is_empty());

        if status == StatusCode::UNAUTHORIZED {
            return Err(ChatError::Unauthorized(
                message.unwrap_or_else(|| SESSION_EXPIRED_MESSAGE.to_string()),
            ));
        }

        Err(ChatError::Api {
            status: status.as_u16(),
            message: message.unwrap_or_else(|| REQUEST_FAILED_MESSAGE.to_string()),
        })
    }

    /// Read a JSON body.
    async fn read_json<T: for<'de> Deserialize<'de>>(response: Response) -> ChatResult<T> {
        let bytes = response.bytes().await.map_err(map_send_error)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Split reqwest failures into the variants the widget reports differently.
fn map_send_error(err: reqwest::Error) -> ChatError {
    if err.is_timeout() {
        ChatError::Timeout
    } else if err.is_connect() {
        ChatError::Network(err.to_string())
    } else {
        ChatError::Http(err)
    }
}

/// Multipart body for a message carrying files.
fn multipart_body(message: OutboundMessage) -> ChatResult<Form> {
    let mut form = Form::new()
        .text("message", message.text)
        .text("sessionId", message.session_id.to_string());

    for attachment in message.attachments {
        let mut part = Part::bytes(attachment.bytes).file_name(attachment.filename);
        if let Some(content_type) = attachment.content_type {
            part = part.mime_str(&content_type)?;
        }
        form = form.part("attachments", part);
    }

    Ok(form)
}

impl ChatTransport for HttpChatTransport {
    fn create_session(&self, channel: &str) -> TransportFuture<'_, ChatResult<SessionEnvelope>> {
        let channel = channel.to_string();
        Box::pin(async move {
            let builder = self
                .request(Method::POST, "chatbot/session")?
                .json(&json!({ "platform": channel }));
            let response = Self::execute(builder).await?;
            let envelope: WireSessionEnvelope = Self::read_json(response).await?;
            envelope.into_envelope(&channel)
        })
    }

    fn send_message(
        &self,
        message: OutboundMessage,
    ) -> TransportFuture<'_, ChatResult<SendResponse>> {
        Box::pin(async move {
            let attachment_count = message.attachments.len();
            let builder = self.request(Method::POST, "chatbot/message")?;
            let builder = if attachment_count == 0 {
                builder.json(&json!({
                    "message": message.text,
                    "sessionId": message.session_id,
                }))
            } else {
                builder.multipart(multipart_body(message)?)
            };

            let response = Self::execute(builder).await?;
            let bytes = response.bytes().await.map_err(map_send_error)?;
            debug!(attachment_count, bytes = bytes.len(), "chat message accepted");

            // A success status with an unreadable body still gets a reply downstream.
            Ok(serde_json::from_slice(&bytes).unwrap_or_else(|err| {
                warn!(error = %err, "undecodable send response, using defaults");
                SendResponse::default()
            }))
        })
    }

    fn get_history(&self, query: HistoryQuery) -> TransportFuture<'_, ChatResult<Vec<Session>>> {
        Box::pin(async move {
            let limit = query.limit.unwrap_or(self.history_limit).to_string();
            let mut params = vec![("limit", limit)];
            if let Some(user_id) = query.user_id {
                params.push(("userId", user_id));
            }

            let builder = self.request(Method::GET, "chatbot/history")?.query(&params);
            let response = Self::execute(builder).await?;
            let sessions: Vec<WireSession> = Self::read_json(response).await?;

            Ok(sessions
                .into_iter()
                .filter_map(|wire| match wire.into_session(&self.channel) {
                    Ok(session) => Some(session),
                    Err(err) => {
                        warn!(error = %err, "skipping history entry");
                        None
                    }
                })
                .collect())
        })
    }

    fn get_session(
        &self,
        session_id: &SessionId,
    ) -> TransportFuture<'_, ChatResult<SessionEnvelope>> {
        let path = format!(
            "chatbot/session/{}",
            urlencoding::encode(session_id.as_str())
        );
        Box::pin(async move {
            let builder = self.request(Method::GET, &path)?;
            let response = Self::execute(builder).await?;
            let envelope: WireSessionEnvelope = Self::read_json(response).await?;
            envelope.into_envelope(&self.channel)
        })
    }

    fn escalate(
        &self,
        session_id: &SessionId,
        department_id: Option<&str>,
    ) -> TransportFuture<'_, ChatResult<Escalation>> {
        let body = json!({
            "sessionId": session_id,
            "departmentId": department_id,
        });
        Box::pin(async move {
            let builder = self.request(Method::POST, "chatbot/escalate")?.json(&body);
            let response = Self::execute(builder).await?;
            let escalation: WireEscalation = Self::read_json(response).await?;

            let session = escalation
                .session
                .ok_or_else(|| ChatError::Malformed("escalation without session".to_string()))?
                .into_session(&self.channel)?;
            let notice = escalation
                .message
                .and_then(|m| m.content)
                .filter(|c| !c.trim().is_empty());

            Ok(Escalation { session, notice })
        })
    }

    fn create_ticket(
        &self,
        session_id: &SessionId,
        draft: TicketDraft,
    ) -> TransportFuture<'_, ChatResult<CreatedTicket>> {
        let body = serde_json::to_value(TicketRequest {
            session_id,
            draft: &draft,
        });
        Box::pin(async move {
            let builder = self
                .request(Method::POST, "chatbot/create-ticket")?
                .json(&body?);
            let response = Self::execute(builder).await?;
            let created: WireTicketCreated = Self::read_json(response).await?;
            let ticket = created.into_created()?;
            debug!(ticket_id = %ticket.ticket_id, "ticket created from chat");
            Ok(ticket)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::core::session::SessionStatus;
    use crate::chat::quick_actions::Priority;
    use crate::chat::transport::OutboundAttachment;
    use wiremock::matchers::{body_partial_json, header, header_regex, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport_for(server: &MockServer) -> ChatResult<HttpChatTransport> {
        let config = ChatConfig::new()
            .with_api_base_url(format!("{}/api", server.uri()))
            .with_auth_token("secret");
        HttpChatTransport::new(&config)
    }

    fn session_id(raw: &str) -> ChatResult<SessionId> {
        SessionId::new(raw).map_err(|e| ChatError::Malformed(e.to_string()))
    }

    #[tokio::test]
    async fn test_create_session_posts_platform() -> ChatResult<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chatbot/session"))
            .and(header("authorization", "Bearer secret"))
            .and(body_partial_json(json!({ "platform": "web" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "session": { "sessionId": "chat_1_abc", "status": "active", "ticketId": null },
                "messages": [{ "sender": "bot", "content": "Welcome back" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let envelope = transport_for(&server)?.create_session("web").await?;
        assert_eq!(envelope.session.session_id.as_str(), "chat_1_abc");
        assert_eq!(envelope.session.status, SessionStatus::Active);
        assert_eq!(envelope.messages.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_send_text_uses_json_body() -> ChatResult<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chatbot/message"))
            .and(body_partial_json(json!({ "message": "hello", "sessionId": "chat_1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "userMessage": { "sender": "user", "content": "hello" },
                "botMessage": { "sender": "bot", "content": "hi", "quickActions": ["FAQ"] }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = transport_for(&server)?
            .send_message(OutboundMessage {
                text: "hello".to_string(),
                session_id: session_id("chat_1")?,
                attachments: Vec::new(),
            })
            .await?;
        assert_eq!(
            response.bot_message.and_then(|m| m.quick_actions),
            Some(vec!["FAQ".to_string()])
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_send_with_files_uses_multipart() -> ChatResult<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chatbot/message"))
            .and(header_regex("content-type", "^multipart/form-data"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "content": "got it" })))
            .expect(1)
            .mount(&server)
            .await;

        let response = transport_for(&server)?
            .send_message(OutboundMessage {
                text: String::new(),
                session_id: session_id("chat_1")?,
                attachments: vec![OutboundAttachment::new("f.png", vec![0x89, 0x50])],
            })
            .await?;
        assert_eq!(response.content.as_deref(), Some("got it"));
        Ok(())
    }

    #[tokio::test]
    async fn test_undecodable_send_body_is_tolerated() -> ChatResult<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chatbot/message"))
            .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
            .mount(&server)
            .await;

        let response = transport_for(&server)?
            .send_message(OutboundMessage {
                text: "hello".to_string(),
                session_id: session_id("chat_1")?,
                attachments: Vec::new(),
            })
            .await?;
        assert_eq!(response, SendResponse::default());
        Ok(())
    }

    #[tokio::test]
    async fn test_unauthorized_maps_message() -> ChatResult<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chatbot/session"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({ "message": "Not authorized" })),
            )
            .mount(&server)
            .await;

        let result = transport_for(&server)?.create_session("web").await;
        assert!(matches!(result, Err(ChatError::Unauthorized(m)) if m == "Not authorized"));
        Ok(())
    }

    #[tokio::test]
    async fn test_server_error_without_body() -> ChatResult<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chatbot/session"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = transport_for(&server)?.create_session("web").await;
        assert!(matches!(
            result,
            Err(ChatError::Api { status: 500, ref message }) if message == REQUEST_FAILED_MESSAGE
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_history_passes_filters_and_skips_bad_rows() -> ChatResult<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/chatbot/history"))
            .and(query_param("userId", "u-7"))
            .and(query_param("limit", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "sessionId": "chat_a", "status": "resolved" },
                { "status": "active" },
                { "sessionId": "chat_b", "status": "closed", "metadata": { "platform": "mobile" } }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let sessions = transport_for(&server)?
            .get_history(HistoryQuery {
                user_id: Some("u-7".to_string()),
                limit: Some(5),
            })
            .await?;
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[1].channel, "mobile");
        assert_eq!(sessions[1].status, SessionStatus::Closed);
        Ok(())
    }

    #[tokio::test]
    async fn test_get_session_encodes_path() -> ChatResult<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/chatbot/session/chat%201"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "session": { "sessionId": "chat 1" },
                "messages": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let envelope = transport_for(&server)?
            .get_session(&session_id("chat 1")?)
            .await?;
        assert_eq!(envelope.session.session_id.as_str(), "chat 1");
        Ok(())
    }

    #[tokio::test]
    async fn test_escalate_returns_notice() -> ChatResult<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chatbot/escalate"))
            .and(body_partial_json(json!({ "sessionId": "chat_1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "session": { "sessionId": "chat_1", "status": "escalated" },
                "message": { "sender": "system", "content": "A technician will respond shortly." }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let escalation = transport_for(&server)?
            .escalate(&session_id("chat_1")?, None)
            .await?;
        assert_eq!(escalation.session.status, SessionStatus::Escalated);
        assert_eq!(
            escalation.notice.as_deref(),
            Some("A technician will respond shortly.")
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_create_ticket_posts_draft() -> ChatResult<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chatbot/create-ticket"))
            .and(body_partial_json(json!({
                "sessionId": "chat_1",
                "title": "VPN down",
                "description": "Cannot connect",
                "priority": "urgent",
                "category": "Network"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ticket": { "ticketId": 1044, "title": "VPN down", "priority": "urgent", "status": "open" },
                "message": {
                    "sender": "bot",
                    "content": "Ticket #1044 has been created successfully!",
                    "metadata": { "ticketId": 1044 }
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let draft = TicketDraft::new("VPN down", "Cannot connect")
            .with_priority(Priority::Urgent)
            .with_category("Network");
        let ticket = transport_for(&server)?
            .create_ticket(&session_id("chat_1")?, draft)
            .await?;
        assert_eq!(ticket.ticket_id, "1044");
        assert_eq!(ticket.priority, Some(Priority::Urgent));
        assert!(ticket.message.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_create_ticket_surfaces_validation_message() -> ChatResult<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chatbot/create-ticket"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "message": "Title and description are required"
            })))
            .mount(&server)
            .await;

        let result = transport_for(&server)?
            .create_ticket(&session_id("chat_1")?, TicketDraft::new("", ""))
            .await;
        assert!(matches!(
            result,
            Err(ChatError::Api { status: 400, ref message }) if message == "Title and description are required"
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() -> ChatResult<()> {
        let config = ChatConfig::new().with_api_base_url("http://127.0.0.1:9/api");
        let result = HttpChatTransport::new(&config)?.create_session("web").await;
        assert!(matches!(result, Err(ChatError::Network(_))));
        Ok(())
    }
}
