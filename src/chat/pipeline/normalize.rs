//! Turn a partial send response into a complete user+bot pair.

use chrono::{DateTime, Utc};

use crate::chat::core::config::ChatConfig;
use crate::chat::core::message::{Attachment, Message, MessageMetadata, Sender};
use crate::chat::transport::wire::{SendResponse, WireAttachment, WireMessage};

/// The pair appended to the transcript after a successful send.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedExchange {
    /// User half.
    pub user: Message,
    /// Bot half.
    pub bot: Message,
    /// The reply text was missing and the configured acknowledgment was used.
    pub degraded: bool,
}

/// What was actually sent, used to synthesize a missing user half.
#[derive(Clone, Copy, Debug)]
pub struct SentParts<'a> {
    /// Trimmed outbound text.
    pub text: &'a str,
    /// Names of the attached files, in order.
    pub attachment_names: &'a [String],
    /// Local time of the send.
    pub sent_at: DateTime<Utc>,
}

/// Response normalizer.
#[derive(Clone, Debug)]
pub struct Normalizer {
    fallback_reply: String,
    attachment_placeholder: String,
}

impl Normalizer {
    /// Build a normalizer from the configured defaults.
    #[must_use]
    pub fn new(config: &ChatConfig) -> Self {
        Self {
            fallback_reply: config.fallback_reply.clone(),
            attachment_placeholder: config.attachment_placeholder.clone(),
        }
    }

    /// Complete a send response. Never fails: every missing piece is filled
    /// from the request or a default.
    #[must_use]
    pub fn normalize(&self, response: SendResponse, sent: SentParts<'_>) -> NormalizedExchange {
        let SendResponse {
            user_message,
            bot_message,
            content,
            quick_actions,
            metadata,
        } = response;

        let user = self.user_half(user_message, sent);

        let bot_wire = bot_message.unwrap_or_default();
        let flat_content = content.filter(|c| !c.is_empty());
        let (reply, degraded) = match (bot_wire.non_empty_content(), flat_content) {
            (Some(text), _) => (text.to_string(), false),
            (None, Some(text)) => (text, false),
            (None, None) => (self.fallback_reply.clone(), true),
        };
        let bot = Message {
            sender: bot_wire.parsed_sender().unwrap_or(Sender::Bot),
            content: reply,
            created_at: bot_wire.created_at.unwrap_or(sent.sent_at),
            attachments: bot_wire
                .attachments
                .unwrap_or_default()
                .into_iter()
                .map(WireAttachment::into_attachment)
                .collect(),
            quick_actions: bot_wire.quick_actions.or(quick_actions).unwrap_or_default(),
            metadata: bot_wire
                .metadata
                .or(metadata)
                .map(MessageMetadata::from)
                .unwrap_or_default(),
        };

        NormalizedExchange {
            user,
            bot,
            degraded,
        }
    }

    fn user_half(&self, echoed: Option<WireMessage>, sent: SentParts<'_>) -> Message {
        let fallback_content = if sent.text.is_empty() && !sent.attachment_names.is_empty() {
            self.attachment_placeholder.clone()
        } else {
            sent.text.to_string()
        };
        let local_attachments = || -> Vec<Attachment> {
            sent.attachment_names
                .iter()
                .map(|name| Attachment::local(name.as_str()))
                .collect()
        };

        let Some(wire) = echoed else {
            return Message {
                sender: Sender::User,
                content: fallback_content,
                created_at: sent.sent_at,
                attachments: local_attachments(),
                quick_actions: Vec::new(),
                metadata: MessageMetadata::default(),
            };
        };

        let content = wire
            .non_empty_content()
            .map_or(fallback_content, str::to_string);
        Message {
            sender: wire.parsed_sender().unwrap_or(Sender::User),
            content,
            created_at: wire.created_at.unwrap_or(sent.sent_at),
            attachments: wire.attachments.map_or_else(local_attachments, |stored| {
                stored.into_iter().map(WireAttachment::into_attachment).collect()
            }),
            quick_actions: wire.quick_actions.unwrap_or_default(),
            metadata: wire.metadata.map(MessageMetadata::from).unwrap_or_default(),
        }
    }
}
