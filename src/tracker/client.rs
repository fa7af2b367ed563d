use crate::tracker::DueItem;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use poise::serenity_prelude::{ChannelId, CreateEmbed, CreateMessage, EditMessage, MessageId};
use thiserror::Error;

/// Failure classes the refresh engine reacts to. The adapter decides the
/// class from the platform response; the engine never inspects error text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("channel or message no longer exists")]
    NotFound,
    #[error("rate limited")]
    RateLimited,
    #[error("chat platform error: {0}")]
    Other(String),
}

/// A rendered announcement body, ready to be posted or edited in.
#[derive(Debug, Clone, Default)]
pub struct Payload {
    pub content: Option<String>,
    pub embed: Option<CreateEmbed>,
}

impl Payload {
    pub fn to_create_message(&self) -> CreateMessage {
        let mut message = CreateMessage::new();
        if let Some(content) = &self.content {
            message = message.content(content.clone());
        }
        if let Some(embed) = &self.embed {
            message = message.embed(embed.clone());
        }
        message
    }

    pub fn to_edit_message(&self) -> EditMessage {
        let mut edit = EditMessage::new();
        if let Some(content) = &self.content {
            edit = edit.content(content.clone());
        }
        if let Some(embed) = &self.embed {
            edit = edit.embed(embed.clone());
        }
        edit
    }
}

/// Minimal chat-platform surface the refresh engine needs. Fetches only
/// verify existence; edits push a freshly rendered payload.
#[async_trait]
pub trait ChatClient: Send + Sync + 'static {
    async fn fetch_channel(&self, channel: ChannelId) -> Result<(), ChatError>;
    async fn fetch_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<(), ChatError>;
    async fn edit_message(
        &self,
        channel: ChannelId,
        message: MessageId,
        payload: &Payload,
    ) -> Result<(), ChatError>;
    async fn delete_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<(), ChatError>;
}

#[derive(Debug, Error)]
#[error("render failed: {0}")]
pub struct RenderError(pub String);

/// Turns due-items into a displayable payload. Must be pure given its
/// inputs: the signature dedup assumes identical labels render identically.
pub trait Renderer: Send + Sync + 'static {
    fn render(
        &self,
        items: &[DueItem],
        label: &str,
        now: DateTime<Utc>,
    ) -> Result<Payload, RenderError>;
}
