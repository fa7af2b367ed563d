use crate::tracker::client::{ChatClient, ChatError, Payload};
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use poise::serenity_prelude::{ChannelId, Http, HttpError, MessageId};
use std::sync::Arc;

/// Discord-backed chat client. Error classification happens here so the
/// refresh engine only ever sees the structured variants.
pub struct SerenityChat {
    http: Arc<Http>,
}

impl SerenityChat {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

fn classify_error(err: serenity::Error) -> ChatError {
    if let serenity::Error::Http(HttpError::UnsuccessfulRequest(response)) = &err {
        match response.status_code.as_u16() {
            404 => return ChatError::NotFound,
            429 => return ChatError::RateLimited,
            _ => {}
        }
    }
    ChatError::Other(err.to_string())
}

#[async_trait]
impl ChatClient for SerenityChat {
    async fn fetch_channel(&self, channel: ChannelId) -> Result<(), ChatError> {
        self.http
            .get_channel(channel)
            .await
            .map(|_| ())
            .map_err(classify_error)
    }

    async fn fetch_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<(), ChatError> {
        self.http
            .get_message(channel, message)
            .await
            .map(|_| ())
            .map_err(classify_error)
    }

    async fn edit_message(
        &self,
        channel: ChannelId,
        message: MessageId,
        payload: &Payload,
    ) -> Result<(), ChatError> {
        channel
            .edit_message(&self.http, message, payload.to_edit_message())
            .await
            .map(|_| ())
            .map_err(classify_error)
    }

    async fn delete_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<(), ChatError> {
        channel
            .delete_message(&self.http, message)
            .await
            .map_err(classify_error)
    }
}
