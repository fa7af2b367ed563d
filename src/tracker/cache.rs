use poise::serenity_prelude::{ChannelId, MessageId};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

pub const MESSAGE_TTL: Duration = Duration::from_secs(2 * 60);
pub const CHANNEL_TTL: Duration = Duration::from_secs(30 * 60);
pub const PRUNE_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Remembers which channels and messages were recently confirmed to exist so
/// every tick doesn't re-fetch them. Entries expire; a periodic prune keeps
/// the maps from accumulating dead channels.
pub struct FetchCache {
    channels: Mutex<HashMap<ChannelId, Instant>>,
    messages: Mutex<HashMap<(ChannelId, MessageId), Instant>>,
}

impl FetchCache {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            messages: Mutex::new(HashMap::new()),
        }
    }

    pub fn channel_fresh(&self, channel: ChannelId) -> bool {
        self.channels
            .lock()
            .unwrap()
            .get(&channel)
            .is_some_and(|expires| *expires > Instant::now())
    }

    pub fn note_channel(&self, channel: ChannelId) {
        self.channels
            .lock()
            .unwrap()
            .insert(channel, Instant::now() + CHANNEL_TTL);
    }

    pub fn message_fresh(&self, channel: ChannelId, message: MessageId) -> bool {
        self.messages
            .lock()
            .unwrap()
            .get(&(channel, message))
            .is_some_and(|expires| *expires > Instant::now())
    }

    pub fn note_message(&self, channel: ChannelId, message: MessageId) {
        self.messages
            .lock()
            .unwrap()
            .insert((channel, message), Instant::now() + MESSAGE_TTL);
    }

    pub fn invalidate_message(&self, channel: ChannelId, message: MessageId) {
        self.messages.lock().unwrap().remove(&(channel, message));
    }

    pub fn prune(&self) {
        let now = Instant::now();
        self.channels
            .lock()
            .unwrap()
            .retain(|_, expires| *expires > now);
        self.messages
            .lock()
            .unwrap()
            .retain(|_, expires| *expires > now);
    }
}
