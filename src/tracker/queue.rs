use crate::tracker::cadence::Cadence;
use poise::serenity_prelude::{ChannelId, MessageId};
use rand::Rng;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Channel-wide pause applied after the platform reports a rate limit.
pub const RATE_LIMIT_COOLDOWN: Duration = Duration::from_millis(1500);

/// One pending refresh of a tracked message, tagged with the cadence that
/// requested it so the worker knows how hard to pace itself.
#[derive(Debug, Clone, Copy)]
pub struct RefreshTask {
    pub message_id: MessageId,
    pub cadence: Cadence,
}

/// What the channel worker should do next.
pub enum Dequeue {
    Run(RefreshTask),
    /// In cooldown; wait this long and ask again.
    Wait(Duration),
    /// Queue drained; the worker exits and the processing flag is cleared.
    Idle,
}

struct QueueState {
    pending: VecDeque<RefreshTask>,
    processing: bool,
    cooldown_until: Option<Instant>,
}

impl QueueState {
    fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            processing: false,
            cooldown_until: None,
        }
    }
}

/// Per-channel FIFO edit queues, created lazily. Each channel is worked by at
/// most one worker at a time; different channels proceed independently.
pub struct ChannelQueues {
    queues: Mutex<HashMap<ChannelId, QueueState>>,
}

impl ChannelQueues {
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
        }
    }

    /// Append a task. Returns true when the caller must spawn a worker for
    /// this channel (none was processing).
    pub fn push(&self, channel: ChannelId, task: RefreshTask) -> bool {
        let mut queues = self.queues.lock().unwrap();
        let state = queues.entry(channel).or_insert_with(QueueState::new);
        state.pending.push_back(task);
        if state.processing {
            false
        } else {
            state.processing = true;
            true
        }
    }

    /// Next action for a channel's worker. The cooldown is re-checked before
    /// every dequeue so a rate-limit pause delays pending tasks without
    /// dropping them. Clearing the processing flag and observing an empty
    /// queue happen under one lock, so a concurrent push either sees the flag
    /// still set or spawns a fresh worker.
    pub fn next(&self, channel: ChannelId) -> Dequeue {
        let mut queues = self.queues.lock().unwrap();
        let state = queues.entry(channel).or_insert_with(QueueState::new);
        if let Some(until) = state.cooldown_until {
            let now = Instant::now();
            if now < until {
                return Dequeue::Wait(until - now);
            }
            state.cooldown_until = None;
        }
        match state.pending.pop_front() {
            Some(task) => Dequeue::Run(task),
            None => {
                state.processing = false;
                Dequeue::Idle
            }
        }
    }

    pub fn set_cooldown(&self, channel: ChannelId, duration: Duration) {
        let mut queues = self.queues.lock().unwrap();
        let state = queues.entry(channel).or_insert_with(QueueState::new);
        state.cooldown_until = Some(Instant::now() + duration);
    }
}

/// Small random spread added to the per-cadence base delay so simultaneous
/// ticks don't land edits in lockstep.
pub fn pacing_jitter() -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(0..60))
}
