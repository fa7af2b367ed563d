use super::*;
use crate::tracker::client::{ChatClient, ChatError, Payload, RenderError, Renderer};
use crate::tracker::persist::{SnapshotRecord, SnapshotStore, StoreError};
use async_trait::async_trait;
use chrono::TimeDelta;
use std::collections::HashSet;
use std::sync::Mutex as StdMutex;

#[derive(Debug, Clone)]
struct EditAttempt {
    channel: ChannelId,
    message: MessageId,
    content: Option<String>,
    at: tokio::time::Instant,
    outcome: Result<(), ChatError>,
}

/// Scripted chat platform: every message exists unless listed missing, and
/// a channel can be told to rate-limit its next edit.
#[derive(Clone, Default)]
struct FakeChat {
    attempts: Arc<StdMutex<Vec<EditAttempt>>>,
    missing_messages: Arc<StdMutex<HashSet<MessageId>>>,
    rate_limit_next_edit: Arc<StdMutex<HashSet<ChannelId>>>,
}

impl FakeChat {
    fn mark_missing(&self, message: MessageId) {
        self.missing_messages.lock().unwrap().insert(message);
    }

    fn rate_limit_next(&self, channel: ChannelId) {
        self.rate_limit_next_edit.lock().unwrap().insert(channel);
    }

    fn attempts(&self) -> Vec<EditAttempt> {
        self.attempts.lock().unwrap().clone()
    }

    fn successful_edits(&self) -> Vec<EditAttempt> {
        self.attempts()
            .into_iter()
            .filter(|attempt| attempt.outcome.is_ok())
            .collect()
    }
}

#[async_trait]
impl ChatClient for FakeChat {
    async fn fetch_channel(&self, _channel: ChannelId) -> Result<(), ChatError> {
        Ok(())
    }

    async fn fetch_message(
        &self,
        _channel: ChannelId,
        message: MessageId,
    ) -> Result<(), ChatError> {
        if self.missing_messages.lock().unwrap().contains(&message) {
            Err(ChatError::NotFound)
        } else {
            Ok(())
        }
    }

    async fn edit_message(
        &self,
        channel: ChannelId,
        message: MessageId,
        payload: &Payload,
    ) -> Result<(), ChatError> {
        let outcome = if self.missing_messages.lock().unwrap().contains(&message) {
            Err(ChatError::NotFound)
        } else if self.rate_limit_next_edit.lock().unwrap().remove(&channel) {
            Err(ChatError::RateLimited)
        } else {
            Ok(())
        };
        self.attempts.lock().unwrap().push(EditAttempt {
            channel,
            message,
            content: payload.content.clone(),
            at: tokio::time::Instant::now(),
            outcome: outcome.clone(),
        });
        outcome
    }

    async fn delete_message(
        &self,
        _channel: ChannelId,
        _message: MessageId,
    ) -> Result<(), ChatError> {
        Ok(())
    }
}

#[derive(Clone, Default)]
struct TestRenderer;

impl Renderer for TestRenderer {
    fn render(
        &self,
        items: &[DueItem],
        label: &str,
        now: DateTime<Utc>,
    ) -> Result<Payload, RenderError> {
        let mut sorted: Vec<&DueItem> = items.iter().collect();
        sorted.sort_by_key(|item| item.due_at);
        let labels: Vec<String> = sorted
            .iter()
            .map(|item| cadence::staged_label(item.due_at, now))
            .collect();
        Ok(Payload {
            content: Some(format!("{label}: {}", labels.join(", "))),
            embed: None,
        })
    }
}

#[derive(Clone, Default)]
struct MemoryStore {
    records: Arc<StdMutex<Vec<SnapshotRecord>>>,
    fail_saves: Arc<StdMutex<bool>>,
}

impl MemoryStore {
    fn stored(&self) -> Vec<SnapshotRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn load(&self) -> Result<Vec<SnapshotRecord>, StoreError> {
        Ok(self.stored())
    }

    async fn save(&self, records: &[SnapshotRecord]) -> Result<(), StoreError> {
        if *self.fail_saves.lock().unwrap() {
            return Err(StoreError("save rejected".into()));
        }
        *self.records.lock().unwrap() = records.to_vec();
        Ok(())
    }
}

type TestTracker = HomeworkTracker<FakeChat, TestRenderer, MemoryStore>;

fn tracker_with(chat: FakeChat, store: MemoryStore) -> TestTracker {
    HomeworkTracker::new(chat, TestRenderer, store)
}

fn item_in(now: DateTime<Utc>, delta: TimeDelta) -> DueItem {
    DueItem {
        title: "worksheet".into(),
        due_at: now + delta,
        group_key: "bio 1".into(),
    }
}

fn task(message_id: MessageId, cadence: Cadence) -> RefreshTask {
    RefreshTask {
        message_id,
        cadence,
    }
}

/// Every record's bucket/slot fields must agree with the membership sets.
fn assert_membership_consistent(tracker: &TestTracker) {
    let state = tracker.inner.state.lock().unwrap();
    for (message_id, record) in &state.records {
        for cadence in [Cadence::Second, Cadence::Minute, Cadence::Hour] {
            assert_eq!(
                state.buckets.contains(*message_id, cadence),
                record.bucket == Some(cadence),
                "bucket set mismatch for {message_id} at {cadence:?}"
            );
        }
        assert_eq!(
            record.hour_slot.is_some(),
            record.bucket == Some(Cadence::Hour),
            "hour_slot must be set exactly for hour-bucket records"
        );
        if let Some(slot) = record.hour_slot {
            assert!(state.buckets.slot_contains(*message_id, slot));
        }
    }
}

#[tokio::test]
async fn dedup_skips_edit_when_signature_unchanged() {
    let chat = FakeChat::default();
    let tracker = tracker_with(chat.clone(), MemoryStore::default());
    let channel = ChannelId::new(10);
    let message = MessageId::new(100);
    let now = Utc::now();

    tracker.track(channel, message, vec![item_in(now, TimeDelta::minutes(10))], "bio 1".into());

    tracker.inner.run_task(channel, task(message, Cadence::Minute), now).await;
    assert_eq!(chat.successful_edits().len(), 1);

    // 5 seconds later the staged label still reads "in 10 min"
    tracker
        .inner
        .run_task(channel, task(message, Cadence::Minute), now + TimeDelta::seconds(5))
        .await;
    assert_eq!(chat.successful_edits().len(), 1, "unchanged label must not re-edit");

    // a minute later it doesn't
    tracker
        .inner
        .run_task(channel, task(message, Cadence::Minute), now + TimeDelta::seconds(70))
        .await;
    assert_eq!(chat.successful_edits().len(), 2);
    assert_membership_consistent(&tracker);
}

#[tokio::test]
async fn due_convergence_pushes_one_final_edit_then_untracks() {
    let chat = FakeChat::default();
    let tracker = tracker_with(chat.clone(), MemoryStore::default());
    let channel = ChannelId::new(10);
    let message = MessageId::new(100);
    let now = Utc::now();
    let due = now + TimeDelta::seconds(30);

    tracker.track(channel, message, vec![item_in(now, TimeDelta::seconds(30))], "bio 1".into());

    tracker.inner.run_task(channel, task(message, Cadence::Second), now).await;
    assert_eq!(chat.successful_edits().len(), 1);

    tracker
        .inner
        .run_task(channel, task(message, Cadence::Second), due + TimeDelta::seconds(1))
        .await;
    let edits = chat.successful_edits();
    assert_eq!(edits.len(), 2);
    assert!(edits[1].content.as_deref().unwrap().contains("due"));
    assert!(tracker.status(message).is_none(), "record must be gone after final push");

    // a stale task for the removed record is a no-op
    tracker
        .inner
        .run_task(channel, task(message, Cadence::Second), due + TimeDelta::seconds(2))
        .await;
    assert_eq!(chat.successful_edits().len(), 2);
    assert_membership_consistent(&tracker);
}

#[tokio::test]
async fn minute_driver_promotes_hour_records() {
    let chat = FakeChat::default();
    let tracker = tracker_with(chat.clone(), MemoryStore::default());
    let channel = ChannelId::new(10);
    let message = MessageId::new(100);
    let now = Utc::now();

    tracker.track(channel, message, vec![item_in(now, TimeDelta::minutes(70))], "bio 1".into());
    assert_eq!(tracker.status(message).unwrap().bucket, Some(Cadence::Hour));

    // 15 minutes later there are 55 minutes left; the sweep must move it
    tracker.inner.minute_tick(now + TimeDelta::minutes(15));
    let status = tracker.status(message).unwrap();
    assert_eq!(status.bucket, Some(Cadence::Minute));
    {
        let state = tracker.inner.state.lock().unwrap();
        assert!(!state.buckets.contains(message, Cadence::Hour));
        assert!(state.buckets.contains(message, Cadence::Minute));
    }
    assert_membership_consistent(&tracker);
}

#[tokio::test]
async fn second_driver_promotes_minute_records() {
    let chat = FakeChat::default();
    let tracker = tracker_with(chat.clone(), MemoryStore::default());
    let channel = ChannelId::new(10);
    let message = MessageId::new(100);
    let now = Utc::now();

    tracker.track(channel, message, vec![item_in(now, TimeDelta::seconds(90))], "bio 1".into());
    assert_eq!(tracker.status(message).unwrap().bucket, Some(Cadence::Minute));

    tracker.inner.second_tick(now + TimeDelta::seconds(35));
    assert_eq!(tracker.status(message).unwrap().bucket, Some(Cadence::Second));
    assert_membership_consistent(&tracker);
}

#[tokio::test(start_paused = true)]
async fn rate_limited_channel_cools_down_while_others_continue() {
    let chat = FakeChat::default();
    let tracker = tracker_with(chat.clone(), MemoryStore::default());
    let limited = ChannelId::new(10);
    let free = ChannelId::new(20);
    let limited_msg = MessageId::new(100);
    let free_msg = MessageId::new(200);
    let now = Utc::now();
    let start = tokio::time::Instant::now();

    tracker.track(limited, limited_msg, vec![item_in(now, TimeDelta::days(7))], "bio 1".into());
    tracker.track(free, free_msg, vec![item_in(now, TimeDelta::days(7))], "chem 2".into());
    chat.rate_limit_next(limited);

    // two ticks' worth of work for the limited channel, one for the free one
    tracker.inner.enqueue(limited, task(limited_msg, Cadence::Hour));
    tracker.inner.enqueue(limited, task(limited_msg, Cadence::Hour));
    tracker.inner.enqueue(free, task(free_msg, Cadence::Hour));

    tokio::time::sleep(Duration::from_secs(10)).await;

    let limited_attempts: Vec<_> = chat
        .attempts()
        .into_iter()
        .filter(|attempt| attempt.channel == limited)
        .collect();
    assert_eq!(limited_attempts.len(), 2);
    assert_eq!(limited_attempts[0].outcome, Err(ChatError::RateLimited));
    assert!(
        limited_attempts[1].at >= start + RATE_LIMIT_COOLDOWN,
        "no edit may run before the cooldown elapses"
    );
    assert_eq!(limited_attempts[1].outcome, Ok(()));

    let free_attempts: Vec<_> = chat
        .attempts()
        .into_iter()
        .filter(|attempt| attempt.channel == free)
        .collect();
    assert_eq!(free_attempts.len(), 1);
    assert!(
        free_attempts[0].at < start + RATE_LIMIT_COOLDOWN,
        "an independent channel must not be stalled by the cooldown"
    );
}

#[tokio::test]
async fn missing_message_untracks_without_editing() {
    let chat = FakeChat::default();
    let tracker = tracker_with(chat.clone(), MemoryStore::default());
    let channel = ChannelId::new(10);
    let message = MessageId::new(100);
    let now = Utc::now();

    tracker.track(channel, message, vec![item_in(now, TimeDelta::minutes(10))], "bio 1".into());
    chat.mark_missing(message);

    tracker.inner.run_task(channel, task(message, Cadence::Minute), now).await;

    assert!(tracker.status(message).is_none());
    assert!(chat.successful_edits().is_empty());
    let state = tracker.inner.state.lock().unwrap();
    assert!(state.records.is_empty());
    for cadence in [Cadence::Second, Cadence::Minute, Cadence::Hour] {
        assert!(state.buckets.members(cadence).is_empty());
    }
}

#[tokio::test(start_paused = true)]
async fn snapshot_round_trip_restores_tracked_tuples() {
    let chat = FakeChat::default();
    let store = MemoryStore::default();
    let tracker = tracker_with(chat.clone(), store.clone());
    let now = Utc::now();

    tracker.track(
        ChannelId::new(10),
        MessageId::new(100),
        vec![item_in(now, TimeDelta::hours(3)), item_in(now, TimeDelta::days(1))],
        "bio 1".into(),
    );
    tracker.track(
        ChannelId::new(20),
        MessageId::new(200),
        vec![item_in(now, TimeDelta::minutes(30))],
        "chem 2".into(),
    );

    // let the debounced save land
    tokio::time::sleep(SAVE_DEBOUNCE * 3).await;
    assert_eq!(store.stored().len(), 2);

    let revived = tracker_with(chat.clone(), store.clone());
    revived.inner.restore().await;
    assert_eq!(revived.inner.snapshot(), tracker.inner.snapshot());
    assert_membership_consistent(&revived);

    // each restored post gets one reconciling refresh through its queue
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(chat.successful_edits().len() >= 2);
}

#[tokio::test(start_paused = true)]
async fn restore_skips_missing_messages() {
    let chat = FakeChat::default();
    let store = MemoryStore::default();
    let now = Utc::now();
    let gone = MessageId::new(200);
    *store.records.lock().unwrap() = vec![
        SnapshotRecord {
            channel_id: 10,
            message_id: 100,
            label: "bio 1".into(),
            items: vec![item_in(now, TimeDelta::hours(2))],
        },
        SnapshotRecord {
            channel_id: 20,
            message_id: 200,
            label: "chem 2".into(),
            items: vec![item_in(now, TimeDelta::hours(2))],
        },
    ];
    chat.mark_missing(gone);

    let tracker = tracker_with(chat.clone(), store.clone());
    tracker.inner.restore().await;

    assert!(tracker.status(MessageId::new(100)).is_some());
    assert!(tracker.status(gone).is_none());
}

#[tokio::test(start_paused = true)]
async fn save_failures_are_swallowed() {
    let chat = FakeChat::default();
    let store = MemoryStore::default();
    *store.fail_saves.lock().unwrap() = true;
    let tracker = tracker_with(chat.clone(), store.clone());
    let now = Utc::now();

    tracker.track(
        ChannelId::new(10),
        MessageId::new(100),
        vec![item_in(now, TimeDelta::hours(2))],
        "bio 1".into(),
    );
    tokio::time::sleep(SAVE_DEBOUNCE * 3).await;

    // tracking is unaffected by the failed write
    assert!(tracker.status(MessageId::new(100)).is_some());
    assert!(store.stored().is_empty());
}

#[tokio::test]
async fn hour_records_land_in_their_due_minute_slot() {
    let chat = FakeChat::default();
    let tracker = tracker_with(chat.clone(), MemoryStore::default());
    let message = MessageId::new(100);
    let now = Utc::now();
    let due = now + TimeDelta::hours(5);
    let expected_slot = due.with_timezone(&HOME_TZ).minute() as usize;

    tracker.track(
        ChannelId::new(10),
        message,
        vec![DueItem {
            title: "lab report".into(),
            due_at: due,
            group_key: "bio 1".into(),
        }],
        "bio 1".into(),
    );

    let state = tracker.inner.state.lock().unwrap();
    let record = state.records.get(&message).unwrap();
    assert_eq!(record.bucket, Some(Cadence::Hour));
    assert_eq!(record.hour_slot, Some(expected_slot));
    assert!(state.buckets.slot_contains(message, expected_slot));
}

#[tokio::test]
async fn retracking_replaces_the_previous_record() {
    let chat = FakeChat::default();
    let tracker = tracker_with(chat.clone(), MemoryStore::default());
    let channel = ChannelId::new(10);
    let message = MessageId::new(100);
    let now = Utc::now();

    tracker.track(channel, message, vec![item_in(now, TimeDelta::hours(5))], "bio 1".into());
    tracker.track(channel, message, vec![item_in(now, TimeDelta::seconds(30))], "bio 1".into());

    let status = tracker.status(message).unwrap();
    assert_eq!(status.bucket, Some(Cadence::Second));
    assert_eq!(status.item_count, 1);
    assert_membership_consistent(&tracker);
}

#[tokio::test]
async fn appending_a_sooner_item_demotes_to_finer_cadence() {
    let chat = FakeChat::default();
    let tracker = tracker_with(chat.clone(), MemoryStore::default());
    let channel = ChannelId::new(10);
    let message = MessageId::new(100);
    let now = Utc::now();

    tracker.track(channel, message, vec![item_in(now, TimeDelta::hours(5))], "bio 1".into());
    assert_eq!(tracker.status(message).unwrap().bucket, Some(Cadence::Hour));

    assert!(tracker.append_items(message, vec![item_in(now, TimeDelta::seconds(45))]));
    let status = tracker.status(message).unwrap();
    assert_eq!(status.bucket, Some(Cadence::Second));
    assert_eq!(status.item_count, 2);
    assert_membership_consistent(&tracker);

    assert!(!tracker.append_items(MessageId::new(999), vec![item_in(now, TimeDelta::hours(1))]));
}

#[tokio::test(start_paused = true)]
async fn daily_refresh_touches_live_records_only() {
    let chat = FakeChat::default();
    let tracker = tracker_with(chat.clone(), MemoryStore::default());
    let now = Utc::now();
    let live = MessageId::new(100);

    tracker.track(ChannelId::new(10), live, vec![item_in(now, TimeDelta::days(3))], "bio 1".into());
    {
        // hand-craft an already-expired record; the daily pass must not touch it
        let mut state = tracker.inner.state.lock().unwrap();
        state.records.insert(
            MessageId::new(200),
            TrackedPost {
                channel_id: ChannelId::new(20),
                message_id: MessageId::new(200),
                items: vec![item_in(now, -TimeDelta::hours(1))],
                label: "chem 2".into(),
                last_signature: None,
                bucket: None,
                hour_slot: None,
            },
        );
    }

    tracker.inner.daily_refresh(now);
    tokio::time::sleep(Duration::from_secs(5)).await;

    let edits = chat.successful_edits();
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0].message, live);
}
