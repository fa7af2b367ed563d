//! Adaptive refresh engine for posted homework announcements.
//!
//! Posts are classified into second/minute/hour cadence buckets by how soon
//! their next item is due. Wall-aligned drivers select due buckets each tick
//! and feed per-channel FIFO queues, which pace edits and back off on rate
//! limits. A staged-label signature skips edits that wouldn't change the
//! displayed text, and a debounced snapshot lets tracking survive restarts.

pub mod buckets;
pub mod cache;
pub mod cadence;
pub mod client;
pub mod persist;
pub mod queue;
pub mod timing;

#[cfg(test)]
mod tests;

use crate::tracker::buckets::BucketRegistry;
use crate::tracker::cache::{FetchCache, PRUNE_INTERVAL};
use crate::tracker::cadence::{classify, signature, Cadence};
use crate::tracker::client::{ChatClient, ChatError, Renderer};
use crate::tracker::persist::{SnapshotRecord, SnapshotStore, SAVE_DEBOUNCE};
use crate::tracker::queue::{
    pacing_jitter, ChannelQueues, Dequeue, RefreshTask, RATE_LIMIT_COOLDOWN,
};
use crate::tracker::timing::{next_home_midnight, until_next_boundary, HOME_TZ};
use chrono::{DateTime, Timelike, Utc};
use poise::serenity_prelude::{ChannelId, MessageId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// At most this many second-bucket posts are enqueued per tick; the
/// round-robin cursor keeps the rest from starving.
pub const SECOND_BUCKET_CAP_PER_TICK: usize = 6;

/// A single titled deadline shown on an announcement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DueItem {
    pub title: String,
    pub due_at: DateTime<Utc>,
    pub group_key: String,
}

struct TrackedPost {
    channel_id: ChannelId,
    message_id: MessageId,
    items: Vec<DueItem>,
    label: String,
    last_signature: Option<String>,
    bucket: Option<Cadence>,
    hour_slot: Option<usize>,
}

impl TrackedPost {
    fn all_past_due(&self, now: DateTime<Utc>) -> bool {
        self.items.iter().all(|item| item.due_at <= now)
    }

    fn snapshot(&self) -> SnapshotRecord {
        SnapshotRecord {
            channel_id: self.channel_id.get(),
            message_id: self.message_id.get(),
            label: self.label.clone(),
            items: self.items.clone(),
        }
    }
}

/// Current tracking state of one announcement, for the status command.
#[derive(Debug, Clone, PartialEq)]
pub struct PostStatus {
    pub bucket: Option<Cadence>,
    pub item_count: usize,
    pub all_past_due: bool,
}

/// One row of the tracked-post listing.
#[derive(Debug, Clone)]
pub struct TrackedSummary {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub label: String,
    pub bucket: Option<Cadence>,
    pub item_count: usize,
}

struct TrackerState {
    records: HashMap<MessageId, TrackedPost>,
    buckets: BucketRegistry,
}

/// The tracking table plus everything that keeps it current. One instance
/// owns all state; nothing here is process-global.
pub struct HomeworkTracker<C, R, S> {
    inner: Arc<Inner<C, R, S>>,
}

impl<C, R, S> Clone for HomeworkTracker<C, R, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<C, R, S> {
    chat: C,
    renderer: R,
    store: S,
    state: Mutex<TrackerState>,
    queues: ChannelQueues,
    cache: FetchCache,
    persist_epoch: AtomicU64,
    started: AtomicBool,
}

impl<C: ChatClient, R: Renderer, S: SnapshotStore> HomeworkTracker<C, R, S> {
    pub fn new(chat: C, renderer: R, store: S) -> Self {
        Self {
            inner: Arc::new(Inner {
                chat,
                renderer,
                store,
                state: Mutex::new(TrackerState {
                    records: HashMap::new(),
                    buckets: BucketRegistry::new(),
                }),
                queues: ChannelQueues::new(),
                cache: FetchCache::new(),
                persist_epoch: AtomicU64::new(0),
                started: AtomicBool::new(false),
            }),
        }
    }

    /// Register an announcement for adaptive refresh. Tracking the same
    /// message again replaces the previous record.
    pub fn track(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        items: Vec<DueItem>,
        label: String,
    ) {
        let now = Utc::now();
        {
            let mut state = self.inner.state.lock().unwrap();
            state.buckets.remove_everywhere(message_id);
            state.records.insert(
                message_id,
                TrackedPost {
                    channel_id,
                    message_id,
                    items,
                    label,
                    last_signature: None,
                    bucket: None,
                    hour_slot: None,
                },
            );
            update_membership(&mut state, message_id, now);
        }
        self.inner.schedule_persist();
    }

    /// Stop tracking. Idempotent; returns the channel the post lived in when
    /// something was actually removed.
    pub fn untrack(&self, message_id: MessageId) -> Option<ChannelId> {
        self.inner.untrack(message_id)
    }

    /// Append items to a tracked announcement and refresh it. Returns false
    /// when the message isn't tracked.
    pub fn append_items(&self, message_id: MessageId, new_items: Vec<DueItem>) -> bool {
        let now = Utc::now();
        let target = {
            let mut state = self.inner.state.lock().unwrap();
            let Some(record) = state.records.get_mut(&message_id) else {
                return false;
            };
            record.items.extend(new_items);
            // A newly appended item with a nearer deadline may demote the
            // post to a finer cadence right away.
            update_membership(&mut state, message_id, now);
            state
                .records
                .get(&message_id)
                .map(|record| (record.channel_id, record.bucket.unwrap_or(Cadence::Minute)))
        };
        if let Some((channel, cadence)) = target {
            self.inner.enqueue(channel, RefreshTask { message_id, cadence });
        }
        self.inner.schedule_persist();
        true
    }

    pub fn status(&self, message_id: MessageId) -> Option<PostStatus> {
        let state = self.inner.state.lock().unwrap();
        let record = state.records.get(&message_id)?;
        Some(PostStatus {
            bucket: record.bucket,
            item_count: record.items.len(),
            all_past_due: record.all_past_due(Utc::now()),
        })
    }

    pub fn list_tracked(&self) -> Vec<TrackedSummary> {
        let state = self.inner.state.lock().unwrap();
        let mut summaries: Vec<TrackedSummary> = state
            .records
            .values()
            .map(|record| TrackedSummary {
                channel_id: record.channel_id,
                message_id: record.message_id,
                label: record.label.clone(),
                bucket: record.bucket,
                item_count: record.items.len(),
            })
            .collect();
        summaries.sort_by_key(|summary| summary.message_id);
        summaries
    }

    /// Restore persisted posts and launch the tick drivers. Safe to call
    /// more than once; only the first call does anything.
    pub fn start(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let inner = self.inner.clone();
        tokio::spawn(async move {
            inner.restore().await;
        });

        let inner = self.inner.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(PRUNE_INTERVAL).await;
                inner.cache.prune();
            }
        });

        // Second driver, aligned to the top of each wall-clock second.
        let inner = self.inner.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(until_next_boundary(Duration::from_secs(1))).await;
                inner.second_tick(Utc::now());
            }
        });

        // Minute driver, aligned to :00 of each minute.
        let inner = self.inner.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(until_next_boundary(Duration::from_secs(60))).await;
                inner.minute_tick(Utc::now());
            }
        });

        // Daily driver at home-time-zone midnight, recomputed every firing.
        let inner = self.inner.clone();
        tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let wait = (next_home_midnight(now) - now)
                    .to_std()
                    .unwrap_or(Duration::from_secs(1));
                tokio::time::sleep(wait).await;
                inner.daily_refresh(Utc::now());
            }
        });
    }
}

impl<C: ChatClient, R: Renderer, S: SnapshotStore> Inner<C, R, S> {
    fn untrack(self: &Arc<Self>, message_id: MessageId) -> Option<ChannelId> {
        let channel = {
            let mut state = self.state.lock().unwrap();
            remove_record(&mut state, message_id)
        };
        if channel.is_some() {
            self.schedule_persist();
        }
        channel
    }

    pub(crate) fn enqueue(self: &Arc<Self>, channel: ChannelId, task: RefreshTask) {
        if self.queues.push(channel, task) {
            let inner = self.clone();
            tokio::spawn(async move {
                inner.work_channel(channel).await;
            });
        }
    }

    /// Single worker per channel: drain the queue FIFO, pacing between tasks
    /// and honoring cooldown before every dequeue.
    async fn work_channel(self: Arc<Self>, channel: ChannelId) {
        loop {
            match self.queues.next(channel) {
                Dequeue::Wait(wait) => tokio::time::sleep(wait).await,
                Dequeue::Idle => break,
                Dequeue::Run(task) => {
                    let cadence = task.cadence;
                    self.run_task(channel, task, Utc::now()).await;
                    tokio::time::sleep(cadence.base_delay() + pacing_jitter()).await;
                }
            }
        }
    }

    pub(crate) async fn run_task(
        self: &Arc<Self>,
        channel: ChannelId,
        task: RefreshTask,
        now: DateTime<Utc>,
    ) {
        let message_id = task.message_id;
        let (items, label, sig, all_due) = {
            let mut state = self.state.lock().unwrap();
            let Some(record) = state.records.get(&message_id) else {
                return;
            };
            let sig = signature(&record.items, record.bucket, now);
            if record.last_signature.as_deref() == Some(sig.as_str()) {
                // Displayed text is unchanged; skip the render and edit but
                // keep membership current.
                update_membership(&mut state, message_id, now);
                return;
            }
            let all_due = record.all_past_due(now);
            (record.items.clone(), record.label.clone(), sig, all_due)
        };

        if !self.cache.channel_fresh(channel) {
            match self.chat.fetch_channel(channel).await {
                Ok(()) => self.cache.note_channel(channel),
                Err(err) => return self.resolve_failed(channel, message_id, err),
            }
        }
        if !self.cache.message_fresh(channel, message_id) {
            match self.chat.fetch_message(channel, message_id).await {
                Ok(()) => self.cache.note_message(channel, message_id),
                Err(err) => return self.resolve_failed(channel, message_id, err),
            }
        }

        let payload = match self.renderer.render(&items, &label, now) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(%message_id, "render failed: {err}");
                return;
            }
        };

        match self.chat.edit_message(channel, message_id, &payload).await {
            Ok(()) => {
                let removed = {
                    let mut state = self.state.lock().unwrap();
                    let Some(record) = state.records.get_mut(&message_id) else {
                        return;
                    };
                    record.last_signature = Some(sig);
                    if all_due {
                        // Final "due" state is on screen; nothing left to refresh.
                        remove_record(&mut state, message_id);
                        true
                    } else {
                        update_membership(&mut state, message_id, now);
                        false
                    }
                };
                if removed {
                    self.schedule_persist();
                }
            }
            Err(ChatError::NotFound) => {
                self.cache.invalidate_message(channel, message_id);
                self.untrack(message_id);
            }
            Err(ChatError::RateLimited) => {
                self.queues.set_cooldown(channel, RATE_LIMIT_COOLDOWN);
            }
            Err(ChatError::Other(err)) => {
                tracing::debug!(%message_id, "refresh edit failed: {err}");
            }
        }
    }

    fn resolve_failed(self: &Arc<Self>, channel: ChannelId, message_id: MessageId, err: ChatError) {
        match err {
            ChatError::NotFound => {
                self.cache.invalidate_message(channel, message_id);
                self.untrack(message_id);
            }
            ChatError::RateLimited => self.queues.set_cooldown(channel, RATE_LIMIT_COOLDOWN),
            ChatError::Other(err) => tracing::debug!(%message_id, "fetch failed: {err}"),
        }
    }

    pub(crate) fn second_tick(self: &Arc<Self>, now: DateTime<Utc>) {
        let selected = {
            let mut state = self.state.lock().unwrap();
            promote(&mut state, Cadence::Minute, Cadence::Second, now);
            let ids = state.buckets.select_second(SECOND_BUCKET_CAP_PER_TICK);
            collect_tasks(&mut state, ids, Cadence::Second)
        };
        for (channel, task) in selected {
            self.enqueue(channel, task);
        }
    }

    pub(crate) fn minute_tick(self: &Arc<Self>, now: DateTime<Utc>) {
        let selected = {
            let mut state = self.state.lock().unwrap();
            promote(&mut state, Cadence::Hour, Cadence::Minute, now);
            let minute_ids = state.buckets.members(Cadence::Minute);
            let mut tasks = collect_tasks(&mut state, minute_ids, Cadence::Minute);

            // Hour-cadence posts are only touched on their due minute-of-hour.
            let slot = now.with_timezone(&HOME_TZ).minute() as usize;
            for message_id in state.buckets.slot_members(slot) {
                match state.records.get(&message_id) {
                    None => state.buckets.remove_everywhere(message_id),
                    Some(record) if record.bucket != Some(Cadence::Hour) => {
                        state.buckets.remove_hour_slot(message_id, slot);
                    }
                    Some(record) => tasks.push((
                        record.channel_id,
                        RefreshTask {
                            message_id,
                            cadence: Cadence::Hour,
                        },
                    )),
                }
            }
            tasks
        };
        for (channel, task) in selected {
            self.enqueue(channel, task);
        }
    }

    /// Once a day every tracked post gets one forced pass through its queue,
    /// so nothing silently goes stale across day boundaries.
    pub(crate) fn daily_refresh(self: &Arc<Self>, now: DateTime<Utc>) {
        let selected: Vec<(ChannelId, RefreshTask)> = {
            let state = self.state.lock().unwrap();
            state
                .records
                .values()
                .filter(|record| !record.all_past_due(now))
                .map(|record| {
                    (
                        record.channel_id,
                        RefreshTask {
                            message_id: record.message_id,
                            cadence: record.bucket.unwrap_or(Cadence::Minute),
                        },
                    )
                })
                .collect()
        };
        for (channel, task) in selected {
            self.enqueue(channel, task);
        }
    }

    /// Reload the snapshot, verify each post still exists, and enqueue one
    /// reconciling refresh per survivor (it may have gone due during
    /// downtime).
    pub(crate) async fn restore(self: &Arc<Self>) {
        let records = match self.store.load().await {
            Ok(records) => records,
            Err(err) => {
                tracing::warn!("snapshot load failed: {err}");
                return;
            }
        };
        let mut restored = 0usize;
        for snapshot in records {
            if snapshot.channel_id == 0 || snapshot.message_id == 0 {
                continue;
            }
            let channel = ChannelId::new(snapshot.channel_id);
            let message_id = MessageId::new(snapshot.message_id);
            if self.chat.fetch_channel(channel).await.is_err() {
                continue;
            }
            if self.chat.fetch_message(channel, message_id).await.is_err() {
                continue;
            }
            self.cache.note_channel(channel);
            self.cache.note_message(channel, message_id);

            let now = Utc::now();
            let cadence = {
                let mut state = self.state.lock().unwrap();
                state.buckets.remove_everywhere(message_id);
                state.records.insert(
                    message_id,
                    TrackedPost {
                        channel_id: channel,
                        message_id,
                        items: snapshot.items,
                        label: snapshot.label,
                        last_signature: None,
                        bucket: None,
                        hour_slot: None,
                    },
                );
                update_membership(&mut state, message_id, now);
                state.records.get(&message_id).and_then(|record| record.bucket)
            };
            self.enqueue(
                channel,
                RefreshTask {
                    message_id,
                    cadence: cadence.unwrap_or(Cadence::Minute),
                },
            );
            restored += 1;
        }
        if restored > 0 {
            tracing::info!("restored {restored} tracked posts");
        }
    }

    pub(crate) fn snapshot(&self) -> Vec<SnapshotRecord> {
        let state = self.state.lock().unwrap();
        let mut records: Vec<SnapshotRecord> =
            state.records.values().map(TrackedPost::snapshot).collect();
        records.sort_by_key(|record| record.message_id);
        records
    }

    /// Debounced snapshot write: only the latest scheduled save within the
    /// window actually hits the store.
    fn schedule_persist(self: &Arc<Self>) {
        let epoch = self.persist_epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let inner = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(SAVE_DEBOUNCE).await;
            if inner.persist_epoch.load(Ordering::SeqCst) != epoch {
                return;
            }
            let records = inner.snapshot();
            if let Err(err) = inner.store.save(&records).await {
                tracing::warn!("snapshot save failed: {err}");
            }
        });
    }
}

/// Reclassify one record and reconcile every membership set with the result.
/// The record ends up in exactly one bucket (or none when everything is past
/// due), and in an hour slot exactly when that bucket is `Hour`.
fn update_membership(state: &mut TrackerState, message_id: MessageId, now: DateTime<Utc>) {
    let Some(record) = state.records.get_mut(&message_id) else {
        return;
    };
    state.buckets.remove_everywhere(message_id);
    record.hour_slot = None;

    let Some(cadence) = classify(&record.items, now) else {
        record.bucket = None;
        return;
    };
    record.bucket = Some(cadence);
    state.buckets.insert(message_id, cadence);

    if cadence == Cadence::Hour {
        let soonest = record
            .items
            .iter()
            .filter(|item| item.due_at > now)
            .min_by_key(|item| item.due_at);
        if let Some(item) = soonest {
            let slot = item.due_at.with_timezone(&HOME_TZ).minute() as usize;
            record.hour_slot = Some(slot);
            state.buckets.insert_hour_slot(message_id, slot);
        }
    }
}

fn remove_record(state: &mut TrackerState, message_id: MessageId) -> Option<ChannelId> {
    let record = state.records.remove(&message_id)?;
    state.buckets.remove_everywhere(message_id);
    Some(record.channel_id)
}

/// Move records whose classification has become finer from the coarse bucket
/// into `to`. Bridges the gap between infrequent coarse ticks and deadlines
/// crossing a cadence boundary.
fn promote(state: &mut TrackerState, from: Cadence, to: Cadence, now: DateTime<Utc>) {
    for message_id in state.buckets.members(from) {
        let Some(record) = state.records.get_mut(&message_id) else {
            state.buckets.remove(message_id, from);
            continue;
        };
        if classify(&record.items, now) == Some(to) {
            state.buckets.remove(message_id, from);
            if from == Cadence::Hour {
                if let Some(slot) = record.hour_slot.take() {
                    state.buckets.remove_hour_slot(message_id, slot);
                }
            }
            state.buckets.insert(message_id, to);
            record.bucket = Some(to);
        }
    }
}

/// Pair selected ids with their owning channel, dropping (and unregistering)
/// any id whose record vanished since selection.
fn collect_tasks(
    state: &mut TrackerState,
    ids: Vec<MessageId>,
    cadence: Cadence,
) -> Vec<(ChannelId, RefreshTask)> {
    let mut tasks = Vec::with_capacity(ids.len());
    for message_id in ids {
        match state.records.get(&message_id) {
            None => state.buckets.remove(message_id, cadence),
            Some(record) => tasks.push((record.channel_id, RefreshTask { message_id, cadence })),
        }
    }
    tasks
}
