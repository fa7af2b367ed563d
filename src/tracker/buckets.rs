use crate::tracker::cadence::Cadence;
use poise::serenity_prelude::MessageId;
use std::collections::BTreeSet;

/// Membership sets for the three refresh cadences, plus 60 minute-of-hour
/// slots nested under the hour bucket so hour-cadence posts are only touched
/// on the minute their next item is due.
pub struct BucketRegistry {
    second: BTreeSet<MessageId>,
    minute: BTreeSet<MessageId>,
    hour: BTreeSet<MessageId>,
    hour_slots: [BTreeSet<MessageId>; 60],
    second_cursor: usize,
}

impl BucketRegistry {
    pub fn new() -> Self {
        Self {
            second: BTreeSet::new(),
            minute: BTreeSet::new(),
            hour: BTreeSet::new(),
            hour_slots: std::array::from_fn(|_| BTreeSet::new()),
            second_cursor: 0,
        }
    }

    fn set(&mut self, cadence: Cadence) -> &mut BTreeSet<MessageId> {
        match cadence {
            Cadence::Second => &mut self.second,
            Cadence::Minute => &mut self.minute,
            Cadence::Hour => &mut self.hour,
        }
    }

    /// Remove a message from every bucket and slot set.
    pub fn remove_everywhere(&mut self, message_id: MessageId) {
        self.second.remove(&message_id);
        self.minute.remove(&message_id);
        self.hour.remove(&message_id);
        for slot in &mut self.hour_slots {
            slot.remove(&message_id);
        }
    }

    pub fn insert(&mut self, message_id: MessageId, cadence: Cadence) {
        self.set(cadence).insert(message_id);
    }

    /// Record an hour-cadence post under its due minute-of-hour.
    pub fn insert_hour_slot(&mut self, message_id: MessageId, slot: usize) {
        self.hour_slots[slot % 60].insert(message_id);
    }

    pub fn remove(&mut self, message_id: MessageId, cadence: Cadence) {
        self.set(cadence).remove(&message_id);
    }

    pub fn remove_hour_slot(&mut self, message_id: MessageId, slot: usize) {
        self.hour_slots[slot % 60].remove(&message_id);
    }

    pub fn contains(&self, message_id: MessageId, cadence: Cadence) -> bool {
        match cadence {
            Cadence::Second => self.second.contains(&message_id),
            Cadence::Minute => self.minute.contains(&message_id),
            Cadence::Hour => self.hour.contains(&message_id),
        }
    }

    pub fn slot_contains(&self, message_id: MessageId, slot: usize) -> bool {
        self.hour_slots[slot % 60].contains(&message_id)
    }

    pub fn members(&self, cadence: Cadence) -> Vec<MessageId> {
        match cadence {
            Cadence::Second => self.second.iter().copied().collect(),
            Cadence::Minute => self.minute.iter().copied().collect(),
            Cadence::Hour => self.hour.iter().copied().collect(),
        }
    }

    pub fn slot_members(&self, slot: usize) -> Vec<MessageId> {
        self.hour_slots[slot % 60].iter().copied().collect()
    }

    /// Select up to `cap` second-bucket members, round-robin. The cursor
    /// advances by the number actually selected and wraps, so a large bucket
    /// cycles through all members over successive ticks instead of starving
    /// whatever sorts last.
    pub fn select_second(&mut self, cap: usize) -> Vec<MessageId> {
        let ids: Vec<MessageId> = self.second.iter().copied().collect();
        if ids.is_empty() {
            return Vec::new();
        }
        let take = cap.min(ids.len());
        let cursor = self.second_cursor % ids.len();
        let mut selected = Vec::with_capacity(take);
        for i in 0..take {
            selected.push(ids[(cursor + i) % ids.len()]);
        }
        self.second_cursor = (cursor + take) % ids.len();
        selected
    }
}
