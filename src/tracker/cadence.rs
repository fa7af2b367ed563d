use crate::tracker::DueItem;
use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;

/// Refresh cadence for a tracked post, decided by how soon its next item is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    Second,
    Minute,
    Hour,
}

impl Cadence {
    pub fn tag(self) -> &'static str {
        match self {
            Cadence::Second => "second",
            Cadence::Minute => "minute",
            Cadence::Hour => "hour",
        }
    }

    /// Base spacing between edits in one channel's queue. The busiest cadence
    /// gets the shortest delay so it doesn't starve the channel.
    pub fn base_delay(self) -> Duration {
        match self {
            Cadence::Second => Duration::from_millis(120),
            Cadence::Minute => Duration::from_millis(220),
            Cadence::Hour => Duration::from_millis(350),
        }
    }
}

/// Decide the refresh cadence from the soonest item still in the future.
/// `None` means everything is past due and the post no longer needs a bucket.
pub fn classify(items: &[DueItem], now: DateTime<Utc>) -> Option<Cadence> {
    let min_remaining = items
        .iter()
        .filter(|item| item.due_at > now)
        .map(|item| item.due_at - now)
        .min()?;
    if min_remaining <= TimeDelta::seconds(60) {
        Some(Cadence::Second)
    } else if min_remaining <= TimeDelta::seconds(3600) {
        Some(Cadence::Minute)
    } else {
        Some(Cadence::Hour)
    }
}

/// Staged countdown label. Far-out times use coarse text that only changes
/// once a minute or slower; the last minute steps through fixed tiers so the
/// displayed text (and therefore the signature) doesn't churn every second.
pub fn staged_label(due_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = due_at - now;
    if diff <= TimeDelta::zero() {
        return "due".into();
    }
    let diff_ms = diff.num_milliseconds();
    let secs = (diff_ms + 999) / 1000;
    if secs > 60 {
        let mins = (diff_ms as f64 / 60_000.0).round() as i64;
        if mins < 60 {
            return format!("in {mins} min");
        }
        let hrs = (mins as f64 / 60.0).round() as i64;
        if hrs < 24 {
            return format!("in {hrs} hr{}", if hrs == 1 { "" } else { "s" });
        }
        let days = (hrs as f64 / 24.0).round() as i64;
        return format!("in {days} day{}", if days == 1 { "" } else { "s" });
    }
    if secs > 30 {
        "in 1 min".into()
    } else if secs > 15 {
        "in 30 sec".into()
    } else if secs > 10 {
        "in 15 sec".into()
    } else {
        format!("in {secs} sec")
    }
}

/// Signature of what a post would display right now. Two calls are equal
/// exactly when the rendered due-labels would be identical, which is what the
/// edit dedup relies on. The bucket tag is included so membership changes
/// without label changes still force one refresh.
pub fn signature(items: &[DueItem], bucket: Option<Cadence>, now: DateTime<Utc>) -> String {
    let mut sorted: Vec<&DueItem> = items.iter().collect();
    sorted.sort_by_key(|item| item.due_at);
    let mut parts: Vec<String> = sorted
        .iter()
        .map(|item| staged_label(item.due_at, now))
        .collect();
    parts.push(bucket.map(Cadence::tag).unwrap_or("").to_string());
    parts.join("|")
}
