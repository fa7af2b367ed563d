use crate::schedule;
use crate::tracker::DueItem;
use crate::Error;
use chrono::Utc;
use poise::serenity_prelude::MessageId;

pub fn parse_message_id(input: &str) -> Result<MessageId, Error> {
    let id: u64 = input
        .trim()
        .parse()
        .map_err(|_| "That doesn't look like a message ID.")?;
    if id == 0 {
        return Err("That doesn't look like a message ID.".into());
    }
    Ok(MessageId::new(id))
}

/// Turn command arguments into a due-item, rejecting dates that can't be
/// resolved or are already behind us.
pub fn build_due_item(
    title: String,
    class: &str,
    due_date: &str,
    period: Option<u8>,
) -> Result<DueItem, Error> {
    let today = schedule::today_home();
    let date = schedule::parse_due_date(due_date, today)
        .ok_or("Invalid due date. Use today, tomorrow, MM/DD or YYYY-MM-DD.")?;
    let due_at = schedule::due_instant(date, period).ok_or("Invalid period. Periods run 1-10.")?;
    if due_at <= Utc::now() {
        return Err("That due time is already in the past.".into());
    }
    Ok(DueItem {
        title,
        due_at,
        group_key: class.to_string(),
    })
}
