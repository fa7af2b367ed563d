use crate::tracker::cadence::staged_label;
use crate::tracker::client::{Payload, RenderError, Renderer};
use crate::tracker::timing::HOME_TZ;
use crate::tracker::DueItem;
use crate::BOT_COLOR;
use chrono::{DateTime, Utc};
use poise::serenity_prelude::{CreateEmbed, Timestamp};

/// Announcement surface: one embed, one field per assignment, with the
/// staged countdown next to the calendar date.
pub struct EmbedRenderer;

impl Renderer for EmbedRenderer {
    fn render(
        &self,
        items: &[DueItem],
        label: &str,
        now: DateTime<Utc>,
    ) -> Result<Payload, RenderError> {
        let stamp = Timestamp::from_unix_timestamp(now.timestamp())
            .map_err(|err| RenderError(err.to_string()))?;
        let mut sorted: Vec<&DueItem> = items.iter().collect();
        sorted.sort_by_key(|item| item.due_at);

        let mut embed = CreateEmbed::new()
            .color(BOT_COLOR)
            .title(format!("Homework — {label}"))
            .description(if sorted.is_empty() {
                "Nothing due"
            } else {
                "Upcoming assignments"
            })
            .timestamp(stamp);
        for item in sorted {
            embed = embed.field(
                item.title.clone(),
                format!(
                    "{} · {}",
                    staged_label(item.due_at, now),
                    item.due_at.with_timezone(&HOME_TZ).format("%m/%d/%Y")
                ),
                false,
            );
        }
        Ok(Payload {
            content: None,
            embed: Some(embed),
        })
    }
}
