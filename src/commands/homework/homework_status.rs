use crate::commands::homework::util::parse_message_id;
use crate::tracker::cadence::Cadence;
use crate::util::send_ephemeral_text;
use crate::{Context, Error, BOT_COLOR};
use poise::serenity_prelude::CreateEmbed;
use poise::CreateReply;

/// Show how a tracked announcement is being refreshed
///
/// hw!homeworkstatus <message ID>
#[poise::command(
    slash_command,
    prefix_command,
    rename = "homeworkstatus",
    aliases("hwstatus"),
    discard_spare_arguments
)]
pub async fn homework_status(
    ctx: Context<'_>, #[description = "Message ID of the announcement"] message_id: String,
) -> Result<(), Error> {
    let message_id = match parse_message_id(&message_id) {
        Ok(id) => id,
        Err(err) => {
            send_ephemeral_text(ctx, &err.to_string()).await?;
            return Ok(());
        }
    };

    let Some(status) = ctx.data().tracker.status(message_id) else {
        send_ephemeral_text(ctx, "That message isn't being tracked.").await?;
        return Ok(());
    };

    let cadence = match status.bucket {
        Some(Cadence::Second) => "every second",
        Some(Cadence::Minute) => "every minute",
        Some(Cadence::Hour) => "hourly, on its due minute",
        None => "idle (everything past due)",
    };
    let embed = CreateEmbed::new()
        .color(BOT_COLOR)
        .title(format!("Status for {message_id}"))
        .field("Refresh cadence", cadence, true)
        .field("Assignments", status.item_count.to_string(), true)
        .field("All past due", if status.all_past_due { "yes" } else { "no" }, true);
    ctx.send(CreateReply::default().embed(embed).ephemeral(true)).await?;
    Ok(())
}
