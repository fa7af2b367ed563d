use crate::commands::homework::util::parse_message_id;
use crate::util::send_ephemeral_text;
use crate::{Context, Error, BOT_COLOR};
use poise::serenity_prelude::CreateEmbed;
use poise::CreateReply;

/// Delete a tracked announcement and stop refreshing it
///
/// hw!removehomework <message ID>
#[poise::command(
    slash_command,
    prefix_command,
    rename = "removehomework",
    aliases("removehw"),
    discard_spare_arguments,
    required_permissions = "MANAGE_MESSAGES",
    default_member_permissions = "MANAGE_MESSAGES",
    guild_only
)]
pub async fn remove_homework(
    ctx: Context<'_>, #[description = "Message ID of the announcement"] message_id: String,
) -> Result<(), Error> {
    let message_id = match parse_message_id(&message_id) {
        Ok(id) => id,
        Err(err) => {
            send_ephemeral_text(ctx, &err.to_string()).await?;
            return Ok(());
        }
    };

    let Some(channel) = ctx.data().tracker.untrack(message_id) else {
        send_ephemeral_text(ctx, "That message isn't being tracked.").await?;
        return Ok(());
    };
    // The message may already be gone; tracking is removed either way.
    let deleted = channel
        .delete_message(ctx.serenity_context(), message_id)
        .await
        .is_ok();

    let embed = CreateEmbed::new()
        .color(BOT_COLOR)
        .title("Announcement removed.")
        .description(if deleted {
            "The post was deleted and will no longer be refreshed."
        } else {
            "The post was already gone; it will no longer be refreshed."
        });
    ctx.send(CreateReply::default().embed(embed).ephemeral(true)).await?;
    Ok(())
}
