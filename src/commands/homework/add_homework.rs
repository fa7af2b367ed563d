use crate::commands::homework::util::{build_due_item, parse_message_id};
use crate::util::send_ephemeral_text;
use crate::{Context, Error, BOT_COLOR};
use poise::serenity_prelude::{CreateEmbed, CreateEmbedAuthor};
use poise::CreateReply;

/// Add another assignment to a tracked announcement
///
/// hw!addhomework <message ID> <class> <title> <due date> [period]
#[poise::command(
    slash_command,
    prefix_command,
    rename = "addhomework",
    aliases("addhw"),
    guild_only
)]
pub async fn add_homework(
    ctx: Context<'_>, #[description = "Message ID of the tracked announcement"] message_id: String,
    #[description = "Class the homework is for"] class: String,
    #[description = "Assignment title"] title: String,
    #[description = "Due date: today, tomorrow, MM/DD or YYYY-MM-DD"] due_date: String,
    #[description = "Bell period 1-10; end of day when omitted"] period: Option<u8>,
) -> Result<(), Error> {
    let message_id = match parse_message_id(&message_id) {
        Ok(id) => id,
        Err(err) => {
            send_ephemeral_text(ctx, &err.to_string()).await?;
            return Ok(());
        }
    };
    let item = match build_due_item(title, &class, &due_date, period) {
        Ok(item) => item,
        Err(err) => {
            send_ephemeral_text(ctx, &err.to_string()).await?;
            return Ok(());
        }
    };

    let title = item.title.clone();
    let due_ts = item.due_at.timestamp();
    if !ctx.data().tracker.append_items(message_id, vec![item]) {
        send_ephemeral_text(ctx, "I'm not tracking that message.").await?;
        return Ok(());
    }

    let embed = CreateEmbed::new()
        .author(CreateEmbedAuthor::from(ctx.author().clone()))
        .color(BOT_COLOR)
        .title("Assignment added.")
        .description(format!("**{title}** is due <t:{due_ts}:F>. The post will refresh shortly."));
    ctx.send(CreateReply::default().embed(embed).ephemeral(true)).await?;
    Ok(())
}
