use crate::commands::homework::util::build_due_item;
use crate::render::EmbedRenderer;
use crate::tracker::client::Renderer;
use crate::util::send_ephemeral_text;
use crate::{Context, Error, BOT_COLOR};
use chrono::Utc;
use poise::serenity_prelude::{ChannelId, CreateEmbed, CreateEmbedFooter};
use poise::CreateReply;

/// Post a homework announcement with a self-updating countdown
///
/// hw!sendhomework <class> <title> <due date> [period]
#[poise::command(
    slash_command,
    prefix_command,
    rename = "sendhomework",
    aliases("sendhw", "hw"),
    guild_only
)]
pub async fn send_homework(
    ctx: Context<'_>, #[description = "Class the homework is for"] class: String,
    #[description = "Assignment title"] title: String,
    #[description = "Due date: today, tomorrow, MM/DD or YYYY-MM-DD"] due_date: String,
    #[description = "Bell period 1-10; end of day when omitted"] period: Option<u8>,
    #[description = "Channel to post into (defaults to current)"]
    #[channel_types("Text")]
    target: Option<ChannelId>,
) -> Result<(), Error> {
    let item = match build_due_item(title, &class, &due_date, period) {
        Ok(item) => item,
        Err(err) => {
            send_ephemeral_text(ctx, &err.to_string()).await?;
            return Ok(());
        }
    };

    let channel = target.unwrap_or_else(|| ctx.channel_id());
    let payload = EmbedRenderer.render(&[item.clone()], &class, Utc::now())?;
    let message = channel
        .send_message(ctx.serenity_context(), payload.to_create_message())
        .await?;
    ctx.data()
        .tracker
        .track(channel, message.id, vec![item.clone()], class);

    let embed = CreateEmbed::new()
        .color(BOT_COLOR)
        .title("Homework posted.")
        .description(format!(
            "Tracking **{0}** in <#{1}>. The countdown keeps itself fresh until <t:{2}:F>.",
            item.title,
            channel.get(),
            item.due_at.timestamp()
        ))
        .footer(CreateEmbedFooter::new(format!(
            "Message ID {} · use addhomework to put more items on this post",
            message.id
        )));
    ctx.send(CreateReply::default().embed(embed).ephemeral(true)).await?;
    Ok(())
}
