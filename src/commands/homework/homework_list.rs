use crate::tracker::cadence::Cadence;
use crate::util::send_ephemeral_text;
use crate::{Context, Error, BOT_COLOR};
use poise::serenity_prelude::CreateEmbed;
use poise::CreateReply;
use std::fmt::Write;

/// List every announcement currently being refreshed
///
/// hw!homeworklist
#[poise::command(
    slash_command,
    prefix_command,
    rename = "homeworklist",
    aliases("hwlist"),
    discard_spare_arguments
)]
pub async fn homework_list(ctx: Context<'_>) -> Result<(), Error> {
    let tracked = ctx.data().tracker.list_tracked();
    if tracked.is_empty() {
        send_ephemeral_text(ctx, "Nothing is being tracked right now.").await?;
        return Ok(());
    }

    let mut description = String::new();
    for summary in tracked {
        let cadence = match summary.bucket {
            Some(Cadence::Second) => "second",
            Some(Cadence::Minute) => "minute",
            Some(Cadence::Hour) => "hour",
            None => "idle",
        };
        writeln!(
            description,
            "`{0}` · {1} · {2} item{3} · {4} cadence · <#{5}>",
            summary.message_id,
            summary.label,
            summary.item_count,
            if summary.item_count == 1 { "" } else { "s" },
            cadence,
            summary.channel_id.get()
        )?;
    }
    let embed = CreateEmbed::new()
        .color(BOT_COLOR)
        .title("Tracked homework posts")
        .description(description);
    ctx.send(CreateReply::default().embed(embed).ephemeral(true)).await?;
    Ok(())
}
