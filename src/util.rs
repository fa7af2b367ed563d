use crate::{Context, Error};
use poise::CreateReply;

pub async fn send_ephemeral_text(ctx: Context<'_>, content: &str) -> Result<(), Error> {
    ctx.send(CreateReply::default().content(content).ephemeral(true)).await?;
    Ok(())
}
