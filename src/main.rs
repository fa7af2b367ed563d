mod commands;
mod discord;
mod render;
mod schedule;
mod store;
mod tracker;
mod util;

use crate::discord::SerenityChat;
use crate::render::EmbedRenderer;
use crate::store::SqliteSnapshotStore;
use crate::tracker::HomeworkTracker;
use dotenvy::dotenv;
use poise::serenity_prelude as serenity;
use poise::serenity_prelude::Color;
use sqlx::SqlitePool;
use std::sync::Arc;

pub const BOT_COLOR: Color = Color::new(0x8aadf4);

type Tracker = HomeworkTracker<SerenityChat, EmbedRenderer, SqliteSnapshotStore>;

pub struct Data {
    tracker: Tracker,
} // User data, which is stored and accessible in all command invocations
type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Arc<Data>, Error>;
pub type Command = poise::Command<Arc<Data>, Error>;

/// Untrack announcements whose messages get deleted out from under us.
async fn handle_event(
    _ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Arc<Data>, Error>,
    data: &Arc<Data>,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::MessageDelete {
            deleted_message_id, ..
        } => {
            data.tracker.untrack(*deleted_message_id);
        }
        serenity::FullEvent::MessageDeleteBulk {
            multiple_deleted_messages_ids,
            ..
        } => {
            for message_id in multiple_deleted_messages_ids {
                data.tracker.untrack(*message_id);
            }
        }
        _ => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenv().expect(".env file not found");
    tracing_subscriber::fmt::init();
    let token = std::env::var("DISCORD_TOKEN").expect("missing DISCORD_TOKEN");
    let database_url = std::env::var("DATABASE_URL").expect("missing DATABASE_URL");
    let intents =
        serenity::GatewayIntents::non_privileged() | serenity::GatewayIntents::MESSAGE_CONTENT;

    let pool = SqlitePool::connect(&database_url).await.unwrap();
    store::init_schema(&pool).await.unwrap();

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some("hw!".into()),
                ..Default::default()
            },
            commands: commands::commands(),
            event_handler: |ctx, event, framework, data| {
                Box::pin(handle_event(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                let tracker = HomeworkTracker::new(
                    SerenityChat::new(ctx.http.clone()),
                    EmbedRenderer,
                    SqliteSnapshotStore::new(pool),
                );
                tracker.start();
                Ok(Arc::new(Data { tracker }))
            })
        })
        .build();

    let client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await;
    client.unwrap().start().await.unwrap();
}
