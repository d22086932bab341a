use ::serenity::all::ClientBuilder;
use dotenv::dotenv;
use poise::serenity_prelude as serenity;
use songbird::SerenityInit;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use rusty_music::commands::music::{
    audio_sources::SourceResolver,
    clearqueue::*,
    filter::*,
    looping::*,
    nowplaying::*,
    play::*,
    queue::*,
    shuffle::*,
    skip::*,
    skipto::*,
    stop::*,
    utils::music_manager::MusicManager,
};
use rusty_music::config::BotConfig;
use rusty_music::{CommandResult, Context, Data, Error};

#[poise::command(slash_command, category = "General")]
async fn help(
    ctx: Context<'_>,
    #[description = "Specific command to show help about"]
    #[autocomplete = "poise::builtins::autocomplete_command"]
    command: Option<String>,
) -> CommandResult {
    poise::builtins::help(
        ctx,
        command.as_deref(),
        poise::builtins::HelpConfiguration {
            show_context_menu_commands: true,
            ..Default::default()
        },
    )
    .await
    .map_err(|e| e.into())
}

#[poise::command(prefix_command, hide_in_help)]
async fn register(ctx: Context<'_>) -> Result<(), Error> {
    poise::builtins::register_application_commands_buttons(ctx)
        .await
        .map_err(|e| e.into())
}

async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!("Command /{} failed: {}", ctx.command().name, error);
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize logging with debug level for our crate
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("rusty_music=debug,warn")),
        )
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_target(true)
        .with_ansi(true)
        .pretty()
        .init();

    dotenv().ok();

    let config = BotConfig::from_env()?;
    if config.spotify.is_none() {
        info!("Spotify credentials not set, Spotify links will be rejected");
    }

    let resolver = Arc::new(SourceResolver::new(&config, reqwest::Client::new()));
    let music = Arc::new(MusicManager::new(resolver, config.settle_delay));

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_VOICE_STATES;

    let commands = vec![
        // Default commands
        register(),
        help(),
        // Music commands
        play(),
        skip(),
        skipto(),
        queue(),
        clearqueue(),
        stop(),
        nowplaying(),
        shuffle(),
        loop_song(),
        loop_queue(),
        filter(),
    ];

    let data_music = music.clone();
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands,
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                Ok(Data { music: data_music })
            })
        });

    let mut client = ClientBuilder::new(&config.discord_token, intents)
        .framework(framework.build())
        .register_songbird()
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            return;
        }

        info!("Received Ctrl-C, stopping all guild players");
        music.shutdown().await;
        shard_manager.shutdown_all().await;
    });

    client.start().await.map_err(Into::into)
}
