pub mod clearqueue;
pub mod filter;
pub mod looping;
pub mod nowplaying;
pub mod play;
pub mod queue;
pub mod shuffle;
pub mod skip;
pub mod skipto;
pub mod stop;

pub mod audio_sources;
pub mod utils;

use crate::{CommandResult, Context};
use poise::CreateReply;
use tracing::{debug, info, warn};
use utils::{
    embedded_messages,
    filters::FilterPreset,
    guild_player::GuildHandle,
    music_manager::{MusicError, MusicManager, MusicResult},
    playback::SkipToOutcome,
};

/// The invoking guild's player; the invoking channel becomes its notice channel.
async fn guild_player(ctx: Context<'_>) -> MusicResult<GuildHandle> {
    let guild_id = ctx.guild_id().ok_or(MusicError::NotInGuild)?;
    let player = ctx
        .data()
        .music
        .player(ctx.serenity_context(), guild_id)
        .await?;

    player.set_notice_channel(ctx.channel_id())?;
    Ok(player)
}

/// Send the command's reply, or an error embed when it failed.
async fn respond(ctx: Context<'_>, result: MusicResult<CreateReply>) -> CommandResult {
    let reply = match result {
        Ok(reply) => reply,
        Err(err) => {
            warn!(
                "/{} failed in guild {:?}: {}",
                ctx.command().name,
                ctx.guild_id(),
                err
            );
            embedded_messages::error(&err)
        }
    };

    ctx.send(reply).await?;
    Ok(())
}
