//! Loop toggles. Turning one mode on turns the other off.

use super::*;

/// Toggle repeating the current song
#[poise::command(slash_command, category = "Music")]
pub async fn loop_song(ctx: Context<'_>) -> CommandResult {
    ctx.defer().await?;

    let result: MusicResult<CreateReply> = async {
        let player = guild_player(ctx).await?;
        let enabled = !player.snapshot().await?.loop_song;
        player.set_loop_song(enabled).await?;

        Ok(embedded_messages::loop_status("Loop song", enabled))
    }
    .await;

    respond(ctx, result).await
}

/// Toggle cycling through the whole queue
#[poise::command(slash_command, category = "Music")]
pub async fn loop_queue(ctx: Context<'_>) -> CommandResult {
    ctx.defer().await?;

    let result: MusicResult<CreateReply> = async {
        let player = guild_player(ctx).await?;
        let enabled = !player.snapshot().await?.loop_queue;
        player.set_loop_queue(enabled).await?;

        Ok(embedded_messages::loop_status("Loop queue", enabled))
    }
    .await;

    respond(ctx, result).await
}
