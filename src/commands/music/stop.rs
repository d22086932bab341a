use super::*;

/// Stop the music, clear the queue, and leave the voice channel
#[poise::command(slash_command, category = "Music")]
pub async fn stop(ctx: Context<'_>) -> CommandResult {
    ctx.defer().await?;

    let result: MusicResult<CreateReply> = async {
        let player = guild_player(ctx).await?;
        player.stop().await?;

        // The main goal (stopping) is achieved even if leaving fails
        if let Err(e) = MusicManager::leave_channel(ctx.serenity_context(), player.guild_id()).await
        {
            warn!("Failed to leave voice channel during stop: {}", e);
        }

        Ok(embedded_messages::stopped())
    }
    .await;

    respond(ctx, result).await
}
