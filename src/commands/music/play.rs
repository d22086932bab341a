use super::*;

/// Play a song or playlist from YouTube, Spotify or a search query
#[poise::command(slash_command, category = "Music")]
pub async fn play(
    ctx: Context<'_>,
    #[description = "URL or search query"] query: String,
    #[description = "Audio filter for the added tracks"] filter: Option<FilterPreset>,
) -> CommandResult {
    info!("Received play command with query: {}", query);

    // Defer the response since playlist expansion and resolution might take time
    ctx.defer().await?;

    let result: MusicResult<CreateReply> = async {
        let guild_id = ctx.guild_id().ok_or(MusicError::NotInGuild)?;
        MusicManager::ensure_voice_connection(ctx.serenity_context(), guild_id, ctx.author().id)
            .await?;

        let player = guild_player(ctx).await?;
        let filter = filter
            .and_then(FilterPreset::ffmpeg_filter)
            .map(str::to_string);
        let enqueued = player.enqueue(query.as_str(), filter).await?;

        if player.advance_if_idle().await? {
            debug!("Started playback in guild {}", guild_id);
        }

        Ok(embedded_messages::added_to_queue(&query, &enqueued))
    }
    .await;

    respond(ctx, result).await
}
