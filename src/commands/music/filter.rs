use super::*;

/// Apply an audio filter to the current and upcoming tracks
#[poise::command(slash_command, category = "Music")]
pub async fn filter(
    ctx: Context<'_>,
    #[description = "Filter preset, or None to remove it"] preset: FilterPreset,
) -> CommandResult {
    ctx.defer().await?;

    let result: MusicResult<CreateReply> = async {
        let player = guild_player(ctx).await?;
        let filter = preset.ffmpeg_filter().map(str::to_string);
        player.replace_filter(filter.clone()).await?;

        Ok(embedded_messages::filter_set(filter.as_deref()))
    }
    .await;

    respond(ctx, result).await
}
