use super::*;

/// Jump to a position in the queue, dropping everything before it
#[poise::command(slash_command, category = "Music")]
pub async fn skipto(
    ctx: Context<'_>,
    #[description = "Queue position, starting at 1"]
    #[min = 1]
    index: usize,
) -> CommandResult {
    ctx.defer().await?;

    let result: MusicResult<CreateReply> = async {
        let player = guild_player(ctx).await?;

        Ok(match player.skip_to(index).await? {
            SkipToOutcome::Skipped => embedded_messages::skipped_to(index),
            SkipToOutcome::IgnoredLoopSong => embedded_messages::loop_song_blocks_skip(),
        })
    }
    .await;

    respond(ctx, result).await
}
