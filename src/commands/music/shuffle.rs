use super::*;

/// Shuffle the upcoming tracks
#[poise::command(slash_command, category = "Music")]
pub async fn shuffle(ctx: Context<'_>) -> CommandResult {
    ctx.defer().await?;

    let result: MusicResult<CreateReply> = async {
        let player = guild_player(ctx).await?;
        player.shuffle().await?;

        let snapshot = player.snapshot().await?;
        Ok(embedded_messages::shuffled(snapshot.queue.len()))
    }
    .await;

    respond(ctx, result).await
}
