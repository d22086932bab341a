use super::*;

/// Remove every upcoming track, keeping the current one
#[poise::command(slash_command, category = "Music")]
pub async fn clearqueue(ctx: Context<'_>) -> CommandResult {
    ctx.defer().await?;

    let result: MusicResult<CreateReply> = async {
        guild_player(ctx).await?.clear_queue().await?;
        Ok(embedded_messages::queue_cleared())
    }
    .await;

    respond(ctx, result).await
}
