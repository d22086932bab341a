use super::*;

/// Show the current track and its filter
#[poise::command(slash_command, category = "Music")]
pub async fn nowplaying(ctx: Context<'_>) -> CommandResult {
    ctx.defer().await?;

    let result: MusicResult<CreateReply> = async {
        let snapshot = guild_player(ctx).await?.snapshot().await?;
        Ok(embedded_messages::now_playing(&snapshot))
    }
    .await;

    respond(ctx, result).await
}
