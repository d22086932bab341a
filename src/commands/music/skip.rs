use super::*;

/// Skip the currently playing song
#[poise::command(slash_command, category = "Music")]
pub async fn skip(ctx: Context<'_>) -> CommandResult {
    ctx.defer().await?;

    let result: MusicResult<CreateReply> = async {
        let player = guild_player(ctx).await?;

        Ok(if player.skip_current().await? {
            embedded_messages::skipped()
        } else {
            embedded_messages::no_track_to_skip()
        })
    }
    .await;

    respond(ctx, result).await
}
