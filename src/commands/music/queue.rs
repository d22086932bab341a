use super::*;

/// View the current music queue
#[poise::command(slash_command, category = "Music")]
pub async fn queue(ctx: Context<'_>) -> CommandResult {
    ctx.defer().await?;

    let snapshot = match guild_player(ctx).await {
        Ok(player) => player.snapshot().await,
        Err(err) => Err(err),
    };

    let snapshot = match snapshot {
        Ok(snapshot) => snapshot,
        Err(err) => return respond(ctx, Err(err)).await,
    };

    // The first chunk fills in the deferred reply, the rest go out as follow-ups
    for message in embedded_messages::queue_messages(&snapshot) {
        ctx.say(message).await?;
    }

    Ok(())
}
