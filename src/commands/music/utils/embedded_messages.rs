use poise::{CreateReply, serenity_prelude as serenity};
use ::serenity::all::{CreateEmbed, CreateMessage};
use ::serenity::async_trait;
use ::serenity::model::id::ChannelId;
use std::sync::Arc;
use tracing::{debug, warn};

use super::filters::FilterPreset;
use super::music_manager::MusicError;
use super::playback::{Enqueued, Notice, Notifier, PlaybackSnapshot};

/// Discord's limit for a single message body.
pub const MESSAGE_LIMIT: usize = 2000;

const COLOR_OK: u32 = 0x00ff00;
const COLOR_ERROR: u32 = 0xff0000;
const COLOR_INFO: u32 = 0x5865f2;

/// Posts playback notices as embeds into the channel of the guild's latest command.
pub struct ChannelNotifier {
    http: Arc<serenity::Http>,
    channel_id: Option<ChannelId>,
}

impl ChannelNotifier {
    pub fn new(http: Arc<serenity::Http>) -> Self {
        Self {
            http,
            channel_id: None,
        }
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, notice: Notice) {
        let Some(channel_id) = self.channel_id else {
            debug!("No notice channel yet, dropping {:?}", notice);
            return;
        };

        let message = CreateMessage::new().embed(notice_embed(&notice));
        if let Err(e) = channel_id.send_message(&self.http, message).await {
            warn!("Failed to send notice to channel {}: {}", channel_id, e);
        }
    }

    fn redirect(&mut self, channel_id: ChannelId) {
        self.channel_id = Some(channel_id);
    }
}

/// Create the embed announcing a playback notice
pub fn notice_embed(notice: &Notice) -> CreateEmbed {
    match notice {
        Notice::NowPlaying {
            title,
            filter,
            thumbnail,
        } => {
            let mut embed = CreateEmbed::new()
                .title("🎵 Now Playing")
                .description(title)
                .field("Filter", format!("`{}`", FilterPreset::describe(filter.as_deref())), true)
                .color(COLOR_OK);
            if let Some(thumbnail) = thumbnail {
                embed = embed.thumbnail(thumbnail);
            }
            embed
        }
        Notice::QueueEmpty => CreateEmbed::new()
            .title("📭 Queue finished")
            .description("Nothing left to play. Use `/play` to add more.")
            .color(COLOR_INFO),
        Notice::ResolutionFailed { query, reason } => CreateEmbed::new()
            .title("❌ Could not play track")
            .description(format!("`{}`\n{}", query, reason))
            .color(COLOR_ERROR),
        Notice::NotConnected => CreateEmbed::new()
            .title("❌ Error")
            .description("Not connected to a voice channel")
            .color(COLOR_ERROR),
    }
}

fn reply(title: &str, description: impl Into<String>, color: u32) -> CreateReply {
    CreateReply::default().embed(
        CreateEmbed::new()
            .title(title)
            .description(description)
            .color(color),
    )
}

/// Create an embed for any music error surfaced by a command
pub fn error(err: &MusicError) -> CreateReply {
    let description = match err {
        MusicError::UserNotInVoiceChannel => {
            "You need to be in a voice channel to use this command".to_string()
        }
        MusicError::NotInGuild => "This command only works in a server".to_string(),
        other => other.to_string(),
    };

    reply("❌ Error", description, COLOR_ERROR).ephemeral(true)
}

/// Create an embed for when tracks are added to the queue
pub fn added_to_queue(query: &str, enqueued: &Enqueued) -> CreateReply {
    let description = if enqueued.added == 1 {
        format!("Added `{}`", query)
    } else {
        format!("Added {} tracks from `{}`", enqueued.added, query)
    };

    let mut embed = CreateEmbed::new()
        .title("🎵 Added to Queue")
        .description(description)
        .field("Queue length", format!("`{}`", enqueued.queue_len), true)
        .color(COLOR_OK);
    if enqueued.skipped > 0 {
        embed = embed.field("Skipped", format!("`{}` unavailable", enqueued.skipped), true);
    }

    CreateReply::default().embed(embed)
}

pub fn skipped() -> CreateReply {
    reply("⏭️ Skipped", "Skipped the current track", COLOR_OK)
}

/// Create an embed for when there is no track to skip
pub fn no_track_to_skip() -> CreateReply {
    reply("❌ Error", "No track is currently playing", COLOR_ERROR)
}

pub fn skipped_to(index: usize) -> CreateReply {
    reply("⏭️ Skipped", format!("Jumped to queue position #{}", index), COLOR_OK)
}

pub fn loop_song_blocks_skip() -> CreateReply {
    reply(
        "🔂 Loop song is on",
        "Turn off `/loop_song` before skipping ahead in the queue",
        COLOR_INFO,
    )
}

pub fn queue_cleared() -> CreateReply {
    reply("🗑️ Queue Cleared", "Removed every upcoming track", COLOR_OK)
}

/// Create an embed for when the bot stops playing music
pub fn stopped() -> CreateReply {
    reply(
        "⏹️ Stopped",
        "Playback stopped, queue cleared and voice channel left",
        COLOR_OK,
    )
}

pub fn shuffled(queue_len: usize) -> CreateReply {
    reply("🔀 Shuffled", format!("Shuffled {} tracks", queue_len), COLOR_OK)
}

pub fn loop_status(name: &str, enabled: bool) -> CreateReply {
    let (title, color) = if enabled {
        (format!("🔁 {} enabled", name), COLOR_OK)
    } else {
        (format!("⏹️ {} disabled", name), COLOR_INFO)
    };
    reply(&title, format!("{} is now {}", name, if enabled { "on" } else { "off" }), color)
}

pub fn filter_set(filter: Option<&str>) -> CreateReply {
    reply(
        "🎚️ Filter",
        format!("Filter set to `{}`", FilterPreset::describe(filter)),
        COLOR_OK,
    )
}

/// Create an embed for the current track, or say nothing is playing
pub fn now_playing(snapshot: &PlaybackSnapshot) -> CreateReply {
    let Some(now) = &snapshot.now_playing else {
        return reply("🔇 Nothing playing", "Use `/play` to start something", COLOR_INFO);
    };

    let mut embed = CreateEmbed::new()
        .title("🎵 Now Playing")
        .description(&now.title)
        .field("Filter", format!("`{}`", FilterPreset::describe(now.filter.as_deref())), true)
        .field("Up next", format!("`{}` tracks", snapshot.queue.len()), true)
        .color(COLOR_OK);
    if snapshot.loop_song {
        embed = embed.field("Loop", "`song`", true);
    } else if snapshot.loop_queue {
        embed = embed.field("Loop", "`queue`", true);
    }
    if let Some(thumbnail) = &now.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }

    CreateReply::default().embed(embed)
}

/// Render the queue as plain-text messages, each within Discord's length limit.
pub fn queue_messages(snapshot: &PlaybackSnapshot) -> Vec<String> {
    let mut lines = Vec::with_capacity(snapshot.queue.len() + 2);

    match (&snapshot.now_playing, &snapshot.current) {
        (Some(now), _) => lines.push(format!("**Now playing:** {}", now.title)),
        (None, Some(current)) => lines.push(format!("**Current:** {}", current.query)),
        (None, None) => {}
    }

    if snapshot.queue.is_empty() {
        lines.push("**Queue is empty**".to_string());
    } else {
        lines.push(format!("**Queue - {} tracks**", snapshot.queue.len()));
        for (index, entry) in snapshot.queue.iter().enumerate() {
            let mut line = format!("{}. {}", index + 1, entry.query);
            if entry.filter.is_some() {
                line.push_str(&format!(
                    " [filter: {}]",
                    FilterPreset::describe(entry.filter.as_deref())
                ));
            }
            lines.push(line);
        }
    }

    split_messages(lines, MESSAGE_LIMIT)
}

/// Pack lines into as few messages as possible without exceeding `limit` characters.
///
/// Lines are never split across messages; a single line longer than `limit` is cut.
pub fn split_messages(lines: impl IntoIterator<Item = String>, limit: usize) -> Vec<String> {
    let mut messages = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in lines {
        let line = if line.chars().count() > limit {
            line.chars().take(limit).collect()
        } else {
            line
        };
        let line_len = line.chars().count();

        let needed = if current.is_empty() { line_len } else { current_len + 1 + line_len };
        if needed > limit && !current.is_empty() {
            messages.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if !current.is_empty() {
            current.push('\n');
            current_len += 1;
        }
        current.push_str(&line);
        current_len += line_len;
    }

    if !current.is_empty() {
        messages.push(current);
    }
    messages
}
