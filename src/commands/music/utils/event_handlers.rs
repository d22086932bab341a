use serenity::async_trait;
use serenity::model::id::GuildId;
use songbird::tracks::PlayMode;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::guild_player::GuildCommand;
use super::voice_sink::PlaybackToken;

/// Event handler for when a song ends or errors out.
///
/// Instead of touching playback state from songbird's event task, it posts a
/// [`GuildCommand::TrackEnded`] into the guild's mailbox and flips the stop-confirmation
/// flag that `SongbirdSink::stop` waits on.
#[derive(Clone)]
pub struct TrackEndNotifier {
    guild_id: GuildId,
    token: PlaybackToken,
    events: mpsc::UnboundedSender<GuildCommand>,
    ended: Arc<watch::Sender<bool>>,
}

impl TrackEndNotifier {
    pub fn new(
        guild_id: GuildId,
        token: PlaybackToken,
        events: mpsc::UnboundedSender<GuildCommand>,
        ended: watch::Sender<bool>,
    ) -> Self {
        Self {
            guild_id,
            token,
            events,
            ended: Arc::new(ended),
        }
    }
}

#[async_trait]
impl songbird::EventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &songbird::EventContext<'_>) -> Option<songbird::Event> {
        let songbird::EventContext::Track(tracks) = ctx else {
            return None;
        };

        let error = tracks.iter().find_map(|(state, _)| match &state.playing {
            PlayMode::Errored(e) => Some(format!("{:?}", e)),
            _ => None,
        });

        // End and Error are both registered; only the first one counts
        if self.ended.send_replace(true) {
            debug!("Duplicate end event for {:?} in guild {}", self.token, self.guild_id);
            return None;
        }

        info!("Track {:?} ended for guild {}", self.token, self.guild_id);
        if self
            .events
            .send(GuildCommand::TrackEnded {
                token: self.token,
                error,
            })
            .is_err()
        {
            warn!("Guild player for {} is gone, dropping end event", self.guild_id);
        }

        None
    }
}
