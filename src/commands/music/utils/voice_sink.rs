//! The voice side of playback: a small [`VoiceSink`] trait and its songbird implementation.

use serenity::async_trait;
use serenity::model::id::GuildId;
use songbird::error::ControlError;
use songbird::input::Input;
use songbird::tracks::{PlayMode, TrackHandle};
use songbird::{Event, Songbird, TrackEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, watch};
use tracing::{debug, info, warn};

use super::event_handlers::TrackEndNotifier;
use super::guild_player::GuildCommand;
use super::music_manager::{MusicError, MusicResult};

/// Identifies a single `play` call, so late end events can be told apart from live ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaybackToken(pub u64);

#[async_trait]
pub trait VoiceSink: Send + Sync {
    type Stream: Send;

    async fn is_playing(&self) -> bool;

    /// Start `stream`. Its end must be reported exactly once, tagged with `token`.
    async fn play(&self, stream: Self::Stream, token: PlaybackToken) -> MusicResult<()>;

    /// Stop the current stream, returning once the transport confirmed it or the settle
    /// delay ran out.
    async fn stop(&self) -> MusicResult<()>;
}

/// The parts of a started track that end-event registration needs.
trait StartedTrack {
    fn watch(&self, event: TrackEvent, notifier: TrackEndNotifier) -> Result<(), ControlError>;
    fn halt(&self) -> Result<(), ControlError>;
}

impl StartedTrack for TrackHandle {
    fn watch(&self, event: TrackEvent, notifier: TrackEndNotifier) -> Result<(), ControlError> {
        self.add_event(Event::Track(event), notifier)
    }

    fn halt(&self) -> Result<(), ControlError> {
        self.stop()
    }
}

/// Register the end handlers on a track that is already playing. If that fails the track
/// is stopped, since nothing could report its end or stop it later.
fn watch_track_end<T: StartedTrack>(track: &T, notifier: &TrackEndNotifier) -> MusicResult<()> {
    for event in [TrackEvent::End, TrackEvent::Error] {
        if let Err(err) = track.watch(event, notifier.clone()) {
            if let Err(stop_err) = track.halt() {
                debug!("Unwatched track could not be stopped: {}", stop_err);
            }
            return Err(MusicError::TransportError(err.to_string()));
        }
    }
    Ok(())
}

struct LiveTrack {
    handle: TrackHandle,
    token: PlaybackToken,
    ended: watch::Receiver<bool>,
}

/// Plays resolved streams into the guild's songbird call.
pub struct SongbirdSink {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    events: mpsc::UnboundedSender<GuildCommand>,
    settle_delay: Duration,
    live: Mutex<Option<LiveTrack>>,
}

impl SongbirdSink {
    pub fn new(
        manager: Arc<Songbird>,
        guild_id: GuildId,
        events: mpsc::UnboundedSender<GuildCommand>,
        settle_delay: Duration,
    ) -> Self {
        Self {
            manager,
            guild_id,
            events,
            settle_delay,
            live: Mutex::new(None),
        }
    }
}

#[async_trait]
impl VoiceSink for SongbirdSink {
    type Stream = Input;

    async fn is_playing(&self) -> bool {
        let live = self.live.lock().await;
        let Some(track) = live.as_ref() else {
            return false;
        };

        match track.handle.get_info().await {
            Ok(info) => matches!(info.playing, PlayMode::Play | PlayMode::Pause),
            // The driver drops finished tracks, which makes the handle unreachable
            Err(_) => false,
        }
    }

    async fn play(&self, stream: Input, token: PlaybackToken) -> MusicResult<()> {
        let call = self
            .manager
            .get(self.guild_id)
            .ok_or(MusicError::NotConnected)?;

        let handle = {
            let mut handler = call.lock().await;
            handler.play_input(stream)
        };

        let (ended_tx, ended_rx) = watch::channel(false);
        let notifier = TrackEndNotifier::new(self.guild_id, token, self.events.clone(), ended_tx);

        watch_track_end(&handle, &notifier)?;

        info!("Started {:?} in guild {}", token, self.guild_id);
        *self.live.lock().await = Some(LiveTrack {
            handle,
            token,
            ended: ended_rx,
        });

        Ok(())
    }

    async fn stop(&self) -> MusicResult<()> {
        let Some(mut track) = self.live.lock().await.take() else {
            return Ok(());
        };

        if let Err(e) = track.handle.stop() {
            // Already finished; nothing left to confirm
            debug!("Stop of {:?} in guild {} was a no-op: {}", track.token, self.guild_id, e);
            return Ok(());
        }

        match tokio::time::timeout(self.settle_delay, track.ended.wait_for(|ended| *ended)).await
        {
            Ok(_) => debug!("Driver confirmed stop of {:?} in guild {}", track.token, self.guild_id),
            Err(_) => warn!(
                "No stop confirmation for {:?} in guild {} after {:?}",
                track.token, self.guild_id, self.settle_delay
            ),
        }

        Ok(())
    }
}
