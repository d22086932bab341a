//! The per-guild playback state machine.
//!
//! [`PlaybackController`] owns the queue, the current entry and the mode flags, and decides
//! what plays next every time [`PlaybackController::advance`] runs. It never talks to
//! Discord directly: streams come from a [`TrackResolver`], audio goes to a [`VoiceSink`] and
//! user-facing messages go to a [`Notifier`]. The controller is not shared; the guild
//! player task in `guild_player` is its only owner, which is what serializes commands and
//! track-end events for one guild.

use rand::seq::SliceRandom;
use serenity::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::music_manager::{MusicError, MusicResult};
use super::voice_sink::{PlaybackToken, VoiceSink};
use crate::commands::music::audio_sources::TrackResolver;

/// One request to play a query, optionally under its own filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueEntry {
    pub query: String,
    pub filter: Option<String>,
}

impl QueueEntry {
    pub fn new(query: impl Into<String>, filter: Option<String>) -> Self {
        Self {
            query: query.into(),
            filter,
        }
    }

    /// The entry's own filter, falling back to the guild-wide one.
    pub fn active_filter(&self, global_filter: Option<&str>) -> Option<String> {
        self.filter
            .clone()
            .or_else(|| global_filter.map(str::to_string))
    }
}

/// One-shot instruction to replay the current entry under a different filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FilterOverride {
    #[default]
    None,
    ReplayWithFilter(String),
    ReplayWithNoFilter,
}

impl FilterOverride {
    /// Override that swaps the current filter for `filter`, or removes it on `None`.
    pub fn replace_with(filter: Option<String>) -> Self {
        match filter {
            Some(filter) => Self::ReplayWithFilter(filter),
            None => Self::ReplayWithNoFilter,
        }
    }

    pub fn is_set(&self) -> bool {
        !matches!(self, Self::None)
    }

    fn filter(&self) -> Option<String> {
        match self {
            Self::ReplayWithFilter(filter) => Some(filter.clone()),
            Self::None | Self::ReplayWithNoFilter => None,
        }
    }
}

/// What the last successfully started track looked like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlaying {
    pub title: String,
    pub thumbnail: Option<String>,
    pub filter: Option<String>,
}

/// Messages the controller emits for the guild's text channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    NowPlaying {
        title: String,
        filter: Option<String>,
        thumbnail: Option<String>,
    },
    QueueEmpty,
    ResolutionFailed {
        query: String,
        reason: String,
    },
    NotConnected,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notice: Notice);

    /// Notifiers bound to a text channel follow the channel of the latest command.
    fn redirect(&mut self, _channel_id: ChannelId) {}
}

/// Result of a successful [`PlaybackController::skip_to`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipToOutcome {
    Skipped,
    /// Loop-song wins over skipping; nothing changed.
    IgnoredLoopSong,
}

/// Summary returned by [`PlaybackController::enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enqueued {
    pub added: usize,
    pub skipped: usize,
    pub queue_len: usize,
}

/// Read-only copy of a guild's state for display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackSnapshot {
    pub queue: Vec<QueueEntry>,
    pub current: Option<QueueEntry>,
    pub now_playing: Option<NowPlaying>,
    pub loop_song: bool,
    pub loop_queue: bool,
    pub global_filter: Option<String>,
    pub pending_override: FilterOverride,
    pub is_playing: bool,
}

#[derive(Debug, Default)]
struct PlaybackState {
    queue: VecDeque<QueueEntry>,
    current: Option<QueueEntry>,
    loop_song: bool,
    loop_queue: bool,
    global_filter: Option<String>,
    pending_override: FilterOverride,
    suppress_auto_advance: bool,
    empty_notified: bool,
    /// Token of the stream considered live; track-end events for any other token are stale.
    active: Option<PlaybackToken>,
    now_playing: Option<NowPlaying>,
}

enum SelectionSource {
    /// Replays the current entry, optionally consuming the pending override.
    Replay { consumes_override: bool },
    /// Takes the front of the queue.
    Queue,
}

struct Selection {
    entry: QueueEntry,
    active_filter: Option<String>,
    source: SelectionSource,
}

pub struct PlaybackController<R, V>
where
    R: TrackResolver,
    V: VoiceSink<Stream = R::Stream>,
{
    guild_id: GuildId,
    resolver: Arc<R>,
    sink: V,
    state: PlaybackState,
    next_token: u64,
}

impl<R, V> PlaybackController<R, V>
where
    R: TrackResolver,
    V: VoiceSink<Stream = R::Stream>,
{
    pub fn new(guild_id: GuildId, resolver: Arc<R>, sink: V) -> Self {
        Self {
            guild_id,
            resolver,
            sink,
            state: PlaybackState::default(),
            next_token: 0,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn queue(&self) -> &VecDeque<QueueEntry> {
        &self.state.queue
    }

    pub fn current(&self) -> Option<&QueueEntry> {
        self.state.current.as_ref()
    }

    pub fn now_playing(&self) -> Option<&NowPlaying> {
        self.state.now_playing.as_ref()
    }

    pub fn loop_song(&self) -> bool {
        self.state.loop_song
    }

    pub fn loop_queue(&self) -> bool {
        self.state.loop_queue
    }

    pub fn global_filter(&self) -> Option<&str> {
        self.state.global_filter.as_deref()
    }

    pub fn pending_override(&self) -> &FilterOverride {
        &self.state.pending_override
    }

    pub fn active_token(&self) -> Option<PlaybackToken> {
        self.state.active
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            queue: self.state.queue.iter().cloned().collect(),
            current: self.state.current.clone(),
            now_playing: self.state.now_playing.clone(),
            loop_song: self.state.loop_song,
            loop_queue: self.state.loop_queue,
            global_filter: self.state.global_filter.clone(),
            pending_override: self.state.pending_override.clone(),
            is_playing: self.state.active.is_some(),
        }
    }

    /// Append `query` to the queue, expanding playlist references into one entry per track.
    ///
    /// Partial playlist listings are still queued; the error is only returned when nothing
    /// could be listed at all.
    pub async fn enqueue(&mut self, query: &str, filter: Option<String>) -> MusicResult<Enqueued> {
        let expansion = self.resolver.expand(query).await;
        let added = expansion.queries.len();

        match expansion.error {
            Some(err) if added == 0 => return Err(err),
            Some(err) => warn!(
                "Partial listing for '{}' in guild {}: queued {} entries before error: {}",
                query, self.guild_id, added, err
            ),
            None => {}
        }

        self.state.queue.extend(
            expansion
                .queries
                .into_iter()
                .map(|query| QueueEntry::new(query, filter.clone())),
        );

        info!(
            "Queued {} entries ({} skipped) for guild {}",
            added, expansion.skipped, self.guild_id
        );

        Ok(Enqueued {
            added,
            skipped: expansion.skipped,
            queue_len: self.state.queue.len(),
        })
    }

    /// Pick the next track and start it. See [`Self::advance_with`].
    pub async fn advance(&mut self, notifier: &dyn Notifier) {
        self.advance_with(FilterOverride::None, notifier).await
    }

    /// Start the next track unless the controller already has a live stream.
    pub async fn advance_if_idle(&mut self, notifier: &dyn Notifier) -> bool {
        if self.state.active.is_some() || self.sink.is_playing().await {
            return false;
        }
        self.advance(notifier).await;
        true
    }

    /// Pick the next track and start it, with `forced` taking precedence over every
    /// other rule when the guild has a current entry.
    ///
    /// Queue and current entry are only touched once the stream resolved and the sink
    /// accepted it; any failure is reported through `notifier` and leaves them as they were.
    pub async fn advance_with(&mut self, forced: FilterOverride, notifier: &dyn Notifier) {
        let Some(selection) = self.select(forced) else {
            self.state.current = None;
            self.state.active = None;
            self.state.now_playing = None;
            self.state.pending_override = FilterOverride::None;

            if !self.state.empty_notified {
                self.state.empty_notified = true;
                info!("Queue is empty for guild {}", self.guild_id);
                notifier.notify(Notice::QueueEmpty).await;
            } else {
                debug!("Queue still empty for guild {}, notice already sent", self.guild_id);
            }
            return;
        };

        let query = selection.entry.query.clone();
        debug!(
            "Resolving '{}' (filter: {:?}) for guild {}",
            query, selection.active_filter, self.guild_id
        );

        let resolved = match self
            .resolver
            .resolve(&query, selection.active_filter.as_deref())
            .await
        {
            Ok(resolved) => resolved,
            Err(err) => {
                warn!("Failed to resolve '{}' for guild {}: {}", query, self.guild_id, err);
                notifier
                    .notify(Notice::ResolutionFailed {
                        query,
                        reason: err.to_string(),
                    })
                    .await;
                return;
            }
        };

        self.stop_live_stream().await;

        let token = self.issue_token();
        if let Err(err) = self.sink.play(resolved.stream, token).await {
            warn!("Failed to start '{}' for guild {}: {}", query, self.guild_id, err);
            let notice = match err {
                MusicError::NotConnected => Notice::NotConnected,
                other => Notice::ResolutionFailed {
                    query,
                    reason: other.to_string(),
                },
            };
            notifier.notify(notice).await;
            return;
        }

        self.commit(selection.entry, selection.source);
        self.state.active = Some(token);
        self.state.empty_notified = false;
        self.state.now_playing = Some(NowPlaying {
            title: resolved.title.clone(),
            thumbnail: resolved.thumbnail.clone(),
            filter: selection.active_filter.clone(),
        });

        info!(
            "Now playing '{}' ({:?}) in guild {}",
            resolved.title, token, self.guild_id
        );
        notifier
            .notify(Notice::NowPlaying {
                title: resolved.title,
                filter: selection.active_filter,
                thumbnail: resolved.thumbnail,
            })
            .await;
    }

    fn select(&self, forced: FilterOverride) -> Option<Selection> {
        let state = &self.state;

        if let Some(current) = &state.current {
            let replay_override = if forced.is_set() {
                Some(forced)
            } else if state.pending_override.is_set() {
                Some(state.pending_override.clone())
            } else {
                None
            };

            if let Some(replay) = replay_override {
                let filter = replay.filter();
                return Some(Selection {
                    entry: QueueEntry::new(current.query.clone(), filter.clone()),
                    active_filter: filter,
                    source: SelectionSource::Replay {
                        consumes_override: true,
                    },
                });
            }

            if state.loop_song {
                return Some(self.replay_current(current));
            }
        }

        if let Some(front) = state.queue.front() {
            return Some(Selection {
                entry: front.clone(),
                active_filter: front.active_filter(state.global_filter.as_deref()),
                source: SelectionSource::Queue,
            });
        }

        match &state.current {
            Some(current) if state.loop_queue => Some(self.replay_current(current)),
            _ => None,
        }
    }

    fn replay_current(&self, current: &QueueEntry) -> Selection {
        Selection {
            entry: current.clone(),
            active_filter: current.active_filter(self.state.global_filter.as_deref()),
            source: SelectionSource::Replay {
                consumes_override: false,
            },
        }
    }

    fn commit(&mut self, entry: QueueEntry, source: SelectionSource) {
        match source {
            SelectionSource::Replay { consumes_override } => {
                if consumes_override {
                    self.state.pending_override = FilterOverride::None;
                }
            }
            SelectionSource::Queue => {
                self.state.queue.pop_front();
                if self.state.loop_queue {
                    if let Some(previous) = self.state.current.take() {
                        self.state.queue.push_back(previous);
                    }
                }
            }
        }
        self.state.current = Some(entry);
    }

    fn issue_token(&mut self) -> PlaybackToken {
        self.next_token += 1;
        PlaybackToken(self.next_token)
    }

    /// Stop whatever the sink is playing and forget its token, so its end event is stale.
    async fn stop_live_stream(&mut self) {
        if self.sink.is_playing().await {
            if let Err(err) = self.sink.stop().await {
                warn!("Failed to stop playback for guild {}: {}", self.guild_id, err);
            }
        }
        self.state.active = None;
    }

    /// Stop the live stream; its end event drives the next advance.
    pub async fn skip_current(&mut self) -> bool {
        if !self.sink.is_playing().await {
            return false;
        }
        if let Err(err) = self.sink.stop().await {
            warn!("Failed to skip track for guild {}: {}", self.guild_id, err);
            return false;
        }
        true
    }

    /// Jump to the 1-based queue position `index`, starting it before returning.
    pub async fn skip_to(
        &mut self,
        index: usize,
        notifier: &dyn Notifier,
    ) -> MusicResult<SkipToOutcome> {
        let len = self.state.queue.len();
        if index == 0 || index > len {
            return Err(MusicError::InvalidIndex { index, len });
        }

        if self.state.loop_song {
            info!("Ignoring skip to {} for guild {}: loop song is on", index, self.guild_id);
            return Ok(SkipToOutcome::IgnoredLoopSong);
        }

        let passed: Vec<QueueEntry> = self.state.queue.drain(..index - 1).collect();
        if self.state.loop_queue {
            self.state.queue.extend(passed);
        }
        self.state.pending_override = FilterOverride::None;

        self.state.suppress_auto_advance = true;
        self.stop_live_stream().await;
        self.advance(notifier).await;
        self.state.suppress_auto_advance = false;

        Ok(SkipToOutcome::Skipped)
    }

    /// Set the guild-wide filter and, if something is playing, restart it under the new one.
    pub async fn replace_filter(&mut self, filter: Option<String>, notifier: &dyn Notifier) {
        self.state.global_filter = filter.clone();

        if self.state.current.is_none() {
            return;
        }

        let replay = FilterOverride::replace_with(filter);
        if self.sink.is_playing().await {
            self.state.suppress_auto_advance = true;
            self.stop_live_stream().await;
            self.advance_with(replay, notifier).await;
            self.state.suppress_auto_advance = false;
        } else {
            debug!(
                "Nothing playing in guild {}, keeping filter change for the next advance",
                self.guild_id
            );
            self.state.pending_override = replay;
        }
    }

    /// Handle the end of the stream identified by `token`.
    ///
    /// Returns whether the event advanced playback.
    pub async fn on_track_end(
        &mut self,
        token: PlaybackToken,
        error: Option<String>,
        notifier: &dyn Notifier,
    ) -> bool {
        if let Some(error) = &error {
            warn!(
                "Track {:?} in guild {} ended with transport error: {}",
                token, self.guild_id, error
            );
        }

        if self.state.active != Some(token) {
            debug!("Ignoring stale end of {:?} for guild {}", token, self.guild_id);
            return false;
        }

        if self.state.suppress_auto_advance {
            debug!("Auto advance suppressed for guild {}", self.guild_id);
            return false;
        }

        self.state.active = None;
        self.advance(notifier).await;
        true
    }

    pub fn shuffle(&mut self) {
        self.state.queue.make_contiguous().shuffle(&mut rand::rng());
        info!("Shuffled {} entries for guild {}", self.state.queue.len(), self.guild_id);
    }

    pub fn clear_queue(&mut self) {
        self.state.queue.clear();
    }

    pub fn set_loop_song(&mut self, enabled: bool) {
        self.state.loop_song = enabled;
        if enabled {
            self.state.loop_queue = false;
        }
    }

    pub fn set_loop_queue(&mut self, enabled: bool) {
        self.state.loop_queue = enabled;
        if enabled {
            self.state.loop_song = false;
        }
    }

    /// Stop playback and return to the initial state; the controller stays usable.
    pub async fn stop(&mut self) {
        if let Err(err) = self.sink.stop().await {
            warn!("Failed to stop playback for guild {}: {}", self.guild_id, err);
        }
        self.state = PlaybackState::default();
        info!("Playback reset for guild {}", self.guild_id);
    }
}
