//! Fake and mock collaborators for the playback controller
//! The fakes record every interaction so tests can assert on the exact calls made.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mockall::mock;
use serenity::model::id::ChannelId;
use tokio::sync::mpsc;

use rusty_music::commands::music::audio_sources::{QueryExpansion, ResolvedTrack, TrackResolver};
use rusty_music::commands::music::utils::guild_player::GuildCommand;
use rusty_music::commands::music::utils::music_manager::{MusicError, MusicResult};
use rusty_music::commands::music::utils::playback::{Notice, Notifier};
use rusty_music::commands::music::utils::voice_sink::{PlaybackToken, VoiceSink};

/// What a fake stream carries: the query and filter it was resolved with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeStream {
    pub query: String,
    pub filter: Option<String>,
}

/// Listing a fake playlist produces; `error` becomes a `ResolutionFailure`.
#[derive(Debug, Clone, Default)]
pub struct FakeListing {
    pub queries: Vec<String>,
    pub skipped: usize,
    pub error: Option<String>,
}

/// Resolves any query to a stream titled `"Title of <query>"`, except those marked failing.
#[derive(Default)]
pub struct FakeResolver {
    calls: Mutex<Vec<(String, Option<String>)>>,
    failing: Mutex<HashSet<String>>,
    listings: Mutex<HashMap<String, FakeListing>>,
    delay: Mutex<Option<Duration>>,
}

impl FakeResolver {
    pub fn fail_on(&self, query: &str) {
        self.failing.lock().unwrap().insert(query.to_string());
    }

    pub fn succeed_on(&self, query: &str) {
        self.failing.lock().unwrap().remove(query);
    }

    pub fn add_listing(&self, query: &str, listing: FakeListing) {
        self.listings
            .lock()
            .unwrap()
            .insert(query.to_string(), listing);
    }

    /// Make every following `resolve` take `delay`, like a slow yt-dlp lookup.
    pub fn slow_down(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Every `(query, filter)` pair passed to `resolve`, in call order.
    pub fn calls(&self) -> Vec<(String, Option<String>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_call(&self) -> Option<(String, Option<String>)> {
        self.calls.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl TrackResolver for FakeResolver {
    type Stream = FakeStream;

    async fn resolve(
        &self,
        query: &str,
        filter: Option<&str>,
    ) -> MusicResult<ResolvedTrack<FakeStream>> {
        self.calls
            .lock()
            .unwrap()
            .push((query.to_string(), filter.map(str::to_string)));

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.lock().unwrap().contains(query) {
            return Err(MusicError::ResolutionFailure(format!("no results for {}", query)));
        }

        Ok(ResolvedTrack {
            title: format!("Title of {}", query),
            thumbnail: None,
            stream: FakeStream {
                query: query.to_string(),
                filter: filter.map(str::to_string),
            },
        })
    }

    async fn expand(&self, query: &str) -> QueryExpansion {
        match self.listings.lock().unwrap().get(query) {
            Some(listing) => QueryExpansion {
                queries: listing.queries.clone(),
                skipped: listing.skipped,
                error: listing.error.clone().map(MusicError::ResolutionFailure),
            },
            None => QueryExpansion::single(query),
        }
    }
}

#[derive(Debug, Default)]
pub struct FakeSinkState {
    pub live: Option<(FakeStream, PlaybackToken)>,
    pub played: Vec<(FakeStream, PlaybackToken)>,
    pub stops: usize,
    pub disconnected: bool,
    /// Where end events go, mimicking the songbird event handler.
    pub events: Option<mpsc::UnboundedSender<GuildCommand>>,
}

/// In-memory voice sink. Clones share state, so a test can keep one while the controller
/// owns another.
#[derive(Clone, Default)]
pub struct FakeSink {
    state: Arc<Mutex<FakeSinkState>>,
}

impl FakeSink {
    /// A sink that reports track ends into a guild player's mailbox.
    pub fn reporting_to(events: mpsc::UnboundedSender<GuildCommand>) -> Self {
        let sink = Self::default();
        sink.state.lock().unwrap().events = Some(events);
        sink
    }

    pub fn disconnect(&self) {
        self.state.lock().unwrap().disconnected = true;
    }

    pub fn live(&self) -> Option<(FakeStream, PlaybackToken)> {
        self.state.lock().unwrap().live.clone()
    }

    pub fn live_token(&self) -> Option<PlaybackToken> {
        self.live().map(|(_, token)| token)
    }

    pub fn played(&self) -> Vec<(FakeStream, PlaybackToken)> {
        self.state.lock().unwrap().played.clone()
    }

    pub fn stops(&self) -> usize {
        self.state.lock().unwrap().stops
    }

    /// Let the live stream run out on its own, returning its token.
    pub fn finish(&self) -> Option<PlaybackToken> {
        let mut state = self.state.lock().unwrap();
        let (_, token) = state.live.take()?;
        if let Some(events) = &state.events {
            let _ = events.send(GuildCommand::TrackEnded { token, error: None });
        }
        Some(token)
    }
}

#[async_trait]
impl VoiceSink for FakeSink {
    type Stream = FakeStream;

    async fn is_playing(&self) -> bool {
        self.state.lock().unwrap().live.is_some()
    }

    async fn play(&self, stream: FakeStream, token: PlaybackToken) -> MusicResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.disconnected {
            return Err(MusicError::NotConnected);
        }
        state.played.push((stream.clone(), token));
        state.live = Some((stream, token));
        Ok(())
    }

    async fn stop(&self) -> MusicResult<()> {
        let mut state = self.state.lock().unwrap();
        state.stops += 1;
        if let Some((_, token)) = state.live.take() {
            if let Some(events) = &state.events {
                let _ = events.send(GuildCommand::TrackEnded { token, error: None });
            }
        }
        Ok(())
    }
}

/// Notifier that keeps every notice it was given.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    notices: Arc<Mutex<Vec<Notice>>>,
    channel: Arc<Mutex<Option<ChannelId>>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }

    pub fn count(&self, predicate: impl Fn(&Notice) -> bool) -> usize {
        self.notices().iter().filter(|n| predicate(n)).count()
    }

    pub fn channel(&self) -> Option<ChannelId> {
        *self.channel.lock().unwrap()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }

    fn redirect(&mut self, channel_id: ChannelId) {
        *self.channel.lock().unwrap() = Some(channel_id);
    }
}

mock! {
    pub Notifier {}

    #[async_trait]
    impl Notifier for Notifier {
        async fn notify(&self, notice: Notice);
    }
}
