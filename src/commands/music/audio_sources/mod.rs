//! This module turns user queries into things the playback controller can use.
//! It includes implementations for specific sources like YouTube and Spotify,
//! and provides the [`TrackResolver`] seam the controller depends on.

/// Submodule implementing the `AudioApi` trait for Spotify.
pub mod spotify;
/// Submodule defining the `TrackMetadata` struct parsed from `yt-dlp` output.
pub mod track_metadata;
/// Submodule implementing stream resolution and playlist listing through `yt-dlp`.
pub mod youtube;

use crate::commands::music::utils::music_manager::{MusicError, MusicResult};
use crate::config::BotConfig;
use serenity::async_trait;
use songbird::input::Input;
use spotify::SpotifyApi;
use tracing::info;
use url::Url;
use youtube::YoutubeApi;

/// A specialized `Result` type for operations within the `audio_sources` module.
pub type AudioSourceResult<T> = Result<T, MusicError>;

/// A stream ready to be handed to the voice transport, plus what to show for it.
#[derive(Debug)]
pub struct ResolvedTrack<S> {
    pub title: String,
    pub thumbnail: Option<String>,
    pub stream: S,
}

/// The queue entries one user query stands for.
///
/// Listing can fail halfway through a paginated playlist; whatever was listed before the
/// failure is kept in `queries` next to the `error`.
#[derive(Debug, Default)]
pub struct QueryExpansion {
    pub queries: Vec<String>,
    /// Items dropped because their metadata was unusable.
    pub skipped: usize,
    pub error: Option<MusicError>,
}

impl QueryExpansion {
    pub fn single(query: impl Into<String>) -> Self {
        Self {
            queries: vec![query.into()],
            ..Default::default()
        }
    }

    pub fn failed(error: MusicError) -> Self {
        Self {
            error: Some(error),
            ..Default::default()
        }
    }
}

/// Everything the playback controller needs from the audio-source side.
#[async_trait]
pub trait TrackResolver: Send + Sync {
    type Stream: Send;

    /// Resolve `query` (a link or free text) into a playable stream under `filter`.
    async fn resolve(
        &self,
        query: &str,
        filter: Option<&str>,
    ) -> MusicResult<ResolvedTrack<Self::Stream>>;

    /// Expand playlist-style references; anything else comes back as a single query.
    async fn expand(&self, query: &str) -> QueryExpansion;
}

/// Trait defining the common interface for providers whose links expand into queue entries.
/// Requires `Send + Sync` to be safely used across async tasks.
#[async_trait]
pub trait AudioApi: Send + Sync {
    /// Checks if the given URL string is recognized by this specific provider.
    fn is_valid_url(&self, url: &str) -> bool;

    /// Lists the queries the URL stands for, in listing order.
    async fn expand(&self, url: &str) -> QueryExpansion;
}

/// A utility struct providing general helper functions related to audio sources.
pub struct AudioSource;

impl AudioSource {
    /// Performs a basic check if the input string can be parsed as a URL.
    /// Does not validate if the URL is actually reachable or supported by any specific API.
    pub fn is_url(input: &str) -> bool {
        Url::parse(input).is_ok()
    }
}

/// The production resolver: Spotify and YouTube playlists for expansion, `yt-dlp` and
/// `ffmpeg` for streams.
pub struct SourceResolver {
    apis: Vec<Box<dyn AudioApi>>,
    youtube: YoutubeApi,
}

impl SourceResolver {
    pub fn new(config: &BotConfig, http: reqwest::Client) -> Self {
        let youtube = YoutubeApi::new(&config.ytdlp_path, &config.ffmpeg_path);
        Self {
            apis: vec![
                Box::new(youtube.clone()),
                Box::new(SpotifyApi::new(http, config.spotify.clone())),
            ],
            youtube,
        }
    }
}

#[async_trait]
impl TrackResolver for SourceResolver {
    type Stream = Input;

    async fn resolve(&self, query: &str, filter: Option<&str>) -> MusicResult<ResolvedTrack<Input>> {
        let metadata = self.youtube.fetch_metadata(query).await?;
        let stream = self.youtube.stream(&metadata, filter)?;

        Ok(ResolvedTrack {
            title: metadata.title,
            thumbnail: metadata.thumbnail,
            stream,
        })
    }

    async fn expand(&self, query: &str) -> QueryExpansion {
        if AudioSource::is_url(query) {
            for api in &self.apis {
                if api.is_valid_url(query) {
                    info!("Expanding provider link: {}", query);
                    return api.expand(query).await;
                }
            }
        }
        QueryExpansion::single(query)
    }
}
