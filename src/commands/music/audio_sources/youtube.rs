//! YouTube support through the `yt-dlp` command-line tool.
//!
//! `yt-dlp` is used both for listing playlist links and for turning a query into a direct
//! media URL; `ffmpeg` then streams that URL as WAV into songbird.

use std::process::Stdio;

use serenity::async_trait;
use songbird::input::{ChildContainer, Input};
use tokio::process::Command;
use tracing::{debug, info, warn};
use url::Url;

use super::track_metadata::TrackMetadata;
use super::{AudioApi, AudioSource, AudioSourceResult, QueryExpansion};
use crate::commands::music::utils::music_manager::MusicError;

/// Runs `yt-dlp` and `ffmpeg` from the configured paths.
#[derive(Debug, Clone)]
pub struct YoutubeApi {
    ytdlp_path: String,
    ffmpeg_path: String,
}

#[async_trait]
impl AudioApi for YoutubeApi {
    /// Only playlist links expand; single videos are resolved as-is.
    fn is_valid_url(&self, url: &str) -> bool {
        YoutubeApi::is_playlist_url(url)
    }

    async fn expand(&self, url: &str) -> QueryExpansion {
        info!("Listing YouTube playlist: {}", url);

        let output = match self.run_ytdlp(&["--flat-playlist", "-J", url]).await {
            Ok(output) => output,
            Err(e) => return QueryExpansion::failed(e),
        };

        match Self::parse_flat_playlist(&output) {
            Ok(expansion) => expansion,
            Err(e) => QueryExpansion::failed(e),
        }
    }
}

impl YoutubeApi {
    pub fn new(ytdlp_path: impl Into<String>, ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ytdlp_path: ytdlp_path.into(),
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    fn is_youtube_host(url: &Url) -> bool {
        matches!(
            url.host_str(),
            Some("www.youtube.com" | "youtube.com" | "m.youtube.com" | "music.youtube.com")
        )
    }

    /// Checks if the input string is a YouTube playlist page.
    ///
    /// Watch links carrying a `list=` parameter are treated as the single video.
    pub fn is_playlist_url(query: &str) -> bool {
        match Url::parse(query) {
            Ok(url) => {
                Self::is_youtube_host(&url)
                    && url.path() == "/playlist"
                    && url.query_pairs().any(|(key, _)| key == "list")
            }
            Err(_) => false,
        }
    }

    /// The argument `yt-dlp` should resolve: links verbatim, free text as a search.
    pub fn search_target(query: &str) -> String {
        if AudioSource::is_url(query) {
            query.to_string()
        } else {
            format!("ytsearch:{}", query)
        }
    }

    /// Turns `yt-dlp --flat-playlist -J` output into watch links, skipping unusable entries.
    pub fn parse_flat_playlist(raw: &str) -> AudioSourceResult<QueryExpansion> {
        let json: serde_json::Value = serde_json::from_str(raw).map_err(|e| {
            MusicError::ResolutionFailure(format!("Failed to parse playlist listing: {}", e))
        })?;

        let entries = json["entries"].as_array().ok_or_else(|| {
            MusicError::ResolutionFailure("Playlist listing has no entries".to_string())
        })?;

        let mut expansion = QueryExpansion::default();
        for entry in entries {
            let link = entry["url"]
                .as_str()
                .filter(|url| !url.is_empty())
                .map(str::to_string)
                .or_else(|| {
                    entry["id"]
                        .as_str()
                        .filter(|id| !id.is_empty())
                        .map(|id| format!("https://www.youtube.com/watch?v={}", id))
                });

            match link {
                Some(link) => expansion.queries.push(link),
                None => expansion.skipped += 1,
            }
        }

        if expansion.skipped > 0 {
            warn!("Skipped {} playlist entries without a link", expansion.skipped);
        }
        Ok(expansion)
    }

    /// Arguments for streaming `stream_url` as 48 kHz stereo WAV on stdout.
    pub fn ffmpeg_args(stream_url: &str, filter: Option<&str>) -> Vec<String> {
        let mut args: Vec<String> = [
            "-reconnect",
            "1",
            "-reconnect_streamed",
            "1",
            "-reconnect_delay_max",
            "5",
            "-nostdin",
            "-i",
            stream_url,
            "-vn",
        ]
        .into_iter()
        .map(str::to_string)
        .collect();

        if let Some(filter) = filter {
            args.push("-af".to_string());
            args.push(filter.to_string());
        }

        args.extend(
            ["-f", "wav", "-ac", "2", "-ar", "48000", "pipe:1"]
                .into_iter()
                .map(str::to_string),
        );
        args
    }

    async fn run_ytdlp(&self, args: &[&str]) -> AudioSourceResult<String> {
        debug!("Running {} {:?}", self.ytdlp_path, args);

        let output = Command::new(&self.ytdlp_path)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| MusicError::ResolutionFailure(format!("Failed to run yt-dlp: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MusicError::ResolutionFailure(format!(
                "yt-dlp failed: {}",
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Looks up the best audio stream for a link or search text.
    pub async fn fetch_metadata(&self, query: &str) -> AudioSourceResult<TrackMetadata> {
        info!("Resolving audio source for: {}", query);
        let target = Self::search_target(query);

        let output = self
            .run_ytdlp(&["-j", "--no-playlist", "-f", "bestaudio/best", &target])
            .await?;

        let metadata = TrackMetadata::from_json(&output)?;
        debug!(
            "Resolved '{}' to '{}' ({:?}, page {:?})",
            query, metadata.title, metadata.duration, metadata.url
        );
        Ok(metadata)
    }

    /// Spawns `ffmpeg` on the track's media URL and wraps its stdout as a songbird input.
    pub fn stream(&self, metadata: &TrackMetadata, filter: Option<&str>) -> AudioSourceResult<Input> {
        let args = Self::ffmpeg_args(&metadata.stream_url, filter);
        debug!("Spawning {} for '{}' with filter {:?}", self.ffmpeg_path, metadata.title, filter);

        let child = std::process::Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| MusicError::ResolutionFailure(format!("Failed to start ffmpeg: {}", e)))?;

        Ok(ChildContainer::from(child).into())
    }
}
