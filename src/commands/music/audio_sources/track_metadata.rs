//! Defines the `TrackMetadata` struct, the subset of `yt-dlp --dump-json` output the bot
//! needs to stream and announce a track.

use crate::commands::music::utils::music_manager::MusicError;
use std::time::Duration;

/// Metadata for a playable track.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackMetadata {
    /// The title of the track.
    pub title: String,
    /// The page the track was found on (e.g., YouTube watch URL), if available.
    pub url: Option<String>,
    /// Direct media URL that ffmpeg reads from.
    pub stream_url: String,
    /// The duration of the track, if available.
    pub duration: Option<Duration>,
    /// URL to a thumbnail image for the track, if available.
    pub thumbnail: Option<String>,
}

impl TrackMetadata {
    /// Parses `yt-dlp -j` output.
    ///
    /// `yt-dlp` prints one JSON document per line; the first one wins. Search and playlist
    /// results wrapped in `entries` resolve to their first entry.
    pub fn from_json(raw: &str) -> Result<Self, MusicError> {
        let line = raw
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .ok_or_else(|| MusicError::ResolutionFailure("yt-dlp returned no data".to_string()))?;

        let mut json: serde_json::Value = serde_json::from_str(line).map_err(|e| {
            MusicError::ResolutionFailure(format!("Failed to parse video metadata: {}", e))
        })?;

        if let Some(entries) = json.get_mut("entries").and_then(|e| e.as_array_mut()) {
            if entries.is_empty() {
                return Err(MusicError::ResolutionFailure("No results found".to_string()));
            }
            json = entries.swap_remove(0);
        }

        let stream_url = json["url"]
            .as_str()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                MusicError::ResolutionFailure("No playable URL found in yt-dlp data".to_string())
            })?
            .to_string();

        Ok(Self {
            title: json["title"]
                .as_str()
                .unwrap_or("Unknown Title")
                .to_string(),
            url: json["webpage_url"].as_str().map(str::to_string),
            stream_url,
            duration: json["duration"].as_f64().map(Duration::from_secs_f64),
            thumbnail: json["thumbnail"].as_str().map(str::to_string),
        })
    }
}
