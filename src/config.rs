//! Environment-driven configuration for the bot.
//!
//! `main` loads `.env` through `dotenv` before calling [`BotConfig::from_env`]; the
//! parsing itself goes through a lookup closure so it can be exercised without touching
//! the process environment.

use std::env;
use std::time::Duration;

use crate::commands::music::utils::music_manager::MusicError;

/// Default pause allowed for the voice driver to confirm a stop before a new stream starts.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(200);

/// Client credentials for the Spotify Web API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BotConfig {
    pub discord_token: String,
    /// `None` when either Spotify variable is missing; Spotify links then fail to expand.
    pub spotify: Option<SpotifyCredentials>,
    pub settle_delay: Duration,
    pub ytdlp_path: String,
    pub ffmpeg_path: String,
}

impl BotConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, MusicError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, MusicError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let discord_token = non_empty("DISCORD_TOKEN")
            .ok_or_else(|| MusicError::ConfigError("DISCORD_TOKEN not set".to_string()))?;

        let spotify = match (
            non_empty("SPOTIFY_CLIENT_ID"),
            non_empty("SPOTIFY_CLIENT_SECRET"),
        ) {
            (Some(client_id), Some(client_secret)) => Some(SpotifyCredentials {
                client_id,
                client_secret,
            }),
            _ => None,
        };

        let settle_delay = match non_empty("MUSIC_SETTLE_DELAY") {
            Some(raw) => humantime::parse_duration(raw.trim()).map_err(|e| {
                MusicError::ConfigError(format!("Invalid MUSIC_SETTLE_DELAY '{}': {}", raw, e))
            })?,
            None => DEFAULT_SETTLE_DELAY,
        };

        Ok(Self {
            discord_token,
            spotify,
            settle_delay,
            ytdlp_path: non_empty("YTDLP_PATH").unwrap_or_else(|| "yt-dlp".to_string()),
            ffmpeg_path: non_empty("FFMPEG_PATH").unwrap_or_else(|| "ffmpeg".to_string()),
        })
    }
}
