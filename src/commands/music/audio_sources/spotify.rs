//! Implements the `AudioApi` trait for Spotify links.
//! Handles authentication (client credentials flow), URL parsing, and API requests.
//! Spotify has no audio we can stream, so every track becomes a search query.

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use regex::Regex;
use reqwest::header;
use serde::{Deserialize, Serialize};
use serenity::async_trait;
use std::sync::LazyLock;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::commands::music::utils::music_manager::MusicError;
use crate::config::SpotifyCredentials;

use super::{AudioApi, QueryExpansion};

/// Result type specific to Spotify API operations.
pub type SpotifyResult<T> = Result<T, MusicError>;

pub const SPOTIFY_ACCOUNTS_URL: &str = "https://accounts.spotify.com";
pub const SPOTIFY_API_URL: &str = "https://api.spotify.com/v1";

const PLAYLIST_PAGE_SIZE: usize = 100;
const ALBUM_PAGE_SIZE: usize = 50;

/// Represents basic track information retrieved from Spotify.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpotifyTrack {
    /// The name of the track.
    pub name: String,
    /// A list of artist names associated with the track, never empty.
    pub artists: Vec<String>,
}

impl SpotifyTrack {
    /// Reads a track object, returning `None` when it has no name or no named artist.
    pub fn from_json(track: &serde_json::Value) -> Option<Self> {
        let name = track["name"].as_str().filter(|name| !name.trim().is_empty())?;

        let artists: Vec<String> = track["artists"]
            .as_array()?
            .iter()
            .filter_map(|a| a["name"].as_str())
            .filter(|a| !a.trim().is_empty())
            .map(str::to_string)
            .collect();

        if artists.is_empty() {
            return None;
        }

        Some(Self {
            name: name.to_string(),
            artists,
        })
    }

    /// Search text for the track: first artist, then title.
    pub fn search_query(&self) -> String {
        format!("{} {}", self.artists[0], self.name)
    }
}

/// Represents the response from Spotify's token endpoint.
#[derive(Debug, Serialize, Deserialize)]
struct SpotifyToken {
    /// The OAuth2 access token.
    access_token: String,
    /// The type of token (usually "Bearer").
    token_type: String,
    /// The duration in seconds for which the token is valid.
    expires_in: u64,
    /// The time when the token was created, used to check expiry.
    #[serde(skip, default = "Instant::now")]
    created_at: Instant,
}

impl SpotifyToken {
    /// Checks if the token has expired or is close to expiring.
    fn is_expired(&self) -> bool {
        let expiry = Duration::from_secs(self.expires_in);
        let elapsed = self.created_at.elapsed();
        // Consider it expired 30 seconds before actual expiry
        elapsed > expiry.saturating_sub(Duration::from_secs(30))
    }
}

/// Regex to match and capture Spotify track URLs.
static SPOTIFY_TRACK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(https?://)?(open\.spotify\.com(/intl-[a-zA-Z-]+)?|spotify)/track/(?P<id>[a-zA-Z0-9]+)(\?.*)?$")
        .unwrap()
});

/// Regex to match and capture Spotify playlist URLs.
static SPOTIFY_PLAYLIST_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(https?://)?(open\.spotify\.com(/intl-[a-zA-Z-]+)?|spotify)/playlist/(?P<id>[a-zA-Z0-9]+)(\?.*)?$")
        .unwrap()
});

/// Regex to match and capture Spotify album URLs.
static SPOTIFY_ALBUM_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(https?://)?(open\.spotify\.com(/intl-[a-zA-Z-]+)?|spotify)/album/(?P<id>[a-zA-Z0-9]+)(\?.*)?$")
        .unwrap()
});

fn capture_id(regex: &Regex, url: &str) -> Option<String> {
    regex
        .captures(url)
        .and_then(|cap| cap.name("id"))
        .map(|m| m.as_str().to_string())
}

/// Spotify Web API client using the client credentials flow.
pub struct SpotifyApi {
    client: reqwest::Client,
    credentials: Option<SpotifyCredentials>,
    accounts_url: String,
    api_url: String,
    token: Mutex<Option<SpotifyToken>>,
}

impl SpotifyApi {
    pub fn new(client: reqwest::Client, credentials: Option<SpotifyCredentials>) -> Self {
        Self::with_base_urls(client, credentials, SPOTIFY_ACCOUNTS_URL, SPOTIFY_API_URL)
    }

    /// Client talking to other hosts than the public Spotify ones.
    pub fn with_base_urls(
        client: reqwest::Client,
        credentials: Option<SpotifyCredentials>,
        accounts_url: impl Into<String>,
        api_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            credentials,
            accounts_url: accounts_url.into().trim_end_matches('/').to_string(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: Mutex::new(None),
        }
    }

    /// Checks if the provided URL matches any of the known Spotify URL patterns
    /// (track, playlist, album).
    pub fn is_spotify_url(url: &str) -> bool {
        SPOTIFY_TRACK_REGEX.is_match(url)
            || SPOTIFY_PLAYLIST_REGEX.is_match(url)
            || SPOTIFY_ALBUM_REGEX.is_match(url)
    }

    pub fn extract_track_id(url: &str) -> Option<String> {
        capture_id(&SPOTIFY_TRACK_REGEX, url)
    }

    pub fn extract_playlist_id(url: &str) -> Option<String> {
        capture_id(&SPOTIFY_PLAYLIST_REGEX, url)
    }

    pub fn extract_album_id(url: &str) -> Option<String> {
        capture_id(&SPOTIFY_ALBUM_REGEX, url)
    }

    /// Retrieves a valid Spotify API access token.
    ///
    /// Checks the cached token first. If it's missing or expired, requests a new one
    /// with the configured client credentials and caches it.
    async fn get_access_token(&self) -> SpotifyResult<String> {
        let mut token_lock = self.token.lock().await;

        if let Some(token) = &*token_lock {
            if !token.is_expired() {
                return Ok(token.access_token.clone());
            }
        }

        let credentials = self.credentials.as_ref().ok_or_else(|| {
            MusicError::ConfigError(
                "SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET must be set for Spotify links"
                    .to_string(),
            )
        })?;

        let auth = BASE64_STANDARD.encode(format!(
            "{}:{}",
            credentials.client_id, credentials.client_secret
        ));

        debug!("Requesting a new Spotify access token");
        let response = self
            .client
            .post(format!("{}/api/token", self.accounts_url))
            .header(header::AUTHORIZATION, format!("Basic {}", auth))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| {
                MusicError::ExternalApiError(format!("Failed to request Spotify token: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Cannot read response".to_string());
            return Err(MusicError::ExternalApiError(format!(
                "Spotify API error: {} - {}",
                status, text
            )));
        }

        let token_response = response.json::<SpotifyToken>().await.map_err(|e| {
            MusicError::ExternalApiError(format!("Failed to parse Spotify token: {}", e))
        })?;

        let access_token = token_response.access_token.clone();
        *token_lock = Some(token_response);

        Ok(access_token)
    }

    async fn get_json(&self, url: &str) -> SpotifyResult<serde_json::Value> {
        let token = self.get_access_token().await?;

        let response = self
            .client
            .get(url)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .send()
            .await
            .map_err(|e| MusicError::ExternalApiError(format!("Spotify request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Cannot read response".to_string());
            return Err(MusicError::ExternalApiError(format!(
                "Spotify API error: {} - {}",
                status, text
            )));
        }

        response.json().await.map_err(|e| {
            MusicError::ExternalApiError(format!("Failed to parse Spotify response: {}", e))
        })
    }

    /// Fetches a single Spotify track by its ID.
    pub async fn get_track(&self, track_id: &str) -> SpotifyResult<SpotifyTrack> {
        let data = self
            .get_json(&format!("{}/tracks/{}", self.api_url, track_id))
            .await?;

        SpotifyTrack::from_json(&data).ok_or_else(|| {
            MusicError::ResolutionFailure(format!(
                "Spotify track {} has no usable name or artist",
                track_id
            ))
        })
    }

    /// Walks a paginated track listing, following `next` links.
    ///
    /// Playlist items wrap the track in a `track` field; album items are the track itself.
    /// A failing page ends the walk and keeps what was listed so far.
    async fn list_tracks(&self, first_page: String, wrapped: bool) -> QueryExpansion {
        let mut expansion = QueryExpansion::default();
        let mut next = Some(first_page);

        while let Some(url) = next.take() {
            let page = match self.get_json(&url).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(
                        "Spotify listing stopped after {} tracks: {}",
                        expansion.queries.len(),
                        e
                    );
                    expansion.error = Some(e);
                    break;
                }
            };

            for item in page["items"].as_array().into_iter().flatten() {
                let track = if wrapped { &item["track"] } else { item };
                match SpotifyTrack::from_json(track) {
                    Some(track) => expansion.queries.push(track.search_query()),
                    None => expansion.skipped += 1,
                }
            }

            next = page["next"].as_str().map(str::to_string);
        }

        expansion
    }

    pub async fn get_playlist_tracks(&self, playlist_id: &str) -> QueryExpansion {
        self.list_tracks(
            format!(
                "{}/playlists/{}/tracks?limit={}",
                self.api_url, playlist_id, PLAYLIST_PAGE_SIZE
            ),
            true,
        )
        .await
    }

    pub async fn get_album_tracks(&self, album_id: &str) -> QueryExpansion {
        self.list_tracks(
            format!(
                "{}/albums/{}/tracks?limit={}",
                self.api_url, album_id, ALBUM_PAGE_SIZE
            ),
            false,
        )
        .await
    }
}

#[async_trait]
impl AudioApi for SpotifyApi {
    fn is_valid_url(&self, url: &str) -> bool {
        SpotifyApi::is_spotify_url(url)
    }

    /// Tracks become one search query; playlists and albums one query per listed track.
    async fn expand(&self, url: &str) -> QueryExpansion {
        info!("Expanding Spotify URL: {}", url);

        let expansion = if let Some(track_id) = SpotifyApi::extract_track_id(url) {
            return match self.get_track(&track_id).await {
                Ok(track) => QueryExpansion::single(track.search_query()),
                Err(e) => QueryExpansion::failed(e),
            };
        } else if let Some(playlist_id) = SpotifyApi::extract_playlist_id(url) {
            self.get_playlist_tracks(&playlist_id).await
        } else if let Some(album_id) = SpotifyApi::extract_album_id(url) {
            self.get_album_tracks(&album_id).await
        } else {
            return QueryExpansion::failed(MusicError::ResolutionFailure(format!(
                "Unsupported Spotify URL: {}",
                url
            )));
        };

        if expansion.queries.is_empty() && expansion.error.is_none() {
            return QueryExpansion {
                skipped: expansion.skipped,
                ..QueryExpansion::failed(MusicError::ResolutionFailure(
                    "Spotify listing has no playable tracks".to_string(),
                ))
            };
        }

        expansion
    }
}
