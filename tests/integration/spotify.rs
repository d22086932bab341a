//! Spotify link expansion against a local `wiremock` server.

use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};

use crate::common::fixtures::{album_page, playlist_page, spotify_track, token_response};
use crate::{Mock, MockServer, ResponseTemplate, assert_eq, assert_matches, test_utils};

use rusty_music::commands::music::audio_sources::AudioApi;
use rusty_music::commands::music::audio_sources::spotify::SpotifyApi;
use rusty_music::commands::music::utils::music_manager::MusicError;
use rusty_music::config::SpotifyCredentials;

const BASIC_AUTH: &str = "Basic Y2xpZW50LWlkOmNsaWVudC1zZWNyZXQ=";

fn credentials() -> Option<SpotifyCredentials> {
    Some(SpotifyCredentials {
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
    })
}

fn api_for(server: &MockServer, credentials: Option<SpotifyCredentials>) -> SpotifyApi {
    test_utils::init();
    SpotifyApi::with_base_urls(
        reqwest::Client::new(),
        credentials,
        server.uri(),
        format!("{}/v1", server.uri()),
    )
}

async fn mount_token(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(header("authorization", BASIC_AUTH))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response()))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn track_link_becomes_artist_and_title_query() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/v1/tracks/abc123"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(spotify_track("One More Time", "Daft Punk")),
        )
        .mount(&server)
        .await;
    let api = api_for(&server, credentials());

    let expansion = api
        .expand("https://open.spotify.com/track/abc123?si=share")
        .await;

    assert_eq!(expansion.queries, vec!["Daft Punk One More Time".to_string()]);
    assert!(expansion.error.is_none());
}

#[tokio::test]
async fn token_is_cached_between_requests() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/v1/tracks/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(spotify_track("Song", "Artist")))
        .expect(2)
        .mount(&server)
        .await;
    let api = api_for(&server, credentials());

    api.expand("https://open.spotify.com/track/abc123").await;
    api.expand("https://open.spotify.com/track/abc123").await;
}

#[tokio::test]
async fn playlist_follows_next_links_and_skips_unusable_items() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/v1/playlists/pl1/tracks"))
        .and(query_param("limit", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(playlist_page(
            vec![
                spotify_track("Alpha", "Ann"),
                json!(null),
                json!({ "name": "No Artist", "artists": [] }),
            ],
            Some(format!("{}/v1/pages/2", server.uri())),
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/pages/2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(playlist_page(vec![spotify_track("Beta", "Ben")], None)),
        )
        .mount(&server)
        .await;
    let api = api_for(&server, credentials());

    let expansion = api.expand("https://open.spotify.com/playlist/pl1").await;

    assert_eq!(
        expansion.queries,
        vec!["Ann Alpha".to_string(), "Ben Beta".to_string()]
    );
    assert_eq!(expansion.skipped, 2);
    assert!(expansion.error.is_none());
}

#[tokio::test]
async fn failing_page_keeps_tracks_listed_before_it() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/v1/playlists/pl1/tracks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(playlist_page(
            vec![spotify_track("Alpha", "Ann"), spotify_track("Gamma", "Gus")],
            Some(format!("{}/v1/pages/2", server.uri())),
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/pages/2"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;
    let api = api_for(&server, credentials());

    let expansion = api.expand("https://open.spotify.com/playlist/pl1").await;

    assert_eq!(
        expansion.queries,
        vec!["Ann Alpha".to_string(), "Gus Gamma".to_string()]
    );
    assert_matches!(expansion.error, Some(MusicError::ExternalApiError(_)));
}

#[tokio::test]
async fn album_items_are_tracks_themselves() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/v1/albums/al1/tracks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(album_page(
            vec![spotify_track("Intro", "Band"), spotify_track("Outro", "Band")],
            None,
        )))
        .mount(&server)
        .await;
    let api = api_for(&server, credentials());

    let expansion = api.expand("https://open.spotify.com/album/al1").await;

    assert_eq!(
        expansion.queries,
        vec!["Band Intro".to_string(), "Band Outro".to_string()]
    );
}

#[tokio::test]
async fn empty_playlist_is_an_error() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/v1/playlists/empty/tracks"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(playlist_page(vec![json!(null)], None)),
        )
        .mount(&server)
        .await;
    let api = api_for(&server, credentials());

    let expansion = api.expand("https://open.spotify.com/playlist/empty").await;

    assert!(expansion.queries.is_empty());
    assert_eq!(expansion.skipped, 1);
    assert_matches!(expansion.error, Some(MusicError::ResolutionFailure(_)));
}

#[tokio::test]
async fn missing_credentials_fail_without_requests() {
    let server = MockServer::start().await;
    let api = api_for(&server, None);

    let expansion = api.expand("https://open.spotify.com/track/abc123").await;

    assert!(expansion.queries.is_empty());
    assert_matches!(expansion.error, Some(MusicError::ConfigError(_)));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn rejected_credentials_surface_as_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
        .mount(&server)
        .await;
    let api = api_for(&server, credentials());

    let expansion = api.expand("https://open.spotify.com/playlist/pl1").await;

    assert!(expansion.queries.is_empty());
    assert_matches!(expansion.error, Some(MusicError::ExternalApiError(message)) if message.contains("invalid_client"));
}
