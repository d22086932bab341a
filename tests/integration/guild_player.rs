//! Drives a spawned guild player through its `GuildHandle`, with a sink that reports
//! track ends into the mailbox the way the songbird handler does.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use crate::common::fixtures::{NIGHTCORE, channel_id, guild_id};
use crate::common::mocks::{FakeResolver, FakeSink, RecordingNotifier};
use crate::{assert_eq, assert_matches, test_utils};

use rusty_music::commands::music::utils::guild_player::{GuildHandle, spawn_guild_player};
use rusty_music::commands::music::utils::music_manager::MusicError;
use rusty_music::commands::music::utils::playback::{
    Notice, PlaybackController, PlaybackSnapshot, QueueEntry, SkipToOutcome,
};

struct Harness {
    handle: GuildHandle,
    resolver: Arc<FakeResolver>,
    sink: FakeSink,
    notifier: RecordingNotifier,
    task: JoinHandle<()>,
}

fn spawn_player() -> Harness {
    test_utils::init();

    let (handle, mailbox) = GuildHandle::mailbox(guild_id());
    let resolver = Arc::new(FakeResolver::default());
    let sink = FakeSink::reporting_to(handle.sender());
    let notifier = RecordingNotifier::default();
    let controller = PlaybackController::new(guild_id(), resolver.clone(), sink.clone());

    let task = spawn_guild_player(controller, notifier.clone(), mailbox);

    Harness {
        handle,
        resolver,
        sink,
        notifier,
        task,
    }
}

fn queries(snapshot: &PlaybackSnapshot) -> Vec<String> {
    snapshot.queue.iter().map(|e| e.query.clone()).collect()
}

fn current_query(snapshot: &PlaybackSnapshot) -> Option<String> {
    snapshot.current.as_ref().map(|e| e.query.clone())
}

async fn play_all(handle: &GuildHandle, items: &[&str]) {
    for item in items {
        handle.enqueue(*item, None).await.unwrap();
    }
    handle.advance_if_idle().await.unwrap();
}

#[tokio::test]
async fn play_starts_first_entry_and_reports_it() {
    let h = spawn_player();

    let enqueued = h.handle.enqueue("A", None).await.unwrap();
    assert_eq!(enqueued.queue_len, 1);
    assert!(h.handle.advance_if_idle().await.unwrap());
    assert!(!h.handle.advance_if_idle().await.unwrap());

    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(current_query(&snapshot), Some("A".to_string()));
    assert!(snapshot.is_playing);
    assert_eq!(
        h.notifier.notices(),
        vec![Notice::NowPlaying {
            title: "Title of A".to_string(),
            filter: None,
            thumbnail: None,
        }]
    );
}

#[tokio::test]
async fn natural_end_advances_to_next_entry() {
    let h = spawn_player();
    play_all(&h.handle, &["A", "B"]).await;

    h.sink.finish().unwrap();

    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(current_query(&snapshot), Some("B".to_string()));
    assert!(snapshot.queue.is_empty());
}

#[tokio::test]
async fn skip_advances_exactly_once() {
    let h = spawn_player();
    play_all(&h.handle, &["A", "B", "C"]).await;

    assert!(h.handle.skip_current().await.unwrap());

    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(current_query(&snapshot), Some("B".to_string()));
    assert_eq!(queries(&snapshot), vec!["C"]);
    assert_eq!(h.sink.played().len(), 2);
}

#[tokio::test]
async fn filter_change_replays_instead_of_skipping() {
    let h = spawn_player();
    play_all(&h.handle, &["A", "B"]).await;

    h.handle
        .replace_filter(Some(NIGHTCORE.to_string()))
        .await
        .unwrap();

    // The end event of the replaced stream is processed after the filter change finished
    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(
        snapshot.current,
        Some(QueueEntry::new("A", Some(NIGHTCORE.to_string())))
    );
    assert_eq!(queries(&snapshot), vec!["B"]);
    assert_eq!(h.sink.played().len(), 2);
    assert_eq!(
        h.resolver.last_call(),
        Some(("A".to_string(), Some(NIGHTCORE.to_string())))
    );
}

#[tokio::test]
async fn skip_to_is_not_followed_by_a_second_advance() {
    let h = spawn_player();
    play_all(&h.handle, &["X", "A", "B", "C"]).await;

    let outcome = h.handle.skip_to(2).await.unwrap();
    assert_eq!(outcome, SkipToOutcome::Skipped);

    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(current_query(&snapshot), Some("B".to_string()));
    assert_eq!(queries(&snapshot), vec!["C"]);
}

#[tokio::test]
async fn requests_queue_behind_a_slow_resolve() {
    let h = spawn_player();
    play_all(&h.handle, &["A"]).await;
    h.resolver.slow_down(Duration::from_millis(300));

    let handle = h.handle.clone();
    let filter_change =
        tokio::spawn(async move { handle.replace_filter(Some(NIGHTCORE.to_string())).await });
    tokio::time::sleep(Duration::from_millis(30)).await;

    // A read-only request still waits for the replay to finish resolving
    let started = Instant::now();
    let snapshot = h.handle.snapshot().await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(150));
    assert_eq!(
        snapshot.current,
        Some(QueueEntry::new("A", Some(NIGHTCORE.to_string())))
    );

    filter_change.await.unwrap().unwrap();
}

#[tokio::test]
async fn skip_to_errors_are_returned_to_the_caller() {
    let h = spawn_player();
    play_all(&h.handle, &["X", "A"]).await;

    let result = h.handle.skip_to(5).await;

    assert_matches!(result, Err(MusicError::InvalidIndex { index: 5, len: 1 }));
}

#[tokio::test]
async fn stop_resets_and_swallows_the_stop_event() {
    let h = spawn_player();
    play_all(&h.handle, &["A", "B"]).await;
    h.handle.set_loop_queue(true).await.unwrap();

    h.handle.stop().await.unwrap();

    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot, PlaybackSnapshot::default());
    assert_eq!(h.notifier.count(|n| matches!(n, Notice::QueueEmpty)), 0);

    // The player stays usable after a stop
    play_all(&h.handle, &["C"]).await;
    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(current_query(&snapshot), Some("C".to_string()));
}

#[tokio::test]
async fn loop_toggles_and_shuffle_go_through_the_mailbox() {
    let h = spawn_player();
    for item in ["A", "B", "C"] {
        h.handle.enqueue(item, None).await.unwrap();
    }

    h.handle.set_loop_song(true).await.unwrap();
    h.handle.set_loop_queue(true).await.unwrap();
    h.handle.shuffle().await.unwrap();

    let snapshot = h.handle.snapshot().await.unwrap();
    assert!(snapshot.loop_queue);
    assert!(!snapshot.loop_song);
    assert_eq!(snapshot.queue.len(), 3);

    h.handle.clear_queue().await.unwrap();
    assert!(h.handle.snapshot().await.unwrap().queue.is_empty());
}

#[tokio::test]
async fn notice_channel_follows_latest_command() {
    let h = spawn_player();
    assert_eq!(h.notifier.channel(), None);

    h.handle.set_notice_channel(channel_id()).unwrap();
    h.handle.snapshot().await.unwrap();

    assert_eq!(h.notifier.channel(), Some(channel_id()));
}

#[tokio::test]
async fn concurrent_enqueues_are_serialized() {
    let h = spawn_player();

    let tasks: Vec<_> = (0..20)
        .map(|i| {
            let handle = h.handle.clone();
            tokio::spawn(async move { handle.enqueue(format!("song {}", i), None).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let snapshot = h.handle.snapshot().await.unwrap();
    let mut queued = queries(&snapshot);
    queued.sort();
    let mut expected: Vec<String> = (0..20).map(|i| format!("song {}", i)).collect();
    expected.sort();
    assert_eq!(queued, expected);
}

#[tokio::test]
async fn requests_fail_once_the_player_is_gone() {
    let h = spawn_player();

    h.task.abort();
    let _ = h.task.await;

    assert!(h.handle.is_closed());
    assert_matches!(h.handle.snapshot().await, Err(MusicError::PlayerGone));
    assert_matches!(
        h.handle.set_notice_channel(channel_id()),
        Err(MusicError::PlayerGone)
    );
}
