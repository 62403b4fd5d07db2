//! Deterministic countdown tests for the clock engine
//!
//! These run on tokio's paused clock, so ticks fire instantly and in
//! order while remaining fully deterministic.

use std::sync::Arc;
use std::time::Duration;
use tempo_hall::config::SessionSettings;
use tempo_hall::metrics::MetricsCollector;
use tempo_hall::session::manager::{FixedSideAssigner, SessionCore};
use tempo_hall::transport::events::{ClientEvent, ServerEvent};
use tempo_hall::transport::notifier::{Delivery, RecordingNotifier};
use tempo_hall::types::PlayerNumber;

fn create_test_system(settings: SessionSettings) -> (Arc<SessionCore>, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::new());
    let core = Arc::new(SessionCore::with_parts(
        settings,
        notifier.clone(),
        Arc::new(FixedSideAssigner(PlayerNumber::One)),
        Arc::new(MetricsCollector::default()),
    ));
    (core, notifier)
}

/// Settings that allow very short games for expiry tests
fn short_game_settings() -> SessionSettings {
    SessionSettings {
        min_preferred_time_ms: 1_000,
        ..SessionSettings::default()
    }
}

async fn start_game(core: &Arc<SessionCore>, time_ms: u64) {
    for (conn, name) in [("conn-a", "alice"), ("conn-b", "bob")] {
        core.dispatch(
            &conn.to_string(),
            ClientEvent::Register {
                username: name.to_string(),
                army: "kingdom".to_string(),
                pieces: vec![],
                preferred_time_ms: time_ms,
            },
        )
        .await;
    }
    core.dispatch(
        &"conn-a".to_string(),
        ClientEvent::StartGame {
            opponent: "conn-b".to_string(),
        },
    )
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_countdown_decrements_per_tick() {
    let (core, _notifier) = create_test_system(SessionSettings::default());
    start_game(&core, 300_000).await;

    // Five ticks at 100ms resolution
    tokio::time::sleep(Duration::from_millis(550)).await;
    assert_eq!(core.user("conn-a").await.unwrap().time_ms, Some(299_500));

    // The idle side has not moved
    assert_eq!(core.user("conn-b").await.unwrap().time_ms, Some(300_000));

    core.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_whole_second_boundaries_notify_the_room() {
    let (core, notifier) = create_test_system(SessionSettings::default());
    start_game(&core, 300_000).await;
    notifier.clear();

    tokio::time::sleep(Duration::from_millis(1_050)).await;

    let updates = notifier.events_named("clock_time");
    assert_eq!(updates.len(), 1, "only whole seconds are published");
    assert_eq!(
        updates[0].event,
        ServerEvent::ClockTime {
            formatted: "4:59".to_string(),
            conn: "conn-a".to_string(),
        }
    );
    // Time updates go to the whole room, sender included
    assert_eq!(
        updates[0].delivery,
        Delivery::Room {
            room: "room1".to_string(),
            except: None,
        }
    );

    core.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_move_freezes_mover_and_runs_opponent() {
    let (core, _notifier) = create_test_system(SessionSettings::default());
    start_game(&core, 300_000).await;

    tokio::time::sleep(Duration::from_millis(550)).await;
    core.dispatch(
        &"conn-a".to_string(),
        ClientEvent::Move {
            from: "e2".to_string(),
            to: "e4".to_string(),
        },
    )
    .await;

    tokio::time::sleep(Duration::from_millis(1_020)).await;

    // The mover's clock froze at the handover point
    assert_eq!(core.user("conn-a").await.unwrap().time_ms, Some(299_500));
    // The opponent's clock has been ticking since
    assert_eq!(core.user("conn-b").await.unwrap().time_ms, Some(299_000));

    core.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_expiry_stops_clock_without_ending_game() {
    let (core, notifier) = create_test_system(short_game_settings());
    start_game(&core, 2_000).await;
    notifier.clear();

    tokio::time::sleep(Duration::from_millis(2_050)).await;

    // Countdown reached exactly zero and the timer removed itself
    let alice = core.user("conn-a").await.unwrap();
    assert_eq!(alice.time_ms, Some(0));
    assert!(!core.clock_running("conn-a").await);

    // One whole-second update at 0:01, one at 0:00, one expiry
    let updates = notifier.events_named("clock_time");
    assert_eq!(updates.len(), 2);
    assert_eq!(
        updates[0].event,
        ServerEvent::ClockTime {
            formatted: "0:01".to_string(),
            conn: "conn-a".to_string(),
        }
    );
    assert_eq!(
        updates[1].event,
        ServerEvent::ClockTime {
            formatted: "0:00".to_string(),
            conn: "conn-a".to_string(),
        }
    );
    assert_eq!(notifier.count_named("clock_expired"), 1);

    // Expiry is a notification, not a termination: the game is still on
    assert!(alice.in_play);
    assert!(!alice.game_ended);

    // No further ticks ever fire for that connection
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(core.user("conn-a").await.unwrap().time_ms, Some(0));
    assert_eq!(notifier.count_named("clock_expired"), 1);

    core.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_leave_game_halts_running_countdown() {
    let (core, _notifier) = create_test_system(SessionSettings::default());
    start_game(&core, 300_000).await;

    tokio::time::sleep(Duration::from_millis(250)).await;
    core.dispatch(&"conn-b".to_string(), ClientEvent::LeaveGame).await;

    // Stopping the absent clock of conn-b was a no-op; Alice's stopped too
    assert!(!core.clock_running("conn-a").await);
    assert!(!core.clock_running("conn-b").await);

    let frozen = core.user("conn-a").await.unwrap().time_ms;
    tokio::time::sleep(Duration::from_millis(1_000)).await;
    assert_eq!(core.user("conn-a").await.unwrap().time_ms, frozen);
}

#[tokio::test(start_paused = true)]
async fn test_consecutive_games_reuse_no_clock_state() {
    let (core, notifier) = create_test_system(short_game_settings());
    start_game(&core, 2_000).await;

    // Run the first game's clock dry
    tokio::time::sleep(Duration::from_millis(2_050)).await;
    core.dispatch(&"conn-a".to_string(), ClientEvent::GameEnded).await;
    core.dispatch(&"conn-a".to_string(), ClientEvent::LeaveGame).await;
    core.dispatch(&"conn-b".to_string(), ClientEvent::LeaveGame).await;
    notifier.clear();

    // A fresh game starts with a fresh room and a fresh countdown
    core.dispatch(
        &"conn-b".to_string(),
        ClientEvent::StartGame {
            opponent: "conn-a".to_string(),
        },
    )
    .await;

    let bob = core.user("conn-b").await.unwrap();
    assert_eq!(bob.current_room.as_deref(), Some("room2"));
    assert_eq!(bob.time_ms, Some(2_000));
    assert!(core.clock_running("conn-b").await);
    assert!(!core.clock_running("conn-a").await);

    tokio::time::sleep(Duration::from_millis(1_050)).await;
    assert_eq!(core.user("conn-b").await.unwrap().time_ms, Some(1_000));

    core.shutdown().await;
}
