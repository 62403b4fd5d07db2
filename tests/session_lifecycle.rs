//! Complete session lifecycle integration tests
//!
//! These tests validate the entire flow from registration through
//! challenge negotiation, game start, in-game relay, and teardown on
//! leave or disconnect.

use std::sync::Arc;
use tempo_hall::config::SessionSettings;
use tempo_hall::metrics::MetricsCollector;
use tempo_hall::session::manager::{FixedSideAssigner, SessionCore};
use tempo_hall::transport::events::{ClientEvent, ServerEvent};
use tempo_hall::transport::notifier::RecordingNotifier;
use tempo_hall::types::PlayerNumber;

/// Integration test setup that creates a complete core with a
/// deterministic side assigner (the initiator always draws seat one)
fn create_test_system() -> (Arc<SessionCore>, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::new());
    let core = Arc::new(SessionCore::with_parts(
        SessionSettings::default(),
        notifier.clone(),
        Arc::new(FixedSideAssigner(PlayerNumber::One)),
        Arc::new(MetricsCollector::default()),
    ));
    (core, notifier)
}

async fn register(
    core: &Arc<SessionCore>,
    conn: &str,
    name: &str,
    pieces: &[&str],
    time_ms: u64,
) {
    core.dispatch(
        &conn.to_string(),
        ClientEvent::Register {
            username: name.to_string(),
            army: "kingdom".to_string(),
            pieces: pieces.iter().map(|p| p.to_string()).collect(),
            preferred_time_ms: time_ms,
        },
    )
    .await;
}

#[tokio::test]
async fn test_complete_challenge_to_game_workflow() {
    let (core, notifier) = create_test_system();

    // Step 1: Alice and Bob enter the lobby
    register(&core, "conn-a", "Alice", &["Royal Guard", "Pawn"], 300_000).await;
    register(&core, "conn-b", "Bob", &["Dark Knight"], 180_000).await;

    // Both registrations were acknowledged and the lobby rebroadcast
    assert_eq!(notifier.count_named("registered"), 2);
    assert!(notifier.count_named("lobby_update") >= 2);

    // Step 2: Alice challenges Bob
    core.dispatch(
        &"conn-a".to_string(),
        ClientEvent::IssueChallenge {
            to: "conn-b".to_string(),
        },
    )
    .await;

    let bob = core.user("conn-b").await.unwrap();
    assert_eq!(bob.challenge_from.as_deref(), Some("conn-a"));
    assert_eq!(
        core.user("conn-a").await.unwrap().challenge_to.as_deref(),
        Some("conn-b")
    );

    // Step 3: Alice initiates the game with Bob as target
    core.dispatch(
        &"conn-a".to_string(),
        ClientEvent::StartGame {
            opponent: "conn-b".to_string(),
        },
    )
    .await;

    let alice = core.user("conn-a").await.unwrap();
    let bob = core.user("conn-b").await.unwrap();

    // A room exists and both sides are in play
    let room = alice.current_room.clone().unwrap();
    assert_eq!(bob.current_room.as_deref(), Some(room.as_str()));
    assert!(alice.in_play && bob.in_play);

    // Both clocks seeded from the initiator's preferred 300000
    assert_eq!(alice.time_ms, Some(300_000));
    assert_eq!(bob.time_ms, Some(300_000));

    // Opponent links are symmetric
    assert_eq!(alice.opponent_id.as_deref(), Some("conn-b"));
    assert_eq!(bob.opponent_id.as_deref(), Some("conn-a"));

    // Exactly one of them holds seat one, and that side's clock runs
    assert_eq!(alice.player_number, Some(PlayerNumber::One));
    assert_eq!(bob.player_number, Some(PlayerNumber::Two));
    assert!(core.clock_running("conn-a").await);
    assert!(!core.clock_running("conn-b").await);

    // The rebroadcast snapshot shows both in the room with cleared
    // challenge fields
    let snapshot = notifier.last_lobby_snapshot().unwrap();
    assert_eq!(snapshot.len(), 2);
    for user in snapshot {
        assert!(user.current_room.is_some());
        assert!(user.challenge_to.is_none());
        assert!(user.challenge_from.is_none());
    }

    // Step 4: both sides joined the room channel
    let joins: Vec<_> = notifier
        .membership_changes()
        .into_iter()
        .filter(|(_, _, joined)| *joined)
        .collect();
    assert_eq!(joins.len(), 2);

    core.shutdown().await;
}

#[tokio::test]
async fn test_decline_leaves_both_idle() {
    let (core, notifier) = create_test_system();
    register(&core, "conn-a", "Alice", &[], 300_000).await;
    register(&core, "conn-b", "Bob", &[], 300_000).await;

    core.dispatch(
        &"conn-a".to_string(),
        ClientEvent::IssueChallenge {
            to: "conn-b".to_string(),
        },
    )
    .await;
    core.dispatch(
        &"conn-b".to_string(),
        ClientEvent::DeclineChallenge {
            to: "conn-a".to_string(),
        },
    )
    .await;

    let alice = core.user("conn-a").await.unwrap();
    let bob = core.user("conn-b").await.unwrap();
    assert!(alice.is_idle() && bob.is_idle());
    assert_eq!(notifier.count_named("challenge_declined"), 1);
}

#[tokio::test]
async fn test_full_game_relay_sequence() {
    let (core, notifier) = create_test_system();
    register(&core, "conn-a", "Alice", &[], 300_000).await;
    register(&core, "conn-b", "Bob", &[], 300_000).await;
    core.dispatch(
        &"conn-a".to_string(),
        ClientEvent::StartGame {
            opponent: "conn-b".to_string(),
        },
    )
    .await;
    notifier.clear();

    // Alice moves, Bob answers; the clock alternates every time
    core.dispatch(
        &"conn-a".to_string(),
        ClientEvent::Move {
            from: "e2".to_string(),
            to: "e4".to_string(),
        },
    )
    .await;
    assert!(!core.clock_running("conn-a").await);
    assert!(core.clock_running("conn-b").await);

    core.dispatch(&"conn-a".to_string(), ClientEvent::TurnChange).await;
    core.dispatch(
        &"conn-b".to_string(),
        ClientEvent::Move {
            from: "e7".to_string(),
            to: "e5".to_string(),
        },
    )
    .await;
    assert!(core.clock_running("conn-a").await);
    assert!(!core.clock_running("conn-b").await);

    // Bob resigns; the result reaches Alice and both records finish
    core.dispatch(
        &"conn-b".to_string(),
        ClientEvent::Resign {
            result: "1-0".to_string(),
        },
    )
    .await;

    assert_eq!(notifier.count_named("move"), 2);
    assert_eq!(notifier.count_named("turn_change"), 1);
    assert_eq!(notifier.count_named("resign"), 1);
    assert!(core.user("conn-a").await.unwrap().game_ended);
    assert!(core.user("conn-b").await.unwrap().game_ended);
    assert!(!core.clock_running("conn-a").await);
    assert!(!core.clock_running("conn-b").await);

    // Both return to the lobby
    core.dispatch(&"conn-a".to_string(), ClientEvent::LeaveGame).await;
    core.dispatch(&"conn-b".to_string(), ClientEvent::LeaveGame).await;

    let alice = core.user("conn-a").await.unwrap();
    let bob = core.user("conn-b").await.unwrap();
    assert!(!alice.in_play && alice.current_room.is_none());
    assert!(!bob.in_play && bob.current_room.is_none());

    // The first leaver saw a finished game
    let left = notifier.events_named("opponent_left");
    assert_eq!(left[0].event, ServerEvent::OpponentLeft { game_ended: true });
}

#[tokio::test]
async fn test_disconnect_mid_game_cleanup() {
    let (core, notifier) = create_test_system();
    register(&core, "conn-a", "Alice", &[], 300_000).await;
    register(&core, "conn-b", "Bob", &[], 300_000).await;
    core.dispatch(
        &"conn-a".to_string(),
        ClientEvent::StartGame {
            opponent: "conn-b".to_string(),
        },
    )
    .await;

    // Alice (whose clock is running) vanishes mid-game
    core.disconnect(&"conn-a".to_string()).await;

    // Her record is fully removed from the snapshot
    let snapshot = notifier.last_lobby_snapshot().unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].username, "Bob");

    // Bob's cross-reference is cleared and his clock is stopped
    let bob = core.user("conn-b").await.unwrap();
    assert!(bob.opponent_id.is_none());
    assert!(!core.clock_running("conn-a").await);
    assert!(!core.clock_running("conn-b").await);

    // Bob can leave the dead game and play again
    core.dispatch(&"conn-b".to_string(), ClientEvent::LeaveGame).await;
    let bob = core.user("conn-b").await.unwrap();
    assert!(!bob.in_play && bob.current_room.is_none());

    register(&core, "conn-c", "Carol", &[], 60_000).await;
    core.dispatch(
        &"conn-c".to_string(),
        ClientEvent::StartGame {
            opponent: "conn-b".to_string(),
        },
    )
    .await;
    assert!(core.user("conn-b").await.unwrap().in_play);

    // Rooms are never reused: the second game gets a fresh identifier
    let first_room = notifier.membership_changes()[0].0.clone();
    let second_room = core.user("conn-c").await.unwrap().current_room.unwrap();
    assert_ne!(first_room, second_room);

    core.shutdown().await;
}

#[tokio::test]
async fn test_disconnect_of_idle_user_only_updates_lobby() {
    let (core, notifier) = create_test_system();
    register(&core, "conn-a", "Alice", &[], 300_000).await;
    register(&core, "conn-b", "Bob", &[], 300_000).await;
    notifier.clear();

    core.disconnect(&"conn-b".to_string()).await;

    assert!(core.user("conn-b").await.is_none());
    assert_eq!(notifier.count_named("opponent_left"), 0);
    assert_eq!(notifier.count_named("challenge_cancelled"), 0);
    assert_eq!(notifier.count_named("challenge_declined"), 0);
    let snapshot = notifier.last_lobby_snapshot().unwrap();
    assert_eq!(snapshot.len(), 1);
}

#[tokio::test]
async fn test_rename_reaches_the_lobby() {
    let (core, notifier) = create_test_system();
    register(&core, "conn-a", "Alice", &[], 300_000).await;

    core.dispatch(
        &"conn-a".to_string(),
        ClientEvent::UpdateName {
            username: "Queen Alice".to_string(),
        },
    )
    .await;

    let snapshot = notifier.last_lobby_snapshot().unwrap();
    assert_eq!(snapshot[0].username, "Queen Alice");
}

#[tokio::test]
async fn test_leave_lobby_removes_user() {
    let (core, notifier) = create_test_system();
    register(&core, "conn-a", "Alice", &[], 300_000).await;
    register(&core, "conn-b", "Bob", &[], 300_000).await;

    core.dispatch(&"conn-a".to_string(), ClientEvent::LeaveLobby).await;

    assert!(core.user("conn-a").await.is_none());
    let snapshot = notifier.last_lobby_snapshot().unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].username, "Bob");
}
