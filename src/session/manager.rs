//! Session manager: the context object owning all live session state
//!
//! `SessionCore` replaces the reference design's global mutable maps with
//! one explicit context passed to every handler, so multiple independent
//! cores can coexist in one process (and in tests). All inbound events and
//! all clock ticks serialize on the single core lock: each handler locks
//! once and runs to completion, which makes every "stop one clock, start
//! the other" pair atomic with respect to everything else.

use crate::config::SessionSettings;
use crate::metrics::MetricsCollector;
use crate::registry::Registry;
use crate::session::clock::ClockEngine;
use crate::transport::events::{ClientEvent, ServerEvent};
use crate::transport::notifier::Notifier;
use crate::types::{ConnId, PlayerNumber, RoomId, TimeSeedPolicy, UserRecord};
use crate::utils::normalize_piece_names;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Draws the seat assigned to a game's initiator; the opponent receives
/// the complement. Injectable so tests can make pairing deterministic.
pub trait SideAssigner: Send + Sync {
    fn draw(&self) -> PlayerNumber;
}

/// Production assigner: uniform coin flip
#[derive(Debug, Default)]
pub struct RandomSideAssigner;

impl SideAssigner for RandomSideAssigner {
    fn draw(&self) -> PlayerNumber {
        if rand::random::<bool>() {
            PlayerNumber::One
        } else {
            PlayerNumber::Two
        }
    }
}

/// Deterministic assigner for tests
#[derive(Debug)]
pub struct FixedSideAssigner(pub PlayerNumber);

impl SideAssigner for FixedSideAssigner {
    fn draw(&self) -> PlayerNumber {
        self.0
    }
}

/// Counters about core operations
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Total users registered
    pub users_registered: u64,
    /// Total challenges issued
    pub challenges_issued: u64,
    /// Total games started
    pub games_started: u64,
    /// Total games ended by resignation, draw or acknowledgment
    pub games_ended: u64,
    /// Total connection losses handled
    pub disconnects: u64,
}

/// Point-in-time view of the core for health reporting
#[derive(Debug, Clone, Serialize)]
pub struct CoreOverview {
    pub connected_users: usize,
    pub users_in_play: usize,
    pub pending_challenges: usize,
    pub active_clocks: usize,
    pub games_started: u64,
    pub games_ended: u64,
    pub disconnects: u64,
}

/// Everything behind the core lock
pub struct CoreState {
    pub(crate) registry: Registry,
    pub(crate) clocks: ClockEngine,
    next_room: u64,
    pub(crate) stats: SessionStats,
}

impl CoreState {
    fn new() -> Self {
        Self {
            registry: Registry::new(),
            clocks: ClockEngine::new(),
            next_room: 1,
            stats: SessionStats::default(),
        }
    }

    /// Fresh room identifier; the embedded counter is monotonically
    /// increasing for the process lifetime, so rooms are never reused
    fn allocate_room(&mut self) -> RoomId {
        let room = format!("room{}", self.next_room);
        self.next_room += 1;
        room
    }
}

/// The session core
pub struct SessionCore {
    pub(crate) state: Mutex<CoreState>,
    notifier: Arc<dyn Notifier>,
    side_assigner: Arc<dyn SideAssigner>,
    pub(crate) settings: SessionSettings,
    pub(crate) metrics: Arc<MetricsCollector>,
}

impl SessionCore {
    /// Create a new session core with production defaults
    pub fn new(settings: SessionSettings, notifier: Arc<dyn Notifier>) -> Self {
        let metrics = Arc::new(MetricsCollector::new().unwrap_or_else(|_| {
            warn!("Failed to create metrics collector, using default");
            MetricsCollector::default()
        }));

        Self::with_parts(settings, notifier, Arc::new(RandomSideAssigner), metrics)
    }

    /// Create with explicit side assigner and metrics collector
    pub fn with_parts(
        settings: SessionSettings,
        notifier: Arc<dyn Notifier>,
        side_assigner: Arc<dyn SideAssigner>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            state: Mutex::new(CoreState::new()),
            notifier,
            side_assigner,
            settings,
            metrics,
        }
    }

    /// Route one inbound event to its handler
    pub async fn dispatch(self: &Arc<Self>, conn: &ConnId, event: ClientEvent) {
        debug!("Dispatching {} from {}", event.name(), conn);
        self.metrics.record_event(event.name());

        match event {
            ClientEvent::Register {
                username,
                army,
                pieces,
                preferred_time_ms,
            } => {
                self.register(conn, username, army, pieces, preferred_time_ms)
                    .await
            }
            ClientEvent::UpdateName { username } => self.update_name(conn, username).await,
            ClientEvent::IssueChallenge { to } => self.issue_challenge(conn, &to).await,
            ClientEvent::CancelChallenge { to } => self.cancel_challenge(conn, &to).await,
            ClientEvent::DeclineChallenge { to } => self.decline_challenge(conn, &to).await,
            ClientEvent::StartGame { opponent } => self.initiate_start_game(conn, &opponent).await,
            ClientEvent::Move { from, to } => {
                self.relay_timed(conn, ServerEvent::Move { from, to }).await
            }
            ClientEvent::Castling {
                rook_from,
                rook_to,
                king_from,
                king_to,
            } => {
                self.relay_timed(
                    conn,
                    ServerEvent::Castling {
                        rook_from,
                        rook_to,
                        king_from,
                        king_to,
                    },
                )
                .await
            }
            ClientEvent::EnPassant { from, to, captured } => {
                self.relay_timed(conn, ServerEvent::EnPassant { from, to, captured })
                    .await
            }
            ClientEvent::Promotion { from, to, piece } => {
                self.relay_timed(conn, ServerEvent::Promotion { from, to, piece })
                    .await
            }
            ClientEvent::TurnChange => self.relay_plain(conn, ServerEvent::TurnChange).await,
            ClientEvent::MoveLog { piece, from, to } => {
                self.relay_plain(conn, ServerEvent::MoveLog { piece, from, to })
                    .await
            }
            ClientEvent::DrawOffer => self.relay_plain(conn, ServerEvent::DrawOffer).await,
            ClientEvent::Resign { result } => {
                self.end_game(conn, Some(ServerEvent::Resign { result }), "resign")
                    .await
            }
            ClientEvent::DrawOfferAccepted => {
                self.end_game(conn, Some(ServerEvent::DrawOfferAccepted), "draw")
                    .await
            }
            ClientEvent::GameEnded => self.end_game(conn, None, "acknowledged").await,
            ClientEvent::LeaveGame => self.leave_game(conn).await,
            ClientEvent::LeaveLobby => self.leave_lobby(conn).await,
        }
    }

    /// Register a new lobby member and acknowledge it to the connection
    pub async fn register(
        &self,
        conn: &ConnId,
        username: String,
        army: String,
        pieces: Vec<String>,
        preferred_time_ms: u64,
    ) {
        let preferred_time_ms = self.clamp_preferred_time(preferred_time_ms);

        let mut state = self.state.lock().await;
        state.registry.register(
            conn.clone(),
            username.clone(),
            army,
            pieces,
            preferred_time_ms,
        );
        state.stats.users_registered += 1;

        info!(
            "Registered '{}' on connection {} with preferred time {}ms",
            username, conn, preferred_time_ms
        );

        self.send_to(
            conn,
            ServerEvent::Registered {
                id: conn.clone(),
                username,
                preferred_time_ms,
            },
        )
        .await;
        self.broadcast_lobby(&state).await;
    }

    /// Mutate a user's display name in place
    pub async fn update_name(&self, conn: &ConnId, username: String) {
        let mut state = self.state.lock().await;
        if state.registry.update_name(conn, username.clone()) {
            debug!("Connection {} renamed to '{}'", conn, username);
            self.broadcast_lobby(&state).await;
        } else {
            warn!("Name update for unknown connection {}", conn);
        }
    }

    /// Start a game between the initiator and its chosen opponent.
    ///
    /// This is also how a challenge is accepted: the recipient initiates a
    /// start referencing the challenger's connection id. The whole
    /// sequence runs under one hold of the core lock, so no partial game
    /// setup is ever observable from another handler.
    pub async fn initiate_start_game(self: &Arc<Self>, initiator: &ConnId, opponent: &ConnId) {
        let mut state = self.state.lock().await;
        let state = &mut *state;

        if initiator == opponent {
            debug!("Ignoring self-targeted game start from {}", initiator);
            return;
        }
        let (initiator_pref, initiator_name, initiator_pieces) =
            match state.registry.get(initiator) {
                Some(user) if !user.in_play => (
                    user.preferred_time_ms,
                    user.username.clone(),
                    normalize_piece_names(&user.pieces),
                ),
                Some(_) => {
                    warn!("Ignoring game start from {} while already in play", initiator);
                    return;
                }
                None => {
                    warn!("Ignoring game start from unknown connection {}", initiator);
                    return;
                }
            };
        let (opponent_pref, opponent_name, opponent_pieces) = match state.registry.get(opponent) {
            Some(user) if !user.in_play => (
                user.preferred_time_ms,
                user.username.clone(),
                normalize_piece_names(&user.pieces),
            ),
            Some(_) => {
                warn!(
                    "Ignoring game start from {} against busy opponent {}",
                    initiator, opponent
                );
                return;
            }
            None => {
                warn!(
                    "Ignoring game start from {} against unknown opponent {}",
                    initiator, opponent
                );
                return;
            }
        };

        let room = state.allocate_room();
        self.join_room(&room, initiator).await;
        self.join_room(&room, opponent).await;

        // Consume the accepted challenge and drop any residual edges
        Self::clear_challenge_edges(state, initiator);
        Self::clear_challenge_edges(state, opponent);

        let initiator_number = self.side_assigner.draw();
        let opponent_number = initiator_number.opposite();

        let start_time_ms = match self.settings.time_seed_policy {
            TimeSeedPolicy::Initiator => initiator_pref,
            TimeSeedPolicy::Shorter => initiator_pref.min(opponent_pref),
        };

        if let Some(user) = state.registry.get_mut(initiator) {
            user.time_ms = Some(start_time_ms);
            user.current_room = Some(room.clone());
            user.opponent_id = Some(opponent.clone());
            user.player_number = Some(initiator_number);
            user.in_play = true;
            user.game_ended = false;
        }
        if let Some(user) = state.registry.get_mut(opponent) {
            user.time_ms = Some(start_time_ms);
            user.current_room = Some(room.clone());
            user.opponent_id = Some(initiator.clone());
            user.player_number = Some(opponent_number);
            user.in_play = true;
            user.game_ended = false;
        }

        info!(
            "Game starting in {} - '{}' ({}) vs '{}' ({}), {}ms each ({} policy)",
            room,
            initiator_name,
            initiator_number,
            opponent_name,
            opponent_number,
            start_time_ms,
            self.settings.time_seed_policy
        );

        // Each side receives its own seat and the pieces it is about to face
        self.send_to(
            initiator,
            ServerEvent::GameStart {
                player_number: initiator_number,
                opponent_pieces,
                opponent_name,
            },
        )
        .await;
        self.send_to(
            opponent,
            ServerEvent::GameStart {
                player_number: opponent_number,
                opponent_pieces: initiator_pieces,
                opponent_name: initiator_name,
            },
        )
        .await;

        let formatted = crate::utils::format_clock(start_time_ms);
        self.send_to(
            initiator,
            ServerEvent::StartingTime {
                formatted: formatted.clone(),
            },
        )
        .await;
        self.send_to(opponent, ServerEvent::StartingTime { formatted }).await;

        state.stats.games_started += 1;
        self.metrics.record_game_started();

        self.broadcast_lobby(state).await;

        let first_mover = if initiator_number == PlayerNumber::One {
            initiator.clone()
        } else {
            opponent.clone()
        };
        self.start_clock(state, &first_mover);
    }

    /// Explicitly leave an in-progress (or finished) game and return to
    /// the lobby
    pub async fn leave_game(&self, conn: &ConnId) {
        let mut state = self.state.lock().await;
        let state = &mut *state;

        let Some(user) = state.registry.get(conn) else {
            warn!("Game leave from unknown connection {}", conn);
            return;
        };
        let Some(room) = user.current_room.clone() else {
            warn!("Game leave from {} outside a room", conn);
            return;
        };
        let opponent = user.opponent_id.clone();

        // Defaults to true when the opponent record is already gone
        let game_ended = opponent
            .as_deref()
            .and_then(|opp| state.registry.get(opp))
            .map(|opp| opp.game_ended)
            .unwrap_or(true);

        self.send_to_room(&room, Some(conn), ServerEvent::OpponentLeft { game_ended })
            .await;

        self.stop_clock(state, conn);
        if let Some(opp) = opponent.as_deref() {
            self.stop_clock(state, opp);
        }

        self.leave_room(&room, conn).await;

        if let Some(user) = state.registry.get_mut(conn) {
            user.reset_to_idle();
        }
        if let Some(opp) = opponent.as_deref() {
            if let Some(record) = state.registry.get_mut(opp) {
                record.opponent_id = None;
            }
        }

        info!("Connection {} left {}", conn, room);
        self.broadcast_lobby(state).await;
    }

    /// Handle a lost connection: tear down any game and challenge state,
    /// then delete the record entirely
    pub async fn disconnect(&self, conn: &ConnId) {
        let mut state = self.state.lock().await;
        let state = &mut *state;

        let Some(user) = state.registry.get(conn).cloned() else {
            debug!("Disconnect for unregistered connection {}", conn);
            return;
        };

        if let Some(room) = &user.current_room {
            let game_ended = user
                .opponent_id
                .as_deref()
                .and_then(|opp| state.registry.get(opp))
                .map(|opp| opp.game_ended)
                .unwrap_or(true);
            self.send_to_room(room, Some(conn), ServerEvent::OpponentLeft { game_ended })
                .await;

            if let Some(opp) = user.opponent_id.as_deref() {
                if let Some(record) = state.registry.get_mut(opp) {
                    record.opponent_id = None;
                }
                self.stop_clock(state, opp);
            }
            self.leave_room(room, conn).await;
        }

        // Tear down any pending challenge unilaterally
        if let Some(target) = user.challenge_to.as_deref() {
            if let Some(record) = state.registry.get_mut(target) {
                if record.challenge_from.as_deref() == Some(conn) {
                    record.challenge_from = None;
                }
            }
            self.send_to(
                &target.to_string(),
                ServerEvent::ChallengeDeclined { by: conn.clone() },
            )
            .await;
        }
        if let Some(source) = user.challenge_from.as_deref() {
            if let Some(record) = state.registry.get_mut(source) {
                if record.challenge_to.as_deref() == Some(conn) {
                    record.challenge_to = None;
                }
            }
            self.send_to(
                &source.to_string(),
                ServerEvent::ChallengeCancelled { by: conn.clone() },
            )
            .await;
        }

        self.stop_clock(state, conn);
        state.registry.remove(conn);
        state.stats.disconnects += 1;
        self.metrics.record_disconnect();

        info!("Connection {} ('{}') disconnected", conn, user.username);
        self.broadcast_lobby(state).await;
    }

    /// An idle user leaving the lobby without ever entering a game
    pub async fn leave_lobby(&self, conn: &ConnId) {
        let mut state = self.state.lock().await;

        match state.registry.remove(conn) {
            Some(record) => {
                if !record.is_idle() {
                    warn!(
                        "Lobby leave from {} with session state still attached",
                        conn
                    );
                }
                info!("Connection {} ('{}') left the lobby", conn, record.username);
                self.broadcast_lobby(&state).await;
            }
            None => debug!("Lobby leave from unknown connection {}", conn),
        }
    }

    /// Cancel all clocks; called on service shutdown
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        state.clocks.cancel_all();
        self.metrics.set_active_clocks(0);
        info!("Session core shut down, all clocks cancelled");
    }

    // Accessors used by health reporting and tests

    /// Clone of a user's registry record
    pub async fn user(&self, conn: &str) -> Option<UserRecord> {
        self.state.lock().await.registry.get(conn).cloned()
    }

    /// Full lobby snapshot in registration order
    pub async fn lobby_snapshot(&self) -> Vec<UserRecord> {
        self.state.lock().await.registry.snapshot()
    }

    /// Whether a countdown task is currently installed for a connection
    pub async fn clock_running(&self, conn: &str) -> bool {
        self.state.lock().await.clocks.is_running(conn)
    }

    /// Current operation counters
    pub async fn stats(&self) -> SessionStats {
        self.state.lock().await.stats.clone()
    }

    /// Point-in-time view for health reporting
    pub async fn overview(&self) -> CoreOverview {
        let state = self.state.lock().await;
        let snapshot = state.registry.snapshot();
        CoreOverview {
            connected_users: snapshot.len(),
            users_in_play: snapshot.iter().filter(|u| u.in_play).count(),
            pending_challenges: snapshot.iter().filter(|u| u.challenge_to.is_some()).count(),
            active_clocks: state.clocks.active_count(),
            games_started: state.stats.games_started,
            games_ended: state.stats.games_ended,
            disconnects: state.stats.disconnects,
        }
    }

    // Internal helpers shared by the handler impls

    /// Clear this user's challenge fields plus the matching reverse edges
    /// on any peers, so no dangling half-edges survive
    pub(crate) fn clear_challenge_edges(state: &mut CoreState, conn: &str) {
        let (outgoing, incoming) = match state.registry.get(conn) {
            Some(user) => (user.challenge_to.clone(), user.challenge_from.clone()),
            None => return,
        };

        if let Some(target) = outgoing.as_deref() {
            if let Some(record) = state.registry.get_mut(target) {
                if record.challenge_from.as_deref() == Some(conn) {
                    record.challenge_from = None;
                }
            }
        }
        if let Some(source) = incoming.as_deref() {
            if let Some(record) = state.registry.get_mut(source) {
                if record.challenge_to.as_deref() == Some(conn) {
                    record.challenge_to = None;
                }
            }
        }
        if let Some(user) = state.registry.get_mut(conn) {
            user.challenge_to = None;
            user.challenge_from = None;
        }
    }

    fn clamp_preferred_time(&self, preferred_time_ms: u64) -> u64 {
        let clamped = preferred_time_ms.clamp(
            self.settings.min_preferred_time_ms,
            self.settings.max_preferred_time_ms,
        );
        // Align to the tick resolution so the countdown lands on exactly 0
        let aligned = clamped - clamped % self.settings.clock_tick_ms;
        let aligned = aligned.max(self.settings.clock_tick_ms);
        if aligned != preferred_time_ms {
            debug!(
                "Adjusted preferred time {}ms to {}ms",
                preferred_time_ms, aligned
            );
        }
        aligned
    }

    pub(crate) async fn send_to(&self, conn: &ConnId, event: ServerEvent) {
        if let Err(e) = self.notifier.send_to(conn, event).await {
            warn!("Failed to deliver event to {}: {}", conn, e);
        }
    }

    pub(crate) async fn send_to_room(
        &self,
        room: &RoomId,
        except: Option<&ConnId>,
        event: ServerEvent,
    ) {
        if let Err(e) = self.notifier.send_to_room(room, except, event).await {
            warn!("Failed to deliver event to room {}: {}", room, e);
        }
    }

    async fn join_room(&self, room: &RoomId, conn: &ConnId) {
        if let Err(e) = self.notifier.join_room(room, conn).await {
            warn!("Failed to join {} to room {}: {}", conn, room, e);
        }
    }

    async fn leave_room(&self, room: &RoomId, conn: &ConnId) {
        if let Err(e) = self.notifier.leave_room(room, conn).await {
            warn!("Failed to remove {} from room {}: {}", conn, room, e);
        }
    }

    /// Rebroadcast the full registry snapshot to every connection
    pub(crate) async fn broadcast_lobby(&self, state: &CoreState) {
        let users = state.registry.snapshot();
        self.metrics.set_connected_users(users.len());
        if let Err(e) = self.notifier.broadcast(ServerEvent::LobbyUpdate { users }).await {
            warn!("Failed to broadcast lobby snapshot: {}", e);
        }
    }
}
