//! In-game event relay between paired opponents
//!
//! Gameplay payloads are opaque to the core: they are forwarded verbatim
//! to the other side of the sender's room, never echoed to the sender.
//! Move-like actions additionally hand the running clock over to the
//! opponent as one atomic step; game-ending actions stop both clocks and
//! mark both records finished.

use crate::session::manager::SessionCore;
use crate::transport::events::ServerEvent;
use crate::types::ConnId;
use std::sync::Arc;
use tracing::{debug, info, warn};

impl SessionCore {
    /// Relay a move-like action: stop the sender's clock, forward the
    /// payload to the opponent, start the opponent's clock. The whole
    /// exchange happens under one hold of the core lock, so both clocks
    /// can never run simultaneously for one room.
    pub(crate) async fn relay_timed(self: &Arc<Self>, conn: &ConnId, event: ServerEvent) {
        let mut state = self.state.lock().await;
        let state = &mut *state;

        let Some(user) = state.registry.get(conn) else {
            warn!("Relay {} from unknown connection {}", event.name(), conn);
            return;
        };
        let (Some(room), Some(opponent)) = (user.current_room.clone(), user.opponent_id.clone())
        else {
            warn!("Relay {} from {} outside an active game", event.name(), conn);
            return;
        };

        debug!("Relaying {} from {} in {}", event.name(), conn, room);

        self.stop_clock(state, conn);
        self.send_to_room(&room, Some(conn), event).await;

        if state.registry.contains(&opponent) {
            self.start_clock(state, &opponent);
        } else {
            // Opponent vanished between the move and its relay
            warn!(
                "Opponent {} of {} is gone, leaving both clocks stopped",
                opponent, conn
            );
        }
    }

    /// Relay an action that does not touch the clocks (turn change,
    /// move-log append, draw offer)
    pub(crate) async fn relay_plain(&self, conn: &ConnId, event: ServerEvent) {
        let state = self.state.lock().await;

        let Some(user) = state.registry.get(conn) else {
            warn!("Relay {} from unknown connection {}", event.name(), conn);
            return;
        };
        let Some(room) = user.current_room.clone() else {
            warn!("Relay {} from {} outside an active game", event.name(), conn);
            return;
        };

        debug!("Relaying {} from {} in {}", event.name(), conn, room);
        self.send_to_room(&room, Some(conn), event).await;
    }

    /// A game-ending action: optionally forward a final payload, then mark
    /// both records finished and stop both clocks
    pub(crate) async fn end_game(&self, conn: &ConnId, forward: Option<ServerEvent>, reason: &str) {
        let mut state = self.state.lock().await;
        let state = &mut *state;

        let Some(user) = state.registry.get(conn) else {
            warn!("Game end ({}) from unknown connection {}", reason, conn);
            return;
        };
        let Some(room) = user.current_room.clone() else {
            warn!("Game end ({}) from {} outside a room", reason, conn);
            return;
        };
        let opponent = user.opponent_id.clone();

        if let Some(event) = forward {
            self.send_to_room(&room, Some(conn), event).await;
        }

        if let Some(record) = state.registry.get_mut(conn) {
            record.game_ended = true;
        }
        match opponent.as_deref() {
            Some(opp) => {
                if let Some(record) = state.registry.get_mut(opp) {
                    record.game_ended = true;
                } else {
                    warn!("Opponent of {} already gone at game end", conn);
                }
                self.stop_clock(state, opp);
            }
            None => warn!("Game end ({}) from {} with no opponent on record", reason, conn),
        }
        self.stop_clock(state, conn);

        state.stats.games_ended += 1;
        self.metrics.record_game_ended(reason);
        info!("Game in {} ended ({})", room, reason);
    }
}
