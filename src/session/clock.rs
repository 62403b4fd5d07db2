//! Per-player countdown clocks
//!
//! Each active clock is an independent tokio task ticking at the configured
//! resolution. Every tick locks the core state before touching the user's
//! remaining time, so ticks serialize with all other handlers; cancelling a
//! clock while holding that lock guarantees no further tick for that
//! connection can observe or mutate state.

use crate::session::manager::{CoreState, SessionCore};
use crate::transport::events::ServerEvent;
use crate::types::ConnId;
use crate::utils::format_clock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Handle table for the running countdown tasks, keyed by connection id
#[derive(Debug, Default)]
pub struct ClockEngine {
    handles: HashMap<ConnId, JoinHandle<()>>,
}

impl ClockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a clock task, replacing (and cancelling) any previous one
    /// for the same connection to avoid leaked tickers
    pub fn install(&mut self, conn: ConnId, handle: JoinHandle<()>) {
        if let Some(old) = self.handles.insert(conn.clone(), handle) {
            old.abort();
            debug!("Replaced already-running clock for {}", conn);
        }
    }

    /// Cancel the clock for a connection. Safe to call when none is
    /// running; returns whether a task was actually cancelled.
    pub fn cancel(&mut self, conn: &str) -> bool {
        match self.handles.remove(conn) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Drop the handle entry without aborting; used by a clock task that
    /// terminates itself on expiry
    pub(crate) fn forget(&mut self, conn: &str) {
        self.handles.remove(conn);
    }

    pub fn is_running(&self, conn: &str) -> bool {
        self.handles.contains_key(conn)
    }

    pub fn active_count(&self) -> usize {
        self.handles.len()
    }

    /// Cancel every running clock (service shutdown)
    pub fn cancel_all(&mut self) {
        for (_, handle) in self.handles.drain() {
            handle.abort();
        }
    }
}

impl SessionCore {
    /// Begin the countdown for a connection. Caller holds the core lock.
    pub(crate) fn start_clock(self: &Arc<Self>, state: &mut CoreState, conn: &ConnId) {
        if !state.registry.contains(conn) {
            warn!("Not starting clock for unknown connection {}", conn);
            return;
        }

        let core = Arc::clone(self);
        let id = conn.clone();
        let handle = tokio::spawn(async move { core.run_clock(id).await });

        state.clocks.install(conn.clone(), handle);
        self.metrics.set_active_clocks(state.clocks.active_count());
        debug!("Clock started for {}", conn);
    }

    /// Cancel the countdown for a connection; no-op when none is running.
    /// Caller holds the core lock, so a cancelled clock cannot tick again.
    pub(crate) fn stop_clock(&self, state: &mut CoreState, conn: &str) {
        if state.clocks.cancel(conn) {
            debug!("Clock stopped for {}", conn);
        }
        self.metrics.set_active_clocks(state.clocks.active_count());
    }

    /// The countdown task body: decrement on every tick, publish the
    /// formatted time on whole notification steps, and stop at exactly zero
    /// with a time-expired notification. Expiry is terminal for the clock
    /// only; ending the game stays an explicit relay action.
    async fn run_clock(self: Arc<Self>, conn: ConnId) {
        let tick_ms = self.settings.clock_tick_ms;
        let notify_step_ms = self.settings.clock_notify_step_ms;
        let mut ticker = tokio::time::interval(Duration::from_millis(tick_ms));
        // The first interval tick completes immediately; consume it so the
        // first decrement happens one full tick after the clock starts.
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let mut state = self.state.lock().await;
            let ticked = match state.registry.get_mut(&conn) {
                Some(user) => match (user.current_room.clone(), user.time_ms) {
                    (Some(room), Some(remaining)) => {
                        let remaining = remaining.saturating_sub(tick_ms);
                        user.time_ms = Some(remaining);
                        Some((room, remaining))
                    }
                    _ => None,
                },
                None => None,
            };

            let Some((room, remaining)) = ticked else {
                warn!("Clock for {} lost its game state, cancelling", conn);
                state.clocks.forget(&conn);
                self.metrics.set_active_clocks(state.clocks.active_count());
                break;
            };

            if remaining % notify_step_ms == 0 {
                self.send_to_room(
                    &room,
                    None,
                    ServerEvent::ClockTime {
                        formatted: format_clock(remaining),
                        conn: conn.clone(),
                    },
                )
                .await;
            }

            if remaining == 0 {
                state.clocks.forget(&conn);
                self.metrics.set_active_clocks(state.clocks.active_count());
                self.metrics.record_clock_expired();
                info!("Clock expired for {} in {}", conn, room);
                self.send_to_room(&room, None, ServerEvent::ClockExpired { conn: conn.clone() })
                    .await;
                break;
            }
        }
    }
}
