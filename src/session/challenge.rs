//! Challenge negotiation between idle lobby members
//!
//! A challenge is a directed, ephemeral edge between two idle users:
//! outgoing on the issuer, incoming on the target. It is consumed by a
//! game start, or destroyed by cancel, decline, or either party
//! disconnecting. Invalid attempts (unknown or busy target) are silently
//! ignored rather than surfaced to the caller.

use crate::session::manager::SessionCore;
use crate::transport::events::ServerEvent;
use crate::types::ConnId;
use tracing::{debug, info};

impl SessionCore {
    /// Issue a challenge from one idle user to another.
    ///
    /// A second challenge while one is already pending wins over the old
    /// one; the superseded edge is fully cleared on both of its endpoints
    /// so no dangling half-edge survives.
    pub async fn issue_challenge(&self, from: &ConnId, to: &ConnId) {
        let mut state = self.state.lock().await;
        let state = &mut *state;

        if from == to {
            debug!("Ignoring self-challenge from {}", from);
            return;
        }
        match state.registry.get(from) {
            Some(user) if user.in_play => {
                debug!("Ignoring challenge from {} while in play", from);
                return;
            }
            Some(_) => {}
            None => {
                debug!("Ignoring challenge from unknown connection {}", from);
                return;
            }
        }
        match state.registry.get(to) {
            Some(user) if user.in_play => {
                debug!("Ignoring challenge from {} against busy target {}", from, to);
                return;
            }
            Some(_) => {}
            None => {
                debug!("Ignoring challenge from {} against unknown target {}", from, to);
                return;
            }
        }

        // Last write wins: supersede any pending edges on either endpoint
        if let Some(user) = state.registry.get(from) {
            if let Some(previous) = user.challenge_to.clone() {
                if previous != *to {
                    if let Some(record) = state.registry.get_mut(&previous) {
                        if record.challenge_from.as_deref() == Some(from.as_str()) {
                            record.challenge_from = None;
                        }
                    }
                }
            }
        }
        if let Some(user) = state.registry.get(to) {
            if let Some(previous) = user.challenge_from.clone() {
                if previous != *from {
                    if let Some(record) = state.registry.get_mut(&previous) {
                        if record.challenge_to.as_deref() == Some(to.as_str()) {
                            record.challenge_to = None;
                        }
                    }
                }
            }
        }

        if let Some(user) = state.registry.get_mut(from) {
            user.challenge_to = Some(to.clone());
        }
        if let Some(user) = state.registry.get_mut(to) {
            user.challenge_from = Some(from.clone());
        }

        state.stats.challenges_issued += 1;
        self.metrics.record_challenge_issued();
        info!("Challenge issued: {} -> {}", from, to);

        self.send_to(to, ServerEvent::ChallengeReceived { from: from.clone() })
            .await;
        self.broadcast_lobby(state).await;
    }

    /// Issuer withdraws its pending challenge
    pub async fn cancel_challenge(&self, from: &ConnId, to: &ConnId) {
        let mut state = self.state.lock().await;
        let state = &mut *state;

        if !Self::clear_matching_edge(state, from, to) {
            debug!("Ignoring cancel of nonexistent challenge {} -> {}", from, to);
            return;
        }

        info!("Challenge cancelled: {} -> {}", from, to);
        self.send_to(to, ServerEvent::ChallengeCancelled { by: from.clone() })
            .await;
        self.broadcast_lobby(state).await;
    }

    /// Recipient turns down an incoming challenge
    pub async fn decline_challenge(&self, decliner: &ConnId, issuer: &ConnId) {
        let mut state = self.state.lock().await;
        let state = &mut *state;

        if !Self::clear_matching_edge(state, issuer, decliner) {
            debug!(
                "Ignoring decline of nonexistent challenge {} -> {}",
                issuer, decliner
            );
            return;
        }

        info!("Challenge declined: {} -> {}", issuer, decliner);
        self.send_to(issuer, ServerEvent::ChallengeDeclined { by: decliner.clone() })
            .await;
        self.broadcast_lobby(state).await;
    }

    /// Clear the directed edge issuer -> target from both endpoints;
    /// returns false when no such edge existed
    fn clear_matching_edge(
        state: &mut crate::session::manager::CoreState,
        issuer: &str,
        target: &str,
    ) -> bool {
        let edge_exists = state
            .registry
            .get(issuer)
            .map(|user| user.challenge_to.as_deref() == Some(target))
            .unwrap_or(false);
        if !edge_exists {
            return false;
        }

        if let Some(user) = state.registry.get_mut(issuer) {
            user.challenge_to = None;
        }
        if let Some(user) = state.registry.get_mut(target) {
            if user.challenge_from.as_deref() == Some(issuer) {
                user.challenge_from = None;
            }
        }
        true
    }
}
