//! Wire-level event definitions for the connection boundary
//!
//! Inbound events arrive from clients over the per-connection channel;
//! outbound events are pushed back as unicast, room multicast, or global
//! broadcast. The core treats gameplay payloads as opaque values and never
//! validates chess legality.

use crate::error::{Result, SessionError};
use crate::types::{ConnId, PlayerNumber, UserRecord};
use serde::{Deserialize, Serialize};

/// Events a client may send to the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Enter the lobby with a display name, army and preferred clock budget
    Register {
        username: String,
        army: String,
        pieces: Vec<String>,
        preferred_time_ms: u64,
    },
    /// Change display name in place
    UpdateName { username: String },
    IssueChallenge { to: ConnId },
    CancelChallenge { to: ConnId },
    DeclineChallenge { to: ConnId },
    /// Accept a challenge by starting a game against its issuer
    StartGame { opponent: ConnId },
    Move {
        from: String,
        to: String,
    },
    Castling {
        rook_from: String,
        rook_to: String,
        king_from: String,
        king_to: String,
    },
    EnPassant {
        from: String,
        to: String,
        captured: String,
    },
    Promotion {
        from: String,
        to: String,
        piece: String,
    },
    TurnChange,
    MoveLog {
        piece: String,
        from: String,
        to: String,
    },
    Resign { result: String },
    DrawOffer,
    DrawOfferAccepted,
    GameEnded,
    LeaveGame,
    LeaveLobby,
}

impl ClientEvent {
    /// Stable event name for logging and metrics labels
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Register { .. } => "register",
            ClientEvent::UpdateName { .. } => "update_name",
            ClientEvent::IssueChallenge { .. } => "issue_challenge",
            ClientEvent::CancelChallenge { .. } => "cancel_challenge",
            ClientEvent::DeclineChallenge { .. } => "decline_challenge",
            ClientEvent::StartGame { .. } => "start_game",
            ClientEvent::Move { .. } => "move",
            ClientEvent::Castling { .. } => "castling",
            ClientEvent::EnPassant { .. } => "en_passant",
            ClientEvent::Promotion { .. } => "promotion",
            ClientEvent::TurnChange => "turn_change",
            ClientEvent::MoveLog { .. } => "move_log",
            ClientEvent::Resign { .. } => "resign",
            ClientEvent::DrawOffer => "draw_offer",
            ClientEvent::DrawOfferAccepted => "draw_offer_accepted",
            ClientEvent::GameEnded => "game_ended",
            ClientEvent::LeaveGame => "leave_game",
            ClientEvent::LeaveLobby => "leave_lobby",
        }
    }

    /// Deserialize an inbound frame, validating basic shape
    pub fn from_json(raw: &str) -> Result<Self> {
        let event: Self =
            serde_json::from_str(raw).map_err(|e| SessionError::InvalidClientEvent {
                reason: format!("malformed event frame: {}", e),
            })?;

        if let ClientEvent::Register { username, .. } = &event {
            if username.trim().is_empty() {
                return Err(SessionError::InvalidClientEvent {
                    reason: "registration username cannot be empty".to_string(),
                }
                .into());
            }
        }

        Ok(event)
    }
}

/// Events the service pushes to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Registration acknowledgment sent back to the new connection
    Registered {
        id: ConnId,
        username: String,
        preferred_time_ms: u64,
    },
    /// Full lobby snapshot, rebroadcast after every state-affecting change
    LobbyUpdate { users: Vec<UserRecord> },
    ChallengeReceived { from: ConnId },
    ChallengeCancelled { by: ConnId },
    ChallengeDeclined { by: ConnId },
    /// Per-side game start notification
    GameStart {
        player_number: PlayerNumber,
        opponent_pieces: Vec<String>,
        opponent_name: String,
    },
    /// Per-side formatted starting clock value
    StartingTime { formatted: String },
    /// Whole-second clock update for one side of a room
    ClockTime { formatted: String, conn: ConnId },
    /// A clock reached exactly zero; terminal for the clock, not the game
    ClockExpired { conn: ConnId },
    Move {
        from: String,
        to: String,
    },
    Castling {
        rook_from: String,
        rook_to: String,
        king_from: String,
        king_to: String,
    },
    EnPassant {
        from: String,
        to: String,
        captured: String,
    },
    Promotion {
        from: String,
        to: String,
        piece: String,
    },
    TurnChange,
    MoveLog {
        piece: String,
        from: String,
        to: String,
    },
    Resign { result: String },
    DrawOffer,
    DrawOfferAccepted,
    /// The room's other member left; carries whether the game had already ended
    OpponentLeft { game_ended: bool },
}

impl ServerEvent {
    /// Stable event name for logging, metrics and test assertions
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Registered { .. } => "registered",
            ServerEvent::LobbyUpdate { .. } => "lobby_update",
            ServerEvent::ChallengeReceived { .. } => "challenge_received",
            ServerEvent::ChallengeCancelled { .. } => "challenge_cancelled",
            ServerEvent::ChallengeDeclined { .. } => "challenge_declined",
            ServerEvent::GameStart { .. } => "game_start",
            ServerEvent::StartingTime { .. } => "starting_time",
            ServerEvent::ClockTime { .. } => "clock_time",
            ServerEvent::ClockExpired { .. } => "clock_expired",
            ServerEvent::Move { .. } => "move",
            ServerEvent::Castling { .. } => "castling",
            ServerEvent::EnPassant { .. } => "en_passant",
            ServerEvent::Promotion { .. } => "promotion",
            ServerEvent::TurnChange => "turn_change",
            ServerEvent::MoveLog { .. } => "move_log",
            ServerEvent::Resign { .. } => "resign",
            ServerEvent::DrawOffer => "draw_offer",
            ServerEvent::DrawOfferAccepted => "draw_offer_accepted",
            ServerEvent::OpponentLeft { .. } => "opponent_left",
        }
    }

    /// Serialize for the wire
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| {
            SessionError::InternalError {
                message: format!("Failed to serialize server event: {}", e),
            }
            .into()
        })
    }
}
