//! Common types used throughout the session service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a live client connection, stable for the
/// connection's lifetime
pub type ConnId = String;

/// Unique identifier for a game room
pub type RoomId = String;

/// Which seat a participant was assigned when a game started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerNumber {
    One,
    Two,
}

impl PlayerNumber {
    /// The seat the opponent receives
    pub fn opposite(self) -> Self {
        match self {
            PlayerNumber::One => PlayerNumber::Two,
            PlayerNumber::Two => PlayerNumber::One,
        }
    }

    /// Numeric wire value (1 or 2)
    pub fn as_u8(self) -> u8 {
        match self {
            PlayerNumber::One => 1,
            PlayerNumber::Two => 2,
        }
    }

    /// Parse the numeric wire value
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(PlayerNumber::One),
            2 => Some(PlayerNumber::Two),
            _ => None,
        }
    }
}

impl std::fmt::Display for PlayerNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

impl Serialize for PlayerNumber {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for PlayerNumber {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = u8::deserialize(deserializer)?;
        PlayerNumber::from_u8(value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid player number: {}", value)))
    }
}

/// One registry record per live connection.
///
/// The record carries both lobby-visible identity (name, army, pieces,
/// preferred clock budget) and the mutable game-session state that the
/// session manager and clock engine drive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: ConnId,
    pub username: String,
    /// Chosen side/faction name
    pub army: String,
    /// Ordered piece identifiers for the chosen army
    pub pieces: Vec<String>,
    /// Starting clock budget the user asked for, in milliseconds
    pub preferred_time_ms: u64,
    /// Remaining clock time while a game is in progress
    pub time_ms: Option<u64>,
    pub current_room: Option<RoomId>,
    pub opponent_id: Option<ConnId>,
    pub player_number: Option<PlayerNumber>,
    pub in_play: bool,
    pub game_ended: bool,
    /// Outgoing challenge target, at most one at a time
    pub challenge_to: Option<ConnId>,
    /// Incoming challenge source, at most one at a time
    pub challenge_from: Option<ConnId>,
    pub registered_at: DateTime<Utc>,
}

impl UserRecord {
    /// Create a fresh idle record for a newly registered connection
    pub fn new(
        id: ConnId,
        username: String,
        army: String,
        pieces: Vec<String>,
        preferred_time_ms: u64,
        registered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            username,
            army,
            pieces,
            preferred_time_ms,
            time_ms: None,
            current_room: None,
            opponent_id: None,
            player_number: None,
            in_play: false,
            game_ended: false,
            challenge_to: None,
            challenge_from: None,
            registered_at,
        }
    }

    /// A user is idle when not in a game and not part of a pending challenge
    pub fn is_idle(&self) -> bool {
        !self.in_play && self.challenge_to.is_none() && self.challenge_from.is_none()
    }

    /// Whether any challenge edge (either direction) is pending
    pub fn has_pending_challenge(&self) -> bool {
        self.challenge_to.is_some() || self.challenge_from.is_some()
    }

    /// Clear all game-session state, returning the record to the lobby.
    ///
    /// Leaves identity fields and the challenge edges untouched.
    pub fn reset_to_idle(&mut self) {
        self.time_ms = None;
        self.current_room = None;
        self.opponent_id = None;
        self.player_number = None;
        self.in_play = false;
        self.game_ended = false;
    }
}

/// Policy for seeding both players' clocks at game start.
///
/// The reference behavior takes the initiating side's preference for both
/// clocks; `Shorter` negotiates the lower of the two preferences instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeSeedPolicy {
    Initiator,
    Shorter,
}

impl std::fmt::Display for TimeSeedPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeSeedPolicy::Initiator => write!(f, "initiator"),
            TimeSeedPolicy::Shorter => write!(f, "shorter"),
        }
    }
}

impl std::str::FromStr for TimeSeedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "initiator" => Ok(TimeSeedPolicy::Initiator),
            "shorter" => Ok(TimeSeedPolicy::Shorter),
            other => Err(format!("unknown time seed policy: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_number_opposite() {
        assert_eq!(PlayerNumber::One.opposite(), PlayerNumber::Two);
        assert_eq!(PlayerNumber::Two.opposite(), PlayerNumber::One);
    }

    #[test]
    fn test_player_number_wire_value() {
        assert_eq!(PlayerNumber::One.as_u8(), 1);
        assert_eq!(PlayerNumber::from_u8(2), Some(PlayerNumber::Two));
        assert_eq!(PlayerNumber::from_u8(3), None);

        let encoded = serde_json::to_string(&PlayerNumber::Two).unwrap();
        assert_eq!(encoded, "2");
        let decoded: PlayerNumber = serde_json::from_str("1").unwrap();
        assert_eq!(decoded, PlayerNumber::One);
    }

    #[test]
    fn test_reset_to_idle_clears_session_state() {
        let mut record = UserRecord::new(
            "conn-1".to_string(),
            "alice".to_string(),
            "kingdom".to_string(),
            vec!["rook".to_string()],
            300_000,
            chrono::Utc::now(),
        );
        record.time_ms = Some(120_000);
        record.current_room = Some("room1".to_string());
        record.opponent_id = Some("conn-2".to_string());
        record.player_number = Some(PlayerNumber::One);
        record.in_play = true;
        record.game_ended = true;

        record.reset_to_idle();

        assert!(record.time_ms.is_none());
        assert!(record.current_room.is_none());
        assert!(record.opponent_id.is_none());
        assert!(record.player_number.is_none());
        assert!(!record.in_play);
        assert!(!record.game_ended);
        assert_eq!(record.username, "alice");
        assert_eq!(record.preferred_time_ms, 300_000);
    }

    #[test]
    fn test_time_seed_policy_parse() {
        assert_eq!(
            "initiator".parse::<TimeSeedPolicy>().unwrap(),
            TimeSeedPolicy::Initiator
        );
        assert_eq!(
            "SHORTER".parse::<TimeSeedPolicy>().unwrap(),
            TimeSeedPolicy::Shorter
        );
        assert!("median".parse::<TimeSeedPolicy>().is_err());
    }
}
