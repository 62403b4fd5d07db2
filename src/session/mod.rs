//! Session core for the tempo-hall service
//!
//! This module owns the whole game-session lifecycle: challenge
//! negotiation, room pairing and teardown, the per-player countdown
//! clocks, and the in-game event relay between paired opponents.

pub mod challenge;
pub mod clock;
pub mod manager;
pub mod relay;

// Re-export commonly used types
pub use clock::ClockEngine;
pub use manager::{
    CoreOverview, FixedSideAssigner, RandomSideAssigner, SessionCore, SessionStats, SideAssigner,
};
