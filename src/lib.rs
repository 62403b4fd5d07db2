//! Tempo Hall - real-time session service for two-player chess games
//!
//! This crate provides WebSocket-based session management with a
//! connection registry, challenge negotiation, room pairing, synchronized
//! per-player countdown clocks, and in-game event relay between paired
//! opponents.

pub mod config;
pub mod error;
pub mod metrics;
pub mod registry;
pub mod service;
pub mod session;
pub mod transport;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{Result, SessionError};
pub use types::*;

// Re-export key components
pub use registry::Registry;
pub use session::manager::SessionCore;
pub use transport::notifier::Notifier;
pub use transport::ws::WsHub;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
