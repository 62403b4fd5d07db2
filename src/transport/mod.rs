//! Transport boundary for the session service
//!
//! This module defines the wire event vocabulary, the abstract outbound
//! notification trait the core publishes through, and the concrete
//! WebSocket gateway implementation.

pub mod events;
pub mod notifier;
pub mod ws;

// Re-export commonly used types
pub use events::{ClientEvent, ServerEvent};
pub use notifier::{Delivery, Notifier, RecordedEvent, RecordingNotifier};
pub use ws::{ws_handler, GatewayContext, WsHub};
