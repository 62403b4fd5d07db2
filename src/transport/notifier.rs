//! Outbound notification boundary
//!
//! The session core never talks to sockets directly; it publishes through
//! this trait. The production implementation is the WebSocket hub in
//! `transport::ws`; tests use the recording implementation below.

use crate::error::Result;
use crate::transport::events::ServerEvent;
use crate::types::{ConnId, RoomId};
use async_trait::async_trait;

/// Trait for delivering events to connected clients.
///
/// Implementations must treat unknown connection and room identifiers as
/// no-ops: by the time an event is flushed the target may already have
/// disconnected, and that is a normal case rather than an error.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send an event to a single connection
    async fn send_to(&self, conn: &ConnId, event: ServerEvent) -> Result<()>;

    /// Send an event to every member of a room, optionally excluding one
    /// connection (typically the sender of the event being relayed)
    async fn send_to_room(
        &self,
        room: &RoomId,
        except: Option<&ConnId>,
        event: ServerEvent,
    ) -> Result<()>;

    /// Send an event to every live connection
    async fn broadcast(&self, event: ServerEvent) -> Result<()>;

    /// Add a connection to a room's broadcast channel
    async fn join_room(&self, room: &RoomId, conn: &ConnId) -> Result<()>;

    /// Remove a connection from a room's broadcast channel
    async fn leave_room(&self, room: &RoomId, conn: &ConnId) -> Result<()>;
}

/// Where a recorded event was addressed
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    To(ConnId),
    Room { room: RoomId, except: Option<ConnId> },
    Broadcast,
}

/// A single captured notification
#[derive(Debug, Clone)]
pub struct RecordedEvent {
    pub delivery: Delivery,
    pub event: ServerEvent,
}

/// Recording notifier for tests.
///
/// Captures every delivery and room membership change so assertions can be
/// made about what the core published and to whom.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: std::sync::Mutex<Vec<RecordedEvent>>,
    memberships: std::sync::Mutex<Vec<(RoomId, ConnId, bool)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured events in delivery order
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Captured events with the given wire name
    pub fn events_named(&self, name: &str) -> Vec<RecordedEvent> {
        self.events()
            .into_iter()
            .filter(|recorded| recorded.event.name() == name)
            .collect()
    }

    /// Number of captured events with the given wire name
    pub fn count_named(&self, name: &str) -> usize {
        self.events_named(name).len()
    }

    /// Events unicast to a specific connection
    pub fn events_for_conn(&self, conn: &str) -> Vec<ServerEvent> {
        self.events()
            .into_iter()
            .filter(|recorded| recorded.delivery == Delivery::To(conn.to_string()))
            .map(|recorded| recorded.event)
            .collect()
    }

    /// The most recent broadcast lobby snapshot, if any
    pub fn last_lobby_snapshot(&self) -> Option<Vec<crate::types::UserRecord>> {
        self.events()
            .into_iter()
            .rev()
            .find_map(|recorded| match recorded.event {
                ServerEvent::LobbyUpdate { users } => Some(users),
                _ => None,
            })
    }

    /// Room join/leave history as (room, conn, joined) tuples
    pub fn membership_changes(&self) -> Vec<(RoomId, ConnId, bool)> {
        self.memberships
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Drop all captured events and membership changes
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
        if let Ok(mut memberships) = self.memberships.lock() {
            memberships.clear();
        }
    }

    fn record(&self, delivery: Delivery, event: ServerEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(RecordedEvent { delivery, event });
        }
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_to(&self, conn: &ConnId, event: ServerEvent) -> Result<()> {
        self.record(Delivery::To(conn.clone()), event);
        Ok(())
    }

    async fn send_to_room(
        &self,
        room: &RoomId,
        except: Option<&ConnId>,
        event: ServerEvent,
    ) -> Result<()> {
        self.record(
            Delivery::Room {
                room: room.clone(),
                except: except.cloned(),
            },
            event,
        );
        Ok(())
    }

    async fn broadcast(&self, event: ServerEvent) -> Result<()> {
        self.record(Delivery::Broadcast, event);
        Ok(())
    }

    async fn join_room(&self, room: &RoomId, conn: &ConnId) -> Result<()> {
        if let Ok(mut memberships) = self.memberships.lock() {
            memberships.push((room.clone(), conn.clone(), true));
        }
        Ok(())
    }

    async fn leave_room(&self, room: &RoomId, conn: &ConnId) -> Result<()> {
        if let Ok(mut memberships) = self.memberships.lock() {
            memberships.push((room.clone(), conn.clone(), false));
        }
        Ok(())
    }
}
