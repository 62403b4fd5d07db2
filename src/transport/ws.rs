//! WebSocket gateway: the production transport
//!
//! Each client holds one persistent WebSocket. The hub owns the outbound
//! half of every connection plus room membership, and implements the
//! `Notifier` boundary for the session core. The socket task owns the
//! inbound half: it decodes frames into `ClientEvent`s, dispatches them
//! into the core, and triggers disconnect cleanup when the socket closes.

use crate::error::{Result, SessionError};
use crate::session::manager::SessionCore;
use crate::transport::events::{ClientEvent, ServerEvent};
use crate::transport::notifier::Notifier;
use crate::types::{ConnId, RoomId};
use crate::utils::generate_conn_id;
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Connection table and room membership for the WebSocket transport
#[derive(Default)]
pub struct WsHub {
    inner: Mutex<HubInner>,
}

#[derive(Default)]
struct HubInner {
    senders: HashMap<ConnId, mpsc::UnboundedSender<Message>>,
    rooms: HashMap<RoomId, HashSet<ConnId>>,
}

impl WsHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the outbound channel for a freshly opened connection
    pub fn connect(&self, conn: ConnId, sender: mpsc::UnboundedSender<Message>) {
        if let Ok(mut inner) = self.inner.lock() {
            if inner.senders.insert(conn.clone(), sender).is_some() {
                warn!("Replaced existing outbound channel for connection {}", conn);
            }
        }
    }

    /// Remove a closed connection from the table and from every room
    pub fn drop_connection(&self, conn: &ConnId) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.senders.remove(conn);
            for members in inner.rooms.values_mut() {
                members.remove(conn);
            }
            inner.rooms.retain(|_, members| !members.is_empty());
        }
    }

    /// Number of live connections
    pub fn connection_count(&self) -> usize {
        self.inner.lock().map(|inner| inner.senders.len()).unwrap_or(0)
    }

    fn encode(event: &ServerEvent) -> Result<Message> {
        Ok(Message::Text(event.to_json()?.into()))
    }

    fn locked(&self) -> Result<std::sync::MutexGuard<'_, HubInner>> {
        self.inner.lock().map_err(|_| {
            SessionError::InternalError {
                message: "Failed to acquire hub lock".to_string(),
            }
            .into()
        })
    }
}

#[async_trait]
impl Notifier for WsHub {
    async fn send_to(&self, conn: &ConnId, event: ServerEvent) -> Result<()> {
        let message = Self::encode(&event)?;
        let inner = self.locked()?;
        match inner.senders.get(conn) {
            Some(sender) => {
                if sender.send(message).is_err() {
                    debug!("Outbound channel for {} already closed", conn);
                }
            }
            None => debug!("Dropping {} event for unknown connection {}", event.name(), conn),
        }
        Ok(())
    }

    async fn send_to_room(
        &self,
        room: &RoomId,
        except: Option<&ConnId>,
        event: ServerEvent,
    ) -> Result<()> {
        let message = Self::encode(&event)?;
        let inner = self.locked()?;
        let Some(members) = inner.rooms.get(room) else {
            debug!("Dropping {} event for unknown room {}", event.name(), room);
            return Ok(());
        };
        for member in members {
            if Some(member) == except {
                continue;
            }
            if let Some(sender) = inner.senders.get(member) {
                if sender.send(message.clone()).is_err() {
                    debug!("Outbound channel for {} already closed", member);
                }
            }
        }
        Ok(())
    }

    async fn broadcast(&self, event: ServerEvent) -> Result<()> {
        let message = Self::encode(&event)?;
        let inner = self.locked()?;
        for (conn, sender) in &inner.senders {
            if sender.send(message.clone()).is_err() {
                debug!("Outbound channel for {} already closed", conn);
            }
        }
        Ok(())
    }

    async fn join_room(&self, room: &RoomId, conn: &ConnId) -> Result<()> {
        let mut inner = self.locked()?;
        inner.rooms.entry(room.clone()).or_default().insert(conn.clone());
        Ok(())
    }

    async fn leave_room(&self, room: &RoomId, conn: &ConnId) -> Result<()> {
        let mut inner = self.locked()?;
        if let Some(members) = inner.rooms.get_mut(room) {
            members.remove(conn);
            if members.is_empty() {
                inner.rooms.remove(room);
            }
        }
        Ok(())
    }
}

/// Shared state handed to the WebSocket route
#[derive(Clone)]
pub struct GatewayContext {
    pub core: Arc<SessionCore>,
    pub hub: Arc<WsHub>,
}

/// Axum handler upgrading `/ws` requests into session connections
pub async fn ws_handler(State(context): State<GatewayContext>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(context, socket))
}

/// Per-connection task: writer half drains the hub channel, reader half
/// dispatches decoded frames into the core until the socket closes.
async fn handle_socket(context: GatewayContext, mut socket: WebSocket) {
    let conn_id = generate_conn_id();
    let (tx, mut rx) = mpsc::unbounded_channel();
    context.hub.connect(conn_id.clone(), tx);

    info!("Connection {} opened", conn_id);

    loop {
        tokio::select! {
            outbound = rx.recv() => match outbound {
                Some(message) => {
                    if socket.send(message).await.is_err() {
                        debug!("Write to connection {} failed", conn_id);
                        break;
                    }
                }
                None => break,
            },
            inbound = socket.recv() => match inbound {
                Some(Ok(Message::Text(text))) => match ClientEvent::from_json(text.as_str()) {
                    Ok(event) => context.core.dispatch(&conn_id, event).await,
                    Err(e) => warn!("Dropping malformed frame from {}: {}", conn_id, e),
                },
                Some(Ok(Message::Close(_))) | None => break,
                // Ping/pong handled at the protocol layer; binary frames ignored
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("Read from connection {} failed: {}", conn_id, e);
                    break;
                }
            },
        }
    }

    context.core.disconnect(&conn_id).await;
    context.hub.drop_connection(&conn_id);
    info!("Connection {} closed", conn_id);
}
