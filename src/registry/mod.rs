//! Connection registry: the single source of truth for user records
//!
//! Every live connection owns exactly one `UserRecord` keyed by its
//! connection identifier. All other components read and mutate session
//! state through this registry; the snapshot it produces is what gets
//! rebroadcast to the whole lobby after every state-affecting change.

use crate::types::{ConnId, UserRecord};
use crate::utils::current_timestamp;
use std::collections::HashMap;
use tracing::debug;

/// In-memory registry of all currently connected users
#[derive(Debug, Default)]
pub struct Registry {
    users: HashMap<ConnId, UserRecord>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and store a record for a newly registered connection.
    ///
    /// Connection identifiers are unique for a connection's lifetime, so an
    /// existing record under the same key is not expected; if one shows up
    /// anyway it is replaced.
    pub fn register(
        &mut self,
        conn: ConnId,
        username: String,
        army: String,
        pieces: Vec<String>,
        preferred_time_ms: u64,
    ) -> &UserRecord {
        let record = UserRecord::new(
            conn.clone(),
            username,
            army,
            pieces,
            preferred_time_ms,
            current_timestamp(),
        );
        if self.users.insert(conn.clone(), record).is_some() {
            debug!("Replaced existing registry record for connection {}", conn);
        }
        &self.users[&conn]
    }

    /// Fallible lookup; an absent record is a normal, handled case
    pub fn get(&self, conn: &str) -> Option<&UserRecord> {
        self.users.get(conn)
    }

    pub fn get_mut(&mut self, conn: &str) -> Option<&mut UserRecord> {
        self.users.get_mut(conn)
    }

    pub fn contains(&self, conn: &str) -> bool {
        self.users.contains_key(conn)
    }

    /// Remove and return the record for a departed connection
    pub fn remove(&mut self, conn: &str) -> Option<UserRecord> {
        self.users.remove(conn)
    }

    /// Mutate a user's display name in place; false when the record is gone
    pub fn update_name(&mut self, conn: &str, username: String) -> bool {
        match self.users.get_mut(conn) {
            Some(record) => {
                record.username = username;
                true
            }
            None => false,
        }
    }

    /// Full lobby snapshot in registration order
    pub fn snapshot(&self) -> Vec<UserRecord> {
        let mut users: Vec<UserRecord> = self.users.values().cloned().collect();
        users.sort_by(|a, b| {
            a.registered_at
                .cmp(&b.registered_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        users
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
