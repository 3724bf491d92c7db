pub mod actor;
pub mod broadcast;
pub mod handler;
pub mod protocol;

use axum::extract::ws::Message;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Type alias for the sender half of a WebSocket connection's channel.
/// Other parts of the system can clone this to push messages to a specific client.
pub type ConnectionSender = mpsc::UnboundedSender<Message>;

/// One live push channel belonging to a user. A user can have several
/// (multiple tabs/devices), each with its own connection id.
#[derive(Clone)]
pub struct Connection {
    pub id: Uuid,
    pub sender: ConnectionSender,
    pub connected_at: DateTime<Utc>,
}

impl Connection {
    pub fn new(sender: ConnectionSender) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
            connected_at: Utc::now(),
        }
    }
}

/// Connection registry: tracks all active WebSocket connections per user.
/// The single source of truth for "who is reachable now" — every fan-out
/// takes a fresh snapshot at the moment of delivery, never a cached one.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<DashMap<String, Vec<Connection>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection for a user. Idempotent per connection id.
    /// Returns true when this took the user from offline to online; the
    /// check runs against the post-mutation set under the entry lock, so a
    /// tab switch (disconnect old, connect new) never flickers offline.
    pub fn register(&self, user_id: &str, conn: Connection) -> bool {
        let mut entry = self.inner.entry(user_id.to_string()).or_default();
        let was_empty = entry.is_empty();
        if !entry.iter().any(|c| c.id == conn.id) {
            entry.push(conn);
        }
        was_empty && !entry.is_empty()
    }

    /// Remove one connection by id, sweeping any senders whose receiver is
    /// already gone. Unknown ids are a no-op: network disconnects race with
    /// explicit client cleanup and both paths may arrive.
    /// Returns true when this emptied the user's connection set.
    pub fn unregister(&self, user_id: &str, connection_id: Uuid) -> bool {
        let went_offline = match self.inner.get_mut(user_id) {
            Some(mut entry) => {
                entry.retain(|c| c.id != connection_id && !c.sender.is_closed());
                entry.is_empty()
            }
            None => false,
        };

        if went_offline {
            // Re-checked under the entry lock: a concurrent register wins.
            self.inner.remove_if(user_id, |_, conns| conns.is_empty());
        }

        went_offline
    }

    /// Current snapshot of a user's live connections (possibly empty).
    pub fn connections_of(&self, user_id: &str) -> Vec<Connection> {
        self.inner
            .get(user_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Snapshot of every live connection, for whole-fleet broadcasts.
    pub fn all_connections(&self) -> Vec<Connection> {
        self.inner
            .iter()
            .flat_map(|entry| entry.value().clone())
            .collect()
    }

    /// The online-user set: exactly the users with a non-empty connection
    /// set. Sorted so snapshots compare stably.
    pub fn online_users(&self) -> Vec<String> {
        let mut users: Vec<String> = self
            .inner
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| entry.key().clone())
            .collect();
        users.sort();
        users
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.inner
            .get(user_id)
            .map(|entry| !entry.value().is_empty())
            .unwrap_or(false)
    }
}
