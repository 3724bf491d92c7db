//! Fan-out helpers over the connection registry.
//!
//! Each send goes into the target connection's unbounded queue and never
//! blocks the caller, so one stuck peer cannot stall delivery to others.
//! Send errors mean the connection is already gone and are ignored; the
//! actor's unregister path cleans the entry up.

use axum::extract::ws::Message;
use uuid::Uuid;

use crate::ws::protocol::ServerEvent;
use crate::ws::ConnectionRegistry;

fn encode(event: &ServerEvent) -> Option<Message> {
    serde_json::to_string(event).ok().map(|json| Message::Text(json.into()))
}

/// Send an event to every connected client.
pub fn broadcast_to_all(registry: &ConnectionRegistry, event: &ServerEvent) {
    let Some(msg) = encode(event) else { return };
    for conn in registry.all_connections() {
        let _ = conn.sender.send(msg.clone());
    }
}

/// Send an event to a specific user (all their connections).
pub fn send_to_user(registry: &ConnectionRegistry, user_id: &str, event: &ServerEvent) {
    let Some(msg) = encode(event) else { return };
    for conn in registry.connections_of(user_id) {
        let _ = conn.sender.send(msg.clone());
    }
}

/// Send an event to all of a user's connections except one — the multi-tab
/// echo path, where the originating tab already knows.
pub fn send_to_user_except(
    registry: &ConnectionRegistry,
    user_id: &str,
    except: Uuid,
    event: &ServerEvent,
) {
    let Some(msg) = encode(event) else { return };
    for conn in registry.connections_of(user_id) {
        if conn.id != except {
            let _ = conn.sender.send(msg.clone());
        }
    }
}
