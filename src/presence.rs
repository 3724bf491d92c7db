//! Presence tracking derived from the connection registry.
//!
//! There is no separate presence store: a user is online iff their
//! connection set is non-empty, and the registry computes transitions
//! atomically with its own mutations. This module only handles the
//! broadcast side.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::auth::Claims;
use crate::state::AppState;
use crate::ws::broadcast::broadcast_to_all;
use crate::ws::protocol::{send_event, ServerEvent};
use crate::ws::{ConnectionRegistry, ConnectionSender};

fn online_snapshot(registry: &ConnectionRegistry) -> ServerEvent {
    ServerEvent::GetOnlineUsers {
        users: registry.online_users(),
    }
}

/// Push the full online list to every connected client. The list is always
/// the complete snapshot, never a diff.
pub fn broadcast_online_users(registry: &ConnectionRegistry) {
    broadcast_to_all(registry, &online_snapshot(registry));
}

/// Send the current online list to a single connection — used when a new tab
/// of an already-online user connects and no transition was broadcast.
pub fn send_online_snapshot(registry: &ConnectionRegistry, tx: &ConnectionSender) {
    send_event(tx, &online_snapshot(registry));
}

#[derive(Debug, Serialize)]
pub struct PresenceResponse {
    pub users: Vec<String>,
}

/// GET /api/presence — Current online-user snapshot. JWT auth required.
/// Same list the push channel broadcasts, for clients that poll on resume.
pub async fn get_presence(
    State(state): State<AppState>,
    _claims: Claims,
) -> Json<PresenceResponse> {
    Json(PresenceResponse {
        users: state.connections.online_users(),
    })
}
