//! Wire protocol: tagged JSON event schemas and the inbound dispatch.
//!
//! One JSON object per text frame, discriminated by a "type" field. Event
//! names follow the client contract exactly, including its mixed camelCase /
//! kebab-case convention. Malformed frames are rejected with an `error`
//! event to the offending connection only and never touch shared state.

use serde::{Deserialize, Serialize};

use crate::auth::Claims;
use crate::chat;
use crate::meeting;
use crate::state::AppState;
use crate::ws::{Connection, ConnectionSender};

/// Inbound events (client → core). The sender identity is always the one
/// bound to the connection at registration; wire payloads never carry it.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    SendMessage {
        recipient_id: String,
        content: String,
        workspace_id: String,
        conversation_id: Option<String>,
    },
    MarkMessagesAsRead {
        conversation_id: String,
        other_user_id: String,
    },
    StartTyping {
        recipient_id: String,
    },
    StopTyping {
        recipient_id: String,
    },
    RequestToJoin {
        meeting_id: String,
    },
    AdmitGuest {
        guest: String,
        meeting_id: String,
    },
    DenyGuest {
        guest: String,
        meeting_id: String,
    },
}

/// Outbound events (core → client).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Full online snapshot, pushed to every client on any presence change.
    GetOnlineUsers { users: Vec<String> },
    NewMessage { message: MessagePayload },
    MessagesRead { conversation_id: String },
    Typing { sender_id: String },
    StopTyping { sender_id: String },
    #[serde(rename = "new-join-request")]
    NewJoinRequest { guest: GuestPayload },
    #[serde(rename = "join-request-approved")]
    JoinRequestApproved { token: String },
    #[serde(rename = "waiting-for-host")]
    WaitingForHost,
    #[serde(rename = "join-request-denied")]
    JoinRequestDenied { meeting_id: String },
    Error { code: u32, message: String },
}

/// A delivered chat message as the client sees it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub workspace_id: String,
    pub content: String,
    pub status: chat::messages::MessageStatus,
    pub created_at: String,
}

/// A guest entry as shown in the host's waiting list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestPayload {
    pub user_id: String,
    pub name: String,
    pub requested_at: String,
}

/// Handle an incoming text (JSON) frame: decode the tagged event and
/// dispatch. Runs inline on the connection's reader loop, which is what
/// gives per-sender FIFO delivery.
pub async fn handle_text_frame(text: &str, conn: &Connection, state: &AppState, claims: &Claims) {
    let event: ClientEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(
                user_id = %claims.sub,
                error = %e,
                "Rejected malformed client event"
            );
            send_error(&conn.sender, 400, "Malformed event payload");
            return;
        }
    };

    dispatch(event, conn, state, claims).await;
}

async fn dispatch(event: ClientEvent, conn: &Connection, state: &AppState, claims: &Claims) {
    match event {
        ClientEvent::SendMessage {
            recipient_id,
            content,
            workspace_id,
            conversation_id,
        } => {
            chat::messages::handle_send(
                state,
                conn,
                &claims.sub,
                &recipient_id,
                &workspace_id,
                content,
                conversation_id,
            )
            .await;
        }
        ClientEvent::MarkMessagesAsRead {
            conversation_id,
            other_user_id,
        } => {
            chat::messages::handle_mark_read(state, conn, &claims.sub, &conversation_id, &other_user_id)
                .await;
        }
        ClientEvent::StartTyping { recipient_id } => {
            chat::typing::handle_start(state, &claims.sub, &recipient_id);
        }
        ClientEvent::StopTyping { recipient_id } => {
            chat::typing::handle_stop(state, &claims.sub, &recipient_id);
        }
        ClientEvent::RequestToJoin { meeting_id } => {
            meeting::admission::handle_request_to_join(state, conn, claims, &meeting_id);
        }
        ClientEvent::AdmitGuest { guest, meeting_id } => {
            meeting::admission::handle_admit(state, conn, &claims.sub, &guest, &meeting_id);
        }
        ClientEvent::DenyGuest { guest, meeting_id } => {
            meeting::admission::handle_deny(state, conn, &claims.sub, &guest, &meeting_id);
        }
    }
}

/// Encode and send a server event as a text WebSocket message.
pub fn send_event(tx: &ConnectionSender, event: &ServerEvent) {
    if let Ok(json) = serde_json::to_string(event) {
        let _ = tx.send(axum::extract::ws::Message::Text(json.into()));
    }
}

/// Send an error event to a single connection.
pub fn send_error(tx: &ConnectionSender, code: u32, message: &str) {
    send_event(
        tx,
        &ServerEvent::Error {
            code,
            message: message.to_string(),
        },
    );
}
