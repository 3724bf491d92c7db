//! Message delivery coordination: the send path and the read-receipt path.
//!
//! A message is persisted (status `sent`) before any fan-out; if the store
//! rejects it, only the originating connection hears about the failure and
//! no recipient ever sees an un-recorded message. Delivery itself is
//! store-and-forward: an offline recipient finds the message in the store
//! on their next session, and status only advances once their client
//! acknowledges through markMessagesAsRead.

use chrono::Utc;
use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chat::typing;
use crate::db::DbPool;
use crate::state::AppState;
use crate::ws::broadcast::{send_to_user, send_to_user_except};
use crate::ws::protocol::{send_error, MessagePayload, ServerEvent};
use crate::ws::Connection;

type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Message delivery status. Monotonically non-decreasing per message:
/// sent → delivered → read, never backward. The server itself only ever
/// writes `sent` and `read`; `delivered` is kept for the full lifecycle
/// model the client contract names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Read => "read",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "sent" => Some(Self::Sent),
            "delivered" => Some(Self::Delivered),
            "read" => Some(Self::Read),
            _ => None,
        }
    }
}

/// Handle a sendMessage event.
///
/// Resolves (or lazily creates) the pair conversation, persists the message,
/// then fans out `newMessage` to every recipient connection and echoes to
/// the sender's other tabs. Runs inline on the sender's reader loop, so two
/// sends from the same tab stay ordered end to end.
pub async fn handle_send(
    state: &AppState,
    conn: &Connection,
    sender_id: &str,
    recipient_id: &str,
    workspace_id: &str,
    content: String,
    conversation_id: Option<String>,
) {
    if sender_id == recipient_id {
        send_error(&conn.sender, 400, "Cannot message yourself");
        return;
    }

    // Submitting a message clears any pending typing indicator for the pair
    typing::handle_stop(state, sender_id, recipient_id);

    let db = state.db.clone();
    let sender = sender_id.to_string();
    let recipient = recipient_id.to_string();
    let workspace = workspace_id.to_string();

    let persisted = tokio::task::spawn_blocking(move || {
        persist_message(&db, &sender, &recipient, &workspace, &content, conversation_id)
    })
    .await;

    let message = match persisted {
        Ok(Ok(message)) => message,
        Ok(Err(e)) => {
            tracing::warn!(
                sender_id = %sender_id,
                recipient_id = %recipient_id,
                error = %e,
                "Message persistence failed"
            );
            // Surface to the sender only; never forward an un-recorded message
            send_error(&conn.sender, 500, "Message could not be stored");
            return;
        }
        Err(e) => {
            tracing::error!(error = %e, "Persistence task join error");
            send_error(&conn.sender, 500, "Message could not be stored");
            return;
        }
    };

    let event = ServerEvent::NewMessage { message };

    // Fresh registry snapshot at the moment of fan-out: a connection may have
    // closed between event receipt and now, or a new tab may have appeared.
    send_to_user(&state.connections, recipient_id, &event);
    // Multi-tab self-sync: every sender tab except the originating one
    send_to_user_except(&state.connections, sender_id, conn.id, &event);
}

/// Persist a message with status `sent`, creating the conversation on first
/// contact between the pair. Participant order is normalized so the pair
/// maps to one conversation regardless of direction.
fn persist_message(
    db: &DbPool,
    sender_id: &str,
    recipient_id: &str,
    workspace_id: &str,
    content: &str,
    conversation_id: Option<String>,
) -> Result<MessagePayload, StoreError> {
    let conn = db.lock().map_err(|e| format!("DB lock error: {}", e))?;
    let now = Utc::now().to_rfc3339();

    let conversation_id = match conversation_id {
        Some(id) => {
            // The client named a conversation: it must exist and both parties
            // must be its participants. Anything else is a shape violation.
            let participants: Option<(String, String)> = conn
                .query_row(
                    "SELECT participant_a, participant_b FROM conversations WHERE id = ?1",
                    rusqlite::params![id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let (a, b) = participants.ok_or("Unknown conversation")?;
            let (lo, hi) = normalized_pair(sender_id, recipient_id);
            if (a.as_str(), b.as_str()) != (lo, hi) {
                return Err("Sender is not a participant of that conversation".into());
            }
            id
        }
        None => resolve_or_create_conversation(&conn, sender_id, recipient_id, &now)?,
    };

    let message_id = Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO messages (id, conversation_id, sender_id, recipient_id, workspace_id, content, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'sent', ?7)",
        rusqlite::params![
            message_id,
            conversation_id,
            sender_id,
            recipient_id,
            workspace_id,
            content,
            now
        ],
    )?;

    conn.execute(
        "UPDATE conversations SET last_message_id = ?1 WHERE id = ?2",
        rusqlite::params![message_id, conversation_id],
    )?;

    Ok(MessagePayload {
        id: message_id,
        conversation_id,
        sender_id: sender_id.to_string(),
        recipient_id: recipient_id.to_string(),
        workspace_id: workspace_id.to_string(),
        content: content.to_string(),
        status: MessageStatus::Sent,
        created_at: now,
    })
}

fn normalized_pair<'a>(x: &'a str, y: &'a str) -> (&'a str, &'a str) {
    if x < y {
        (x, y)
    } else {
        (y, x)
    }
}

fn resolve_or_create_conversation(
    conn: &rusqlite::Connection,
    sender_id: &str,
    recipient_id: &str,
    now: &str,
) -> Result<String, StoreError> {
    let (a, b) = normalized_pair(sender_id, recipient_id);

    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM conversations WHERE participant_a = ?1 AND participant_b = ?2",
            rusqlite::params![a, b],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(id) = existing {
        return Ok(id);
    }

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO conversations (id, participant_a, participant_b, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![id, a, b, now],
    )?;
    Ok(id)
}

/// Handle a markMessagesAsRead event.
///
/// Flips every message in the conversation authored by `other_user_id` and
/// addressed to the reader from not-yet-read to `read`, then notifies the
/// author's connections (not the reader's) so their UI can update ticks.
/// Idempotent: when nothing changed, nobody is notified.
pub async fn handle_mark_read(
    state: &AppState,
    conn: &Connection,
    reader_id: &str,
    conversation_id: &str,
    other_user_id: &str,
) {
    let db = state.db.clone();
    let conversation = conversation_id.to_string();
    let author = other_user_id.to_string();
    let reader = reader_id.to_string();

    let changed = tokio::task::spawn_blocking(move || mark_read(&db, &conversation, &author, &reader))
        .await;

    let changed = match changed {
        Ok(Ok(n)) => n,
        Ok(Err(e)) => {
            tracing::warn!(
                reader_id = %reader_id,
                conversation_id = %conversation_id,
                error = %e,
                "Read-receipt update failed"
            );
            send_error(&conn.sender, 500, "Read receipt could not be stored");
            return;
        }
        Err(e) => {
            tracing::error!(error = %e, "Read-receipt task join error");
            send_error(&conn.sender, 500, "Read receipt could not be stored");
            return;
        }
    };

    if changed == 0 {
        // Already all read (or nothing to read) — a no-op, not an error
        return;
    }

    send_to_user(
        &state.connections,
        other_user_id,
        &ServerEvent::MessagesRead {
            conversation_id: conversation_id.to_string(),
        },
    );
}

/// Forward-only status transition: the reader predicate keeps already-`read`
/// rows untouched, and scoping by recipient means a client can only flip
/// messages that were addressed to it.
fn mark_read(
    db: &DbPool,
    conversation_id: &str,
    author_id: &str,
    reader_id: &str,
) -> Result<usize, StoreError> {
    let conn = db.lock().map_err(|e| format!("DB lock error: {}", e))?;
    let changed = conn.execute(
        "UPDATE messages SET status = 'read'
         WHERE conversation_id = ?1 AND sender_id = ?2 AND recipient_id = ?3 AND status != 'read'",
        rusqlite::params![conversation_id, author_id, reader_id],
    )?;
    Ok(changed)
}
