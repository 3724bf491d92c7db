//! The host-gated admission workflow: join requests, admit/deny decisions,
//! and the room open/close signals from the external meeting service.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Claims;
use crate::meeting::rooms::{Decision, JoinOutcome, RoomError, WaitingGuest};
use crate::meeting::token;
use crate::state::AppState;
use crate::ws::broadcast::send_to_user;
use crate::ws::protocol::{send_error, send_event, GuestPayload, ServerEvent};
use crate::ws::Connection;

fn guest_payload(guest: &WaitingGuest) -> GuestPayload {
    GuestPayload {
        user_id: guest.user_id.clone(),
        name: guest.name.clone(),
        requested_at: guest.requested_at.to_rfc3339(),
    }
}

fn approval_event(state: &AppState, meeting_id: &str, guest_id: &str) -> ServerEvent {
    ServerEvent::JoinRequestApproved {
        token: token::issue_entry_token(
            &state.meeting_token_secret,
            meeting_id,
            guest_id,
            state.meeting_token_ttl_secs,
        ),
    }
}

/// Handle a requestToJoin event.
///
/// The host and already-admitted participants skip the queue entirely and
/// get a fresh entry token on the spot. Everyone else lands in the waiting
/// queue (superseding any prior ask), the host hears about it, and the
/// requester is told to wait.
pub fn handle_request_to_join(state: &AppState, conn: &Connection, claims: &Claims, meeting_id: &str) {
    let guest = WaitingGuest {
        user_id: claims.sub.clone(),
        name: claims.name.clone(),
        requested_at: chrono::Utc::now(),
    };

    match state.meetings.request_to_join(meeting_id, guest.clone()) {
        JoinOutcome::Bypass => {
            send_event(&conn.sender, &approval_event(state, meeting_id, &claims.sub));
        }
        JoinOutcome::Queued { host_id } => {
            tracing::info!(
                guest_id = %claims.sub,
                meeting_id = %meeting_id,
                "Guest waiting for host"
            );
            send_to_user(
                &state.connections,
                &host_id,
                &ServerEvent::NewJoinRequest {
                    guest: guest_payload(&guest),
                },
            );
            send_event(&conn.sender, &ServerEvent::WaitingForHost);
        }
        JoinOutcome::NoSuchMeeting => {
            send_error(&conn.sender, 404, "Meeting not found");
        }
    }
}

/// Handle an admitGuest event. Host-only; a stale decision (request already
/// resolved or never made) is a benign no-op reported to the caller alone,
/// and never re-issues an authorization.
pub fn handle_admit(
    state: &AppState,
    conn: &Connection,
    caller_id: &str,
    guest_id: &str,
    meeting_id: &str,
) {
    match state.meetings.resolve(meeting_id, caller_id, guest_id, true) {
        Decision::Resolved(guest) => {
            tracing::info!(
                guest_id = %guest.user_id,
                meeting_id = %meeting_id,
                "Guest admitted"
            );
            send_to_user(
                &state.connections,
                &guest.user_id,
                &approval_event(state, meeting_id, &guest.user_id),
            );
        }
        Decision::NotHost => {
            tracing::warn!(
                caller_id = %caller_id,
                meeting_id = %meeting_id,
                "Non-host attempted to admit a guest"
            );
            send_error(&conn.sender, 403, "Only the meeting host may admit guests");
        }
        Decision::NoSuchMeeting | Decision::NotPending => {
            send_error(&conn.sender, 404, "No pending join request for that guest");
        }
    }
}

/// Handle a denyGuest event. Same authorization and no-op rules as admit;
/// the guest is free to ask again afterwards.
pub fn handle_deny(
    state: &AppState,
    conn: &Connection,
    caller_id: &str,
    guest_id: &str,
    meeting_id: &str,
) {
    match state.meetings.resolve(meeting_id, caller_id, guest_id, false) {
        Decision::Resolved(guest) => {
            tracing::info!(
                guest_id = %guest.user_id,
                meeting_id = %meeting_id,
                "Guest denied"
            );
            send_to_user(
                &state.connections,
                &guest.user_id,
                &ServerEvent::JoinRequestDenied {
                    meeting_id: meeting_id.to_string(),
                },
            );
        }
        Decision::NotHost => {
            tracing::warn!(
                caller_id = %caller_id,
                meeting_id = %meeting_id,
                "Non-host attempted to deny a guest"
            );
            send_error(&conn.sender, 403, "Only the meeting host may deny guests");
        }
        Decision::NoSuchMeeting | Decision::NotPending => {
            send_error(&conn.sender, 404, "No pending join request for that guest");
        }
    }
}

// --- REST endpoint handlers (the external meeting service's signals) ---

#[derive(Debug, Deserialize)]
pub struct OpenMeetingRequest {
    /// Optional caller-supplied id; generated when absent.
    pub meeting_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MeetingResponse {
    pub meeting_id: String,
    pub host_id: String,
}

/// POST /api/meetings — Open a meeting room; the caller becomes its host.
/// JWT auth required. 409 when the meeting id is already live.
pub async fn open_meeting(
    State(state): State<AppState>,
    claims: Claims,
    Json(body): Json<OpenMeetingRequest>,
) -> Result<(StatusCode, Json<MeetingResponse>), StatusCode> {
    let meeting_id = body
        .meeting_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    if !state.meetings.open(&meeting_id, &claims.sub) {
        return Err(StatusCode::CONFLICT);
    }

    tracing::info!(meeting_id = %meeting_id, host_id = %claims.sub, "Meeting room opened");
    Ok((
        StatusCode::CREATED,
        Json(MeetingResponse {
            meeting_id,
            host_id: claims.sub,
        }),
    ))
}

/// DELETE /api/meetings/{meeting_id} — Close a room. Host-only.
/// Guests still waiting are denied so their UI leaves the lobby.
pub async fn close_meeting(
    State(state): State<AppState>,
    claims: Claims,
    Path(meeting_id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    match state.meetings.close(&meeting_id, &claims.sub) {
        Ok(pending) => {
            tracing::info!(
                meeting_id = %meeting_id,
                pending = pending.len(),
                "Meeting room closed"
            );
            for guest in pending {
                send_to_user(
                    &state.connections,
                    &guest.user_id,
                    &ServerEvent::JoinRequestDenied {
                        meeting_id: meeting_id.clone(),
                    },
                );
            }
            Ok(StatusCode::NO_CONTENT)
        }
        Err(RoomError::NotHost) => Err(StatusCode::FORBIDDEN),
        Err(RoomError::NotFound) => Err(StatusCode::NOT_FOUND),
    }
}

/// GET /api/meetings/{meeting_id}/waiting — Ordered waiting list. Host-only.
pub async fn waiting_list(
    State(state): State<AppState>,
    claims: Claims,
    Path(meeting_id): Path<String>,
) -> Result<Json<Vec<GuestPayload>>, StatusCode> {
    match state.meetings.waiting_of(&meeting_id, &claims.sub) {
        Ok(waiting) => Ok(Json(waiting.iter().map(guest_payload).collect())),
        Err(RoomError::NotHost) => Err(StatusCode::FORBIDDEN),
        Err(RoomError::NotFound) => Err(StatusCode::NOT_FOUND),
    }
}
