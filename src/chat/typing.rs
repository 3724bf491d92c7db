//! Ephemeral typing signals with server-enforced expiry.
//!
//! State lives only in memory, keyed by (sender, recipient); a restart
//! drops it with no correctness impact. The 2-second timeout is enforced
//! here rather than trusted to the client's own timer: a background sweep
//! emits the stop notification when an entry lapses.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::state::AppState;
use crate::ws::broadcast::send_to_user;
use crate::ws::protocol::ServerEvent;
use crate::ws::ConnectionRegistry;

/// A typing indicator never outlives this without renewed activity.
pub const TYPING_TIMEOUT: Duration = Duration::from_secs(2);

/// Sweep cadence. Expiry can therefore lag the deadline by at most one tick.
const SWEEP_INTERVAL: Duration = Duration::from_millis(500);

type PairKey = (String, String);

/// In-memory typing state: (sender, recipient) → deadline.
#[derive(Clone, Default)]
pub struct TypingTable {
    inner: Arc<DashMap<PairKey, Instant>>,
}

impl TypingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// (Re)arm the entry for a pair. Returns true only when the state is
    /// fresh — a refresh extends the deadline without re-notifying, so a
    /// held-down key does not become a notification storm.
    pub fn start(&self, sender_id: &str, recipient_id: &str) -> bool {
        let deadline = Instant::now() + TYPING_TIMEOUT;
        let mut fresh = false;
        self.inner
            .entry((sender_id.to_string(), recipient_id.to_string()))
            .and_modify(|expires_at| *expires_at = deadline)
            .or_insert_with(|| {
                fresh = true;
                deadline
            });
        fresh
    }

    /// Drop the entry for a pair. Returns false when there was none — the
    /// explicit stop raced the sweep or a send, which is routine.
    pub fn stop(&self, sender_id: &str, recipient_id: &str) -> bool {
        self.inner
            .remove(&(sender_id.to_string(), recipient_id.to_string()))
            .is_some()
    }

    /// Remove and return every entry whose deadline has passed.
    pub fn take_expired(&self) -> Vec<PairKey> {
        let now = Instant::now();
        let lapsed: Vec<PairKey> = self
            .inner
            .iter()
            .filter(|entry| *entry.value() <= now)
            .map(|entry| entry.key().clone())
            .collect();

        // Re-check under the entry lock: a concurrent start may have
        // re-armed the pair between the scan and the removal.
        lapsed
            .into_iter()
            .filter(|key| {
                self.inner
                    .remove_if(key, |_, expires_at| *expires_at <= now)
                    .is_some()
            })
            .collect()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.len()
    }
}

/// Handle a startTyping event: arm the state and notify the recipient's
/// connections only on a fresh transition.
pub fn handle_start(state: &AppState, sender_id: &str, recipient_id: &str) {
    if state.typing.start(sender_id, recipient_id) {
        send_to_user(
            &state.connections,
            recipient_id,
            &ServerEvent::Typing {
                sender_id: sender_id.to_string(),
            },
        );
    }
}

/// Handle a stopTyping event (explicit, or implicit when a send clears the
/// pending indicator): drop the state and notify the recipient.
pub fn handle_stop(state: &AppState, sender_id: &str, recipient_id: &str) {
    if state.typing.stop(sender_id, recipient_id) {
        send_to_user(
            &state.connections,
            recipient_id,
            &ServerEvent::StopTyping {
                sender_id: sender_id.to_string(),
            },
        );
    }
}

/// Spawn the background sweep that fires lapsed indicators autonomously,
/// so the client-visible timeout holds even when no stopTyping arrives.
pub fn spawn_expiry_sweep(typing: TypingTable, connections: ConnectionRegistry) {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            tick.tick().await;

            for (sender_id, recipient_id) in typing.take_expired() {
                tracing::debug!(
                    sender_id = %sender_id,
                    recipient_id = %recipient_id,
                    "Typing state expired"
                );
                send_to_user(
                    &connections,
                    &recipient_id,
                    &ServerEvent::StopTyping { sender_id },
                );
            }
        }
    });
}
