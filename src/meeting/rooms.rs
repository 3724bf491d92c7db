//! In-memory meeting-room state: hosts, admitted participants, and the
//! per-room waiting queue.
//!
//! Every mutation of a room happens under its DashMap entry lock, so a
//! concurrent admit/deny for the same guest resolves to exactly one winner
//! and the loser observes a plain no-op.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;

/// A guest with a pending join request, in the order they asked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitingGuest {
    pub user_id: String,
    pub name: String,
    pub requested_at: DateTime<Utc>,
}

/// A live meeting room. Created when the session begins, destroyed when the
/// room closes; both signals arrive through the REST surface.
#[derive(Debug, Clone)]
pub struct MeetingRoom {
    pub meeting_id: String,
    pub host_id: String,
    /// Guests whose requests were approved (plus the host). Membership here
    /// lets a page reload re-enter without queueing again.
    pub admitted: HashSet<String>,
    /// Pending requests in arrival order; at most one entry per guest.
    pub waiting: Vec<WaitingGuest>,
}

/// Outcome of a join request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Caller is the host or already admitted: no queueing, authorize now.
    Bypass,
    /// Queued (or re-queued, superseding a prior ask); notify this host.
    Queued { host_id: String },
    /// No such room is live.
    NoSuchMeeting,
}

/// Outcome of a host decision on a pending request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The caller won the resolution; the guest's entry is gone.
    Resolved(WaitingGuest),
    /// Caller is not the room's current host — rejected, no state change.
    NotHost,
    /// No such room is live.
    NoSuchMeeting,
    /// No pending entry for that guest: already resolved or never asked.
    NotPending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomError {
    NotFound,
    NotHost,
}

/// Registry of live meeting rooms.
#[derive(Clone, Default)]
pub struct MeetingRegistry {
    inner: Arc<DashMap<String, MeetingRoom>>,
}

impl MeetingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a room with the caller as host. Returns false when the meeting
    /// id is already live.
    pub fn open(&self, meeting_id: &str, host_id: &str) -> bool {
        match self.inner.entry(meeting_id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(MeetingRoom {
                    meeting_id: meeting_id.to_string(),
                    host_id: host_id.to_string(),
                    admitted: HashSet::from([host_id.to_string()]),
                    waiting: Vec::new(),
                });
                true
            }
        }
    }

    /// Close a room. Host-only. Returns the still-pending guests so the
    /// caller can fan out denials.
    pub fn close(&self, meeting_id: &str, caller_id: &str) -> Result<Vec<WaitingGuest>, RoomError> {
        let is_host = match self.inner.get(meeting_id) {
            Some(room) => room.host_id == caller_id,
            None => return Err(RoomError::NotFound),
        };
        if !is_host {
            return Err(RoomError::NotHost);
        }

        match self
            .inner
            .remove_if(meeting_id, |_, room| room.host_id == caller_id)
        {
            Some((_, room)) => Ok(room.waiting),
            None => Err(RoomError::NotFound),
        }
    }

    /// Upsert a pending join request. A repeat ask replaces the prior entry
    /// for the same guest rather than queueing twice.
    pub fn request_to_join(&self, meeting_id: &str, guest: WaitingGuest) -> JoinOutcome {
        let Some(mut room) = self.inner.get_mut(meeting_id) else {
            return JoinOutcome::NoSuchMeeting;
        };

        if room.host_id == guest.user_id || room.admitted.contains(&guest.user_id) {
            return JoinOutcome::Bypass;
        }

        room.waiting.retain(|g| g.user_id != guest.user_id);
        room.waiting.push(guest);
        JoinOutcome::Queued {
            host_id: room.host_id.clone(),
        }
    }

    /// Resolve a pending request: remove it from the queue and, on admit,
    /// record the guest as admitted. Host-only; checked against the room's
    /// current host with no side effects on rejection.
    pub fn resolve(
        &self,
        meeting_id: &str,
        caller_id: &str,
        guest_id: &str,
        admit: bool,
    ) -> Decision {
        let Some(mut room) = self.inner.get_mut(meeting_id) else {
            return Decision::NoSuchMeeting;
        };

        if room.host_id != caller_id {
            return Decision::NotHost;
        }

        let Some(pos) = room.waiting.iter().position(|g| g.user_id == guest_id) else {
            return Decision::NotPending;
        };

        let guest = room.waiting.remove(pos);
        if admit {
            room.admitted.insert(guest.user_id.clone());
        }
        Decision::Resolved(guest)
    }

    /// Ordered waiting list. Host-only — the queue is the host's view.
    pub fn waiting_of(
        &self,
        meeting_id: &str,
        caller_id: &str,
    ) -> Result<Vec<WaitingGuest>, RoomError> {
        let room = self.inner.get(meeting_id).ok_or(RoomError::NotFound)?;
        if room.host_id != caller_id {
            return Err(RoomError::NotHost);
        }
        Ok(room.waiting.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guest(id: &str) -> WaitingGuest {
        WaitingGuest {
            user_id: id.to_string(),
            name: id.to_uppercase(),
            requested_at: Utc::now(),
        }
    }

    #[test]
    fn host_and_admitted_bypass_the_queue() {
        let rooms = MeetingRegistry::new();
        assert!(rooms.open("m1", "host"));
        assert!(!rooms.open("m1", "other"));

        assert_eq!(rooms.request_to_join("m1", guest("host")), JoinOutcome::Bypass);

        assert_eq!(
            rooms.request_to_join("m1", guest("g1")),
            JoinOutcome::Queued {
                host_id: "host".to_string()
            }
        );
        assert!(matches!(
            rooms.resolve("m1", "host", "g1", true),
            Decision::Resolved(_)
        ));

        // Once admitted, a re-join (page reload) bypasses the queue
        assert_eq!(rooms.request_to_join("m1", guest("g1")), JoinOutcome::Bypass);
    }

    #[test]
    fn re_request_supersedes_instead_of_duplicating() {
        let rooms = MeetingRegistry::new();
        rooms.open("m1", "host");
        rooms.request_to_join("m1", guest("g1"));
        rooms.request_to_join("m1", guest("g2"));
        rooms.request_to_join("m1", guest("g1"));

        let waiting = rooms.waiting_of("m1", "host").unwrap();
        let ids: Vec<&str> = waiting.iter().map(|g| g.user_id.as_str()).collect();
        assert_eq!(ids, vec!["g2", "g1"]);
    }

    #[test]
    fn only_the_host_may_resolve_or_peek() {
        let rooms = MeetingRegistry::new();
        rooms.open("m1", "host");
        rooms.request_to_join("m1", guest("g1"));

        assert_eq!(rooms.resolve("m1", "g1", "g1", true), Decision::NotHost);
        assert_eq!(rooms.waiting_of("m1", "g1"), Err(RoomError::NotHost));
        // Rejection had no side effects
        assert_eq!(rooms.waiting_of("m1", "host").unwrap().len(), 1);
    }

    #[test]
    fn second_decision_after_resolution_is_a_noop() {
        let rooms = MeetingRegistry::new();
        rooms.open("m1", "host");
        rooms.request_to_join("m1", guest("g1"));

        assert!(matches!(
            rooms.resolve("m1", "host", "g1", true),
            Decision::Resolved(_)
        ));
        assert_eq!(rooms.resolve("m1", "host", "g1", true), Decision::NotPending);
        assert_eq!(rooms.resolve("m1", "host", "g1", false), Decision::NotPending);
    }

    #[test]
    fn concurrent_admit_and_deny_have_exactly_one_winner() {
        let rooms = MeetingRegistry::new();
        rooms.open("m1", "host");

        for round in 0..200 {
            let guest_id = format!("g{}", round);
            rooms.request_to_join("m1", guest(&guest_id));

            let admit_side = rooms.clone();
            let deny_side = rooms.clone();
            let (gid_a, gid_d) = (guest_id.clone(), guest_id.clone());

            let t1 = std::thread::spawn(move || admit_side.resolve("m1", "host", &gid_a, true));
            let t2 = std::thread::spawn(move || deny_side.resolve("m1", "host", &gid_d, false));
            let (r1, r2) = (t1.join().unwrap(), t2.join().unwrap());

            let resolved = usize::from(matches!(r1, Decision::Resolved(_)))
                + usize::from(matches!(r2, Decision::Resolved(_)));
            assert_eq!(resolved, 1, "round {}: {:?} / {:?}", round, r1, r2);

            // Queue no longer contains the guest either way
            assert!(rooms
                .waiting_of("m1", "host")
                .unwrap()
                .iter()
                .all(|g| g.user_id != guest_id));
        }
    }

    #[test]
    fn close_is_host_only_and_returns_pending_guests() {
        let rooms = MeetingRegistry::new();
        rooms.open("m1", "host");
        rooms.request_to_join("m1", guest("g1"));

        assert_eq!(rooms.close("m1", "g1"), Err(RoomError::NotHost));
        let pending = rooms.close("m1", "host").unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(rooms.close("m1", "host"), Err(RoomError::NotFound));
    }
}
