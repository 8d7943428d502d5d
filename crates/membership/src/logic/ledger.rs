//! Membership de-duplication ledger
//!
//! Process-lifetime record of which users were welcomed and the newest
//! event timestamp accepted per user. Nothing is persisted.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use tracing::trace;

use crate::types::{EventTimestamp, LeaveOrdering};

/// Result of recording a join in the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinDecision {
    /// Timestamp not newer than the user's watermark
    Stale,
    /// Watermark advanced but the user was already onboarded
    AlreadyWelcomed,
    /// User marked welcomed; the caller must dispatch exactly once
    Welcome,
}

/// Result of recording a leave in the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveDecision {
    Stale,
    /// User was welcomed and is now re-armed for onboarding
    Removed,
    NotWelcomed,
}

#[derive(Debug, Default)]
struct LedgerState {
    welcomed_users: HashSet<String>,
    last_seen: HashMap<String, EventTimestamp>,
}

impl LedgerState {
    /// Moves the user's watermark to `ts`, refusing anything not strictly newer.
    fn advance_watermark(&mut self, user_id: &str, ts: &EventTimestamp) -> bool {
        if let Some(previous) = self.last_seen.get(user_id) {
            if ts <= previous {
                return false;
            }
        }
        self.last_seen.insert(user_id.to_string(), ts.clone());
        true
    }
}

/// In-memory ledger guarded by a mutex
///
/// Each `record_*` call makes its whole decision inside one critical section,
/// so concurrent webhook deliveries for the same user cannot both win.
#[derive(Debug, Default)]
pub struct MembershipLedger {
    state: Mutex<LedgerState>,
}

impl MembershipLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_join(&self, user_id: &str, ts: &EventTimestamp) -> JoinDecision {
        let mut state = self.state.lock();

        if !state.advance_watermark(user_id, ts) {
            trace!(user_id, event_ts = %ts, "Join not newer than watermark");
            return JoinDecision::Stale;
        }

        if state.welcomed_users.insert(user_id.to_string()) {
            JoinDecision::Welcome
        } else {
            JoinDecision::AlreadyWelcomed
        }
    }

    pub fn record_leave(
        &self,
        user_id: &str,
        ts: &EventTimestamp,
        ordering: LeaveOrdering,
    ) -> LeaveDecision {
        let mut state = self.state.lock();

        if ordering == LeaveOrdering::Watermarked && !state.advance_watermark(user_id, ts) {
            trace!(user_id, event_ts = %ts, "Leave not newer than watermark");
            return LeaveDecision::Stale;
        }

        if state.welcomed_users.remove(user_id) {
            LeaveDecision::Removed
        } else {
            LeaveDecision::NotWelcomed
        }
    }

    pub fn is_welcomed(&self, user_id: &str) -> bool {
        self.state.lock().welcomed_users.contains(user_id)
    }

    pub fn last_seen(&self, user_id: &str) -> Option<EventTimestamp> {
        self.state.lock().last_seen.get(user_id).cloned()
    }

    pub fn welcomed_count(&self) -> usize {
        self.state.lock().welcomed_users.len()
    }
}
