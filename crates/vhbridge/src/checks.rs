use std::collections::{BTreeSet, HashSet};

/// Where the goal report stands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GoalState {
    #[default]
    NotReached,
    /// Reached while the transport could not take it.
    Pending,
    /// On the outbound queue, not yet written to the socket.
    Queued,
    Sent,
}

/// Which locations have been reached and which of those made it onto the wire.
///
/// A location moves `pending -> in flight -> sent`. In flight means handed to
/// the socket task but not yet written; if the write never happens the id goes
/// back to pending. Once sent it is never queued again.
#[derive(Debug, Default)]
pub struct CheckLedger {
    sent: HashSet<i64>,
    in_flight: HashSet<i64>,
    pending: BTreeSet<i64>,
    goal: GoalState,
}

impl CheckLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `id` as reached. False if it was already known.
    pub fn record(&mut self, id: i64) -> bool {
        if self.sent.contains(&id) || self.in_flight.contains(&id) {
            return false;
        }
        self.pending.insert(id)
    }

    pub fn is_checked(&self, id: i64) -> bool {
        self.sent.contains(&id) || self.in_flight.contains(&id) || self.pending.contains(&id)
    }

    /// Move everything pending to in flight.
    pub fn take_pending(&mut self) -> Vec<i64> {
        let ids: Vec<i64> = std::mem::take(&mut self.pending).into_iter().collect();
        self.in_flight.extend(ids.iter().copied());
        ids
    }

    /// Put ids back after a failed or abandoned send.
    pub fn restore(&mut self, ids: &[i64]) {
        for id in ids {
            self.in_flight.remove(id);
            if !self.sent.contains(id) {
                self.pending.insert(*id);
            }
        }
    }

    pub fn mark_sent(&mut self, ids: &[i64]) {
        for id in ids {
            self.pending.remove(id);
            self.in_flight.remove(id);
            self.sent.insert(*id);
        }
    }

    pub fn sent_count(&self) -> usize {
        self.sent.len()
    }

    /// Reached but not yet written, queued or not.
    pub fn pending_count(&self) -> usize {
        self.pending.len() + self.in_flight.len()
    }

    pub fn goal(&self) -> GoalState {
        self.goal
    }

    /// True only on the first call.
    pub fn reach_goal(&mut self) -> bool {
        if self.goal != GoalState::NotReached {
            return false;
        }
        self.goal = GoalState::Pending;
        true
    }

    /// Pending -> queued. True if the goal should go out now.
    pub fn take_goal(&mut self) -> bool {
        if self.goal != GoalState::Pending {
            return false;
        }
        self.goal = GoalState::Queued;
        true
    }

    pub fn restore_goal(&mut self) {
        if self.goal == GoalState::Queued {
            self.goal = GoalState::Pending;
        }
    }

    pub fn mark_goal_sent(&mut self) {
        self.goal = GoalState::Sent;
    }
}

/// Split ids into the 32-bit values the wire takes and those that don't fit.
pub fn wire_ids(ids: &[i64]) -> (Vec<(i64, i32)>, Vec<i64>) {
    let mut ok = Vec::with_capacity(ids.len());
    let mut rejected = Vec::new();
    for id in ids {
        match i32::try_from(*id) {
            Ok(w) => ok.push((*id, w)),
            Err(_) => rejected.push(*id),
        }
    }
    (ok, rejected)
}
