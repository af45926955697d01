//! Snapshot - the immutable, timestamped view of one host's goroutines.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::{GoroutineState, Group, GroupId, StackFrame, StackTrace};

/// A point-in-time view of all goroutines on one host, folded into groups.
///
/// Snapshots are built up by a parser via [`Snapshot::add_goroutine`] and
/// are immutable once published to the store. Goroutines sharing a
/// (state, normalized trace) fingerprint land in the same [`Group`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub host: String,
    pub taken_at_ms: u64,
    pub groups: HashMap<GroupId, Group>,
}

impl Snapshot {
    /// Create an empty snapshot stamped with the current wall clock.
    pub fn new(host: impl Into<String>) -> Self {
        Self::with_timestamp(host, current_timestamp_ms())
    }

    /// Create an empty snapshot with a specific timestamp.
    pub fn with_timestamp(host: impl Into<String>, taken_at_ms: u64) -> Self {
        Self {
            host: host.into(),
            taken_at_ms,
            groups: HashMap::new(),
        }
    }

    /// Fold one goroutine into the snapshot.
    ///
    /// An existing group with the same fingerprint gains a count (and the
    /// wait duration, when present); otherwise a new group is inserted.
    /// The first goroutine of a group decides its `created_by`.
    pub fn add_goroutine(
        &mut self,
        state: GoroutineState,
        trace: StackTrace,
        wait_duration: Option<String>,
        created_by: Option<StackFrame>,
    ) {
        let id = Group::fingerprint(state, &trace);
        match self.groups.get_mut(&id) {
            Some(existing) => {
                existing.count += 1;
                if let Some(wait) = wait_duration {
                    existing.wait_durations.push(wait);
                }
            }
            None => {
                self.groups
                    .insert(id, Group::new(state, trace, wait_duration, created_by));
            }
        }
    }

    /// Total goroutines across all groups; equals the number of records the
    /// source dump contained.
    pub fn total_goroutines(&self) -> u64 {
        self.groups.values().map(|g| u64::from(g.count)).sum()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Current timestamp in milliseconds since the Unix epoch.
fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trace(funcs: &[&str]) -> StackTrace {
        StackTrace::from(
            funcs
                .iter()
                .map(|f| StackFrame::new(*f, "/app/main.go", 10))
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn add_goroutine_folds_identical_stacks() {
        let mut s = Snapshot::with_timestamp("h1", 1000);

        s.add_goroutine(
            GoroutineState::Blocked,
            trace(&["main.worker", "main.main"]),
            Some("5 minutes".to_string()),
            None,
        );
        s.add_goroutine(
            GoroutineState::Blocked,
            trace(&["main.worker", "main.main"]),
            Some("5 minutes".to_string()),
            None,
        );

        assert_eq!(s.len(), 1);
        let group = s.groups.values().next().unwrap();
        assert_eq!(group.count, 2);
        assert_eq!(group.wait_durations, vec!["5 minutes", "5 minutes"]);
        assert_eq!(s.total_goroutines(), 2);
    }

    #[test]
    fn distinct_states_produce_distinct_groups() {
        let mut s = Snapshot::with_timestamp("h1", 1000);
        s.add_goroutine(GoroutineState::Running, trace(&["main.main"]), None, None);
        s.add_goroutine(GoroutineState::Waiting, trace(&["main.main"]), None, None);

        assert_eq!(s.len(), 2);
        assert_eq!(s.total_goroutines(), 2);
    }

    #[test]
    fn created_by_is_kept_from_first_goroutine() {
        let mut s = Snapshot::with_timestamp("h1", 1000);
        let spawner = StackFrame::new("main.spawn", "/app/main.go", 5);

        s.add_goroutine(
            GoroutineState::Blocked,
            trace(&["main.worker"]),
            None,
            Some(spawner.clone()),
        );
        s.add_goroutine(
            GoroutineState::Blocked,
            trace(&["main.worker"]),
            None,
            Some(StackFrame::new("main.other", "/app/other.go", 9)),
        );

        let group = s.groups.values().next().unwrap();
        assert_eq!(group.created_by.as_ref(), Some(&spawner));
    }

    #[test]
    fn empty_snapshot() {
        let s = Snapshot::with_timestamp("h1", 0);
        assert!(s.is_empty());
        assert_eq!(s.total_goroutines(), 0);
    }

    #[test]
    fn new_stamps_current_time() {
        let before = current_timestamp_ms();
        let s = Snapshot::new("h1");
        let after = current_timestamp_ms();

        assert!(s.taken_at_ms >= before);
        assert!(s.taken_at_ms <= after);
    }

    #[test]
    fn serde_roundtrip() {
        let mut s = Snapshot::with_timestamp("h1", 1000);
        s.add_goroutine(
            GoroutineState::Running,
            trace(&["main.main"]),
            None,
            None,
        );

        let json = serde_json::to_string(&s).unwrap();
        let parsed: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(s, parsed);
    }
}
