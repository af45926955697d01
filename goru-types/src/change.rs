//! ChangeSet - the delta between two consecutive snapshots of one host.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{Group, GroupId};

/// Groups that appeared, disappeared, or changed size between the previous
/// and the current snapshot of a host.
///
/// `updated` maps a surviving group to its signed count delta; entries are
/// always non-zero and never overlap with `added` or `removed`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub host: String,
    pub timestamp_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub added: Vec<Group>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed: Vec<Group>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub updated: HashMap<GroupId, i64>,
}

impl ChangeSet {
    pub fn new(host: impl Into<String>, timestamp_ms: u64) -> Self {
        Self {
            host: host.into(),
            timestamp_ms,
            added: Vec::new(),
            removed: Vec::new(),
            updated: HashMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.updated.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GoroutineState, Group, StackFrame, StackTrace};

    #[test]
    fn new_change_set_is_empty() {
        assert!(ChangeSet::new("h1", 0).is_empty());
    }

    #[test]
    fn any_field_makes_it_non_empty() {
        let group = Group::new(
            GoroutineState::Running,
            StackTrace::from(vec![StackFrame::new("main.main", "", 0)]),
            None,
            None,
        );

        let mut added = ChangeSet::new("h1", 0);
        added.added.push(group.clone());
        assert!(!added.is_empty());

        let mut removed = ChangeSet::new("h1", 0);
        removed.removed.push(group.clone());
        assert!(!removed.is_empty());

        let mut updated = ChangeSet::new("h1", 0);
        updated.updated.insert(group.id.clone(), 3);
        assert!(!updated.is_empty());
    }
}
