//! Change-set computation between consecutive snapshots of one host.

use goru_types::{ChangeSet, Snapshot};

/// Compare the previous and current snapshot of a host.
///
/// With no previous snapshot every group is `added`. Otherwise groups only
/// in `old` are `removed`, groups only in `new` are `added`, and groups in
/// both with differing counts contribute a signed delta to `updated`.
pub fn compare(old: Option<&Snapshot>, new: &Snapshot) -> ChangeSet {
    let mut changes = ChangeSet::new(&new.host, new.taken_at_ms);

    let Some(old) = old else {
        changes.added = new.groups.values().cloned().collect();
        return changes;
    };

    for (id, old_group) in &old.groups {
        if !new.groups.contains_key(id) {
            changes.removed.push(old_group.clone());
        }
    }

    for (id, new_group) in &new.groups {
        match old.groups.get(id) {
            None => changes.added.push(new_group.clone()),
            Some(old_group) if old_group.count != new_group.count => {
                changes.updated.insert(
                    id.clone(),
                    i64::from(new_group.count) - i64::from(old_group.count),
                );
            }
            Some(_) => {}
        }
    }

    changes
}

/// Aggregate counters over one change set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffStats {
    pub groups_added: usize,
    pub groups_removed: usize,
    pub groups_with_changes: usize,
    pub total_added: u64,
    pub total_removed: u64,
}

impl DiffStats {
    pub fn from_change_set(changes: &ChangeSet) -> Self {
        let mut stats = Self {
            groups_added: changes.added.len(),
            groups_removed: changes.removed.len(),
            groups_with_changes: changes.updated.len(),
            total_added: changes.added.iter().map(|g| u64::from(g.count)).sum(),
            total_removed: changes.removed.iter().map(|g| u64::from(g.count)).sum(),
        };

        for delta in changes.updated.values() {
            if *delta > 0 {
                stats.total_added += *delta as u64;
            } else {
                stats.total_removed += delta.unsigned_abs();
            }
        }

        stats
    }
}
