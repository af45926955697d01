//! Snapshot store: latest state per host behind a lock-free read path.
//!
//! All per-host state lives in one immutable bundle referenced by an
//! [`ArcSwap`]. Writers clone the bundle, update their slot, and swap it in
//! via a CAS retry loop; readers load the pointer once and see a consistent
//! view for the whole read. Writes happen at source cadence while reads can
//! run per UI frame, so the O(hosts) copy per write is the cheap side.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use goru_types::{ChangeSet, Snapshot};

/// One store update pushed to subscribers.
///
/// The store itself is the source of truth; an `Update` is a wakeup plus
/// the slots that changed. Subscribers that miss updates re-read current
/// state on the next one they receive.
#[derive(Debug, Clone)]
pub struct Update {
    pub host: String,
    pub snapshot: Option<Arc<Snapshot>>,
    pub change_set: Option<Arc<ChangeSet>>,
    pub error: Option<String>,
}

/// Aggregate store statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub hosts: usize,
    pub total_groups: usize,
    pub total_goroutines: u64,
    pub subscribers: usize,
}

#[derive(Debug, Clone, Default)]
struct StoreData {
    hosts: HashSet<String>,
    snapshots: HashMap<String, Arc<Snapshot>>,
    changes: HashMap<String, Arc<ChangeSet>>,
    errors: HashMap<String, String>,
}

/// Holds the latest snapshot, latest non-empty change set, and error status
/// per host, and notifies subscribers on every committed change.
#[derive(Debug, Default)]
pub struct Store {
    current: ArcSwap<StoreData>,
    subscribers: Mutex<Vec<mpsc::Sender<Update>>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register hosts that will be monitored, so they are visible to
    /// observers before their first snapshot or error arrives.
    pub fn register_hosts(&self, hosts: &[String]) {
        self.current.rcu(|data| {
            let mut next = StoreData::clone(data);
            next.hosts.extend(hosts.iter().cloned());
            next
        });
    }

    /// Commit a snapshot and its change set for the snapshot's host.
    ///
    /// Empty change sets are not retained. Any recorded error for the host
    /// is cleared, since a snapshot just arrived from it.
    pub fn update_snapshot(&self, snapshot: Arc<Snapshot>, change_set: Option<ChangeSet>) {
        let host = snapshot.host.clone();
        let change_set = change_set.filter(|c| !c.is_empty()).map(Arc::new);

        self.current.rcu(|data| {
            let mut next = StoreData::clone(data);
            next.snapshots.insert(host.clone(), Arc::clone(&snapshot));
            if let Some(changes) = &change_set {
                next.changes.insert(host.clone(), Arc::clone(changes));
            }
            next.errors.remove(&host);
            next
        });

        self.notify(Update {
            host,
            snapshot: Some(snapshot),
            change_set,
            error: None,
        });
    }

    /// Record or clear the error status for a host.
    ///
    /// No-op (and no notification) when the status did not change, compared
    /// textually. Passing `None` clears a previously recorded error.
    pub fn update_error(&self, host: &str, error: Option<String>) {
        let current = self.current.load();
        if current.errors.get(host) == error.as_ref() {
            return;
        }

        self.current.rcu(|data| {
            let mut next = StoreData::clone(data);
            match &error {
                Some(message) => {
                    next.errors.insert(host.to_string(), message.clone());
                }
                None => {
                    next.errors.remove(host);
                }
            }
            next
        });

        self.notify(Update {
            host: host.to_string(),
            snapshot: None,
            change_set: None,
            error,
        });
    }

    /// The current snapshot for a host, if one has been committed.
    pub fn snapshot(&self, host: &str) -> Option<Arc<Snapshot>> {
        self.current.load().snapshots.get(host).cloned()
    }

    /// All current snapshots, keyed by host.
    pub fn all_snapshots(&self) -> HashMap<String, Arc<Snapshot>> {
        self.current.load().snapshots.clone()
    }

    /// The most recent non-empty change set for a host.
    pub fn change_set(&self, host: &str) -> Option<Arc<ChangeSet>> {
        self.current.load().changes.get(host).cloned()
    }

    /// All hosts with a currently recorded error.
    pub fn errors(&self) -> HashMap<String, String> {
        self.current.load().errors.clone()
    }

    /// Every registered host, whether or not it has produced anything yet.
    pub fn all_hosts(&self) -> Vec<String> {
        self.current.load().hosts.iter().cloned().collect()
    }

    /// Registered hosts that have neither a snapshot nor an error yet.
    pub fn fetching_hosts(&self) -> HashSet<String> {
        let data = self.current.load();
        data.hosts
            .iter()
            .filter(|host| {
                !data.snapshots.contains_key(*host) && !data.errors.contains_key(*host)
            })
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> Stats {
        let data = self.current.load();

        let mut stats = Stats {
            hosts: data.snapshots.len(),
            subscribers: self.subscribers.lock().len(),
            ..Stats::default()
        };
        for snapshot in data.snapshots.values() {
            stats.total_groups += snapshot.len();
            stats.total_goroutines += snapshot.total_goroutines();
        }
        stats
    }

    /// Register a channel to receive updates.
    pub fn subscribe(&self, tx: mpsc::Sender<Update>) {
        self.subscribers.lock().push(tx);
    }

    /// Remove a previously registered channel.
    pub fn unsubscribe(&self, tx: &mpsc::Sender<Update>) {
        let mut subscribers = self.subscribers.lock();
        if let Some(idx) = subscribers.iter().position(|s| s.same_channel(tx)) {
            subscribers.swap_remove(idx);
        }
    }

    /// Non-blocking fan-out: a subscriber whose channel is full simply
    /// misses this update and re-reads the store on the next one.
    fn notify(&self, update: Update) {
        for tx in self.subscribers.lock().iter() {
            let _ = tx.try_send(update.clone());
        }
    }
}
