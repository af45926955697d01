//! Orchestrator: fans sources in, diffs, commits, and drives refresh.
//!
//! Each source runs in its own task with a bounded snapshot channel. A
//! fan-in task per source forwards into one merged stream consumed by a
//! serial processor, which diffs each snapshot against the previous one for
//! its host and commits both to the store. A refresh controller ticks the
//! sources (or relays manual triggers), and an error monitor reconciles
//! per-target source errors into the store every couple of seconds.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use goru_types::Snapshot;

use crate::diff;
use crate::source::Source;
use crate::store::Store;

/// Capacity of the per-source and merged snapshot channels.
const CHANNEL_CAPACITY: usize = 10;

/// Cadence of the source-error reconciliation task.
const ERROR_MONITOR_INTERVAL: Duration = Duration::from_secs(2);

/// Refresh control surface exposed to observers.
pub trait Refresher: Send + Sync {
    /// Request one collection cycle from every source. Coalescing: at most
    /// one refresh is ever pending.
    fn trigger_refresh(&self);

    /// Pause or resume periodic collection. Manual triggers keep working
    /// while paused.
    fn set_paused(&self, paused: bool);

    fn is_paused(&self) -> bool;
}

/// Coordinates collectors, diff computation, and store updates.
pub struct Orchestrator {
    sources: Vec<Arc<dyn Source>>,
    store: Arc<Store>,
    interval: Duration,
    paused: AtomicBool,
    refresh_tx: mpsc::Sender<()>,
    refresh_rx: Mutex<Option<mpsc::Receiver<()>>>,
    last_snapshots: RwLock<HashMap<String, Arc<Snapshot>>>,
}

impl Orchestrator {
    /// `interval` of zero disables the ticker; only manual triggers drive
    /// collection then.
    pub fn new(store: Arc<Store>, interval: Duration, sources: Vec<Arc<dyn Source>>) -> Self {
        let (refresh_tx, refresh_rx) = mpsc::channel(1);
        Self {
            sources,
            store,
            interval,
            paused: AtomicBool::new(false),
            refresh_tx,
            refresh_rx: Mutex::new(Some(refresh_rx)),
            last_snapshots: RwLock::new(HashMap::new()),
        }
    }

    /// Run until cancellation or the first fatal source error.
    ///
    /// Cancellation is a clean shutdown, not an error.
    pub async fn start(self: Arc<Self>, token: CancellationToken) -> Result<()> {
        if self.sources.is_empty() {
            bail!("no sources configured");
        }

        let (merged_tx, mut merged_rx) = mpsc::channel::<Snapshot>(CHANNEL_CAPACITY);
        let (err_tx, mut err_rx) = mpsc::channel::<anyhow::Error>(self.sources.len());

        for source in &self.sources {
            let (tx, mut rx) = mpsc::channel::<Snapshot>(CHANNEL_CAPACITY);

            let collect_task = {
                let source = Arc::clone(source);
                let token = token.clone();
                let err_tx = err_tx.clone();
                async move {
                    info!(source = source.name(), "source started");
                    if let Err(err) = source.collect(token, tx).await {
                        let name = source.name();
                        let _ = err_tx.send(anyhow!(err).context(format!("source {name}"))).await;
                    }
                    debug!(source = source.name(), "source finished");
                }
            };
            tokio::spawn(collect_task);

            // Fan-in: forward this source's snapshots into the merged stream.
            let fan_in = {
                let merged_tx = merged_tx.clone();
                let token = token.clone();
                async move {
                    while let Some(snapshot) = rx.recv().await {
                        tokio::select! {
                            sent = merged_tx.send(snapshot) => {
                                if sent.is_err() {
                                    return;
                                }
                            }
                            _ = token.cancelled() => return,
                        }
                    }
                }
            };
            tokio::spawn(fan_in);
        }
        // The fan-in tasks hold the only remaining senders; the merged
        // stream closes once every source is done.
        drop(merged_tx);

        let processor = {
            let this = Arc::clone(&self);
            let token = token.clone();
            async move {
                loop {
                    tokio::select! {
                        snapshot = merged_rx.recv() => match snapshot {
                            Some(snapshot) => this.handle_snapshot(snapshot),
                            None => return,
                        },
                        _ = token.cancelled() => return,
                    }
                }
            }
        };
        tokio::spawn(processor);

        tokio::spawn(Arc::clone(&self).monitor_errors(token.clone()));
        tokio::spawn(Arc::clone(&self).refresh_controller(token.clone()));

        drop(err_tx);
        tokio::select! {
            err = err_rx.recv() => match err {
                Some(err) => Err(err),
                // All sources completed without a fatal error.
                None => Ok(()),
            },
            _ = token.cancelled() => Ok(()),
        }
    }

    /// Diff against the previous snapshot for the host, commit, and record
    /// the new snapshot as the next "previous".
    fn handle_snapshot(&self, snapshot: Snapshot) {
        let previous = self.last_snapshots.read().get(&snapshot.host).cloned();
        let changes = diff::compare(previous.as_deref(), &snapshot);

        let snapshot = Arc::new(snapshot);
        self.store.update_snapshot(Arc::clone(&snapshot), Some(changes));
        self.last_snapshots
            .write()
            .insert(snapshot.host.clone(), snapshot);
    }

    /// Reconcile per-target source errors into the store. Sources that do
    /// not report targets are skipped by construction.
    async fn monitor_errors(self: Arc<Self>, token: CancellationToken) {
        let mut ticker = tokio::time::interval(ERROR_MONITOR_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = ticker.tick() => {
                    for source in &self.sources {
                        let errors = source.errors();
                        for target in source.targets() {
                            self.store.update_error(&target, errors.get(&target).cloned());
                        }
                    }
                }
            }
        }
    }

    /// The refresh state machine: an immediate initial trigger unless
    /// paused, then interval ticks (ignored while paused) and manual
    /// triggers (honored even while paused).
    async fn refresh_controller(self: Arc<Self>, token: CancellationToken) {
        let Some(mut refresh_rx) = self.refresh_rx.lock().take() else {
            return;
        };

        if !self.is_paused() {
            self.trigger_all();
        }

        if self.interval.is_zero() {
            loop {
                tokio::select! {
                    _ = token.cancelled() => return,
                    trigger = refresh_rx.recv() => match trigger {
                        Some(()) => self.trigger_all(),
                        None => return,
                    },
                }
            }
        }

        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + self.interval,
            self.interval,
        );
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = ticker.tick() => {
                    if !self.is_paused() {
                        self.trigger_all();
                    }
                }
                trigger = refresh_rx.recv() => match trigger {
                    Some(()) => self.trigger_all(),
                    None => return,
                },
            }
        }
    }

    fn trigger_all(&self) {
        for source in &self.sources {
            source.trigger_refresh();
        }
    }
}

impl Refresher for Orchestrator {
    fn trigger_refresh(&self) {
        let _ = self.refresh_tx.try_send(());
    }

    fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}
