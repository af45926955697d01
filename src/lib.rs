//! # goru
//!
//! A multi-host goroutine-dump explorer. goru continuously acquires runtime
//! stack-trace dumps from target processes (via their pprof-style HTTP
//! endpoint, or from dump files on disk), folds each dump into groups of
//! goroutines sharing a state and a normalized stack, diffs every sample
//! against the previous one per host, and publishes state plus deltas to
//! observers through a copy-on-write store with push subscriptions.
//!
//! The pipeline, leaves first:
//!
//! 1. [`source`] produces raw dump byte streams per host.
//! 2. [`parser`] turns each stream into a [`goru_types::Snapshot`].
//! 3. [`orchestrator`] merges the source streams, computes a
//!    [`goru_types::ChangeSet`] via [`diff`], and commits into the store.
//! 4. [`store`] serves lock-free reads and push notifications.
//! 5. [`tui`] renders the store interactively.

pub mod config;
pub mod diff;
pub mod duration;
pub mod orchestrator;
pub mod parser;
pub mod source;
pub mod store;
pub mod telemetry;
pub mod tui;

pub use goru_types;
