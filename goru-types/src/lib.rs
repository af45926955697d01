//! # goru-types
//!
//! Core types for goroutine-dump exploration. This crate defines the schema
//! shared by the parser, the diff engine, the snapshot store, and any
//! observer front end: stack frames and traces, goroutine states, folded
//! groups with stable fingerprints, per-host snapshots, and change sets.
//!
//! ## Design Goals
//!
//! - **Stable group identity**: a group's fingerprint depends only on its
//!   state and normalized stack trace, so the same logical group keeps the
//!   same ID across samples.
//! - **Immutable once published**: snapshots are built up by the parser and
//!   never mutated afterwards; consumers share them read-only.
//! - **Serde throughout**: every type serializes to JSON for export and for
//!   future non-terminal observers.
//!
//! ## Example
//!
//! ```rust
//! use goru_types::{GoroutineState, Snapshot, StackFrame, StackTrace};
//!
//! let mut snapshot = Snapshot::new("app:6060");
//! let trace = StackTrace::from(vec![StackFrame::new("main.main", "/app/main.go", 10)]);
//! snapshot.add_goroutine(GoroutineState::Running, trace, None, None);
//!
//! assert_eq!(snapshot.total_goroutines(), 1);
//! ```

mod change;
mod group;
mod snapshot;
mod trace;

pub use change::*;
pub use group::*;
pub use snapshot::*;
pub use trace::*;
