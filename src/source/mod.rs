//! Snapshot sources feeding the orchestrator.
//!
//! A source runs under a cancellation scope and emits parsed snapshots into
//! an output channel; dropping the sender closes the stream when the source
//! exits. Optional capabilities (manual refresh, per-target health) have
//! inert defaults, so the orchestrator can probe every source uniformly.

mod file;
mod http;

pub use file::FileSource;
pub use http::{HttpSource, DEFAULT_WORKERS};

use std::collections::HashMap;
use std::io;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use goru_types::Snapshot;

/// Errors raised while collecting a dump from one target.
#[derive(Debug, Error)]
pub enum CollectError {
    /// HTTP request failed (connect, timeout, body read).
    #[error("fetching {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Target answered with a non-200 status.
    #[error("unexpected status {status} from {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    /// File could not be read or decompressed.
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Dump stream failed while being parsed.
    #[error("parsing dump from {host}: {source}")]
    Parse {
        host: String,
        #[source]
        source: io::Error,
    },

    /// A configured glob pattern is invalid.
    #[error("glob pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

/// A producer of goroutine snapshots.
#[async_trait]
pub trait Source: Send + Sync {
    /// Logical source name, used in logs.
    fn name(&self) -> &'static str;

    /// Run the collection loop until the token fires or the source is done.
    ///
    /// Snapshots go to `out`; the channel closes when this returns. An `Err`
    /// is a fatal source failure; per-target trouble is recorded in
    /// [`Source::errors`] instead.
    async fn collect(
        &self,
        token: CancellationToken,
        out: mpsc::Sender<Snapshot>,
    ) -> Result<(), CollectError>;

    /// Request one collection cycle. Coalescing: a pending trigger absorbs
    /// further ones. Default is a no-op for sources on their own schedule.
    fn trigger_refresh(&self) {}

    /// Most recent failure per target; empty for sources that do not track
    /// per-target health.
    fn errors(&self) -> HashMap<String, String> {
        HashMap::new()
    }

    /// Targets managed by this source, for store-side error reconciliation.
    fn targets(&self) -> Vec<String> {
        Vec::new()
    }
}
