//! HTTP source polling pprof-style goroutine endpoints.
//!
//! Fetches `GET http://<target>/debug/pprof/goroutine?debug=2` from every
//! configured target whenever the refresh controller triggers it. The source
//! has no timer of its own.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use goru_types::Snapshot;

use super::{CollectError, Source};
use crate::parser;

/// Default size of the per-trigger fetch pool.
pub const DEFAULT_WORKERS: usize = 5;

/// Collects goroutine dumps from HTTP targets on demand.
pub struct HttpSource {
    targets: Vec<String>,
    client: reqwest::Client,
    workers: usize,
    refresh_tx: mpsc::Sender<()>,
    refresh_rx: Mutex<Option<mpsc::Receiver<()>>>,
    errors: RwLock<HashMap<String, String>>,
}

impl HttpSource {
    /// Create a source for `targets` with the given request timeout and
    /// fetch-pool size.
    pub fn new(
        targets: Vec<String>,
        timeout: Duration,
        workers: usize,
    ) -> Result<Self, reqwest::Error> {
        // Capacity 1: a pending refresh absorbs further triggers.
        let (refresh_tx, refresh_rx) = mpsc::channel(1);
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            targets,
            client,
            workers: workers.max(1),
            refresh_tx,
            refresh_rx: Mutex::new(Some(refresh_rx)),
            errors: RwLock::new(HashMap::new()),
        })
    }

    /// Fan one fetch per target across the worker pool.
    async fn collect_all(&self, token: &CancellationToken, out: &mpsc::Sender<Snapshot>) {
        stream::iter(self.targets.clone())
            .for_each_concurrent(self.workers, |target| {
                let out = out.clone();
                let token = token.clone();
                async move {
                    if token.is_cancelled() {
                        return;
                    }
                    match self.fetch_one(&target).await {
                        Ok(snapshot) => {
                            self.errors.write().remove(&target);
                            tokio::select! {
                                _ = out.send(snapshot) => {}
                                _ = token.cancelled() => {}
                            }
                        }
                        Err(err) => {
                            debug!(host = %target, error = %err, "fetch failed");
                            self.errors.write().insert(target, err.to_string());
                        }
                    }
                }
            })
            .await;
    }

    async fn fetch_one(&self, target: &str) -> Result<Snapshot, CollectError> {
        let url = format!("http://{target}/debug/pprof/goroutine?debug=2");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| CollectError::Http {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(CollectError::Status { status, url });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| CollectError::Http {
                url: url.clone(),
                source,
            })?;

        parser::parse_bytes(&body, target).map_err(|source| CollectError::Parse {
            host: target.to_string(),
            source,
        })
    }
}

#[async_trait]
impl Source for HttpSource {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn collect(
        &self,
        token: CancellationToken,
        out: mpsc::Sender<Snapshot>,
    ) -> Result<(), CollectError> {
        let Some(mut refresh_rx) = self.refresh_rx.lock().take() else {
            return Ok(());
        };

        loop {
            tokio::select! {
                _ = token.cancelled() => return Ok(()),
                trigger = refresh_rx.recv() => match trigger {
                    Some(()) => self.collect_all(&token, &out).await,
                    None => return Ok(()),
                },
            }
        }
    }

    fn trigger_refresh(&self) {
        let _ = self.refresh_tx.try_send(());
    }

    fn errors(&self) -> HashMap<String, String> {
        self.errors.read().clone()
    }

    fn targets(&self) -> Vec<String> {
        self.targets.clone()
    }
}
