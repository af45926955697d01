//! File source reading goroutine dumps from paths and globs.
//!
//! One-shot mode reads every match once and exits. Follow mode rescans the
//! globs on an interval and re-reads files whose size or mtime changed,
//! always from the start (no offset tracking, so rotation degrades to a
//! plain re-read). Paths ending in `.gz` decompress transparently.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use flate2::read::GzDecoder;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use goru_types::Snapshot;

use super::{CollectError, Source};
use crate::parser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileState {
    size: u64,
    modified: Option<SystemTime>,
}

/// Collects goroutine dumps from files matching configured glob patterns.
pub struct FileSource {
    patterns: Vec<String>,
    follow: bool,
    interval: Duration,
    states: Mutex<HashMap<PathBuf, FileState>>,
}

impl FileSource {
    pub fn new(patterns: Vec<String>, follow: bool, interval: Duration) -> Self {
        Self {
            patterns,
            follow,
            interval,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Expand all patterns, deduplicated by absolute path.
    fn find_files(&self) -> Result<Vec<PathBuf>, CollectError> {
        let mut files = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for pattern in &self.patterns {
            let matches = glob::glob(pattern).map_err(|source| CollectError::Pattern {
                pattern: pattern.clone(),
                source,
            })?;

            for entry in matches.flatten() {
                let Ok(abs) = std::path::absolute(&entry) else {
                    continue;
                };
                if seen.insert(abs.clone()) {
                    files.push(abs);
                }
            }
        }

        Ok(files)
    }

    async fn collect_once(
        &self,
        token: &CancellationToken,
        out: &mpsc::Sender<Snapshot>,
    ) -> Result<(), CollectError> {
        for path in self.find_files()? {
            if token.is_cancelled() {
                return Ok(());
            }
            match read_file(&path).await {
                Ok(snapshot) => {
                    tokio::select! {
                        _ = out.send(snapshot) => {}
                        _ = token.cancelled() => return Ok(()),
                    }
                }
                Err(err) => debug!(path = %path.display(), error = %err, "skipping file"),
            }
        }
        Ok(())
    }

    async fn scan_and_collect(
        &self,
        token: &CancellationToken,
        out: &mpsc::Sender<Snapshot>,
    ) -> Result<(), CollectError> {
        for path in self.find_files()? {
            if token.is_cancelled() {
                return Ok(());
            }
            if !self.file_changed(&path).await {
                continue;
            }
            match read_file(&path).await {
                Ok(snapshot) => {
                    tokio::select! {
                        _ = out.send(snapshot) => {}
                        _ = token.cancelled() => return Ok(()),
                    }
                }
                Err(err) => debug!(path = %path.display(), error = %err, "skipping file"),
            }
        }
        Ok(())
    }

    /// Record the file's (size, mtime) and report whether it moved since
    /// the last observation. Unstattable files count as unchanged.
    async fn file_changed(&self, path: &Path) -> bool {
        let Ok(meta) = tokio::fs::metadata(path).await else {
            return false;
        };
        let state = FileState {
            size: meta.len(),
            modified: meta.modified().ok(),
        };

        let mut states = self.states.lock();
        match states.insert(path.to_path_buf(), state) {
            Some(previous) => previous != state,
            None => true,
        }
    }
}

/// Read one dump file, decompressing `.gz` paths, into a snapshot tagged
/// `file:<basename>`.
async fn read_file(path: &Path) -> Result<Snapshot, CollectError> {
    let io_err = |source| CollectError::Io {
        path: path.display().to_string(),
        source,
    };

    let data = tokio::fs::read(path).await.map_err(io_err)?;

    let basename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let host = format!("file:{basename}");

    let data = if path.extension().is_some_and(|ext| ext == "gz") {
        let mut text = Vec::new();
        GzDecoder::new(&data[..])
            .read_to_end(&mut text)
            .map_err(io_err)?;
        text
    } else {
        data
    };

    parser::parse_bytes(&data, &host).map_err(|source| CollectError::Parse { host, source })
}

#[async_trait]
impl Source for FileSource {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn collect(
        &self,
        token: CancellationToken,
        out: mpsc::Sender<Snapshot>,
    ) -> Result<(), CollectError> {
        if !self.follow {
            return self.collect_once(&token, &out).await;
        }

        // Follow mode drives itself on the rescan interval.
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = token.cancelled() => return Ok(()),
                _ = ticker.tick() => self.scan_and_collect(&token, &out).await?,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use flate2::write::GzEncoder;
    use flate2::Compression;

    const DUMP: &str = "goroutine 1 [running]:\nmain.main()\n\t/app/main.go:10 +0x20\n";

    fn write_dump(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    async fn collect_all(source: FileSource) -> Vec<Snapshot> {
        let (tx, mut rx) = mpsc::channel(16);
        let token = CancellationToken::new();
        source.collect(token, tx).await.unwrap();

        let mut snapshots = Vec::new();
        while let Ok(snapshot) = rx.try_recv() {
            snapshots.push(snapshot);
        }
        snapshots
    }

    #[tokio::test]
    async fn one_shot_reads_each_match_once() {
        let dir = tempfile::tempdir().unwrap();
        write_dump(dir.path(), "a.txt", DUMP);
        write_dump(dir.path(), "b.txt", DUMP);

        let pattern = dir.path().join("*.txt").to_string_lossy().into_owned();
        let snapshots = collect_all(FileSource::new(
            vec![pattern],
            false,
            Duration::from_millis(50),
        ))
        .await;

        assert_eq!(snapshots.len(), 2);
        let mut hosts: Vec<_> = snapshots.iter().map(|s| s.host.clone()).collect();
        hosts.sort();
        assert_eq!(hosts, vec!["file:a.txt", "file:b.txt"]);
        assert_eq!(snapshots[0].total_goroutines(), 1);
    }

    #[tokio::test]
    async fn overlapping_patterns_deduplicate() {
        let dir = tempfile::tempdir().unwrap();
        write_dump(dir.path(), "a.txt", DUMP);

        let exact = dir.path().join("a.txt").to_string_lossy().into_owned();
        let wild = dir.path().join("*.txt").to_string_lossy().into_owned();
        let snapshots = collect_all(FileSource::new(
            vec![exact, wild],
            false,
            Duration::from_millis(50),
        ))
        .await;

        assert_eq!(snapshots.len(), 1);
    }

    #[tokio::test]
    async fn gzip_files_decompress_transparently() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.txt.gz");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(DUMP.as_bytes()).unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();

        let snapshots = collect_all(FileSource::new(
            vec![path.to_string_lossy().into_owned()],
            false,
            Duration::from_millis(50),
        ))
        .await;

        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].host, "file:dump.txt.gz");
        assert_eq!(snapshots[0].total_goroutines(), 1);
    }

    #[tokio::test]
    async fn corrupt_gzip_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_dump(dir.path(), "bad.gz", "definitely not gzip");

        let pattern = dir.path().join("*.gz").to_string_lossy().into_owned();
        let snapshots = collect_all(FileSource::new(
            vec![pattern],
            false,
            Duration::from_millis(50),
        ))
        .await;

        assert!(snapshots.is_empty());
    }

    #[tokio::test]
    async fn glob_matching_nothing_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = dir.path().join("*.txt").to_string_lossy().into_owned();

        let snapshots =
            collect_all(FileSource::new(vec![pattern], false, Duration::from_millis(50))).await;
        assert!(snapshots.is_empty());
    }

    #[tokio::test]
    async fn follow_mode_reemits_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_dump(dir.path(), "a.txt", DUMP);
        let pattern = dir.path().join("*.txt").to_string_lossy().into_owned();

        let source = FileSource::new(vec![pattern], true, Duration::from_millis(20));
        let (tx, mut rx) = mpsc::channel(16);
        let token = CancellationToken::new();
        let handle = {
            let token = token.clone();
            tokio::spawn(async move { source.collect(token, tx).await })
        };

        let first = rx.recv().await.expect("initial snapshot");
        assert_eq!(first.total_goroutines(), 1);

        // Grow the file; the next rescan should re-read it whole.
        std::fs::write(&path, format!("{DUMP}\n{DUMP}")).unwrap();
        let second = rx.recv().await.expect("snapshot after change");
        assert_eq!(second.total_goroutines(), 2);

        token.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn follow_mode_skips_unchanged_files() {
        let dir = tempfile::tempdir().unwrap();
        write_dump(dir.path(), "a.txt", DUMP);
        let pattern = dir.path().join("*.txt").to_string_lossy().into_owned();

        let source = FileSource::new(vec![pattern], true, Duration::from_millis(10));
        let (tx, mut rx) = mpsc::channel(16);
        let token = CancellationToken::new();
        let handle = {
            let token = token.clone();
            tokio::spawn(async move { source.collect(token, tx).await })
        };

        let _first = rx.recv().await.expect("initial snapshot");

        // Several rescan intervals with no change: nothing new arrives.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());

        token.cancel();
        handle.await.unwrap().unwrap();
    }
}
