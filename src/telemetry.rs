//! Logging setup.
//!
//! Logs go to stderr so they never fight the TUI for stdout. `RUST_LOG`
//! overrides the configured level when set.

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber with the configured level and
/// format. Later calls are no-ops (first subscriber wins), which keeps
/// repeated initialization in tests harmless.
pub fn init(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("goru={level},goru_types={level}")));

    if json {
        let _ = tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .compact()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }
}
