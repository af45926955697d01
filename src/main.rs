use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

use goru::config::Config;
use goru::orchestrator::{Orchestrator, Refresher};
use goru::source::{FileSource, HttpSource, Source, DEFAULT_WORKERS};
use goru::store::Store;
use goru::{telemetry, tui};

fn main() -> Result<()> {
    let cfg = Config::load()?;
    telemetry::init(&cfg.log.level, cfg.log.json);
    info!(mode = %cfg.mode, "starting goru");

    let runtime = tokio::runtime::Runtime::new().context("building runtime")?;
    let token = CancellationToken::new();
    let store = Arc::new(Store::new());

    let mut sources: Vec<Arc<dyn Source>> = Vec::new();

    if !cfg.targets.is_empty() {
        // Register targets up front so unreachable hosts still show up.
        store.register_hosts(&cfg.targets);

        let http = HttpSource::new(cfg.targets.clone(), cfg.timeout, DEFAULT_WORKERS)
            .context("building HTTP client")?;
        sources.push(Arc::new(http));
        info!(
            targets = cfg.targets.len(),
            interval = ?cfg.interval,
            timeout = ?cfg.timeout,
            "added HTTP source"
        );
    }

    if !cfg.files.is_empty() {
        sources.push(Arc::new(FileSource::new(
            cfg.files.clone(),
            cfg.follow,
            cfg.interval,
        )));
        info!(patterns = cfg.files.len(), follow = cfg.follow, "added file source");
    }

    let orchestrator = Arc::new(Orchestrator::new(Arc::clone(&store), cfg.interval, sources));
    let orchestrator_task = runtime.spawn(Arc::clone(&orchestrator).start(token.clone()));

    // The TUI owns the main thread; the pipeline runs on the runtime.
    let ui_result = if cfg.has_tui() {
        info!("starting TUI");
        tui::run(
            Arc::clone(&store),
            Arc::clone(&orchestrator) as Arc<dyn Refresher>,
            cfg.interval,
        )
    } else {
        info!("web mode not yet implemented; running headless until interrupted");
        runtime.block_on(async {
            tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")
        })
    };

    token.cancel();
    runtime
        .block_on(orchestrator_task)
        .context("joining orchestrator")??;
    ui_result?;

    info!("shutdown complete");
    Ok(())
}
