//! `watch`: initial pass, then rebuild on change until Ctrl+C.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::ProjectConfig;
use crate::core::register_shutdown;
use crate::log;
use crate::orchestrator::Orchestrator;
use crate::watcher::Watcher;

pub fn watch_project(config: &ProjectConfig) -> Result<()> {
    if config.build.clean {
        super::clean::clean_project(config)?;
    }

    let shutdown = register_shutdown().context("shutdown handler already registered")?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_time()
        .thread_name("docweave-watch")
        .build()
        .context("failed to start async runtime")?;

    let result = runtime.block_on(async {
        let settings = config.settings();
        let watcher = Arc::new(Watcher::start(settings.roots.clone())?);
        let orchestrator = Orchestrator::new(settings, watcher)?;

        for root in &orchestrator.settings().roots {
            log!("watch"; "watching {}", root.display());
        }

        let stop = tokio::task::spawn_blocking(move || {
            let _ = shutdown.recv();
        });
        orchestrator
            .run(async move {
                let _ = stop.await;
            })
            .await
    });
    // The stop task may still be parked on the shutdown channel.
    runtime.shutdown_background();
    result
}
