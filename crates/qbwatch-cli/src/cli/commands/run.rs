//! `qbwatch run` – the watch daemon: scheduler loop plus event rendering.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use qbwatch_core::config::WatchConfig;
use qbwatch_core::engine::{EngineEvent, WatchEngine};
use qbwatch_core::scheduler::Scheduler;
use qbwatch_core::stats::{format_size, format_speed};

/// Grace period for in-flight tasks after a shutdown signal; no remote
/// command is aborted mid-flight.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

pub async fn run_daemon(cfg: &WatchConfig) -> Result<()> {
    let (events_tx, mut events_rx) = tokio::sync::mpsc::channel::<EngineEvent>(64);
    let engine = Arc::new(WatchEngine::new(cfg.clone(), events_tx)?);

    let mut scheduler = Scheduler::new();
    Arc::clone(&engine).register_tasks(&mut scheduler);

    // The notification sink: renders engine events to stdout and the log.
    let renderer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            render(&event);
        }
    });

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    println!(
        "qbwatch: watching {} (limit {}, thresholds {:?}), Ctrl-C to stop",
        cfg.server.base_url, cfg.max_concurrent, cfg.thresholds
    );
    scheduler.run(shutdown_rx, SHUTDOWN_GRACE).await;

    // Dropping the scheduler releases the task closures and with them the
    // last event senders, so the renderer drains and exits.
    drop(scheduler);
    drop(engine);
    let _ = renderer.await;
    Ok(())
}

fn render(event: &EngineEvent) {
    match event {
        EngineEvent::Completed { torrent, properties } => {
            let elapsed = properties
                .as_ref()
                .map(|p| format_elapsed(p.time_elapsed))
                .unwrap_or_else(|| "?".to_string());
            println!(
                "✅ {} finished: {} in {}, ratio {:.2}",
                torrent.name,
                format_size(torrent.size),
                elapsed,
                torrent.ratio
            );
        }
        EngineEvent::ThresholdReached { threshold, torrent } => {
            println!(
                "📊 {} reached {}%: {} of {}, {} down, ETA {}",
                torrent.name,
                threshold,
                format_size(torrent.downloaded),
                format_size(torrent.size),
                format_speed(torrent.dlspeed),
                format_elapsed(torrent.eta)
            );
        }
        EngineEvent::Summary(summary) => {
            println!("📋 {summary}");
        }
    }
}

fn format_elapsed(secs: i64) -> String {
    if secs <= 0 {
        return "0m".to_string();
    }
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}
