//! The reconciliation engine: owns all mutable engine state and the task
//! bodies the scheduler drives.
//!
//! All shared maps (ledgers, active set, queue, history) live in one
//! `EngineState` behind a single coarse mutex, and the session manager sits
//! behind its own; tasks take the locks only around the synchronous
//! in-memory work and the short command phases, so two tasks dispatched in
//! the same tick cannot interleave their critical sections.

use std::sync::Arc;
use std::time::SystemTime;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, Mutex};

use crate::config::WatchConfig;
use crate::history::{HistoryStore, SeriesSnapshot};
use crate::limiter::ConcurrencyLimiter;
use crate::qbt::{QbtClient, SessionToken, Torrent, TorrentProperties};
use crate::reconcile::{StateReconciler, TorrentEvent};
use crate::scheduler::{Cadence, Scheduler};
use crate::session::SessionManager;
use crate::stats::TransferSummary;

/// Event delivered to the notification sink (chat layer, log renderer, …).
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A torrent finished downloading. `properties` is best-effort detail;
    /// a failed properties fetch never suppresses the event.
    Completed {
        torrent: Torrent,
        properties: Option<TorrentProperties>,
    },
    /// A torrent first crossed a progress threshold.
    ThresholdReached { threshold: u32, torrent: Torrent },
    /// Periodic aggregate of the whole snapshot.
    Summary(TransferSummary),
}

/// Mutable maps shared by the periodic tasks, under one lock.
struct EngineState {
    reconciler: StateReconciler,
    limiter: ConcurrencyLimiter,
    history: HistoryStore,
}

/// Ties session, client, state and the event channel together. Cloned into
/// each scheduled task via `Arc`.
pub struct WatchEngine {
    config: WatchConfig,
    client: QbtClient,
    session: Mutex<SessionManager>,
    state: Mutex<EngineState>,
    events: mpsc::Sender<EngineEvent>,
}

impl WatchEngine {
    /// Build an engine from validated configuration. Fails fast on a
    /// structurally invalid config, before any task runs.
    pub fn new(config: WatchConfig, events: mpsc::Sender<EngineEvent>) -> Result<Self> {
        config.validate()?;
        let client = QbtClient::new(&config.server.base_url)?;
        let session = SessionManager::new(
            client.clone(),
            config.server.clone(),
            config.login_retry_limit,
            std::time::Duration::from_secs(config.login_retry_base_secs),
        );
        let state = EngineState {
            reconciler: StateReconciler::new(config.thresholds.clone(), config.min_notify_size),
            limiter: ConcurrencyLimiter::new(config.max_concurrent),
            history: HistoryStore::new(config.history_capacity, config.history_ttl()),
        };
        Ok(Self {
            config,
            client,
            session: Mutex::new(session),
            state: Mutex::new(state),
            events,
        })
    }

    /// Register the periodic tasks on a scheduler.
    pub fn register_tasks(self: Arc<Self>, scheduler: &mut Scheduler) {
        let cadences = self.config.cadences.clone();

        let engine = Arc::clone(&self);
        scheduler.register(
            "reconcile",
            Cadence::from_secs(cadences.reconcile_secs),
            move || {
                let engine = Arc::clone(&engine);
                async move { engine.poll_and_reconcile().await }
            },
        );

        let engine = Arc::clone(&self);
        scheduler.register(
            "limiter",
            Cadence::from_secs(cadences.limiter_secs),
            move || {
                let engine = Arc::clone(&engine);
                async move { engine.enforce_limits().await }
            },
        );

        let engine = Arc::clone(&self);
        scheduler.register(
            "session",
            Cadence::from_secs(cadences.session_secs),
            move || {
                let engine = Arc::clone(&engine);
                async move { engine.check_session().await }
            },
        );

        let engine = Arc::clone(&self);
        scheduler.register(
            "history-sweep",
            Cadence::from_secs(cadences.sweep_secs),
            move || {
                let engine = Arc::clone(&engine);
                async move { engine.sweep_history().await }
            },
        );

        let engine = Arc::clone(&self);
        scheduler.register(
            "summary",
            Cadence::from_secs(cadences.summary_secs),
            move || {
                let engine = Arc::clone(&engine);
                async move { engine.emit_summary().await }
            },
        );
    }

    async fn valid_token(&self) -> Result<SessionToken> {
        let mut session = self.session.lock().await;
        session
            .ensure_valid()
            .await
            .context("could not establish a session")
    }

    /// Poll the snapshot, diff it against the ledgers, emit events, record
    /// history. A fetch failure aborts the pass before any ledger changes.
    pub async fn poll_and_reconcile(&self) -> Result<()> {
        let token = self.valid_token().await?;
        let snapshot = self
            .client
            .torrents(&token)
            .await
            .context("snapshot fetch failed")?;

        let now = SystemTime::now();
        let (events, resume) = {
            let mut state = self.state.lock().await;
            let outcome = state.reconciler.diff(&snapshot);
            for hash in &outcome.removed {
                state.history.remove(hash);
                state.limiter.forget(hash);
            }
            for torrent in snapshot.iter().filter(|t| t.state.is_downloading_class()) {
                state.history.record(torrent, now);
            }
            // Completions free slots immediately; the freed slots go to the
            // queue head without waiting for the next limiter pass.
            let mut resume = Vec::new();
            for event in &outcome.events {
                if let TorrentEvent::Completed { torrent } = event {
                    resume.extend(state.limiter.release(&torrent.hash));
                }
            }
            (outcome.events, resume)
        };

        if !resume.is_empty() {
            self.issue_resume(&token, &resume).await;
        }

        for event in events {
            let engine_event = match event {
                TorrentEvent::Completed { torrent } => {
                    let properties = match self.client.properties(&token, &torrent.hash).await {
                        Ok(p) => Some(p),
                        Err(err) => {
                            tracing::warn!(
                                hash = %torrent.hash,
                                error = %err,
                                "properties fetch failed, sending completion without detail"
                            );
                            None
                        }
                    };
                    tracing::info!(name = %torrent.name, "torrent completed");
                    EngineEvent::Completed {
                        torrent,
                        properties,
                    }
                }
                TorrentEvent::ThresholdReached { threshold, torrent } => {
                    tracing::info!(name = %torrent.name, threshold, "progress threshold crossed");
                    EngineEvent::ThresholdReached { threshold, torrent }
                }
            };
            self.emit(engine_event).await;
        }

        Ok(())
    }

    /// One admission-control pass: pause overflow, resume queued torrents
    /// into free slots.
    pub async fn enforce_limits(&self) -> Result<()> {
        let token = self.valid_token().await?;
        let snapshot = self
            .client
            .torrents(&token)
            .await
            .context("snapshot fetch failed")?;

        let plan = {
            let mut state = self.state.lock().await;
            state.limiter.rebalance(&snapshot)
        };

        if !plan.pause.is_empty() {
            tracing::info!(
                count = plan.pause.len(),
                limit = self.config.max_concurrent,
                "pausing overflow torrents"
            );
            if let Err(err) = self.client.pause(&token, &plan.pause).await {
                tracing::warn!(hashes = ?plan.pause, error = %err, "pause command failed");
            }
        }
        if !plan.resume.is_empty() {
            self.issue_resume(&token, &plan.resume).await;
        }
        Ok(())
    }

    /// Resume one hash at a time so a single rejection cannot sink the batch.
    async fn issue_resume(&self, token: &SessionToken, hashes: &[String]) {
        for hash in hashes {
            match self
                .client
                .resume(token, std::slice::from_ref(hash))
                .await
            {
                Ok(()) => tracing::info!(%hash, "resumed from queue"),
                Err(err) => tracing::warn!(%hash, error = %err, "resume command failed"),
            }
        }
    }

    /// Liveness probe; reconnects with backoff when the session expired.
    pub async fn check_session(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        if session.check_liveness().await {
            return Ok(());
        }
        session.invalidate();
        session
            .ensure_valid()
            .await
            .context("session reconnect failed")?;
        Ok(())
    }

    /// Hourly TTL sweep of the history series.
    pub async fn sweep_history(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.history.sweep(SystemTime::now());
        Ok(())
    }

    /// Compute and emit a transfer summary from a fresh snapshot.
    pub async fn emit_summary(&self) -> Result<()> {
        let token = self.valid_token().await?;
        let snapshot = self
            .client
            .torrents(&token)
            .await
            .context("snapshot fetch failed")?;
        self.emit(EngineEvent::Summary(TransferSummary::from_snapshot(&snapshot)))
            .await;
        Ok(())
    }

    async fn emit(&self, event: EngineEvent) {
        if self.events.send(event).await.is_err() {
            tracing::warn!("event receiver dropped, notification lost");
        }
    }

    /// Hashes currently holding a download slot.
    pub async fn active_set(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state.limiter.active().iter().cloned().collect()
    }

    /// Hashes waiting for a slot, FIFO.
    pub async fn queued(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state.limiter.queued()
    }

    /// Read access for the chart-rendering collaborator.
    pub async fn history_snapshot(&self, hash: &str) -> Option<SeriesSnapshot> {
        let state = self.state.lock().await;
        state.history.snapshot(hash)
    }
}
