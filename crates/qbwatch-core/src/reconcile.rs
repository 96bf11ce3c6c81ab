//! Snapshot diffing: completion and threshold-crossing detection.
//!
//! Each poll's snapshot is compared against per-torrent ledgers so every
//! event fires exactly once:
//! - the progress ledger remembers the last observed completion fraction;
//! - the threshold ledger remembers which percentage boundaries have
//!   already been notified for each torrent.
//!
//! A torrent seen for the first time only establishes a baseline and never
//! fires events. A progress value lower than the remembered one means the
//! torrent was restarted or re-added under the same hash; its threshold
//! history is reset and the new value accepted as baseline.

use std::collections::{HashMap, HashSet};

use crate::qbt::Torrent;

/// Event computed from one reconciliation pass.
#[derive(Debug, Clone)]
pub enum TorrentEvent {
    /// Progress reached 1.0 for a torrent previously seen below 1.0.
    Completed { torrent: Torrent },
    /// Progress first crossed `threshold` percent.
    ThresholdReached { threshold: u32, torrent: Torrent },
}

impl TorrentEvent {
    pub fn hash(&self) -> &str {
        match self {
            TorrentEvent::Completed { torrent } => &torrent.hash,
            TorrentEvent::ThresholdReached { torrent, .. } => &torrent.hash,
        }
    }
}

/// Result of one pass: events in snapshot order, plus hashes that vanished
/// from the remote and were garbage-collected from the ledgers. The caller
/// is responsible for dropping dependent state (history, limiter) for them.
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    pub events: Vec<TorrentEvent>,
    pub removed: Vec<String>,
}

/// Diffs poll snapshots against remembered state.
pub struct StateReconciler {
    /// Thresholds in ascending order, percent (1–99).
    thresholds: Vec<u32>,
    /// Torrents smaller than this never fire threshold events.
    min_notify_size: u64,
    /// hash → last observed progress.
    progress: HashMap<String, f64>,
    /// hash → thresholds already notified.
    notified: HashMap<String, HashSet<u32>>,
}

impl StateReconciler {
    pub fn new(mut thresholds: Vec<u32>, min_notify_size: u64) -> Self {
        thresholds.sort_unstable();
        thresholds.dedup();
        Self {
            thresholds,
            min_notify_size,
            progress: HashMap::new(),
            notified: HashMap::new(),
        }
    }

    /// Process one snapshot. Ledgers are only touched here, so a failed
    /// fetch (no call) leaves them exactly as the previous pass did.
    pub fn diff(&mut self, snapshot: &[Torrent]) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome::default();

        for torrent in snapshot {
            let prev = match self.progress.get(&torrent.hash) {
                None => {
                    // First observation establishes the baseline.
                    self.progress
                        .insert(torrent.hash.clone(), torrent.progress);
                    continue;
                }
                Some(p) => *p,
            };

            if torrent.progress < prev {
                // Restarted or re-added under the same hash: reset tracking.
                tracing::debug!(
                    hash = %torrent.hash,
                    prev,
                    now = torrent.progress,
                    "progress decreased, resetting ledger"
                );
                self.notified.remove(&torrent.hash);
                self.progress
                    .insert(torrent.hash.clone(), torrent.progress);
                continue;
            }

            if prev < 1.0 && torrent.progress >= 1.0 {
                // Completion supersedes any threshold that would fire in the
                // same pass and clears the threshold history for the hash.
                self.notified.remove(&torrent.hash);
                outcome.events.push(TorrentEvent::Completed {
                    torrent: torrent.clone(),
                });
            } else if torrent.progress < 1.0 && torrent.size >= self.min_notify_size {
                for &threshold in &self.thresholds {
                    let boundary = f64::from(threshold) / 100.0;
                    if torrent.progress >= boundary && prev < boundary {
                        let seen = self.notified.entry(torrent.hash.clone()).or_default();
                        if seen.insert(threshold) {
                            outcome.events.push(TorrentEvent::ThresholdReached {
                                threshold,
                                torrent: torrent.clone(),
                            });
                        }
                    }
                }
            }

            self.progress
                .insert(torrent.hash.clone(), torrent.progress);
        }

        // GC ledger entries for torrents the remote no longer reports.
        let present: HashSet<&str> = snapshot.iter().map(|t| t.hash.as_str()).collect();
        let vanished: Vec<String> = self
            .progress
            .keys()
            .filter(|hash| !present.contains(hash.as_str()))
            .cloned()
            .collect();
        for hash in &vanished {
            self.progress.remove(hash);
            self.notified.remove(hash);
        }
        outcome.removed = vanished;

        outcome
    }

    /// Number of torrents currently tracked (test/introspection aid).
    pub fn tracked(&self) -> usize {
        self.progress.len()
    }
}
