//! Download admission control: at most `max_concurrent` torrents transferring.
//!
//! The limiter is a pure planner: [`ConcurrencyLimiter::rebalance`] and
//! [`ConcurrencyLimiter::release`] return the pause/resume commands to issue;
//! the engine owns the actual Web API calls so command failures can be
//! logged per batch without touching this state machine.
//!
//! Displaced torrents go to a FIFO queue and are resumed head-first as
//! slots free. An id is never in the active set and the queue at once.

use std::collections::{HashSet, VecDeque};

use crate::qbt::Torrent;

/// Commands produced by one rebalancing pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RebalancePlan {
    /// Hashes to pause, in displacement order (least-progressed last).
    pub pause: Vec<String>,
    /// Queue heads to resume into freed slots, FIFO.
    pub resume: Vec<String>,
}

/// Tracks which torrents hold a download slot and which are waiting.
pub struct ConcurrencyLimiter {
    max_concurrent: usize,
    active: HashSet<String>,
    queue: VecDeque<String>,
}

impl ConcurrencyLimiter {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
            active: HashSet::new(),
            queue: VecDeque::new(),
        }
    }

    /// Idempotent pass over a snapshot.
    ///
    /// Downloading-class torrents keep slots by descending progress (stable
    /// on ties, so snapshot order breaks them); the remainder is paused and
    /// queued in displacement order, skipping ids already waiting. Queue
    /// entries that are downloading again, or gone from the snapshot, are
    /// dropped before planning. Freed slots are refilled from the queue head.
    pub fn rebalance(&mut self, snapshot: &[Torrent]) -> RebalancePlan {
        let mut downloading: Vec<&Torrent> = snapshot
            .iter()
            .filter(|t| t.state.is_downloading_class())
            .collect();

        let present: HashSet<&str> = snapshot.iter().map(|t| t.hash.as_str()).collect();
        let downloading_ids: HashSet<&str> =
            downloading.iter().map(|t| t.hash.as_str()).collect();
        self.queue.retain(|hash| {
            present.contains(hash.as_str()) && !downloading_ids.contains(hash.as_str())
        });

        let mut plan = RebalancePlan::default();

        if downloading.len() <= self.max_concurrent {
            self.active = downloading.iter().map(|t| t.hash.clone()).collect();
        } else {
            // Furthest-along torrents keep their slots, minimizing wasted
            // partial work; stable sort preserves snapshot order on ties.
            downloading.sort_by(|a, b| {
                b.progress
                    .partial_cmp(&a.progress)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            let (keep, displaced) = downloading.split_at(self.max_concurrent);
            self.active = keep.iter().map(|t| t.hash.clone()).collect();
            for t in displaced {
                plan.pause.push(t.hash.clone());
                if !self.queue.contains(&t.hash) {
                    self.queue.push_back(t.hash.clone());
                }
            }
        }

        plan.resume = self.fill_slots();
        plan
    }

    /// A slot holder completed or disappeared; refill from the queue.
    /// Returns the hashes to resume.
    pub fn release(&mut self, hash: &str) -> Vec<String> {
        self.active.remove(hash);
        self.fill_slots()
    }

    /// Drop every trace of a hash (vanished from the remote).
    pub fn forget(&mut self, hash: &str) {
        self.active.remove(hash);
        self.queue.retain(|h| h != hash);
    }

    fn fill_slots(&mut self) -> Vec<String> {
        let mut resumed = Vec::new();
        while self.active.len() < self.max_concurrent {
            let Some(hash) = self.queue.pop_front() else {
                break;
            };
            self.active.insert(hash.clone());
            resumed.push(hash);
        }
        resumed
    }

    pub fn active(&self) -> &HashSet<String> {
        &self.active
    }

    /// Waiting hashes in FIFO order.
    pub fn queued(&self) -> Vec<String> {
        self.queue.iter().cloned().collect()
    }
}
