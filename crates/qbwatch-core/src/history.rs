//! Bounded per-torrent time series feeding the chart renderer.
//!
//! Three ring buffers per hash (progress %, download speed in KiB/s,
//! connected peers), each capped at `capacity` samples with FIFO eviction.
//! A series untouched for longer than `ttl` is dropped whole by the hourly
//! sweep.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, SystemTime};

use crate::qbt::Torrent;

/// One data point of a series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp: SystemTime,
    pub value: f64,
}

#[derive(Debug)]
struct Series {
    progress: VecDeque<Sample>,
    speed: VecDeque<Sample>,
    peers: VecDeque<Sample>,
    last_update: SystemTime,
}

impl Series {
    fn new(now: SystemTime) -> Self {
        Self {
            progress: VecDeque::new(),
            speed: VecDeque::new(),
            peers: VecDeque::new(),
            last_update: now,
        }
    }
}

/// Read-only copy of a torrent's series, handed to the chart collaborator.
#[derive(Debug, Clone, Default)]
pub struct SeriesSnapshot {
    pub progress: Vec<Sample>,
    pub speed: Vec<Sample>,
    pub peers: Vec<Sample>,
}

/// All tracked series, keyed by torrent hash.
pub struct HistoryStore {
    capacity: usize,
    ttl: Duration,
    series: HashMap<String, Series>,
}

impl HistoryStore {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl,
            series: HashMap::new(),
        }
    }

    /// Append one sample per buffer for this torrent, evicting the oldest
    /// sample first when a buffer is full.
    pub fn record(&mut self, torrent: &Torrent, now: SystemTime) {
        let series = self
            .series
            .entry(torrent.hash.clone())
            .or_insert_with(|| Series::new(now));
        series.last_update = now;

        push_bounded(
            &mut series.progress,
            self.capacity,
            Sample {
                timestamp: now,
                value: torrent.progress * 100.0,
            },
        );
        push_bounded(
            &mut series.speed,
            self.capacity,
            Sample {
                timestamp: now,
                value: torrent.dlspeed as f64 / 1024.0,
            },
        );
        push_bounded(
            &mut series.peers,
            self.capacity,
            Sample {
                timestamp: now,
                value: f64::from(torrent.peer_count()),
            },
        );
    }

    /// Drop series whose last update is older than the TTL.
    pub fn sweep(&mut self, now: SystemTime) {
        let ttl = self.ttl;
        let before = self.series.len();
        self.series.retain(|_, s| {
            now.duration_since(s.last_update)
                .map(|age| age <= ttl)
                .unwrap_or(true)
        });
        let dropped = before - self.series.len();
        if dropped > 0 {
            tracing::debug!(dropped, "history sweep removed stale series");
        }
    }

    /// Remove one torrent's series (used when it vanishes from the remote).
    pub fn remove(&mut self, hash: &str) {
        self.series.remove(hash);
    }

    pub fn snapshot(&self, hash: &str) -> Option<SeriesSnapshot> {
        self.series.get(hash).map(|s| SeriesSnapshot {
            progress: s.progress.iter().copied().collect(),
            speed: s.speed.iter().copied().collect(),
            peers: s.peers.iter().copied().collect(),
        })
    }

    pub fn tracked(&self) -> usize {
        self.series.len()
    }
}

fn push_bounded(buf: &mut VecDeque<Sample>, capacity: usize, sample: Sample) {
    if buf.len() >= capacity {
        buf.pop_front();
    }
    buf.push_back(sample);
}
