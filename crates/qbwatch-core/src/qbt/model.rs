//! Data model for `/api/v2/torrents/*` responses.

use serde::Deserialize;

/// Torrent states reported by the Web API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum TorrentState {
    #[serde(rename = "downloading")]
    Downloading,
    #[serde(rename = "stalledDL")]
    StalledDl,
    #[serde(rename = "metaDL")]
    MetaDl,
    #[serde(rename = "forcedDL")]
    ForcedDl,
    #[serde(rename = "allocating")]
    Allocating,
    #[serde(rename = "uploading")]
    Uploading,
    #[serde(rename = "stalledUP")]
    StalledUp,
    #[serde(rename = "forcedUP")]
    ForcedUp,
    #[serde(rename = "pausedDL")]
    PausedDl,
    #[serde(rename = "pausedUP")]
    PausedUp,
    #[serde(rename = "queuedDL")]
    QueuedDl,
    #[serde(rename = "queuedUP")]
    QueuedUp,
    #[serde(rename = "checkingDL")]
    CheckingDl,
    #[serde(rename = "checkingUP")]
    CheckingUp,
    #[serde(rename = "checkingResumeData")]
    CheckingResumeData,
    #[serde(rename = "moving")]
    Moving,
    #[serde(rename = "error")]
    Error,
    #[serde(rename = "missingFiles")]
    MissingFiles,
    #[serde(other)]
    Unknown,
}

impl TorrentState {
    /// Actively transferring, or stalled but intended to transfer.
    /// These are the states the concurrency limiter counts against the cap.
    pub fn is_downloading_class(self) -> bool {
        matches!(
            self,
            TorrentState::Downloading | TorrentState::StalledDl | TorrentState::MetaDl
        )
    }

    pub fn is_paused(self) -> bool {
        matches!(self, TorrentState::PausedDl | TorrentState::PausedUp)
    }

    pub fn is_seeding_class(self) -> bool {
        matches!(
            self,
            TorrentState::Uploading | TorrentState::StalledUp | TorrentState::ForcedUp
        )
    }

    pub fn is_errored(self) -> bool {
        matches!(self, TorrentState::Error | TorrentState::MissingFiles)
    }
}

/// One entry of the `/api/v2/torrents/info` snapshot.
///
/// `hash` is the immutable identity; everything else is replaced wholesale
/// on every poll.
#[derive(Debug, Clone, Deserialize)]
pub struct Torrent {
    pub hash: String,
    pub name: String,
    /// Completion fraction, 0.0–1.0.
    pub progress: f64,
    pub state: TorrentState,
    /// Selected payload size in bytes.
    #[serde(default)]
    pub size: u64,
    /// Bytes downloaded so far.
    #[serde(default)]
    pub downloaded: u64,
    /// Download speed in bytes/s.
    #[serde(default)]
    pub dlspeed: u64,
    /// Upload speed in bytes/s.
    #[serde(default)]
    pub upspeed: u64,
    #[serde(default)]
    pub ratio: f64,
    /// Estimated seconds to completion (8640000 means none).
    #[serde(default)]
    pub eta: i64,
    #[serde(default)]
    pub num_seeds: u32,
    #[serde(default)]
    pub num_leechs: u32,
}

impl Torrent {
    pub fn is_complete(&self) -> bool {
        self.progress >= 1.0
    }

    /// Connected peers (seeds + leeches), fed into the history series.
    pub fn peer_count(&self) -> u32 {
        self.num_seeds + self.num_leechs
    }
}

/// Supplemental metadata from `/api/v2/torrents/properties`.
/// Used to enrich completion events; fetched best-effort.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TorrentProperties {
    /// Seconds since the torrent was added.
    #[serde(default)]
    pub time_elapsed: i64,
    #[serde(default)]
    pub seeds: i64,
    #[serde(default)]
    pub peers: i64,
}
