//! Aggregate transfer statistics derived from one snapshot.

use std::fmt;

use crate::qbt::Torrent;

/// Counts and totals over a poll snapshot; feeds the periodic summary
/// event and the `status` subcommand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferSummary {
    pub total: usize,
    pub downloading: usize,
    pub seeding: usize,
    pub paused: usize,
    pub errored: usize,
    pub completed: usize,
    /// Aggregate download speed, bytes/s.
    pub dl_speed: u64,
    /// Aggregate upload speed, bytes/s.
    pub up_speed: u64,
    /// Sum of selected payload sizes, bytes.
    pub total_size: u64,
}

impl TransferSummary {
    pub fn from_snapshot(snapshot: &[Torrent]) -> Self {
        let mut s = Self {
            total: snapshot.len(),
            ..Self::default()
        };
        for t in snapshot {
            if t.state.is_downloading_class() {
                s.downloading += 1;
            } else if t.state.is_seeding_class() {
                s.seeding += 1;
            } else if t.state.is_paused() {
                s.paused += 1;
            } else if t.state.is_errored() {
                s.errored += 1;
            }
            if t.is_complete() {
                s.completed += 1;
            }
            s.dl_speed += t.dlspeed;
            s.up_speed += t.upspeed;
            s.total_size += t.size;
        }
        s
    }
}

impl fmt::Display for TransferSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} torrents ({} downloading, {} seeding, {} paused, {} errored, {} complete) \
             ↓ {} ↑ {}",
            self.total,
            self.downloading,
            self.seeding,
            self.paused,
            self.errored,
            self.completed,
            format_speed(self.dl_speed),
            format_speed(self.up_speed),
        )
    }
}

/// Human-readable bytes/s.
pub fn format_speed(bytes_per_sec: u64) -> String {
    format!("{}/s", format_size(bytes_per_sec))
}

/// Human-readable byte count (binary units).
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[unit])
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qbt::TorrentState;

    fn torrent(state: TorrentState, progress: f64, dlspeed: u64, upspeed: u64) -> Torrent {
        Torrent {
            hash: "h".to_string(),
            name: "n".to_string(),
            progress,
            state,
            size: 1000,
            downloaded: 0,
            dlspeed,
            upspeed,
            ratio: 0.0,
            eta: 0,
            num_seeds: 0,
            num_leechs: 0,
        }
    }

    #[test]
    fn summary_counts_state_classes() {
        let snapshot = vec![
            torrent(TorrentState::Downloading, 0.5, 100, 0),
            torrent(TorrentState::StalledDl, 0.2, 0, 0),
            torrent(TorrentState::Uploading, 1.0, 0, 50),
            torrent(TorrentState::PausedDl, 0.7, 0, 0),
            torrent(TorrentState::Error, 0.1, 0, 0),
        ];
        let s = TransferSummary::from_snapshot(&snapshot);
        assert_eq!(s.total, 5);
        assert_eq!(s.downloading, 2);
        assert_eq!(s.seeding, 1);
        assert_eq!(s.paused, 1);
        assert_eq!(s.errored, 1);
        assert_eq!(s.completed, 1);
        assert_eq!(s.dl_speed, 100);
        assert_eq!(s.up_speed, 50);
        assert_eq!(s.total_size, 5000);
    }

    #[test]
    fn empty_snapshot_is_all_zero() {
        assert_eq!(TransferSummary::from_snapshot(&[]), TransferSummary::default());
    }

    #[test]
    fn size_formatting() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.00 KiB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MiB");
        assert_eq!(format_speed(1024), "1.00 KiB/s");
    }
}
