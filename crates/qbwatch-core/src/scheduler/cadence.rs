//! Wall-clock-aligned recurrence intervals.

use std::time::{SystemTime, UNIX_EPOCH};

/// A fixed recurring interval, due whenever the epoch second is a multiple
/// of its length: "every 30s" fires at :00 and :30, "every 2 minutes" at
/// even minutes, hourly on the hour, all in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    secs: u64,
}

impl Cadence {
    pub fn from_secs(secs: u64) -> Self {
        Self { secs: secs.max(1) }
    }

    pub fn from_minutes(minutes: u64) -> Self {
        Self::from_secs(minutes * 60)
    }

    pub fn hourly() -> Self {
        Self::from_secs(3600)
    }

    pub fn as_secs(&self) -> u64 {
        self.secs
    }

    pub fn is_due(&self, epoch_secs: u64) -> bool {
        epoch_secs % self.secs == 0
    }
}

/// Whole seconds since the Unix epoch, the clock the tick loop aligns on.
pub(super) fn epoch_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thirty_seconds_fires_twice_a_minute() {
        let c = Cadence::from_secs(30);
        assert!(c.is_due(0));
        assert!(c.is_due(30));
        assert!(c.is_due(60));
        assert!(!c.is_due(31));
        assert!(!c.is_due(59));
    }

    #[test]
    fn two_minutes_fires_on_even_minutes() {
        let c = Cadence::from_minutes(2);
        assert!(c.is_due(0));
        assert!(c.is_due(120));
        assert!(c.is_due(240));
        assert!(!c.is_due(60));
        assert!(!c.is_due(121));
    }

    #[test]
    fn hourly_fires_on_the_hour() {
        let c = Cadence::hourly();
        assert!(c.is_due(3600));
        assert!(c.is_due(7200));
        assert!(!c.is_due(3601));
        assert!(!c.is_due(1800));
    }

    #[test]
    fn zero_seconds_is_clamped() {
        let c = Cadence::from_secs(0);
        assert_eq!(c.as_secs(), 1);
        assert!(c.is_due(7));
    }
}
