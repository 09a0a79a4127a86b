//! Process-lifetime counters and the periodic performance summary.
//!
//! Counters are not persisted; they start from zero on every launch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::info;

#[derive(Debug)]
pub struct ScoutStats {
    started_at: DateTime<Utc>,
    scanned: AtomicU64,
    voted: AtomicU64,
    rejected: AtomicU64,
    reports: AtomicU64,
    multipliers: AtomicU64,
    jailed: AtomicU64,
    /// Last block the poller finished, 0 before the first cycle
    watermark: AtomicU64,
    hibernations: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub started_at: DateTime<Utc>,
    pub scanned: u64,
    pub voted: u64,
    pub rejected: u64,
    pub reports: u64,
    pub multipliers: u64,
    pub jailed: u64,
    pub watermark: u64,
    pub hibernations: u64,
}

impl Default for ScoutStats {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            scanned: AtomicU64::new(0),
            voted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            reports: AtomicU64::new(0),
            multipliers: AtomicU64::new(0),
            jailed: AtomicU64::new(0),
            watermark: AtomicU64::new(0),
            hibernations: AtomicU64::new(0),
        }
    }
}

impl ScoutStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_scanned(&self) {
        self.scanned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_vote(&self, multiplied: bool) {
        self.voted.fetch_add(1, Ordering::Relaxed);
        if multiplied {
            self.multipliers.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_report(&self) {
        self.reports.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_jailed(&self) {
        self.jailed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hibernation(&self) {
        self.hibernations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_watermark(&self, height: u64) {
        self.watermark.store(height, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            started_at: self.started_at,
            scanned: self.scanned.load(Ordering::Relaxed),
            voted: self.voted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            reports: self.reports.load(Ordering::Relaxed),
            multipliers: self.multipliers.load(Ordering::Relaxed),
            jailed: self.jailed.load(Ordering::Relaxed),
            watermark: self.watermark.load(Ordering::Relaxed),
            hibernations: self.hibernations.load(Ordering::Relaxed),
        }
    }

    /// Log a summary every `period`, starting one period from now
    pub async fn run_summary(self: Arc<Self>, period: Duration) {
        let start = tokio::time::Instant::now() + period;
        let mut interval = tokio::time::interval_at(start, period);

        loop {
            interval.tick().await;
            let s = self.snapshot();
            info!(
                scanned = s.scanned,
                voted = s.voted,
                rejected = s.rejected,
                reports = s.reports,
                multipliers = s.multipliers,
                jailed = s.jailed,
                watermark = s.watermark,
                "Performance summary"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = ScoutStats::new();
        stats.record_scanned();
        stats.record_scanned();
        stats.record_vote(false);
        stats.record_vote(true);
        stats.record_rejected();
        stats.set_watermark(1234);

        let snap = stats.snapshot();
        assert_eq!(snap.scanned, 2);
        assert_eq!(snap.voted, 2);
        assert_eq!(snap.multipliers, 1);
        assert_eq!(snap.rejected, 1);
        assert_eq!(snap.reports, 0);
        assert_eq!(snap.watermark, 1234);
    }
}
