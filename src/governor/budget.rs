//! Budget arithmetic
//!
//! Voting power is tracked in basis points (0..=10000). The ledger reports
//! the level as of the account's last vote; between votes it regenerates
//! linearly and is capped at the maximum.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Full voting power in basis points
pub const MAX_LEVEL: u32 = 10_000;

/// Time for an empty budget to regenerate fully (5 days)
pub const DEFAULT_REGEN_SECS: u64 = 432_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetMode {
    /// Hibernate when the level drops below the floor
    Monitored,
    /// Sample for display only, never suspend
    Unmonitored,
}

impl BudgetMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetMode::Monitored => "monitored",
            BudgetMode::Unmonitored => "unmonitored",
        }
    }
}

impl std::str::FromStr for BudgetMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "monitored" | "1" => Ok(BudgetMode::Monitored),
            "unmonitored" | "0" => Ok(BudgetMode::Unmonitored),
            other => Err(anyhow::anyhow!("Unknown budget mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetPolicy {
    pub mode: BudgetMode,
    /// Floor as a percentage (15.0 = 15%)
    pub threshold_pct: f64,
    pub regen_secs: u64,
    /// Hibernation length
    pub cooldown: Duration,
    pub sample_interval: Duration,
}

impl Default for BudgetPolicy {
    fn default() -> Self {
        Self {
            mode: BudgetMode::Unmonitored,
            threshold_pct: 15.0,
            regen_secs: DEFAULT_REGEN_SECS,
            cooldown: Duration::from_millis(1_800_000),
            sample_interval: Duration::from_secs(15),
        }
    }
}

impl BudgetPolicy {
    /// Whether `level` (basis points) is below the floor in monitored mode
    pub fn should_hibernate(&self, level: u32) -> bool {
        self.mode == BudgetMode::Monitored && (level as f64 / 100.0) < self.threshold_pct
    }
}

/// Current budget estimate
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BudgetState {
    /// Basis points, 0..=10000
    pub current_level: u32,
    pub last_sample_time: Option<DateTime<Utc>>,
    pub last_action_time: Option<DateTime<Utc>>,
}

impl BudgetState {
    pub fn level_pct(&self) -> f64 {
        self.current_level as f64 / 100.0
    }
}

/// Regenerated level at `now` given the level reported at `last_vote`
pub fn estimate_level(
    reported: u32,
    last_vote: DateTime<Utc>,
    now: DateTime<Utc>,
    regen_secs: u64,
) -> u32 {
    let elapsed_ms = (now - last_vote).num_milliseconds().max(0) as f64;
    let regen_secs = regen_secs.max(1) as f64;
    let regenerated = MAX_LEVEL as f64 * (elapsed_ms / 1000.0) / regen_secs;

    (reported as f64 + regenerated).min(MAX_LEVEL as f64) as u32
}

/// Power consumed by a vote of `weight` cast at `level`
pub fn vote_cost(level: u32, weight: u16) -> u32 {
    let level = level.min(MAX_LEVEL) as u64;
    ((level * weight as u64 / MAX_LEVEL as u64 + 49) / 50) as u32
}

/// Process-wide "stop emitting" switch
#[derive(Debug, Clone, Default)]
pub struct SuspendFlag(Arc<AtomicBool>);

impl SuspendFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn test_estimate_regenerates_linearly() {
        let last_vote = Utc::now();

        // A fifth of the regeneration period restores 20%
        let later = last_vote + ChronoDuration::seconds(86_400);
        assert_eq!(estimate_level(5_000, last_vote, later, DEFAULT_REGEN_SECS), 7_000);

        assert_eq!(estimate_level(5_000, last_vote, last_vote, DEFAULT_REGEN_SECS), 5_000);
    }

    #[test]
    fn test_estimate_is_capped() {
        let last_vote = Utc::now() - ChronoDuration::days(30);
        assert_eq!(
            estimate_level(9_000, last_vote, Utc::now(), DEFAULT_REGEN_SECS),
            MAX_LEVEL
        );
    }

    #[test]
    fn test_clock_skew_does_not_drain() {
        let now = Utc::now();
        let future_vote = now + ChronoDuration::seconds(30);
        assert_eq!(estimate_level(4_200, future_vote, now, DEFAULT_REGEN_SECS), 4_200);
    }

    #[test]
    fn test_vote_cost() {
        // Full power, full weight: 2%
        assert_eq!(vote_cost(10_000, 10_000), 200);
        assert_eq!(vote_cost(10_000, 5_000), 100);
        // Rounds up
        assert_eq!(vote_cost(10_000, 1), 1);
        assert_eq!(vote_cost(0, 10_000), 0);
    }

    #[test]
    fn test_should_hibernate_only_when_monitored() {
        let mut policy = BudgetPolicy::default();
        assert!(!policy.should_hibernate(0));

        policy.mode = BudgetMode::Monitored;
        assert!(policy.should_hibernate(1_499));
        assert!(!policy.should_hibernate(1_500));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("1".parse::<BudgetMode>().unwrap(), BudgetMode::Monitored);
        assert_eq!("Unmonitored".parse::<BudgetMode>().unwrap(), BudgetMode::Unmonitored);
        assert!("sometimes".parse::<BudgetMode>().is_err());
    }

    #[test]
    fn test_suspend_flag_is_shared() {
        let flag = SuspendFlag::new();
        let clone = flag.clone();
        flag.set();
        assert!(clone.is_set());
        clone.clear();
        assert!(!flag.is_set());
    }
}
