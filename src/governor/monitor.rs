//! Voting power monitor
//!
//! Samples the account on a fixed period and keeps a local estimate between
//! samples. When the estimate falls below the floor in monitored mode it
//! raises a [`LowBudget`] alarm for the supervisor, which owns the actual
//! hibernation sequence.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, warn};

use super::budget::{BudgetPolicy, BudgetState, SuspendFlag, estimate_level, vote_cost};
use crate::error::ScoutError;
use crate::ledger::Ledger;

/// Raised when the budget falls below the floor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LowBudget {
    pub level: u32,
}

pub struct Governor {
    account: String,
    ledger: Arc<dyn Ledger>,
    policy: BudgetPolicy,
    state: RwLock<BudgetState>,
    suspend: SuspendFlag,
}

impl Governor {
    pub fn new(
        account: impl Into<String>,
        ledger: Arc<dyn Ledger>,
        policy: BudgetPolicy,
        suspend: SuspendFlag,
    ) -> Self {
        Self {
            account: account.into(),
            ledger,
            policy,
            state: RwLock::new(BudgetState::default()),
            suspend,
        }
    }

    pub fn policy(&self) -> &BudgetPolicy {
        &self.policy
    }

    pub fn suspend_flag(&self) -> &SuspendFlag {
        &self.suspend
    }

    pub fn is_suspended(&self) -> bool {
        self.suspend.is_set()
    }

    /// Query the account and refresh the estimate
    pub async fn sample(&self) -> Result<u32, ScoutError> {
        self.sample_at(Utc::now()).await
    }

    pub async fn sample_at(&self, now: DateTime<Utc>) -> Result<u32, ScoutError> {
        let account = self
            .ledger
            .account(&self.account)
            .await
            .map_err(|e| ScoutError::fetch(format!("{:#}", e)))?;

        let level = estimate_level(
            account.voting_power,
            account.last_vote_time,
            now,
            self.policy.regen_secs,
        );

        let mut state = self.state.write().await;
        state.current_level = level;
        state.last_sample_time = Some(now);

        Ok(level)
    }

    /// Initial reading at startup; a failure only leaves the estimate at zero
    pub async fn initialize(&self) {
        match self.sample().await {
            Ok(level) => info!(
                account = %self.account,
                mode = self.policy.mode.as_str(),
                "Initial voting power: {:.2}%",
                level as f64 / 100.0
            ),
            Err(e) => warn!(error_kind = e.kind(), "Initial voting power unknown: {}", e),
        }
    }

    /// Debit the local estimate after a successful vote
    pub async fn note_vote(&self, weight: u16, now: DateTime<Utc>) {
        let mut state = self.state.write().await;
        let used = vote_cost(state.current_level, weight);
        state.current_level = state.current_level.saturating_sub(used);
        state.last_action_time = Some(now);
        debug!(used, level = state.current_level, "Voting power debited");
    }

    pub async fn level(&self) -> u32 {
        self.state.read().await.current_level
    }

    pub async fn snapshot(&self) -> BudgetState {
        self.state.read().await.clone()
    }

    /// Periodic sampler. Returns after raising one alarm; the supervisor
    /// starts a fresh sampler with the next session.
    pub async fn run_sampler(self: Arc<Self>, alarms: mpsc::Sender<LowBudget>) {
        let mut interval = tokio::time::interval(self.policy.sample_interval);

        loop {
            interval.tick().await;

            if self.suspend.is_set() {
                continue;
            }

            let level = match self.sample().await {
                Ok(level) => level,
                Err(e) => {
                    warn!(error_kind = e.kind(), "Voting power sample failed: {}", e);
                    continue;
                }
            };

            debug!(level_pct = level as f64 / 100.0, "Voting power sampled");

            if self.policy.should_hibernate(level) {
                warn!(
                    level_pct = level as f64 / 100.0,
                    threshold_pct = self.policy.threshold_pct,
                    "Voting power below floor"
                );
                if alarms.send(LowBudget { level }).await.is_err() {
                    debug!("Budget alarm receiver gone");
                }
                return;
            }
        }
    }
}
