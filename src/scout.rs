//! Scout supervisor
//!
//! Owns the shared state objects and runs the periodic tasks as a session:
//! block poller, voting power sampler and performance summary. When the
//! sampler raises a low-budget alarm the session is torn down and the scout
//! hibernates:
//!
//! 1. set the suspend flag
//! 2. persist the edit-jail state
//! 3. abort the session tasks
//! 4. sleep the cooldown
//! 5. refresh social lists and build a fresh poller
//! 6. clear the suspend flag and start a new session
//!
//! Evaluations already in flight are left to finish.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::api::StatusState;
use crate::config::ScoutConfig;
use crate::curation::{Curator, Dispatcher, Reporter};
use crate::governor::{Governor, LowBudget, SuspendFlag};
use crate::jail::{EditJail, StateStore};
use crate::ledger::Ledger;
use crate::social::SocialLists;
use crate::stats::ScoutStats;
use crate::stream::BlockPoller;

pub struct Scout {
    account: String,
    dry_run: bool,
    ledger: Arc<dyn Ledger>,
    governor: Arc<Governor>,
    jail: Arc<EditJail>,
    social: Arc<SocialLists>,
    stats: Arc<ScoutStats>,
    dispatcher: Arc<Dispatcher>,
    suspend: SuspendFlag,
    poll_interval: Duration,
    summary_interval: Duration,
}

impl Scout {
    /// Wire every component from `config`
    pub fn new(config: &ScoutConfig, ledger: Arc<dyn Ledger>, store: Arc<dyn StateStore>) -> Result<Self> {
        let suspend = SuspendFlag::new();
        let stats = Arc::new(ScoutStats::new());

        let governor = Arc::new(Governor::new(
            config.account.name.clone(),
            ledger.clone(),
            config.to_budget_policy(),
            suspend.clone(),
        ));
        let jail = Arc::new(EditJail::open(config.to_jail_policy(), store));
        let social = Arc::new(SocialLists::new(
            config.account.name.clone(),
            ledger.clone(),
            config.files.clone(),
        ));
        let reporter = Arc::new(Reporter::new(
            ledger.clone(),
            config.report_target()?,
            config.reports.columns.clone(),
            stats.clone(),
        ));

        let curator = Arc::new(Curator::new(
            config.to_curator_config(),
            config.to_rules(),
            ledger.clone(),
            jail.clone(),
            social.clone(),
            governor.clone(),
            reporter,
            stats.clone(),
        ));
        let dispatcher = Arc::new(Dispatcher::new(curator, config.timing.max_in_flight));

        Ok(Self {
            account: config.account.name.clone(),
            dry_run: config.effective_dry_run(),
            ledger,
            governor,
            jail,
            social,
            stats,
            dispatcher,
            suspend,
            poll_interval: Duration::from_millis(config.timing.poll_interval_ms),
            summary_interval: Duration::from_secs(config.timing.summary_interval_secs),
        })
    }

    pub fn suspend_flag(&self) -> SuspendFlag {
        self.suspend.clone()
    }

    pub fn stats(&self) -> Arc<ScoutStats> {
        self.stats.clone()
    }

    pub fn governor(&self) -> Arc<Governor> {
        self.governor.clone()
    }

    pub fn jail(&self) -> Arc<EditJail> {
        self.jail.clone()
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        self.dispatcher.clone()
    }

    /// Shared handles for the status API
    pub fn status_state(&self) -> StatusState {
        StatusState {
            account: self.account.clone(),
            dry_run: self.dry_run,
            governor: self.governor.clone(),
            jail: self.jail.clone(),
            social: self.social.clone(),
            stats: self.stats.clone(),
        }
    }

    /// Run sessions forever, hibernating whenever the budget runs low
    pub async fn run(self) {
        self.governor.initialize().await;

        loop {
            self.social.refresh().await;
            self.suspend.clear();

            let mut session = self.start_session();
            let alarm = Self::wait_for_alarm(&mut session).await;
            self.hibernate(alarm, session).await;
        }
    }

    fn start_session(&self) -> (JoinSet<()>, mpsc::Receiver<LowBudget>) {
        let (alarms, rx) = mpsc::channel(1);
        let poller = BlockPoller::new(
            self.ledger.clone(),
            self.dispatcher.clone(),
            self.suspend.clone(),
            self.stats.clone(),
            self.poll_interval,
        );

        let mut tasks = JoinSet::new();
        tasks.spawn(poller.run());
        tasks.spawn(self.governor.clone().run_sampler(alarms));
        tasks.spawn(self.stats.clone().run_summary(self.summary_interval));

        info!(account = %self.account, dry_run = self.dry_run, "Session started");
        (tasks, rx)
    }

    async fn wait_for_alarm(session: &mut (JoinSet<()>, mpsc::Receiver<LowBudget>)) -> Option<LowBudget> {
        let (tasks, alarms) = session;
        loop {
            tokio::select! {
                Some(alarm) = alarms.recv() => return Some(alarm),
                Some(joined) = tasks.join_next() => {
                    if let Err(e) = joined {
                        error!("Session task stopped: {}", e);
                    }
                }
                else => {
                    error!("All session tasks stopped");
                    return None;
                }
            }
        }
    }

    async fn hibernate(&self, alarm: Option<LowBudget>, session: (JoinSet<()>, mpsc::Receiver<LowBudget>)) {
        self.suspend.set();
        self.stats.record_hibernation();

        let cooldown = self.governor.policy().cooldown;
        match alarm {
            Some(alarm) => warn!(
                level_pct = alarm.level as f64 / 100.0,
                cooldown_ms = cooldown.as_millis() as u64,
                "Voting power low, hibernating"
            ),
            None => warn!(cooldown_ms = cooldown.as_millis() as u64, "Restarting session after cooldown"),
        }

        if let Err(e) = self.jail.persist().await {
            warn!(error_kind = e.kind(), "Edit-jail state not saved before hibernation: {}", e);
        }

        let (mut tasks, _alarms) = session;
        tasks.shutdown().await;

        tokio::time::sleep(cooldown).await;
        info!("Waking up");
    }
}
