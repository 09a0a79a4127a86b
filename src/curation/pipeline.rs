//! Evaluation pipeline
//!
//! [`judge`] is the pure decision over a fetched post. [`Curator`] wraps it
//! with the gates that need shared state (suspension, jail, social lists),
//! the content fetch, and the side effects of each verdict. [`Dispatcher`]
//! runs evaluations as detached tasks so the poller never waits on them.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};
use tracing::{debug, info, warn};

use super::content::PostSnapshot;
use super::report::{ReportKind, ReportRow, Reporter};
use super::rules::QualityRules;
use crate::error::ScoutError;
use crate::governor::Governor;
use crate::jail::{EditJail, StrikeOutcome};
use crate::ledger::{Ledger, VoteOperation};
use crate::social::SocialLists;
use crate::stats::ScoutStats;
use crate::stream::{CandidatePost, CandidateSink};

/// Timing knobs of the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CuratorConfig {
    /// Voting account
    pub account: String,
    /// Posts older than this (plus grace) are treated as stale
    pub freshness_secs: i64,
    pub grace_secs: i64,
    /// Delay before fetching content
    pub fetch_throttle: Duration,
}

impl CuratorConfig {
    /// Saturates instead of overflowing on absurd windows
    pub fn stale_after(&self) -> ChronoDuration {
        ChronoDuration::try_seconds(self.freshness_secs.saturating_add(self.grace_secs))
            .unwrap_or(ChronoDuration::MAX)
    }
}

/// Decision over a fetched post
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Older than the freshness window plus grace
    Stale { age_secs: i64 },
    Reject { kind: ReportKind, details: String },
    Accept { weight: u16, fast_track: bool },
}

pub fn judge(
    post: &PostSnapshot,
    followed: bool,
    rules: &QualityRules,
    stale_after: ChronoDuration,
    now: DateTime<Utc>,
) -> Verdict {
    let age = now - post.created_at;
    if age > stale_after {
        return Verdict::Stale {
            age_secs: age.num_seconds(),
        };
    }

    if let Some(tag) = rules.skip_tag(&post.tags) {
        return Verdict::Reject {
            kind: ReportKind::TagRejection,
            details: format!("Tag: {}", tag),
        };
    }

    let words = post.word_count();
    let images = post.image_count();
    let eligibility = rules.eligibility(words, images, followed);

    debug!(
        author = %post.author,
        words,
        images,
        followed,
        "Post measured"
    );

    if !eligibility.accepted() {
        let kind = if followed {
            ReportKind::FastTrackRejection
        } else {
            ReportKind::StandardRuleRejection
        };
        return Verdict::Reject {
            kind,
            details: format!("{}w/{}i", words, images),
        };
    }

    Verdict::Accept {
        weight: rules.weight(&eligibility),
        fast_track: eligibility.passed_fast,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Suspended,
    Jailed,
    Benched,
    Unavailable,
    Malformed,
}

/// What an evaluation ended up doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Skipped(SkipReason),
    Stale(StrikeOutcome),
    Rejected { kind: ReportKind, details: String },
    Voted { weight: u16, fast_track: bool, tx_id: String },
    VoteFailed { weight: u16 },
}

pub struct Curator {
    config: CuratorConfig,
    rules: QualityRules,
    ledger: Arc<dyn Ledger>,
    jail: Arc<EditJail>,
    social: Arc<SocialLists>,
    governor: Arc<Governor>,
    reporter: Arc<Reporter>,
    stats: Arc<ScoutStats>,
}

impl Curator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: CuratorConfig,
        rules: QualityRules,
        ledger: Arc<dyn Ledger>,
        jail: Arc<EditJail>,
        social: Arc<SocialLists>,
        governor: Arc<Governor>,
        reporter: Arc<Reporter>,
        stats: Arc<ScoutStats>,
    ) -> Self {
        Self {
            config,
            rules,
            ledger,
            jail,
            social,
            governor,
            reporter,
            stats,
        }
    }

    /// Evaluate one candidate end to end
    pub async fn evaluate(&self, candidate: &CandidatePost) -> Outcome {
        if self.governor.is_suspended() {
            return Outcome::Skipped(SkipReason::Suspended);
        }
        self.stats.record_scanned();

        let author = candidate.author.as_str();

        if self.jail.check(author, Utc::now()).await.is_jailed() {
            debug!(author = %author, "Author in edit jail");
            return Outcome::Skipped(SkipReason::Jailed);
        }

        let followed = self.social.is_followed(author).await;
        if !followed && self.social.is_benched(author).await {
            return Outcome::Skipped(SkipReason::Benched);
        }

        if !self.config.fetch_throttle.is_zero() {
            tokio::time::sleep(self.config.fetch_throttle).await;
        }

        let post = match self.fetch_post(candidate).await {
            Ok(Some(post)) => post,
            Ok(None) => return Outcome::Skipped(SkipReason::Unavailable),
            Err(e @ ScoutError::MalformedContent(_)) => {
                debug!(author = %author, permlink = %candidate.permlink, "Skipping post: {}", e);
                return Outcome::Skipped(SkipReason::Malformed);
            }
            Err(e) => {
                warn!(
                    error_kind = e.kind(),
                    author = %author,
                    permlink = %candidate.permlink,
                    "Skipping post: {}",
                    e
                );
                return Outcome::Skipped(SkipReason::Unavailable);
            }
        };

        let now = Utc::now();
        match judge(&post, followed, &self.rules, self.config.stale_after(), now) {
            Verdict::Stale { age_secs } => self.strike(candidate, age_secs, now).await,
            Verdict::Reject { kind, details } => {
                info!(author = %author, kind = %kind, details = %details, "Post rejected");
                self.reporter
                    .send_logged(&self.row(candidate, kind, &details, now))
                    .await;
                self.stats.record_rejected();
                Outcome::Rejected { kind, details }
            }
            Verdict::Accept { weight, fast_track } => self.vote(candidate, weight, fast_track).await,
        }
    }

    async fn fetch_post(&self, candidate: &CandidatePost) -> Result<Option<PostSnapshot>, ScoutError> {
        let content = self
            .ledger
            .content(&candidate.author, &candidate.permlink)
            .await
            .map_err(|e| ScoutError::fetch(format!("{:#}", e)))?;

        match content {
            Some(content) if !content.body.is_empty() => PostSnapshot::parse(&content).map(Some),
            _ => Ok(None),
        }
    }

    async fn strike(&self, candidate: &CandidatePost, age_secs: i64, now: DateTime<Utc>) -> Outcome {
        let outcome = self
            .jail
            .record_stale(&candidate.author, &candidate.permlink, now)
            .await;

        match outcome {
            StrikeOutcome::Strike { count } => {
                info!(
                    author = %candidate.author,
                    permlink = %candidate.permlink,
                    age_secs,
                    strikes = count,
                    "Stale post"
                );
            }
            StrikeOutcome::Jailed { until, .. } => {
                warn!(author = %candidate.author, until = %until, "Author jailed");
                self.stats.record_jailed();
                self.reporter
                    .send_logged(&self.row(candidate, ReportKind::EditJail, "Late edit.", now))
                    .await;
            }
        }

        Outcome::Stale(outcome)
    }

    async fn vote(&self, candidate: &CandidatePost, weight: u16, fast_track: bool) -> Outcome {
        // Hibernation may have started while this evaluation was throttled
        if self.governor.is_suspended() {
            return Outcome::Skipped(SkipReason::Suspended);
        }

        let vote = VoteOperation {
            voter: self.config.account.clone(),
            author: candidate.author.clone(),
            permlink: candidate.permlink.clone(),
            weight,
        };

        match self.ledger.broadcast_vote(&vote).await {
            Ok(tx) => {
                self.stats.record_vote(fast_track);
                if !tx.dry_run {
                    self.governor.note_vote(weight, Utc::now()).await;
                }
                info!(
                    author = %candidate.author,
                    permlink = %candidate.permlink,
                    weight_pct = weight as f64 / 100.0,
                    fast_track,
                    tx = %tx.id,
                    "Vote cast"
                );
                Outcome::Voted {
                    weight,
                    fast_track,
                    tx_id: tx.id,
                }
            }
            Err(e) => {
                let e = ScoutError::broadcast(format!("{:#}", e));
                warn!(error_kind = e.kind(), author = %candidate.author, "Vote dropped: {}", e);
                Outcome::VoteFailed { weight }
            }
        }
    }

    fn row(&self, candidate: &CandidatePost, kind: ReportKind, details: &str, now: DateTime<Utc>) -> ReportRow {
        ReportRow {
            time: now,
            author: candidate.author.clone(),
            permlink: candidate.permlink.clone(),
            block: candidate.block_height,
            transaction_id: candidate.transaction_id.clone(),
            kind,
            details: details.to_string(),
        }
    }
}

/// Fire-and-forget evaluation with a cap on concurrent evaluations
pub struct Dispatcher {
    curator: Arc<Curator>,
    permits: Arc<Semaphore>,
    in_flight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

struct InFlightGuard {
    in_flight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

impl Dispatcher {
    pub fn new(curator: Arc<Curator>, max_in_flight: usize) -> Self {
        Self {
            curator,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
            in_flight: Arc::new(AtomicUsize::new(0)),
            idle: Arc::new(Notify::new()),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Wait until every submitted evaluation has finished
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl CandidateSink for Dispatcher {
    fn submit(&self, candidate: CandidatePost) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = InFlightGuard {
            in_flight: self.in_flight.clone(),
            idle: self.idle.clone(),
        };
        let curator = self.curator.clone();
        let permits = self.permits.clone();

        tokio::spawn(async move {
            let _guard = guard;
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            let outcome = curator.evaluate(&candidate).await;
            debug!(
                author = %candidate.author,
                permlink = %candidate.permlink,
                outcome = ?outcome,
                "Evaluation finished"
            );
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(age_secs: i64, body: &str, tags: &[&str]) -> PostSnapshot {
        let created = Utc::now() - ChronoDuration::seconds(age_secs);
        PostSnapshot {
            author: "alice".to_string(),
            permlink: "p".to_string(),
            created_at: created,
            body: body.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn words(n: usize) -> String {
        vec!["word"; n].join(" ")
    }

    fn stale_after() -> ChronoDuration {
        ChronoDuration::seconds(300 + 60)
    }

    #[test]
    fn test_stale_after_saturates() {
        let config = CuratorConfig {
            account: "curator".to_string(),
            freshness_secs: i64::MAX,
            grace_secs: 60,
            fetch_throttle: Duration::ZERO,
        };
        assert_eq!(config.stale_after(), ChronoDuration::MAX);
    }

    #[test]
    fn test_grace_period() {
        let rules = QualityRules::default();
        let body = format!("{} ![a](https://x/a.png)", words(100));

        let inside = judge(&post(350, &body, &[]), false, &rules, stale_after(), Utc::now());
        assert!(matches!(inside, Verdict::Accept { .. }));

        let outside = judge(&post(400, &body, &[]), false, &rules, stale_after(), Utc::now());
        assert!(matches!(outside, Verdict::Stale { .. }));
    }

    #[test]
    fn test_tag_rejection_precedes_quality() {
        let rules = QualityRules {
            tags_to_skip: vec!["nsfw".to_string()],
            ..QualityRules::default()
        };
        let verdict = judge(&post(10, "short", &["life", "nsfw"]), true, &rules, stale_after(), Utc::now());
        assert_eq!(
            verdict,
            Verdict::Reject {
                kind: ReportKind::TagRejection,
                details: "Tag: nsfw".to_string()
            }
        );
    }

    #[test]
    fn test_standard_rejection_details() {
        let rules = QualityRules::default();
        let verdict = judge(&post(10, &words(99), &[]), false, &rules, stale_after(), Utc::now());
        assert_eq!(
            verdict,
            Verdict::Reject {
                kind: ReportKind::StandardRuleRejection,
                details: "99w/0i".to_string()
            }
        );
    }

    #[test]
    fn test_fast_track_accept_and_reject() {
        let rules = QualityRules::default();
        let rich = format!("{} https://x/a.png https://x/b.jpg", words(60));

        let accepted = judge(&post(10, &rich, &[]), true, &rules, stale_after(), Utc::now());
        assert_eq!(accepted, Verdict::Accept { weight: 10_000, fast_track: true });

        let poor = judge(&post(10, &words(40), &[]), true, &rules, stale_after(), Utc::now());
        assert!(matches!(
            poor,
            Verdict::Reject { kind: ReportKind::FastTrackRejection, .. }
        ));
    }
}
