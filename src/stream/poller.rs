//! Block catch-up poller
//!
//! Each tick reads the head height and walks the watermark forward one
//! block at a time. A block is only counted as processed after every root
//! post in it has been handed to the sink, so a failed fetch leaves the
//! watermark on the last complete block and the next tick resumes there.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::ScoutError;
use crate::governor::SuspendFlag;
use crate::ledger::{Block, CommentOperation, Ledger};
use crate::stats::ScoutStats;

/// A root post seen in a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidatePost {
    pub author: String,
    pub permlink: String,
    pub block_height: u64,
    pub transaction_id: String,
}

/// Receives candidates without blocking the poller
pub trait CandidateSink: Send + Sync {
    fn submit(&self, candidate: CandidatePost);
}

/// Outcome of one poll cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollReport {
    pub head: u64,
    pub scanned_blocks: u64,
    pub candidates: usize,
}

/// Root posts in `block`, in operation order
pub fn extract_candidates(height: u64, block: &Block) -> Vec<CandidatePost> {
    let mut candidates = Vec::new();

    for tx in &block.transactions {
        for op in &tx.operations {
            if op.name() != "comment" {
                continue;
            }

            let comment: CommentOperation = match serde_json::from_value(op.payload().clone()) {
                Ok(comment) => comment,
                Err(e) => {
                    debug!(height, tx = %tx.transaction_id, "Skipping malformed comment: {}", e);
                    continue;
                }
            };

            if comment.is_root_post() {
                candidates.push(CandidatePost {
                    author: comment.author,
                    permlink: comment.permlink,
                    block_height: height,
                    transaction_id: tx.transaction_id.clone(),
                });
            }
        }
    }

    candidates
}

pub struct BlockPoller {
    ledger: Arc<dyn Ledger>,
    sink: Arc<dyn CandidateSink>,
    suspend: SuspendFlag,
    stats: Arc<ScoutStats>,
    period: Duration,
    /// Last fully processed height; unset until the first head read
    watermark: Option<u64>,
}

impl BlockPoller {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        sink: Arc<dyn CandidateSink>,
        suspend: SuspendFlag,
        stats: Arc<ScoutStats>,
        period: Duration,
    ) -> Self {
        Self {
            ledger,
            sink,
            suspend,
            stats,
            period,
            watermark: None,
        }
    }

    pub fn watermark(&self) -> Option<u64> {
        self.watermark
    }

    fn advance(&mut self, height: u64) {
        self.watermark = Some(height);
        self.stats.set_watermark(height);
    }

    /// One cycle. `Ok(None)` while suspended.
    pub async fn poll_once(&mut self) -> Result<Option<PollReport>, ScoutError> {
        if self.suspend.is_set() {
            return Ok(None);
        }

        let head = self
            .ledger
            .head_height()
            .await
            .map_err(|e| ScoutError::fetch(format!("head: {:#}", e)))?;

        let mut watermark = match self.watermark {
            Some(height) => height,
            None => {
                let start = head.saturating_sub(1);
                info!(head, start, "Block stream starting");
                self.advance(start);
                start
            }
        };

        let mut report = PollReport {
            head,
            scanned_blocks: 0,
            candidates: 0,
        };

        while watermark < head {
            let height = watermark + 1;

            let block = match self.ledger.block(height).await {
                Ok(Some(block)) => block,
                Ok(None) => {
                    debug!(height, "Block not available yet");
                    break;
                }
                Err(e) => {
                    return Err(ScoutError::fetch(format!("block {}: {:#}", height, e)));
                }
            };

            let candidates = extract_candidates(height, &block);
            report.candidates += candidates.len();
            for candidate in candidates {
                self.sink.submit(candidate);
            }

            self.advance(height);
            watermark = height;
            report.scanned_blocks += 1;
        }

        Ok(Some(report))
    }

    /// Poll on a fixed period until the task is aborted
    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            match self.poll_once().await {
                Ok(Some(report)) => debug!(
                    head = report.head,
                    watermark = ?self.watermark,
                    blocks = report.scanned_blocks,
                    candidates = report.candidates,
                    "Heartbeat"
                ),
                Ok(None) => {}
                Err(e) => warn!(
                    error_kind = e.kind(),
                    watermark = ?self.watermark,
                    "Poll cycle failed: {}",
                    e
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryLedger;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CollectingSink {
        seen: Mutex<Vec<CandidatePost>>,
    }

    impl CandidateSink for CollectingSink {
        fn submit(&self, candidate: CandidatePost) {
            self.seen.lock().unwrap().push(candidate);
        }
    }

    fn poller(ledger: Arc<InMemoryLedger>, sink: Arc<CollectingSink>) -> BlockPoller {
        BlockPoller::new(
            ledger,
            sink,
            SuspendFlag::new(),
            Arc::new(ScoutStats::new()),
            Duration::from_millis(10),
        )
    }

    #[tokio::test]
    async fn test_first_cycle_starts_below_head() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.set_head(100);
        ledger.add_comment(100, "tx100", "alice", "fresh", "");
        let sink = Arc::new(CollectingSink::default());
        let mut poller = poller(ledger.clone(), sink.clone());

        let report = poller.poll_once().await.unwrap().unwrap();

        assert_eq!(report.scanned_blocks, 1);
        assert_eq!(poller.watermark(), Some(100));
        assert_eq!(ledger.block_fetches(), vec![100]);
        assert_eq!(sink.seen.lock().unwrap()[0].permlink, "fresh");
    }

    #[tokio::test]
    async fn test_failure_holds_watermark() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.set_head(10);
        let sink = Arc::new(CollectingSink::default());
        let mut poller = poller(ledger.clone(), sink);
        poller.poll_once().await.unwrap();

        ledger.set_head(14);
        ledger.fail_block(12);
        assert!(poller.poll_once().await.is_err());
        assert_eq!(poller.watermark(), Some(11));

        ledger.heal_block(12);
        poller.poll_once().await.unwrap();
        assert_eq!(poller.watermark(), Some(14));
        assert_eq!(ledger.block_fetches(), vec![10, 11, 12, 12, 13, 14]);
    }

    #[tokio::test]
    async fn test_suspended_poller_is_idle() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.set_head(10);
        let flag = SuspendFlag::new();
        flag.set();
        let mut poller = BlockPoller::new(
            ledger.clone(),
            Arc::new(CollectingSink::default()),
            flag,
            Arc::new(ScoutStats::new()),
            Duration::from_millis(10),
        );

        assert!(poller.poll_once().await.unwrap().is_none());
        assert!(poller.watermark().is_none());
        assert!(ledger.block_fetches().is_empty());
    }

    #[tokio::test]
    async fn test_extract_only_root_posts() {
        let ledger = InMemoryLedger::new();
        ledger.set_head(5);
        ledger.add_comment(5, "t1", "alice", "post", "");
        ledger.add_comment(5, "t2", "bob", "re-post", "alice");
        ledger.add_comment(5, "t3", "carol", "second", "");
        let stored = ledger.block(5).await.unwrap().unwrap();

        // Candidates follow operation order
        let expected: Vec<CandidatePost> = [("t1", "alice", "post"), ("t3", "carol", "second")]
            .into_iter()
            .map(|(tx, author, permlink)| CandidatePost {
                author: author.to_string(),
                permlink: permlink.to_string(),
                block_height: 5,
                transaction_id: tx.to_string(),
            })
            .collect();
        assert_eq!(extract_candidates(5, &stored), expected);

        let mut malformed = Block::default();
        malformed.transactions.push(crate::ledger::Transaction {
            transaction_id: "t4".to_string(),
            operations: vec![crate::ledger::Operation(
                "comment".to_string(),
                serde_json::json!({"permlink": "no-author"}),
            )],
        });
        assert!(extract_candidates(5, &malformed).is_empty());
    }
}
