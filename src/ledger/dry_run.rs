//! Dry-run wrapper: reads go to the real ledger, broadcasts only get logged.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

use super::Ledger;
use super::types::*;

pub struct DryRunLedger {
    inner: Arc<dyn Ledger>,
    suppressed: AtomicU64,
}

impl DryRunLedger {
    pub fn new(inner: Arc<dyn Ledger>) -> Self {
        Self {
            inner,
            suppressed: AtomicU64::new(0),
        }
    }

    /// Number of broadcasts swallowed so far
    pub fn suppressed(&self) -> u64 {
        self.suppressed.load(Ordering::Relaxed)
    }

    fn synthetic_tx(&self) -> TxResult {
        let n = self.suppressed.fetch_add(1, Ordering::Relaxed) + 1;
        TxResult {
            id: format!("dry-run-{}", n),
            block_num: None,
            dry_run: true,
        }
    }
}

#[async_trait]
impl Ledger for DryRunLedger {
    async fn head_height(&self) -> Result<u64> {
        self.inner.head_height().await
    }

    async fn block(&self, height: u64) -> Result<Option<Block>> {
        self.inner.block(height).await
    }

    async fn account(&self, name: &str) -> Result<AccountState> {
        self.inner.account(name).await
    }

    async fn content(&self, author: &str, permlink: &str) -> Result<Option<PostContent>> {
        self.inner.content(author, permlink).await
    }

    async fn following(
        &self,
        account: &str,
        start: &str,
        kind: FollowKind,
        limit: u32,
    ) -> Result<Vec<FollowEntry>> {
        self.inner.following(account, start, kind, limit).await
    }

    async fn broadcast_vote(&self, vote: &VoteOperation) -> Result<TxResult> {
        info!(
            voter = %vote.voter,
            author = %vote.author,
            permlink = %vote.permlink,
            weight = vote.weight,
            "[dry run] vote not broadcast"
        );
        Ok(self.synthetic_tx())
    }

    async fn broadcast_report(&self, report: &ReportComment) -> Result<TxResult> {
        info!(
            author = %report.author,
            permlink = %report.permlink,
            "[dry run] report not broadcast:\n{}",
            report.body
        );
        Ok(self.synthetic_tx())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryLedger;

    #[tokio::test]
    async fn test_dry_run_swallows_broadcasts() {
        let inner = Arc::new(InMemoryLedger::new());
        inner.set_head(42);
        let ledger = DryRunLedger::new(inner.clone());

        assert_eq!(ledger.head_height().await.unwrap(), 42);

        let vote = VoteOperation {
            voter: "curator".to_string(),
            author: "alice".to_string(),
            permlink: "hello".to_string(),
            weight: 10000,
        };
        let tx = ledger.broadcast_vote(&vote).await.unwrap();

        assert_eq!(tx.id, "dry-run-1");
        assert!(tx.dry_run);
        assert_eq!(ledger.suppressed(), 1);
        assert!(inner.votes().is_empty());
    }
}
