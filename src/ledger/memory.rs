//! In-memory ledger (for testing).
//!
//! Heads, blocks, accounts and posts are scripted by the test; broadcasts
//! are recorded instead of sent. Individual heights or the head query can be
//! made to fail to exercise retry paths.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use super::Ledger;
use super::types::*;

#[derive(Debug, Default)]
struct LedgerState {
    head: u64,
    fail_head: bool,
    fail_broadcasts: bool,
    blocks: HashMap<u64, Block>,
    failing_blocks: HashSet<u64>,
    block_fetches: Vec<u64>,
    accounts: HashMap<String, AccountState>,
    contents: HashMap<(String, String), PostContent>,
    follows: HashMap<FollowKind, Vec<String>>,
    votes: Vec<VoteOperation>,
    reports: Vec<ReportComment>,
    tx_counter: u64,
}

#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut LedgerState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut state)
    }

    pub fn set_head(&self, head: u64) {
        self.with_state(|s| s.head = head);
    }

    pub fn set_head_failing(&self, failing: bool) {
        self.with_state(|s| s.fail_head = failing);
    }

    pub fn set_broadcasts_failing(&self, failing: bool) {
        self.with_state(|s| s.fail_broadcasts = failing);
    }

    pub fn insert_block(&self, height: u64, block: Block) {
        self.with_state(|s| {
            s.blocks.insert(height, block);
        });
    }

    /// Append a transaction carrying one `comment` operation to block `height`
    pub fn add_comment(
        &self,
        height: u64,
        transaction_id: &str,
        author: &str,
        permlink: &str,
        parent_author: &str,
    ) {
        let parent_permlink = if parent_author.is_empty() { "life" } else { "re" };
        let op = Operation(
            "comment".to_string(),
            serde_json::json!({
                "author": author,
                "permlink": permlink,
                "parent_author": parent_author,
                "parent_permlink": parent_permlink,
                "title": "",
                "body": "",
                "json_metadata": "{}",
            }),
        );

        self.with_state(|s| {
            s.blocks
                .entry(height)
                .or_default()
                .transactions
                .push(Transaction {
                    transaction_id: transaction_id.to_string(),
                    operations: vec![op],
                });
        });
    }

    /// Make `block(height)` fail until healed
    pub fn fail_block(&self, height: u64) {
        self.with_state(|s| {
            s.failing_blocks.insert(height);
        });
    }

    pub fn heal_block(&self, height: u64) {
        self.with_state(|s| {
            s.failing_blocks.remove(&height);
        });
    }

    pub fn set_account(&self, name: &str, voting_power: u32, last_vote_time: DateTime<Utc>) {
        self.with_state(|s| {
            s.accounts.insert(
                name.to_string(),
                AccountState {
                    name: name.to_string(),
                    voting_power,
                    last_vote_time,
                },
            );
        });
    }

    pub fn set_content(&self, content: PostContent) {
        self.with_state(|s| {
            s.contents
                .insert((content.author.clone(), content.permlink.clone()), content);
        });
    }

    pub fn set_follows(&self, kind: FollowKind, accounts: &[&str]) {
        self.with_state(|s| {
            s.follows
                .insert(kind, accounts.iter().map(|a| a.to_string()).collect());
        });
    }

    /// Heights requested through `block`, in call order
    pub fn block_fetches(&self) -> Vec<u64> {
        self.with_state(|s| s.block_fetches.clone())
    }

    pub fn votes(&self) -> Vec<VoteOperation> {
        self.with_state(|s| s.votes.clone())
    }

    pub fn reports(&self) -> Vec<ReportComment> {
        self.with_state(|s| s.reports.clone())
    }

    fn next_tx(state: &mut LedgerState) -> TxResult {
        state.tx_counter += 1;
        TxResult {
            id: format!("memtx{:08}", state.tx_counter),
            block_num: Some(state.head),
            dry_run: false,
        }
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn head_height(&self) -> Result<u64> {
        self.with_state(|s| {
            if s.fail_head {
                Err(anyhow::anyhow!("head query unavailable"))
            } else {
                Ok(s.head)
            }
        })
    }

    async fn block(&self, height: u64) -> Result<Option<Block>> {
        self.with_state(|s| {
            s.block_fetches.push(height);
            if s.failing_blocks.contains(&height) {
                return Err(anyhow::anyhow!("block {} unavailable", height));
            }
            if height > s.head {
                return Ok(None);
            }
            Ok(Some(s.blocks.get(&height).cloned().unwrap_or_default()))
        })
    }

    async fn account(&self, name: &str) -> Result<AccountState> {
        self.with_state(|s| {
            s.accounts
                .get(name)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("Account not found: {}", name))
        })
    }

    async fn content(&self, author: &str, permlink: &str) -> Result<Option<PostContent>> {
        self.with_state(|s| {
            Ok(s.contents
                .get(&(author.to_string(), permlink.to_string()))
                .cloned())
        })
    }

    async fn following(
        &self,
        account: &str,
        start: &str,
        kind: FollowKind,
        limit: u32,
    ) -> Result<Vec<FollowEntry>> {
        self.with_state(|s| {
            let list = s.follows.get(&kind).cloned().unwrap_or_default();
            let offset = if start.is_empty() {
                0
            } else {
                list.iter().position(|a| a == start).unwrap_or(list.len())
            };

            Ok(list
                .into_iter()
                .skip(offset)
                .take(limit as usize)
                .map(|following| FollowEntry {
                    follower: account.to_string(),
                    following,
                    what: vec![kind.as_str().to_string()],
                })
                .collect())
        })
    }

    async fn broadcast_vote(&self, vote: &VoteOperation) -> Result<TxResult> {
        self.with_state(|s| {
            if s.fail_broadcasts {
                return Err(anyhow::anyhow!("broadcast rejected"));
            }
            s.votes.push(vote.clone());
            Ok(Self::next_tx(s))
        })
    }

    async fn broadcast_report(&self, report: &ReportComment) -> Result<TxResult> {
        self.with_state(|s| {
            if s.fail_broadcasts {
                return Err(anyhow::anyhow!("broadcast rejected"));
            }
            s.reports.push(report.clone());
            Ok(Self::next_tx(s))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_following_pages_from_start() {
        let ledger = InMemoryLedger::new();
        ledger.set_follows(FollowKind::Blog, &["a", "b", "c", "d"]);

        let first = ledger.following("me", "", FollowKind::Blog, 2).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[1].following, "b");

        let second = ledger.following("me", "b", FollowKind::Blog, 2).await.unwrap();
        assert_eq!(second[0].following, "b");
        assert_eq!(second[1].following, "c");
    }

    #[tokio::test]
    async fn test_blocks_above_head_are_missing() {
        let ledger = InMemoryLedger::new();
        ledger.set_head(10);

        assert!(ledger.block(10).await.unwrap().is_some());
        assert!(ledger.block(11).await.unwrap().is_none());
        assert_eq!(ledger.block_fetches(), vec![10, 11]);
    }
}
