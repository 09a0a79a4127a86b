//! Ledger Integration Module
//!
//! The scout only needs a handful of chain capabilities: read the head,
//! read a block, read an account, read a post, page through follow lists,
//! and hand unsigned operations to something that can sign and submit them.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐      ┌──────────────────┐      ┌──────────────┐
//! │ BlockPoller     │─────►│  dyn Ledger      │◄─────│ Governor     │
//! │ Curator         │      │                  │      │ SocialLists  │
//! └─────────────────┘      └────────┬─────────┘      └──────────────┘
//!                                   │
//!            ┌──────────────────────┼───────────────────────┐
//!            ▼                      ▼                       ▼
//!   ┌─────────────────┐   ┌──────────────────┐    ┌──────────────────┐
//!   │ RpcLedgerClient │   │ DryRunLedger     │    │ InMemoryLedger   │
//!   │ (JSON-RPC +     │   │ (reads pass,     │    │ (scripted, for   │
//!   │  signing relay) │   │  writes logged)  │    │  tests)          │
//!   └─────────────────┘   └──────────────────┘    └──────────────────┘
//! ```

pub mod client;
pub mod dry_run;
pub mod memory;
pub mod types;

use anyhow::Result;
use async_trait::async_trait;

pub use client::{LedgerConfig, RpcLedgerClient};
pub use dry_run::DryRunLedger;
pub use memory::InMemoryLedger;
pub use types::*;

/// Chain capabilities used by the scout
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Current head block height
    async fn head_height(&self) -> Result<u64>;

    /// Block at `height`, `None` when the node has not produced it yet
    async fn block(&self, height: u64) -> Result<Option<Block>>;

    /// Voting power and last vote time of an account
    async fn account(&self, name: &str) -> Result<AccountState>;

    /// A post, `None` when it does not exist
    async fn content(&self, author: &str, permlink: &str) -> Result<Option<PostContent>>;

    /// One page of an account's follow list, starting at `start` (inclusive)
    async fn following(
        &self,
        account: &str,
        start: &str,
        kind: FollowKind,
        limit: u32,
    ) -> Result<Vec<FollowEntry>>;

    async fn broadcast_vote(&self, vote: &VoteOperation) -> Result<TxResult>;

    async fn broadcast_report(&self, report: &ReportComment) -> Result<TxResult>;
}
