//! Ledger Scout
//!
//! Autonomous curation agent for a Hive-style ledger. It follows the block
//! stream, evaluates every new root post against anti-abuse and quality
//! rules, and votes within a regenerating voting power budget.
//!
//! ## Module Structure
//!
//! ```text
//! src/
//! ├── lib.rs         - Crate root with re-exports
//! ├── main.rs        - Agent entrypoint
//! ├── config.rs      - Environment configuration
//! ├── error.rs       - Error taxonomy
//! ├── scout.rs       - Session supervisor and hibernation
//! ├── social.rs      - Followed / muted / file-based account lists
//! ├── stats.rs       - Counters and periodic summary
//! ├── stream/        - Block catch-up poller
//! ├── curation/      - Evaluation pipeline
//! │   ├── content.rs  - Word, image and tag extraction
//! │   ├── rules.rs    - Quality thresholds and vote weight
//! │   ├── pipeline.rs - Curator and dispatcher
//! │   └── report.rs   - Markdown report tables
//! ├── jail/          - Edit-abuse tracking
//! │   ├── tracker.rs - Strike and jail state machine
//! │   └── store.rs   - Durable snapshot store
//! ├── governor/      - Voting power budget
//! │   ├── budget.rs  - Regeneration arithmetic, suspend flag
//! │   └── monitor.rs - Periodic sampler
//! ├── ledger/        - Chain access
//! │   ├── client.rs  - JSON-RPC client with failover and signing relay
//! │   ├── dry_run.rs - Broadcast-suppressing wrapper
//! │   ├── memory.rs  - In-memory ledger for tests
//! │   └── types.rs   - Wire types
//! └── api/           - Read-only status API
//! ```

pub mod api;
pub mod config;
pub mod curation;
pub mod error;
pub mod governor;
pub mod jail;
pub mod ledger;
pub mod scout;
pub mod social;
pub mod stats;
pub mod stream;

// Re-export main types for convenience
pub use config::ScoutConfig;
pub use error::ScoutError;
pub use scout::Scout;

pub use curation::{
    Curator, CuratorConfig, Dispatcher, Outcome, QualityRules, ReportColumns, ReportKind,
    ReportTarget, Reporter, SkipReason, Verdict,
};
pub use governor::{BudgetMode, BudgetPolicy, Governor, SuspendFlag};
pub use jail::{EditJail, InMemoryStore, JailPolicy, JailSnapshot, JsonFileStore, StateStore};
pub use ledger::{DryRunLedger, InMemoryLedger, Ledger, LedgerConfig, RpcLedgerClient};
pub use social::{ListFiles, SocialLists};
pub use stats::{ScoutStats, StatsSnapshot};
pub use stream::{BlockPoller, CandidatePost, CandidateSink, PollReport};

// Re-export API types
pub use api::{StatusState, create_status_router};
