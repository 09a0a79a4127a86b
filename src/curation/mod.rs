//! Curation: deciding which posts get a vote
//!
//! ## Pipeline
//!
//! ```text
//! CandidatePost
//!      │
//!      ▼
//! suspended? ── yes ──► skip (not counted)
//!      │ scanned++
//!      ▼
//! jailed? ───── yes ──► skip (expired entries released here)
//!      │
//!      ▼
//! benched and not followed? ── yes ──► skip
//!      │
//!      ▼
//! throttle, fetch content ── missing/malformed ──► skip
//!      │
//!      ▼
//! stale? ────── yes ──► strike (jail + EDIT JAIL report at the limit)
//!      │
//!      ▼
//! skip-tag? ─── yes ──► TAG REJECTION
//!      │
//!      ▼
//! quality rules ── fail ──► FAST TRACK / STANDARD RULE REJECTION
//!      │
//!      ▼
//! vote (weight doubled on fast track)
//! ```

pub mod content;
pub mod pipeline;
pub mod report;
pub mod rules;

pub use content::{PostSnapshot, image_count, parse_tags, word_count};
pub use pipeline::{Curator, CuratorConfig, Dispatcher, Outcome, SkipReason, Verdict, judge};
pub use report::{
    ReportColumn, ReportColumns, ReportKind, ReportRow, ReportTarget, Reporter, render_table,
    report_permlink,
};
pub use rules::{Eligibility, QualityRules};
