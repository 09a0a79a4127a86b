//! Edit Jail for Late-Edit Abuse
//!
//! Authors who publish a post and then keep it looking fresh past the
//! evaluation window collect strikes. Two strikes on the same post jail the
//! author for a fixed duration.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐     ┌─────────────────┐
//! │ Curator         │────►│ EditJail         │────►│ dyn StateStore  │
//! │ (check, strike) │     │ (mutex-guarded)  │     │ (JSON file /    │
//! └─────────────────┘     └──────────────────┘     │  in-memory)     │
//!                                                  └─────────────────┘
//! ```
//!
//! ## State Model
//!
//! - Edit record: `author/permlink` -> strike count, never purged
//! - Jail entries: author -> jail start in unix milliseconds
//! - Expired entries are released lazily on the next check

mod store;
mod tracker;

pub use store::{InMemoryStore, JailSnapshot, JsonFileStore, StateStore};
pub use tracker::{EditJail, JailPolicy, JailRecord, JailStatus, StrikeOutcome, post_id};
