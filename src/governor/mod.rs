//! Voting Power Governor
//!
//! Keeps the scout inside its regenerating resource budget.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐  sample   ┌──────────────────┐  LowBudget  ┌─────────────┐
//! │ dyn Ledger      │◄──────────│ Governor         │────────────►│ Scout       │
//! │ (get_accounts)  │           │ (estimate, floor)│   (mpsc)    │ (hibernate) │
//! └─────────────────┘           └────────┬─────────┘             └──────┬──────┘
//!                                        │ note_vote                    │
//!                                        ▲                              ▼
//!                               ┌──────────────────┐           ┌──────────────┐
//!                               │ Curator          │──────────►│ SuspendFlag  │
//!                               └──────────────────┘  checks   └──────────────┘
//! ```
//!
//! ## Budget Model
//!
//! - Level in basis points, regenerating 10000 per `regen_secs`, capped
//! - Monitored mode hibernates below `threshold_pct`
//! - Unmonitored mode samples for display and never suspends

mod budget;
mod monitor;

pub use budget::{
    BudgetMode, BudgetPolicy, BudgetState, DEFAULT_REGEN_SECS, MAX_LEVEL, SuspendFlag,
    estimate_level, vote_cost,
};
pub use monitor::{Governor, LowBudget};
