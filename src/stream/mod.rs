//! Block stream
//!
//! ```text
//! ┌─────────────┐ head, block(n) ┌──────────────┐ submit  ┌──────────────────┐
//! │ dyn Ledger  │◄───────────────│ BlockPoller  │────────►│ dyn CandidateSink│
//! └─────────────┘                │ (watermark)  │         │ (Dispatcher)     │
//!                                └──────────────┘         └──────────────────┘
//! ```

mod poller;

pub use poller::{BlockPoller, CandidatePost, CandidateSink, PollReport, extract_candidates};
