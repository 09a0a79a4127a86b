//! HTTP API endpoints for the scout
//!
//! Provides a read-only status API:
//! - `/health` liveness
//! - `/status` account, voting power, suspension and watermark
//! - `/stats` process-lifetime counters
//! - `/jail` active edit-jail entries

pub mod status;

pub use status::{StatusState, create_status_router};
