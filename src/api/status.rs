//! Status API Endpoints
//!
//! Read-only monitoring of the running scout. Nothing here changes state:
//! jail listings skip expired entries without releasing them.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::governor::Governor;
use crate::jail::{EditJail, JailRecord};
use crate::social::{ListCounts, SocialLists};
use crate::stats::{ScoutStats, StatsSnapshot};

/// API state for status endpoints
#[derive(Clone)]
pub struct StatusState {
    pub account: String,
    pub dry_run: bool,
    pub governor: Arc<Governor>,
    pub jail: Arc<EditJail>,
    pub social: Arc<SocialLists>,
    pub stats: Arc<ScoutStats>,
}

// Response types

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub account: String,
    pub mode: String,
    pub dry_run: bool,
    pub suspended: bool,
    pub voting_power_pct: f64,
    pub threshold_pct: f64,
    pub last_sample_time: Option<DateTime<Utc>>,
    pub last_vote_time: Option<DateTime<Utc>>,
    pub watermark: u64,
    pub lists: ListCounts,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JailResponse {
    pub strike_limit: u32,
    pub jail_hours: i64,
    pub tracked_posts: usize,
    pub jailed: Vec<JailRecord>,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn get_status(State(state): State<StatusState>) -> Json<StatusResponse> {
    let budget = state.governor.snapshot().await;
    let policy = state.governor.policy();

    Json(StatusResponse {
        account: state.account.clone(),
        mode: policy.mode.as_str().to_string(),
        dry_run: state.dry_run,
        suspended: state.governor.is_suspended(),
        voting_power_pct: budget.level_pct(),
        threshold_pct: policy.threshold_pct,
        last_sample_time: budget.last_sample_time,
        last_vote_time: budget.last_action_time,
        watermark: state.stats.snapshot().watermark,
        lists: state.social.counts().await,
    })
}

pub async fn get_stats(State(state): State<StatusState>) -> Json<StatsSnapshot> {
    Json(state.stats.snapshot())
}

pub async fn get_jail(State(state): State<StatusState>) -> Json<JailResponse> {
    let policy = *state.jail.policy();
    let snapshot = state.jail.snapshot().await;

    Json(JailResponse {
        strike_limit: policy.strike_limit,
        jail_hours: policy.duration.num_hours(),
        tracked_posts: snapshot.edit_record.len(),
        jailed: state.jail.active(Utc::now()).await,
    })
}

pub async fn get_jailed_author(
    State(state): State<StatusState>,
    Path(author): Path<String>,
) -> Result<Json<JailRecord>, (StatusCode, String)> {
    let author = author.to_lowercase();

    state
        .jail
        .active(Utc::now())
        .await
        .into_iter()
        .find(|record| record.author == author)
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, format!("@{} is not jailed", author)))
}

/// Create the status router
pub fn create_status_router(state: StatusState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(get_status))
        .route("/stats", get(get_stats))
        .route("/jail", get(get_jail))
        .route("/jail/{author}", get(get_jailed_author))
        .with_state(state)
}
