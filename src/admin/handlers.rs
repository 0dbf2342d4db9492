use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::admin::AdminState;
use crate::guard::{BlacklistedSource, ConnectionStats, RequestStats, UserAgentCount};

const DEFAULT_TOP_LIMIT: usize = 20;
const MAX_TOP_LIMIT: usize = 1000;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
}

#[derive(Deserialize)]
pub struct TopQuery {
    pub limit: Option<usize>,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

pub async fn get_connections(State(state): State<AdminState>) -> Json<ConnectionStats> {
    Json(state.connections.snapshot())
}

pub async fn get_blacklist(State(state): State<AdminState>) -> Json<Vec<BlacklistedSource>> {
    Json(state.connections.blacklisted_sources())
}

pub async fn get_requests(State(state): State<AdminState>) -> Json<RequestStats> {
    Json(state.requests.snapshot())
}

pub async fn get_user_agents(
    State(state): State<AdminState>,
    Query(query): Query<TopQuery>,
) -> Json<Vec<UserAgentCount>> {
    let limit = query.limit.unwrap_or(DEFAULT_TOP_LIMIT).min(MAX_TOP_LIMIT);
    Json(state.requests.top_user_agents(limit))
}
