//! Health check handler

use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use axum::Json;
use axum::extract::State;
use once_cell::sync::Lazy;
use serde::Serialize;
use utoipa::ToSchema;

use super::super::state::AppState;
use super::super::types::ApiResponse;

static STARTED_AT: Lazy<Instant> = Lazy::new(Instant::now);

/// Pin the process start time; uptime counts from the first call.
pub fn mark_started() {
    Lazy::force(&STARTED_AT);
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Server timestamp in milliseconds
    #[schema(example = 1703494800000_u64)]
    pub timestamp_ms: u64,
    /// Build identifier (short git hash)
    #[schema(example = "a1b2c3d")]
    pub git_hash: String,
    pub uptime_secs: u64,
    /// Wallets currently provisioned
    pub wallets: usize,
    /// Transactions recorded since start
    pub transactions: usize,
    /// Ledger entries recorded since start
    pub ledger_entries: usize,
    /// Idempotency claims currently retained
    pub live_claims: usize,
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    ),
    tag = "System"
)]
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<HealthResponse>> {
    let stats = state.store.stats().await;
    let timestamp_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);

    Json(ApiResponse::success(HealthResponse {
        timestamp_ms,
        git_hash: env!("GIT_HASH").to_string(),
        uptime_secs: STARTED_AT.elapsed().as_secs(),
        wallets: stats.wallets,
        transactions: stats.transactions,
        ledger_entries: stats.ledger_entries,
        live_claims: state.guard.len(),
    }))
}
