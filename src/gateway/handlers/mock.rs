//! Dev-mode provisioning handlers.
//!
//! [SECURITY] Compiled only with the `mock-provider` feature. Production
//! builds have no wallet-provisioning or token-minting surface.

use std::sync::Arc;

use axum::{Json, extract::State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResult, error_codes, ok};

const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;

#[derive(Debug, Deserialize, ToSchema)]
pub struct MockWalletRequest {
    pub user_id: u64,
    /// Public tag other users address transfers to
    #[schema(example = "alice")]
    pub public_tag: String,
    /// Defaults to USD
    pub currency: Option<String>,
    /// Defaults to 0
    pub opening_balance_minor: Option<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MockWalletResponse {
    pub wallet_id: u64,
}

/// Provision a wallet for a test user
pub async fn mock_open_wallet(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MockWalletRequest>,
) -> ApiResult<MockWalletResponse> {
    let wallet_id = state.store.open_wallet(
        req.user_id,
        &req.public_tag,
        req.currency.as_deref().unwrap_or("USD"),
        req.opening_balance_minor.unwrap_or(0),
    )?;

    info!(user_id = req.user_id, wallet_id, "mock wallet provisioned");
    ok(MockWalletResponse { wallet_id })
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MockTokenRequest {
    pub user_id: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MockTokenResponse {
    pub token: String,
}

/// Mint a bearer token for a test user
pub async fn mock_issue_token(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MockTokenRequest>,
) -> ApiResult<MockTokenResponse> {
    let token = state
        .auth
        .issue_token(req.user_id, DEFAULT_TOKEN_TTL_HOURS)
        .map_err(|e| {
            ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                error_codes::INTERNAL_ERROR,
                e.to_string(),
            )
        })?;

    ok(MockTokenResponse { token })
}
