//! Peer-to-peer transfer handler.

use std::sync::Arc;

use axum::{Extension, Json, extract::State};
use tracing::info;

use crate::auth::Claims;

use super::super::state::AppState;
use super::super::types::{
    ApiResult, TransferRequest, TransferResponseData, format_minor, ok,
};
use super::authed_user;

/// Transfer funds to another wallet by public tag
///
/// Atomic: the debit and credit land together or not at all. Retries with
/// the same idempotency key replay the original receipt instead of moving
/// money twice.
#[utoipa::path(
    post,
    path = "/api/v1/transfers",
    request_body = TransferRequest,
    responses(
        (status = 200, description = "Transfer settled", body = TransferResponseData),
        (status = 400, description = "Invalid amount, unknown recipient tag, or self transfer"),
        (status = 401, description = "Authentication failed"),
        (status = 409, description = "Idempotency key already in flight"),
        (status = 422, description = "Insufficient funds or wallet not active")
    ),
    security(("bearer_auth" = [])),
    tag = "Transfer"
)]
pub async fn create_transfer(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<TransferRequest>,
) -> ApiResult<TransferResponseData> {
    let user_id = authed_user(&claims)?;

    info!(
        user_id,
        recipient_tag = %req.recipient_tag,
        amount_minor = req.amount_minor,
        "transfer requested"
    );

    let receipt = state
        .orchestrator
        .transfer(
            user_id,
            &req.recipient_tag,
            req.amount_minor,
            req.memo,
            req.idempotency_key,
        )
        .await?;

    ok(TransferResponseData {
        transaction_id: receipt.transaction_id,
        balance_after_minor: receipt.balance_after,
        balance_after: format_minor(receipt.balance_after),
    })
}
