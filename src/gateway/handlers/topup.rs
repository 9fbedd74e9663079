//! Top-up handlers: invoice creation, cancellation, and the provider
//! outcome webhook.

use std::sync::Arc;

use axum::{Extension, Json};
use axum::extract::{Path, State};
use tracing::info;
use uuid::Uuid;

use crate::auth::Claims;
use crate::topup::decode_event_type;

use super::super::state::AppState;
use super::super::types::{
    ApiResult, CancelResponseData, TopupRequest, TopupResponseData, WebhookAckData,
    WebhookEvent, ok,
};
use super::authed_user;

/// Fund the wallet from an external payment method
///
/// Settles immediately when the provider pays at creation; otherwise
/// returns PENDING and the invoice ref, to be settled by a later webhook.
#[utoipa::path(
    post,
    path = "/api/v1/topups",
    request_body = TopupRequest,
    responses(
        (status = 200, description = "Top-up settled or pending", body = TopupResponseData),
        (status = 400, description = "Invalid amount or payment method"),
        (status = 401, description = "Authentication failed"),
        (status = 422, description = "Wallet not active"),
        (status = 502, description = "Provider rejected or unreachable")
    ),
    security(("bearer_auth" = [])),
    tag = "Topup"
)]
pub async fn create_topup(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<TopupRequest>,
) -> ApiResult<TopupResponseData> {
    let user_id = authed_user(&claims)?;

    info!(user_id, amount_minor = req.amount_minor, "top-up requested");

    let receipt = state
        .reconciler
        .initiate(user_id, req.amount_minor, &req.payment_method_ref)
        .await?;

    ok(TopupResponseData::from(receipt))
}

/// Cancel a pending top-up
///
/// Only PENDING top-ups can be cancelled; settled ones conflict.
#[utoipa::path(
    post,
    path = "/api/v1/topups/{txn_id}/cancel",
    params(
        ("txn_id" = Uuid, Path, description = "Top-up transaction id")
    ),
    responses(
        (status = 200, description = "Top-up cancelled", body = CancelResponseData),
        (status = 401, description = "Authentication failed"),
        (status = 404, description = "No such top-up for this user"),
        (status = 409, description = "Top-up already settled")
    ),
    security(("bearer_auth" = [])),
    tag = "Topup"
)]
pub async fn cancel_topup(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(txn_id): Path<Uuid>,
) -> ApiResult<CancelResponseData> {
    let user_id = authed_user(&claims)?;

    let txn = state.reconciler.cancel(user_id, txn_id).await?;

    ok(CancelResponseData {
        transaction_id: txn.id,
        status: txn.status.as_str().to_string(),
    })
}

/// Provider outcome webhook
///
/// Unauthenticated: the payment rail delivers here directly, at least
/// once and in no particular order. Every recognized delivery is
/// acknowledged with 200 so the rail stops redelivering; `applied` tells
/// whether this particular delivery changed anything.
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/payment",
    request_body = WebhookEvent,
    responses(
        (status = 200, description = "Delivery acknowledged", body = WebhookAckData),
        (status = 400, description = "Malformed event payload")
    ),
    tag = "Topup"
)]
pub async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    Json(event): Json<WebhookEvent>,
) -> ApiResult<WebhookAckData> {
    let Some(outcome) = decode_event_type(&event.event_type) else {
        // Rails send lifecycle noise (created, expiring soon) we don't track.
        info!(event_type = %event.event_type, "ignoring unrecognized webhook event type");
        return ok(WebhookAckData { applied: false });
    };

    let receipt = state
        .reconciler
        .apply_external_outcome(&event.invoice_ref, outcome)
        .await?;

    ok(WebhookAckData {
        applied: receipt.applied,
    })
}
