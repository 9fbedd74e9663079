//! Wallet read-path handlers: balance and transaction history.

use std::sync::Arc;

use axum::Extension;
use axum::extract::{Query, State};

use crate::auth::Claims;
use crate::error::WalletError;
use crate::store::{Page, TxnFilter};
use crate::transaction::{TxnStatus, TxnType};

use super::super::state::AppState;
use super::super::types::{
    ApiError, ApiResult, BalanceResponseData, ListQuery, TxnListData, ok,
};
use super::authed_user;

const DEFAULT_PAGE_LIMIT: usize = 20;
const MAX_PAGE_LIMIT: usize = 100;

/// Get current wallet balance
#[utoipa::path(
    get,
    path = "/api/v1/wallet/balance",
    responses(
        (status = 200, description = "Current balance", body = BalanceResponseData),
        (status = 401, description = "Authentication failed"),
        (status = 404, description = "No wallet for this user")
    ),
    security(("bearer_auth" = [])),
    tag = "Wallet"
)]
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<BalanceResponseData> {
    let user_id = authed_user(&claims)?;
    let view = state.store.balance_of(user_id).await?;
    ok(BalanceResponseData::from(view))
}

/// List wallet transactions, newest first
///
/// Supports status and type filters plus limit/offset paging. The page
/// carries `total` so clients can detect the end of history.
#[utoipa::path(
    get,
    path = "/api/v1/transactions",
    params(ListQuery),
    responses(
        (status = 200, description = "One page of history", body = TxnListData),
        (status = 400, description = "Unknown filter value"),
        (status = 401, description = "Authentication failed"),
        (status = 404, description = "No wallet for this user")
    ),
    security(("bearer_auth" = [])),
    tag = "Wallet"
)]
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ListQuery>,
) -> ApiResult<TxnListData> {
    let user_id = authed_user(&claims)?;
    let wallet_id = state
        .store
        .wallet_id_of(user_id)
        .ok_or_else(|| ApiError::from(WalletError::NotFound(format!("wallet for user {user_id}"))))?;

    let mut filter = TxnFilter::default();
    if let Some(raw) = &query.txn_type {
        filter.txn_type = Some(
            TxnType::from_str_upper(raw)
                .ok_or_else(|| ApiError::bad_request(format!("unknown txn_type '{raw}'")))?,
        );
    }
    if let Some(raw) = &query.status {
        filter.status = Some(
            TxnStatus::from_str_upper(raw)
                .ok_or_else(|| ApiError::bad_request(format!("unknown status '{raw}'")))?,
        );
    }

    let page = Page {
        limit: query
            .limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT),
        offset: query.offset.unwrap_or(0),
    };

    let result = state.store.list_transactions(wallet_id, &filter, page).await;
    ok(TxnListData::from(result))
}
