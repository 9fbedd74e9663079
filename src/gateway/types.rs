//! Gateway types
//!
//! - `ApiResponse<T>`: Unified response wrapper
//! - `ApiError` / `ApiResult`: Handler error plumbing
//! - `error_codes`: Standard error code constants
//! - Request/response DTOs for the wallet API

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::core_types::AmountMinor;
use crate::error::WalletError;
use crate::store::{BalanceView, TxnPage};
use crate::topup::TopupReceipt;
use crate::transaction::Transaction;

/// Fractional digits of the display form; minor units are cents.
const DISPLAY_SCALE: u32 = 2;

/// Render minor units at display scale: 2500 becomes "25.00".
/// Amounts never exceed [`crate::ledger::MAX_AMOUNT_MINOR`], so the cast
/// to i64 cannot truncate.
pub fn format_minor(amount: AmountMinor) -> String {
    Decimal::new(amount as i64, DISPLAY_SCALE).to_string()
}

// ============================================================================
// Unified API Response Format
// ============================================================================

/// Unified API response wrapper
///
/// All API responses follow this structure:
/// - code: 0 = success, non-zero = error code
/// - msg: short message description
/// - data: actual data (success) or null (error)
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response code: 0 for success, non-zero for errors
    #[schema(example = 0)]
    pub code: i32,
    /// Response message
    #[schema(example = "ok")]
    pub msg: String,
    /// Response data (only present when code == 0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Create success response
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }

    /// Create error response
    pub fn error(code: i32, msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}

/// Standard API error codes
pub mod error_codes {
    // Success
    pub const SUCCESS: i32 = 0;

    // Client errors (1xxx)
    pub const INVALID_PARAMETER: i32 = 1001;
    pub const INSUFFICIENT_BALANCE: i32 = 1002;
    pub const SELF_TRANSFER: i32 = 1003;
    pub const WALLET_INACTIVE: i32 = 1004;

    // Auth errors (2xxx)
    pub const MISSING_AUTH: i32 = 2001;
    pub const AUTH_FAILED: i32 = 2002;

    // Resource errors (4xxx)
    pub const NOT_FOUND: i32 = 4001;
    pub const CONFLICT: i32 = 4091;
    pub const DUPLICATE_IN_FLIGHT: i32 = 4092;

    // Server errors (5xxx)
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const SERVICE_UNAVAILABLE: i32 = 5001;
    pub const DATABASE_ERROR: i32 = 5002;
    pub const PROVIDER_ERROR: i32 = 5020;
}

/// Handler-level error carrying the HTTP status and wire code.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: i32,
    pub msg: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: i32, msg: impl Into<String>) -> Self {
        Self {
            status,
            code,
            msg: msg.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            error_codes::INVALID_PARAMETER,
            msg,
        )
    }

    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, error_codes::AUTH_FAILED, msg)
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            error_codes::SERVICE_UNAVAILABLE,
            msg,
        )
    }

    pub fn into_err<T>(self) -> ApiResult<T> {
        Err(self)
    }
}

impl From<WalletError> for ApiError {
    fn from(e: WalletError) -> Self {
        let status = StatusCode::from_u16(e.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let code = match &e {
            WalletError::InvalidAmount | WalletError::Validation(_) => {
                error_codes::INVALID_PARAMETER
            }
            WalletError::SelfTransfer => error_codes::SELF_TRANSFER,
            WalletError::NotFound(_) => error_codes::NOT_FOUND,
            WalletError::WalletInactive(_) => error_codes::WALLET_INACTIVE,
            WalletError::InsufficientFunds => error_codes::INSUFFICIENT_BALANCE,
            WalletError::DuplicateIdempotencyKey => error_codes::DUPLICATE_IN_FLIGHT,
            WalletError::Provider(_) => error_codes::PROVIDER_ERROR,
            WalletError::Conflict(_) => error_codes::CONFLICT,
            WalletError::Inconsistency(_) | WalletError::Internal(_) => {
                error_codes::INTERNAL_ERROR
            }
            WalletError::Database(_) => error_codes::DATABASE_ERROR,
            WalletError::Unavailable(_) => error_codes::SERVICE_UNAVAILABLE,
        };
        Self {
            status,
            code,
            msg: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ApiResponse::<()>::error(self.code, self.msg)),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Wrap response data in the standard success envelope.
pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

// ============================================================================
// Request DTOs
// ============================================================================

/// Custom deserializer for non-empty strings
fn deserialize_non_empty_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    if s.is_empty() {
        return Err(serde::de::Error::custom("string cannot be empty"));
    }
    Ok(s)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TransferRequest {
    /// Recipient's public wallet tag
    #[serde(deserialize_with = "deserialize_non_empty_string")]
    #[schema(example = "bob")]
    pub recipient_tag: String,
    /// Amount in minor units (2500 = 25.00)
    #[schema(example = 2500u64)]
    pub amount_minor: u64,
    #[schema(example = "rent")]
    pub memo: Option<String>,
    /// Client-chosen deduplication token; retries with the same key replay
    /// the original result
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TopupRequest {
    /// Amount in minor units
    #[schema(example = 5000u64)]
    pub amount_minor: u64,
    /// Provider-side payment method handle
    #[serde(deserialize_with = "deserialize_non_empty_string")]
    #[schema(example = "pm_card_visa")]
    pub payment_method_ref: String,
}

/// One delivery from the provider's outcome feed.
#[derive(Debug, Deserialize, ToSchema)]
pub struct WebhookEvent {
    #[schema(example = "payment_succeeded")]
    pub event_type: String,
    #[schema(example = "inv_01JF3V9KQZ")]
    pub invoice_ref: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListQuery {
    /// Page size, clamped to 1..=100 (default 20)
    pub limit: Option<usize>,
    /// Items to skip (default 0)
    pub offset: Option<usize>,
    /// TOPUP | CHARGE | REFUND | WITHDRAW | TRANSFER_IN | TRANSFER_OUT
    pub txn_type: Option<String>,
    /// PENDING | SUCCEEDED | FAILED | CANCELLED
    pub status: Option<String>,
}

// ============================================================================
// Response DTOs
// ============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct TransferResponseData {
    pub transaction_id: Uuid,
    /// Sender balance after the debit, minor units
    #[schema(example = 7500u64)]
    pub balance_after_minor: u64,
    /// Display form of the balance
    #[schema(example = "75.00")]
    pub balance_after: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TopupResponseData {
    pub transaction_id: Uuid,
    #[schema(example = "PENDING")]
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_ref: Option<String>,
    /// Present only when the invoice settled inside this call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance_after_minor: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "50.00")]
    pub balance_after: Option<String>,
}

impl From<TopupReceipt> for TopupResponseData {
    fn from(receipt: TopupReceipt) -> Self {
        Self {
            transaction_id: receipt.transaction_id,
            status: receipt.status.as_str().to_string(),
            invoice_ref: receipt.invoice_ref,
            balance_after_minor: receipt.balance_after,
            balance_after: receipt.balance_after.map(format_minor),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CancelResponseData {
    pub transaction_id: Uuid,
    #[schema(example = "CANCELLED")]
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAckData {
    /// Whether this delivery mutated anything
    pub applied: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BalanceResponseData {
    pub wallet_id: u64,
    /// Balance in minor units
    #[schema(example = 10000u64)]
    pub balance_minor: u64,
    /// Display form of the balance
    #[schema(example = "100.00")]
    pub balance: String,
    #[schema(example = "USD")]
    pub currency: String,
    #[schema(example = "active")]
    pub status: String,
}

impl From<BalanceView> for BalanceResponseData {
    fn from(view: BalanceView) -> Self {
        Self {
            wallet_id: view.wallet_id,
            balance_minor: view.balance,
            balance: format_minor(view.balance),
            currency: view.currency,
            status: view.status.as_str().to_string(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TxnItemData {
    pub transaction_id: Uuid,
    #[schema(example = "TRANSFER_OUT")]
    pub txn_type: String,
    #[schema(example = "SUCCEEDED")]
    pub status: String,
    pub amount_minor: u64,
    #[schema(example = "25.00")]
    pub amount: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Transaction> for TxnItemData {
    fn from(txn: Transaction) -> Self {
        Self {
            transaction_id: txn.id,
            txn_type: txn.txn_type.as_str().to_string(),
            status: txn.status.as_str().to_string(),
            amount_minor: txn.amount,
            amount: format_minor(txn.amount),
            memo: txn.memo,
            external_provider: txn.external_provider,
            external_ref: txn.external_ref,
            created_at: txn.created_at,
            updated_at: txn.updated_at,
        }
    }
}

/// One page of transaction history, newest first.
#[derive(Debug, Serialize, ToSchema)]
pub struct TxnListData {
    pub items: Vec<TxnItemData>,
    /// Total records matching the filter
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

impl From<TxnPage> for TxnListData {
    fn from(page: TxnPage) -> Self {
        Self {
            items: page.items.into_iter().map(TxnItemData::from).collect(),
            total: page.total,
            limit: page.limit,
            offset: page.offset,
        }
    }
}
