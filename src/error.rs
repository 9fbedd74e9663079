//! Wallet Engine Error Types
//!
//! Single error taxonomy for the wallet core. Domain errors surface to the
//! caller unchanged; invariant violations are fatal to the operation that
//! detected them and are never silently swallowed.

use thiserror::Error;

/// Wallet engine error types
///
/// Error codes are stable strings used verbatim in API responses.
#[derive(Error, Debug, Clone)]
pub enum WalletError {
    // === Validation Errors ===
    #[error("Amount must be a positive number of minor units")]
    InvalidAmount,

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Sender and recipient cannot be the same wallet")]
    SelfTransfer,

    // === Lookup Errors ===
    #[error("Not found: {0}")]
    NotFound(String),

    // === Wallet State Errors ===
    #[error("Wallet is not active (status: {0})")]
    WalletInactive(String),

    #[error("Insufficient funds")]
    InsufficientFunds,

    // === Idempotency Errors ===
    #[error("Idempotency key is already in flight with a conflicting request")]
    DuplicateIdempotencyKey,

    // === Settlement Errors ===
    #[error("External provider error: {0}")]
    Provider(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    // === System Errors ===
    #[error("Ledger consistency violation: {0}")]
    Inconsistency(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal system error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl WalletError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            WalletError::InvalidAmount => "INVALID_AMOUNT",
            WalletError::Validation(_) => "VALIDATION_ERROR",
            WalletError::SelfTransfer => "SELF_TRANSFER",
            WalletError::NotFound(_) => "NOT_FOUND",
            WalletError::WalletInactive(_) => "WALLET_INACTIVE",
            WalletError::InsufficientFunds => "INSUFFICIENT_FUNDS",
            WalletError::DuplicateIdempotencyKey => "DUPLICATE_IDEMPOTENCY_KEY",
            WalletError::Provider(_) => "EXTERNAL_PROVIDER_ERROR",
            WalletError::Conflict(_) => "CONFLICT",
            WalletError::Inconsistency(_) => "INTERNAL_CONSISTENCY",
            WalletError::Database(_) => "DATABASE_ERROR",
            WalletError::Internal(_) => "INTERNAL_ERROR",
            WalletError::Unavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            WalletError::InvalidAmount
            | WalletError::Validation(_)
            | WalletError::SelfTransfer => 400,
            WalletError::NotFound(_) => 404,
            WalletError::WalletInactive(_) | WalletError::InsufficientFunds => 422,
            WalletError::DuplicateIdempotencyKey | WalletError::Conflict(_) => 409,
            WalletError::Provider(_) => 502,
            WalletError::Inconsistency(_)
            | WalletError::Database(_)
            | WalletError::Internal(_) => 500,
            WalletError::Unavailable(_) => 503,
        }
    }
}

impl From<sqlx::Error> for WalletError {
    fn from(e: sqlx::Error) -> Self {
        WalletError::Database(e.to_string())
    }
}

impl From<anyhow::Error> for WalletError {
    fn from(e: anyhow::Error) -> Self {
        WalletError::Internal(e.to_string())
    }
}
