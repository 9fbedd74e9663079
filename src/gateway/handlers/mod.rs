//! HTTP request handlers

pub mod health;
pub mod topup;
pub mod transfer;
pub mod wallet;

#[cfg(feature = "mock-provider")]
pub mod mock;

pub use health::health_check;
pub use topup::{cancel_topup, create_topup, payment_webhook};
pub use transfer::create_transfer;
pub use wallet::{get_balance, list_transactions};

use crate::auth::Claims;
use crate::core_types::UserId;

use super::types::ApiError;

/// Extract the authenticated user id from verified claims.
///
/// The middleware has already checked the signature; a non-numeric subject
/// means the token was minted for some other audience.
pub(crate) fn authed_user(claims: &Claims) -> Result<UserId, ApiError> {
    claims
        .user_id()
        .map_err(|_| ApiError::auth_failed("Invalid token subject"))
}
