//! Bearer-token verification
//!
//! Identity lives upstream; this service only verifies the HS256 tokens the
//! identity side mints. Issuance is kept here as well so dev mode and tests
//! can mint their own tokens against the shared secret.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::core_types::UserId;

/// Claims carried by a wallet bearer token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User id, stringified per JWT convention.
    pub sub: String,
    /// Expiry, seconds since epoch.
    pub exp: usize,
    /// Issued at, seconds since epoch.
    pub iat: usize,
}

impl Claims {
    /// Parse the subject back into a user id.
    pub fn user_id(&self) -> Result<UserId> {
        self.sub
            .parse::<UserId>()
            .with_context(|| format!("invalid token subject '{}'", self.sub))
    }
}

pub struct AuthService {
    jwt_secret: String,
}

impl AuthService {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
        }
    }

    /// Issue a token for `user_id`, valid for `ttl_hours`.
    pub fn issue_token(&self, user_id: UserId, ttl_hours: i64) -> Result<String> {
        let now = Utc::now();
        let expiration = now
            .checked_add_signed(Duration::hours(ttl_hours))
            .context("token expiry out of range")?
            .timestamp();

        let claims = Claims {
            sub: user_id.to_string(),
            exp: expiration as usize,
            iat: now.timestamp() as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .context("Failed to generate token")
    }

    /// Verify signature and expiry, returning the claims.
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )?;
        Ok(data.claims)
    }
}
