//! OpenAPI / Swagger UI Documentation
//!
//! Auto-generated OpenAPI 3.0 documentation for the wallet API.
//!
//! - Swagger UI: `http://localhost:8080/docs`
//! - OpenAPI JSON: `http://localhost:8080/api-docs/openapi.json`

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

// Import handler types for schema registration
use crate::gateway::handlers::health::HealthResponse;
use crate::gateway::types::{
    BalanceResponseData, CancelResponseData, TopupRequest, TopupResponseData,
    TransferRequest, TransferResponseData, TxnItemData, TxnListData, WebhookAckData,
    WebhookEvent,
};

/// JWT bearer authentication security scheme
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Main API Documentation struct
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Wallet Service API",
        version = "1.0.0",
        description = "Double-entry wallet ledger: balances, peer-to-peer transfers, and external top-ups.",
        license(
            name = "MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Development"),
    ),
    paths(
        // Public endpoints
        crate::gateway::handlers::health::health_check,
        crate::gateway::handlers::topup::payment_webhook,
        // Private endpoints (bearer token)
        crate::gateway::handlers::wallet::get_balance,
        crate::gateway::handlers::wallet::list_transactions,
        crate::gateway::handlers::transfer::create_transfer,
        crate::gateway::handlers::topup::create_topup,
        crate::gateway::handlers::topup::cancel_topup,
    ),
    components(
        schemas(
            HealthResponse,
            BalanceResponseData,
            TransferRequest,
            TransferResponseData,
            TopupRequest,
            TopupResponseData,
            CancelResponseData,
            WebhookEvent,
            WebhookAckData,
            TxnItemData,
            TxnListData,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Wallet", description = "Balance and transaction history (auth required)"),
        (name = "Transfer", description = "Peer-to-peer transfers (auth required)"),
        (name = "Topup", description = "External funding and the provider webhook"),
        (name = "System", description = "Health checks and system info")
    )
)]
pub struct ApiDoc;
