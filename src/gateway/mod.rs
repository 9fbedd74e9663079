//! HTTP Gateway
//!
//! Axum server exposing the wallet API:
//! - Private routes (bearer token): transfers, top-ups, balance, history
//! - Public routes: health check, provider outcome webhook
//! - Swagger UI at `/docs`

pub mod handlers;
pub mod openapi;
pub mod state;
pub mod types;

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode, header};
use axum::middleware::{Next, from_fn_with_state};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;

pub use state::AppState;
use types::{ApiResponse, error_codes};

type AuthRejection = (StatusCode, Json<ApiResponse<()>>);

/// Verify the bearer token and inject [`crate::auth::Claims`] into request
/// extensions for downstream handlers.
async fn jwt_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AuthRejection> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or((
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::<()>::error(
                error_codes::MISSING_AUTH,
                "Missing Authorization header",
            )),
        ))?;

    let token = auth_header.strip_prefix("Bearer ").ok_or((
        StatusCode::UNAUTHORIZED,
        Json(ApiResponse::<()>::error(
            error_codes::AUTH_FAILED,
            "Authorization header must be 'Bearer {token}'",
        )),
    ))?;

    match state.auth.verify_token(token) {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            Ok(next.run(request).await)
        }
        Err(_) => Err((
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::<()>::error(
                error_codes::AUTH_FAILED,
                "Invalid or expired token",
            )),
        )),
    }
}

/// Build the full application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let private = Router::new()
        .route("/transfers", post(handlers::create_transfer))
        .route("/topups", post(handlers::create_topup))
        .route("/topups/{txn_id}/cancel", post(handlers::cancel_topup))
        .route("/wallet/balance", get(handlers::get_balance))
        .route("/transactions", get(handlers::list_transactions))
        .layer(from_fn_with_state(state.clone(), jwt_auth_middleware));

    // The webhook stays public: the payment rail signs nothing and retries
    // until acknowledged.
    let public = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/webhooks/payment", post(handlers::payment_webhook));

    let app = Router::new().nest("/api/v1", private.merge(public));

    // [SECURITY] Dev-only provisioning surface, compiled out of production.
    #[cfg(feature = "mock-provider")]
    let app = app.nest(
        "/internal/mock",
        Router::new()
            .route("/wallet", post(handlers::mock::mock_open_wallet))
            .route("/token", post(handlers::mock::mock_issue_token)),
    );

    app.with_state(state).merge(
        SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()),
    )
}

/// Start HTTP Gateway server (blocks until shutdown).
pub async fn run_server(config: &AppConfig, state: Arc<AppState>) {
    handlers::health::mark_started();
    let app = build_router(state);

    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("❌ FATAL: Failed to bind to {}: {}", addr, e);
            eprintln!(
                "   Hint: port {} may already be in use. Check with: lsof -i :{}",
                config.gateway.port, config.gateway.port
            );
            std::process::exit(1);
        }
    };

    println!("🚀 Gateway listening on http://{}", addr);
    println!("📖 API Docs: http://{}/docs", addr);

    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("❌ FATAL: Server error: {}", e);
        std::process::exit(1);
    }
}
