//! Gateway application state

use std::sync::Arc;

use crate::auth::AuthService;
use crate::idempotency::IdempotencyGuard;
use crate::store::LedgerStore;
use crate::topup::TopupReconciler;
use crate::transfer::TransferOrchestrator;

/// Shared state for all gateway handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<LedgerStore>,
    pub orchestrator: Arc<TransferOrchestrator>,
    pub reconciler: Arc<TopupReconciler>,
    pub guard: Arc<IdempotencyGuard>,
    pub auth: Arc<AuthService>,
}

impl AppState {
    pub fn new(
        store: Arc<LedgerStore>,
        orchestrator: Arc<TransferOrchestrator>,
        reconciler: Arc<TopupReconciler>,
        guard: Arc<IdempotencyGuard>,
        auth: Arc<AuthService>,
    ) -> Self {
        Self {
            store,
            orchestrator,
            reconciler,
            guard,
            auth,
        }
    }
}
