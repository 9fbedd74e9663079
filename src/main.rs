//! walletd - Wallet Ledger and Transfer Engine
//!
//! Service entry point. Wiring:
//!
//! ```text
//! ┌──────────┐    ┌───────────────┐    ┌──────────────┐
//! │ Gateway  │───▶│  LedgerStore  │───▶│ CommitEvents │──▶ PostgreSQL
//! │ (axum)   │    │ (authoritative)│   │   (mpsc)     │    (write-behind)
//! └──────────┘    └───────────────┘    └──────────────┘
//!      │                  ▲
//!      └─▶ Orchestrator / Reconciler / IdempotencyGuard
//! ```
//!
//! The store is the source of truth; the journal worker mirrors committed
//! effects and never sits on the request path.

use std::sync::Arc;

use walletd::auth::AuthService;
use walletd::config::AppConfig;
use walletd::gateway::{self, AppState};
use walletd::idempotency::IdempotencyGuard;
use walletd::logging::init_logging;
use walletd::persistence::{Database, JournalWorker, JournalWriter, init_schema};
use walletd::store::LedgerStore;
use walletd::sweeper::{ClaimSweeper, SweeperConfig};
use walletd::topup::{PaymentProvider, RestProvider, TopupReconciler};
use walletd::transfer::TransferOrchestrator;

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

fn build_provider(config: &AppConfig) -> Arc<dyn PaymentProvider> {
    match config.provider.mode.as_str() {
        "rest" => match RestProvider::new(
            config.provider.name.clone(),
            config.provider.base_url.clone(),
            config.provider.api_key.clone(),
            config.provider.timeout(),
        ) {
            Ok(provider) => Arc::new(provider),
            Err(e) => {
                eprintln!("❌ FATAL: Failed to build REST provider client: {}", e);
                std::process::exit(1);
            }
        },
        "mock" => {
            #[cfg(feature = "mock-provider")]
            {
                println!("⚠️  Using MOCK payment provider (mock-provider feature)");
                Arc::new(walletd::topup::MockProvider::paying())
            }
            #[cfg(not(feature = "mock-provider"))]
            {
                eprintln!(
                    "❌ FATAL: provider.mode = \"mock\" requires the mock-provider feature"
                );
                std::process::exit(1);
            }
        }
        other => {
            eprintln!(
                "❌ FATAL: Unknown provider.mode '{}' (expected \"mock\" or \"rest\")",
                other
            );
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let env = get_env();
    let mut app_config = AppConfig::load(&env);
    if let Some(port) = get_port_override() {
        app_config.gateway.port = port;
    }
    let _log_guard = init_logging(&app_config);

    tracing::info!("Starting walletd in {} mode", env);
    println!("=== walletd: Wallet Ledger and Transfer Engine ===");
    println!("Environment: {}", env);

    // Write-behind PostgreSQL journal, enabled by config
    let persistence_config = app_config.persistence.clone();
    let store = if persistence_config.enabled {
        println!("\n[Persistence] Connecting to PostgreSQL...");
        let db = match Database::connect(&persistence_config.postgres_url).await {
            Ok(db) => db,
            Err(e) => {
                eprintln!("❌ FATAL: Failed to connect to PostgreSQL: {}", e);
                eprintln!("   Hint: set persistence.enabled = false to run without the journal");
                std::process::exit(1);
            }
        };
        if let Err(e) = init_schema(db.pool()).await {
            eprintln!("❌ FATAL: Failed to initialize journal schema: {}", e);
            std::process::exit(1);
        }
        println!("✅ PostgreSQL connected and schema initialized");

        let (tx, rx) = tokio::sync::mpsc::channel(persistence_config.queue_size);
        let worker = JournalWorker::new(JournalWriter::new(db.pool().clone()), rx);
        tokio::spawn(worker.run());

        Arc::new(LedgerStore::with_events(tx))
    } else {
        println!("\n[Persistence] Disabled");
        Arc::new(LedgerStore::new())
    };

    // Idempotency guard + background claim sweeper
    let guard = Arc::new(IdempotencyGuard::new(
        app_config.idempotency.retention(),
        app_config.idempotency.replay_wait(),
    ));
    let sweeper = ClaimSweeper::new(
        guard.clone(),
        SweeperConfig {
            sweep_interval: app_config.idempotency.sweep_interval(),
        },
    );
    tokio::spawn(async move { sweeper.run().await });

    let orchestrator = Arc::new(TransferOrchestrator::new(
        store.clone(),
        guard.clone(),
        app_config.transfer.max_retries,
    ));

    let provider = build_provider(&app_config);
    println!(
        "Payment provider: {} ({} mode)",
        app_config.provider.name, app_config.provider.mode
    );
    let reconciler = Arc::new(TopupReconciler::new(store.clone(), provider));

    let auth = Arc::new(AuthService::new(app_config.auth.jwt_secret.clone()));

    let state = Arc::new(AppState::new(store, orchestrator, reconciler, guard, auth));
    gateway::run_server(&app_config, state).await;
}
