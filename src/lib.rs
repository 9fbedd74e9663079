//! walletd - Wallet Ledger and Transfer Engine
//!
//! An in-process wallet service with an append-only double-entry journal,
//! idempotent peer-to-peer transfers, and two-phase external top-ups.
//!
//! # Modules
//!
//! - [`core_types`] - Core type aliases (UserId, WalletId, TxnId, AmountMinor)
//! - [`wallet`] - Wallet record and balance arithmetic
//! - [`transaction`] - Transaction records and the status state machine
//! - [`ledger`] - Double-entry journal entry types
//! - [`store`] - Transactional store: wallets, journal, transaction log
//! - [`idempotency`] - Idempotency claim guard for transfer deduplication
//! - [`transfer`] - Peer-to-peer transfer orchestrator
//! - [`topup`] - External funding: provider boundary and reconciler
//! - [`gateway`] - Axum HTTP API with OpenAPI docs
//! - [`persistence`] - PostgreSQL write-behind journal
//! - [`auth`] - JWT bearer-token identity
//! - [`sweeper`] - Expired idempotency claim sweeper

// Core types - must be first!
pub mod core_types;

pub mod error;

// Ledger engine
pub mod idempotency;
pub mod ledger;
pub mod store;
pub mod transaction;
pub mod wallet;

// Money movement orchestration
pub mod topup;
pub mod transfer;

// Service plumbing
pub mod auth;
pub mod config;
pub mod gateway;
pub mod logging;
pub mod persistence;
pub mod sweeper;

// Convenient re-exports at crate root
pub use core_types::{AmountMinor, DeltaMinor, LedgerEntryId, TxnId, UserId, WalletId};
pub use error::WalletError;
pub use idempotency::IdempotencyGuard;
pub use ledger::{LedgerEntry, LedgerSide};
pub use store::{CommitEvent, LedgerStore};
pub use topup::{PaymentProvider, TopupReconciler};
pub use transaction::{Transaction, TxnStatus, TxnType};
pub use transfer::{TransferOrchestrator, TransferReceipt};
pub use wallet::{Wallet, WalletStatus};
