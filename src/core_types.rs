//! Core types used throughout the system
//!
//! These are fundamental type aliases used by all modules.
//! They provide semantic meaning and enable future type evolution.

use uuid::Uuid;

/// User ID - globally unique, immutable after assignment.
///
/// # Usage:
/// - Supplied by the identity layer with every authenticated call
/// - Used in maps for O(1) wallet lookup
pub type UserId = u64;

/// Wallet ID - globally unique identifier for a wallet.
///
/// # Constraints:
/// - **Immutable**: Once assigned, NEVER changes
/// - **Sequential**: Assigned contiguously by the store (1, 2, 3, ...)
/// - Two-wallet atomic units lock in ascending `WalletId` order
pub type WalletId = u64;

/// Transaction ID - unique per money-movement attempt.
pub type TxnId = Uuid;

/// Ledger entry ID - journal-assigned, strictly increasing in append order.
pub type LedgerEntryId = u64;

/// Monetary amount in integer minor units (e.g. cents).
/// Always the positive magnitude of a movement; direction lives in the
/// ledger side or the sign of a delta.
pub type AmountMinor = u64;

/// Signed balance delta in minor units. Negative for debits.
pub type DeltaMinor = i64;
