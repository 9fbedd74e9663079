//! Ledger - Double-entry settlement journal
//!
//! Records every settled balance change as one half of a balanced
//! debit/credit pair. Entries are immutable once written; the journal is
//! append-only and exists for complete auditability.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core_types::{AmountMinor, LedgerEntryId, TxnId, WalletId};

/// Largest representable movement. Amounts above this cannot be expressed
/// as signed ledger deltas and are rejected at the operation boundary.
pub const MAX_AMOUNT_MINOR: AmountMinor = i64::MAX as AmountMinor;

/// Account tags recorded on ledger legs.
pub mod accounts {
    /// A user wallet's own balance account.
    pub const USER_BALANCE: &str = "user_balance";
    /// Clearing account for value entering from the external payment rail.
    pub const PROVIDER_CLEARING: &str = "provider_clearing";
}

/// Which side of the double entry a leg sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i16)]
pub enum LedgerSide {
    Debit = 1,
    Credit = 2,
}

impl LedgerSide {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(LedgerSide::Debit),
            2 => Some(LedgerSide::Credit),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerSide::Debit => "DEBIT",
            LedgerSide::Credit => "CREDIT",
        }
    }
}

impl fmt::Display for LedgerSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One leg of a settled movement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Assigned by the journal at append time, strictly increasing.
    pub id: LedgerEntryId,
    /// The transaction that settled this movement.
    pub txn_id: TxnId,
    /// None marks the external/clearing-side leg.
    pub wallet_id: Option<WalletId>,
    pub account: String,
    pub side: LedgerSide,
    /// Positive magnitude in minor units.
    pub amount: AmountMinor,
    /// The wallet balance as committed in the same atomic unit.
    /// None for clearing legs, which have no wallet balance.
    pub balance_after: Option<AmountMinor>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// A wallet-linked leg carrying the post-mutation balance snapshot.
    pub fn wallet_leg(
        txn_id: TxnId,
        wallet_id: WalletId,
        side: LedgerSide,
        amount: AmountMinor,
        balance_after: AmountMinor,
    ) -> Self {
        Self {
            id: 0,
            txn_id,
            wallet_id: Some(wallet_id),
            account: accounts::USER_BALANCE.to_string(),
            side,
            amount,
            balance_after: Some(balance_after),
            created_at: Utc::now(),
        }
    }

    /// The external/clearing counter-leg of a movement.
    pub fn clearing_leg(txn_id: TxnId, side: LedgerSide, amount: AmountMinor) -> Self {
        Self {
            id: 0,
            txn_id,
            wallet_id: None,
            account: accounts::PROVIDER_CLEARING.to_string(),
            side,
            amount,
            balance_after: None,
            created_at: Utc::now(),
        }
    }

    /// Credit positive, debit negative.
    #[inline]
    pub fn signed_amount(&self) -> i64 {
        match self.side {
            LedgerSide::Credit => self.amount as i64,
            LedgerSide::Debit => -(self.amount as i64),
        }
    }
}

/// Conservation check: signed amounts of a settled movement sum to zero.
pub fn conservation_holds(entries: &[LedgerEntry]) -> bool {
    entries.iter().map(LedgerEntry::signed_amount).sum::<i64>() == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_signed_amounts() {
        let txn = Uuid::new_v4();
        let debit = LedgerEntry::wallet_leg(txn, 1, LedgerSide::Debit, 2500, 7500);
        let credit = LedgerEntry::wallet_leg(txn, 2, LedgerSide::Credit, 2500, 3000);
        assert_eq!(debit.signed_amount(), -2500);
        assert_eq!(credit.signed_amount(), 2500);
    }

    #[test]
    fn test_transfer_pair_conserves() {
        let txn = Uuid::new_v4();
        let pair = [
            LedgerEntry::wallet_leg(txn, 1, LedgerSide::Debit, 2500, 7500),
            LedgerEntry::wallet_leg(txn, 2, LedgerSide::Credit, 2500, 3000),
        ];
        assert!(conservation_holds(&pair));
    }

    #[test]
    fn test_topup_pair_conserves() {
        let txn = Uuid::new_v4();
        let pair = [
            LedgerEntry::wallet_leg(txn, 1, LedgerSide::Credit, 5000, 15000),
            LedgerEntry::clearing_leg(txn, LedgerSide::Debit, 5000),
        ];
        assert!(conservation_holds(&pair));
        assert!(pair[1].wallet_id.is_none());
        assert!(pair[1].balance_after.is_none());
        assert_eq!(pair[1].account, accounts::PROVIDER_CLEARING);
    }

    #[test]
    fn test_unbalanced_pair_detected() {
        let txn = Uuid::new_v4();
        let pair = [
            LedgerEntry::wallet_leg(txn, 1, LedgerSide::Debit, 2500, 7500),
            LedgerEntry::wallet_leg(txn, 2, LedgerSide::Credit, 2400, 2900),
        ];
        assert!(!conservation_holds(&pair));
    }

    #[test]
    fn test_side_roundtrip() {
        assert_eq!(
            LedgerSide::from_id(LedgerSide::Debit.id()),
            Some(LedgerSide::Debit)
        );
        assert_eq!(
            LedgerSide::from_id(LedgerSide::Credit.id()),
            Some(LedgerSide::Credit)
        );
        assert_eq!(LedgerSide::from_id(0), None);
    }
}
