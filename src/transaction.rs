//! Transaction Log Records
//!
//! Every money-movement attempt is recorded as a `Transaction`. Records are
//! append-only: never deleted, never rewritten once a terminal status is
//! reached. Status IDs are designed for PostgreSQL storage as SMALLINT.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core_types::{AmountMinor, TxnId, WalletId};

/// Transaction status state machine
///
/// PENDING is the only non-terminal status. Every transition out of it is
/// an atomic compare-and-set; SUCCEEDED, FAILED and CANCELLED accept no
/// further transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i16)]
pub enum TxnStatus {
    /// Awaiting settlement (the only state a transaction is created in
    /// unless it settles inside its creating atomic unit)
    Pending = 0,

    /// Terminal: settled, balance and ledger effects committed
    Succeeded = 10,

    /// Terminal: settlement definitively failed, no balance effect
    Failed = -10,

    /// Terminal: withdrawn before settlement, no balance effect
    Cancelled = -20,
}

impl TxnStatus {
    /// Check if this is a terminal status (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TxnStatus::Pending)
    }

    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_transition_to(&self, next: TxnStatus) -> bool {
        matches!(self, TxnStatus::Pending) && next.is_terminal()
    }

    /// Get the numeric status ID for PostgreSQL storage
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    /// Convert from PostgreSQL status ID
    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(TxnStatus::Pending),
            10 => Some(TxnStatus::Succeeded),
            -10 => Some(TxnStatus::Failed),
            -20 => Some(TxnStatus::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TxnStatus::Pending => "PENDING",
            TxnStatus::Succeeded => "SUCCEEDED",
            TxnStatus::Failed => "FAILED",
            TxnStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_str_upper(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(TxnStatus::Pending),
            "SUCCEEDED" => Some(TxnStatus::Succeeded),
            "FAILED" => Some(TxnStatus::Failed),
            "CANCELLED" => Some(TxnStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for TxnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<i16> for TxnStatus {
    type Error = ();

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        TxnStatus::from_id(value).ok_or(())
    }
}

/// Transaction type
///
/// Only TOPUP, TRANSFER_IN and TRANSFER_OUT are produced by engine
/// operations today; the remaining variants exist in the data model and the
/// list filters for records originated elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i16)]
pub enum TxnType {
    Topup = 1,
    Charge = 2,
    Refund = 3,
    Withdraw = 4,
    TransferIn = 5,
    TransferOut = 6,
}

impl TxnType {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(TxnType::Topup),
            2 => Some(TxnType::Charge),
            3 => Some(TxnType::Refund),
            4 => Some(TxnType::Withdraw),
            5 => Some(TxnType::TransferIn),
            6 => Some(TxnType::TransferOut),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TxnType::Topup => "TOPUP",
            TxnType::Charge => "CHARGE",
            TxnType::Refund => "REFUND",
            TxnType::Withdraw => "WITHDRAW",
            TxnType::TransferIn => "TRANSFER_IN",
            TxnType::TransferOut => "TRANSFER_OUT",
        }
    }

    pub fn from_str_upper(s: &str) -> Option<Self> {
        match s {
            "TOPUP" => Some(TxnType::Topup),
            "CHARGE" => Some(TxnType::Charge),
            "REFUND" => Some(TxnType::Refund),
            "WITHDRAW" => Some(TxnType::Withdraw),
            "TRANSFER_IN" => Some(TxnType::TransferIn),
            "TRANSFER_OUT" => Some(TxnType::TransferOut),
            _ => None,
        }
    }
}

impl fmt::Display for TxnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One money-movement attempt against a wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TxnId,
    pub wallet_id: WalletId,
    pub txn_type: TxnType,
    pub status: TxnStatus,
    /// Positive magnitude in minor units; direction comes from `txn_type`.
    pub amount: AmountMinor,
    /// Settlement rail that produced this record, e.g. "provider".
    pub external_provider: Option<String>,
    /// Provider-side reference (invoice id). Unique when present; the
    /// reconciler looks transactions up by it.
    pub external_ref: Option<String>,
    /// Caller-supplied deduplication token, recorded for audit.
    pub idempotency_key: Option<String>,
    /// Populated on REFUND records, pointing at the reversed transaction.
    pub reversal_of: Option<TxnId>,
    pub memo: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        id: TxnId,
        wallet_id: WalletId,
        txn_type: TxnType,
        status: TxnStatus,
        amount: AmountMinor,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            wallet_id,
            txn_type,
            status,
            amount,
            external_provider: None,
            external_ref: None,
            idempotency_key: None,
            reversal_of: None,
            memo: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_memo(mut self, memo: Option<String>) -> Self {
        self.memo = memo;
        self
    }

    pub fn with_idempotency_key(mut self, key: Option<String>) -> Self {
        self.idempotency_key = key;
        self
    }

    pub fn with_external(mut self, provider: impl Into<String>) -> Self {
        self.external_provider = Some(provider.into());
        self
    }
}
