//! Wallet records
//!
//! One authoritative record per user. The balance field is private: the only
//! way to move it is through the checked mutations below, so a sufficiency
//! or status check can never be separated from its write. Balances are
//! unsigned; an overdraft is unrepresentable, not merely forbidden.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core_types::{AmountMinor, DeltaMinor, UserId, WalletId};
use crate::error::WalletError;

/// Wallet lifecycle status. Status IDs are stored as SMALLINT.
///
/// Only ACTIVE wallets accept debits or credits; SUSPENDED and CLOSED both
/// freeze the balance in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i16)]
pub enum WalletStatus {
    Active = 1,
    Suspended = 2,
    Closed = 3,
}

impl WalletStatus {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(WalletStatus::Active),
            2 => Some(WalletStatus::Suspended),
            3 => Some(WalletStatus::Closed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WalletStatus::Active => "active",
            WalletStatus::Suspended => "suspended",
            WalletStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for WalletStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<i16> for WalletStatus {
    type Error = ();

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        WalletStatus::from_id(value).ok_or(())
    }
}

/// A user's wallet. Mutated only under its store-level lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    id: WalletId,
    owner: UserId,
    /// Minor units. Private so every mutation goes through the checks.
    balance: AmountMinor,
    currency: String,
    status: WalletStatus,
    /// Public routing tag other users address transfers to.
    public_tag: String,
    created_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(
        id: WalletId,
        owner: UserId,
        public_tag: &str,
        currency: &str,
        opening_balance: AmountMinor,
    ) -> Self {
        Self {
            id,
            owner,
            balance: opening_balance,
            currency: currency.to_string(),
            status: WalletStatus::Active,
            public_tag: public_tag.to_string(),
            created_at: Utc::now(),
        }
    }

    #[inline]
    pub fn id(&self) -> WalletId {
        self.id
    }

    #[inline]
    pub fn owner(&self) -> UserId {
        self.owner
    }

    #[inline]
    pub fn balance(&self) -> AmountMinor {
        self.balance
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    #[inline]
    pub fn status(&self) -> WalletStatus {
        self.status
    }

    pub fn public_tag(&self) -> &str {
        &self.public_tag
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == WalletStatus::Active
    }

    pub fn set_status(&mut self, status: WalletStatus) {
        self.status = status;
    }

    fn ensure_active(&self) -> Result<(), WalletError> {
        if !self.is_active() {
            return Err(WalletError::WalletInactive(self.status.as_str().to_string()));
        }
        Ok(())
    }

    /// Add `amount` minor units. Returns the new balance.
    pub fn credit(&mut self, amount: AmountMinor) -> Result<AmountMinor, WalletError> {
        self.ensure_active()?;
        self.balance = self.balance.checked_add(amount).ok_or_else(|| {
            WalletError::Inconsistency(format!("balance overflow crediting wallet {}", self.id))
        })?;
        Ok(self.balance)
    }

    /// Remove `amount` minor units. The sufficiency check and the write are
    /// one step; callers hold the wallet lock across both. Returns the new
    /// balance.
    pub fn debit(&mut self, amount: AmountMinor) -> Result<AmountMinor, WalletError> {
        self.ensure_active()?;
        if self.balance < amount {
            return Err(WalletError::InsufficientFunds);
        }
        self.balance -= amount;
        Ok(self.balance)
    }

    /// Apply a signed delta: positive credits, negative debits.
    pub fn apply_delta(&mut self, delta: DeltaMinor) -> Result<AmountMinor, WalletError> {
        if delta >= 0 {
            self.credit(delta as AmountMinor)
        } else {
            self.debit(delta.unsigned_abs())
        }
    }
}
