//! Transfer Orchestrator
//!
//! Coordinates atomic peer-to-peer moves: idempotency claim, two-wallet
//! locking in ascending id order, debit+credit, the transaction pair and
//! its balanced ledger legs, all committed as one indivisible unit.

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::core_types::{AmountMinor, TxnId, UserId, WalletId};
use crate::error::WalletError;
use crate::idempotency::{ClaimDecision, ClaimToken, IdempotencyGuard, StoredResult, scope_key};
use crate::ledger::{LedgerEntry, LedgerSide, MAX_AMOUNT_MINOR};
use crate::store::LedgerStore;
use crate::transaction::{Transaction, TxnStatus, TxnType};

/// Longest accepted memo, in characters.
const MAX_MEMO_CHARS: usize = 256;
/// Longest accepted idempotency key, in characters.
const MAX_IDEMPOTENCY_KEY_CHARS: usize = 128;

/// Result of a settled (or replayed) transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    /// The settling TRANSFER_OUT transaction.
    pub transaction_id: TxnId,
    /// Sender balance after the debit.
    pub balance_after: AmountMinor,
}

pub struct TransferOrchestrator {
    store: Arc<LedgerStore>,
    guard: Arc<IdempotencyGuard>,
    /// Bounded retries of the full read-check-write sequence when the
    /// recipient tag moves mid-flight.
    max_retries: u32,
}

impl TransferOrchestrator {
    pub fn new(store: Arc<LedgerStore>, guard: Arc<IdempotencyGuard>, max_retries: u32) -> Self {
        Self {
            store,
            guard,
            max_retries: max_retries.max(1),
        }
    }

    /// Move `amount` minor units from the sender's wallet to the wallet
    /// behind `recipient_tag`.
    pub async fn transfer(
        &self,
        sender: UserId,
        recipient_tag: &str,
        amount: AmountMinor,
        memo: Option<String>,
        idempotency_key: Option<String>,
    ) -> Result<TransferReceipt, WalletError> {
        if amount == 0 || amount > MAX_AMOUNT_MINOR {
            return Err(WalletError::InvalidAmount);
        }
        if let Some(m) = &memo {
            if m.chars().count() > MAX_MEMO_CHARS {
                return Err(WalletError::Validation(format!(
                    "memo exceeds {} characters",
                    MAX_MEMO_CHARS
                )));
            }
        }
        let recipient_tag = recipient_tag.trim();
        if recipient_tag.is_empty() {
            return Err(WalletError::Validation("recipient tag must not be empty".into()));
        }

        let sender_wallet = self
            .store
            .wallet_id_of(sender)
            .ok_or_else(|| WalletError::NotFound(format!("wallet for user {}", sender)))?;

        // Claim before any effect; a completed claim replays the original
        // result with zero additional effect.
        let token = match &idempotency_key {
            Some(key) => {
                let key = key.trim();
                if key.is_empty() || key.chars().count() > MAX_IDEMPOTENCY_KEY_CHARS {
                    return Err(WalletError::Validation(
                        "idempotency key must be 1..=128 characters".into(),
                    ));
                }
                let scope = scope_key(sender_wallet, key);
                match self.guard.claim_or_replay(&scope).await? {
                    ClaimDecision::Execute(token) => Some(token),
                    ClaimDecision::Replay(prior) => {
                        debug!(
                            sender,
                            key, txn_id = %prior.transaction_id,
                            "idempotent replay, no effect applied"
                        );
                        return Ok(TransferReceipt {
                            transaction_id: prior.transaction_id,
                            balance_after: prior.balance_after,
                        });
                    }
                }
            }
            None => None,
        };

        let result = self
            .execute(sender_wallet, recipient_tag, amount, memo, &idempotency_key, token.as_ref())
            .await;

        if result.is_err() {
            if let Some(token) = &token {
                // A failed attempt leaves no recorded result; a retry of
                // the same key runs fresh.
                self.guard.release(token);
            }
        }
        result
    }

    async fn execute(
        &self,
        sender_wallet: WalletId,
        recipient_tag: &str,
        amount: AmountMinor,
        memo: Option<String>,
        idempotency_key: &Option<String>,
        token: Option<&ClaimToken>,
    ) -> Result<TransferReceipt, WalletError> {
        let mut recipient_wallet = self
            .store
            .resolve_tag(recipient_tag)
            .ok_or_else(|| WalletError::NotFound(format!("recipient tag '{}'", recipient_tag)))?;

        for attempt in 0..self.max_retries {
            if recipient_wallet == sender_wallet {
                return Err(WalletError::SelfTransfer);
            }

            let (mut sender_guard, mut recipient_guard) =
                self.store.lock_pair(sender_wallet, recipient_wallet).await?;

            // Re-resolve under the lock: the tag may have moved since the
            // lookup that chose our lock targets.
            match self.store.resolve_tag(recipient_tag) {
                Some(current) if current == recipient_wallet => {}
                Some(moved) => {
                    warn!(
                        attempt,
                        recipient_tag, was = recipient_wallet, now = moved,
                        "recipient tag moved mid-flight, retrying"
                    );
                    drop(recipient_guard);
                    drop(sender_guard);
                    recipient_wallet = moved;
                    continue;
                }
                None => {
                    return Err(WalletError::NotFound(format!(
                        "recipient tag '{}'",
                        recipient_tag
                    )));
                }
            }

            if !sender_guard.is_active() {
                return Err(WalletError::WalletInactive(
                    sender_guard.status().as_str().to_string(),
                ));
            }
            if !recipient_guard.is_active() {
                return Err(WalletError::WalletInactive(
                    recipient_guard.status().as_str().to_string(),
                ));
            }
            if sender_guard.balance() < amount {
                return Err(WalletError::InsufficientFunds);
            }
            let recipient_after = recipient_guard
                .balance()
                .checked_add(amount)
                .ok_or_else(|| {
                    WalletError::Inconsistency("recipient balance overflow".to_string())
                })?;
            let sender_after = sender_guard.balance() - amount;

            let out_id = Uuid::new_v4();
            let in_id = Uuid::new_v4();

            let mut unit = self.store.begin_unit().await;
            unit.insert_txn(
                Transaction::new(
                    out_id,
                    sender_wallet,
                    TxnType::TransferOut,
                    TxnStatus::Succeeded,
                    amount,
                )
                .with_memo(memo.clone())
                .with_idempotency_key(idempotency_key.clone()),
            )?;
            unit.insert_txn(
                Transaction::new(
                    in_id,
                    recipient_wallet,
                    TxnType::TransferIn,
                    TxnStatus::Succeeded,
                    amount,
                )
                .with_memo(memo.clone()),
            )?;
            // Both legs reference the settling TRANSFER_OUT record; the
            // TRANSFER_IN mirror carries no legs of its own.
            unit.append_entries(vec![
                LedgerEntry::wallet_leg(out_id, sender_wallet, LedgerSide::Debit, amount, sender_after),
                LedgerEntry::wallet_leg(
                    out_id,
                    recipient_wallet,
                    LedgerSide::Credit,
                    amount,
                    recipient_after,
                ),
            ])?;

            // All checks passed; apply the balance mutations.
            let debited = sender_guard.debit(amount)?;
            let credited = match recipient_guard.credit(amount) {
                Ok(b) => b,
                Err(e) => {
                    // Undo the debit so the aborted unit leaves no trace.
                    if let Err(restore) = sender_guard.credit(amount) {
                        error!(
                            sender_wallet, error = %restore,
                            "failed to restore sender balance after aborted credit"
                        );
                    }
                    return Err(e);
                }
            };
            if debited != sender_after || credited != recipient_after {
                error!(
                    sender_wallet,
                    recipient_wallet, debited, credited, sender_after, recipient_after,
                    "balance drifted inside locked unit"
                );
                return Err(WalletError::Inconsistency(
                    "balance drifted inside locked unit".to_string(),
                ));
            }
            unit.note_balance(sender_wallet, sender_after);
            unit.note_balance(recipient_wallet, recipient_after);

            let receipt = TransferReceipt {
                transaction_id: out_id,
                balance_after: sender_after,
            };

            // Record the replay result before the unit (and the wallet
            // locks) release, so a duplicate can never slip in between.
            if let Some(token) = token {
                self.guard.complete(
                    token,
                    StoredResult {
                        transaction_id: out_id,
                        balance_after: sender_after,
                    },
                );
            }
            unit.commit();

            info!(
                txn_id = %out_id,
                sender_wallet,
                recipient_wallet,
                amount,
                sender_balance = sender_after,
                "transfer settled"
            );
            return Ok(receipt);
        }

        Err(WalletError::Conflict(format!(
            "recipient tag '{}' kept moving, giving up after {} attempts",
            recipient_tag, self.max_retries
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn harness() -> (Arc<LedgerStore>, TransferOrchestrator) {
        let store = Arc::new(LedgerStore::new());
        let guard = Arc::new(IdempotencyGuard::new(
            Duration::from_secs(3600),
            Duration::from_millis(500),
        ));
        let orch = TransferOrchestrator::new(Arc::clone(&store), guard, 3);
        (store, orch)
    }

    #[tokio::test]
    async fn test_transfer_settles_both_sides() {
        let (store, orch) = harness();
        store.open_wallet(1, "alice", "USD", 10_000).unwrap();
        store.open_wallet(2, "bob", "USD", 500).unwrap();

        let receipt = orch
            .transfer(1, "bob", 2_500, Some("rent".into()), None)
            .await
            .unwrap();
        assert_eq!(receipt.balance_after, 7_500);

        assert_eq!(store.balance_of(1).await.unwrap().balance, 7_500);
        assert_eq!(store.balance_of(2).await.unwrap().balance, 3_000);

        let entries = store.entries_for_txn(receipt.transaction_id).await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries.iter().map(|e| e.signed_amount()).sum::<i64>(), 0);

        let out = store.get_transaction(receipt.transaction_id).await.unwrap();
        assert_eq!(out.txn_type, TxnType::TransferOut);
        assert_eq!(out.status, TxnStatus::Succeeded);
        assert_eq!(out.memo.as_deref(), Some("rent"));
    }

    #[tokio::test]
    async fn test_insufficient_funds_leaves_no_trace() {
        let (store, orch) = harness();
        store.open_wallet(1, "alice", "USD", 100).unwrap();
        store.open_wallet(2, "bob", "USD", 0).unwrap();

        let err = orch.transfer(1, "bob", 500, None, None).await.unwrap_err();
        assert!(matches!(err, WalletError::InsufficientFunds));

        assert_eq!(store.balance_of(1).await.unwrap().balance, 100);
        assert_eq!(store.balance_of(2).await.unwrap().balance, 0);
        assert_eq!(store.stats().await.transactions, 0);
        assert_eq!(store.stats().await.ledger_entries, 0);
    }

    #[tokio::test]
    async fn test_self_transfer_rejected() {
        let (store, orch) = harness();
        store.open_wallet(1, "alice", "USD", 1_000).unwrap();

        let err = orch.transfer(1, "alice", 100, None, None).await.unwrap_err();
        assert!(matches!(err, WalletError::SelfTransfer));
    }

    #[tokio::test]
    async fn test_unknown_recipient_tag() {
        let (store, orch) = harness();
        store.open_wallet(1, "alice", "USD", 1_000).unwrap();

        let err = orch.transfer(1, "nobody", 100, None, None).await.unwrap_err();
        assert!(matches!(err, WalletError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_zero_amount_rejected() {
        let (store, orch) = harness();
        store.open_wallet(1, "alice", "USD", 1_000).unwrap();
        store.open_wallet(2, "bob", "USD", 0).unwrap();

        let err = orch.transfer(1, "bob", 0, None, None).await.unwrap_err();
        assert!(matches!(err, WalletError::InvalidAmount));
    }

    #[tokio::test]
    async fn test_inactive_recipient_rejected() {
        let (store, orch) = harness();
        store.open_wallet(1, "alice", "USD", 1_000).unwrap();
        let bob = store.open_wallet(2, "bob", "USD", 0).unwrap();
        store
            .set_wallet_status(bob, crate::wallet::WalletStatus::Suspended)
            .await
            .unwrap();

        let err = orch.transfer(1, "bob", 100, None, None).await.unwrap_err();
        assert!(matches!(err, WalletError::WalletInactive(_)));
        assert_eq!(store.balance_of(1).await.unwrap().balance, 1_000);
    }

    #[tokio::test]
    async fn test_replayed_key_applies_effect_once() {
        let (store, orch) = harness();
        store.open_wallet(1, "alice", "USD", 10_000).unwrap();
        store.open_wallet(2, "bob", "USD", 0).unwrap();

        let first = orch
            .transfer(1, "bob", 1_000, None, Some("k1".into()))
            .await
            .unwrap();
        for _ in 0..5 {
            let again = orch
                .transfer(1, "bob", 1_000, None, Some("k1".into()))
                .await
                .unwrap();
            assert_eq!(again, first);
        }

        assert_eq!(store.balance_of(1).await.unwrap().balance, 9_000);
        assert_eq!(store.balance_of(2).await.unwrap().balance, 1_000);
        // One settling pair, two transaction records
        assert_eq!(store.stats().await.transactions, 2);
        assert_eq!(store.stats().await.ledger_entries, 2);
    }

    #[tokio::test]
    async fn test_failed_attempt_leaves_key_fresh() {
        let (store, orch) = harness();
        store.open_wallet(1, "alice", "USD", 100).unwrap();
        store.open_wallet(2, "bob", "USD", 0).unwrap();

        let err = orch
            .transfer(1, "bob", 500, None, Some("k1".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::InsufficientFunds));

        // The failure left no claim behind: the same key executes fresh
        let receipt = orch
            .transfer(1, "bob", 50, None, Some("k1".into()))
            .await
            .unwrap();
        assert_eq!(receipt.balance_after, 50);
        assert_eq!(store.balance_of(2).await.unwrap().balance, 50);
    }

    #[tokio::test]
    async fn test_concurrent_overdraw_never_negative() {
        let (store, orch) = harness();
        store.open_wallet(1, "alice", "USD", 1_000).unwrap();
        store.open_wallet(2, "bob", "USD", 0).unwrap();
        let orch = Arc::new(orch);

        let mut handles = Vec::new();
        for _ in 0..10 {
            let orch = Arc::clone(&orch);
            handles.push(tokio::spawn(async move {
                orch.transfer(1, "bob", 400, None, None).await
            }));
        }

        let mut ok: u64 = 0;
        for h in handles {
            if h.await.unwrap().is_ok() {
                ok += 1;
            }
        }

        // floor(1000 / 400) = 2 settle, the rest see InsufficientFunds
        assert_eq!(ok, 2);
        assert_eq!(store.balance_of(1).await.unwrap().balance, 200);
        assert_eq!(store.balance_of(2).await.unwrap().balance, 800);
    }

    #[tokio::test]
    async fn test_opposite_direction_transfers_complete() {
        let (store, orch) = harness();
        store.open_wallet(1, "alice", "USD", 10_000).unwrap();
        store.open_wallet(2, "bob", "USD", 10_000).unwrap();
        let orch = Arc::new(orch);

        let mut handles = Vec::new();
        for i in 0..20 {
            let orch = Arc::clone(&orch);
            handles.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    orch.transfer(1, "bob", 10, None, None).await
                } else {
                    orch.transfer(2, "alice", 10, None, None).await
                }
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        // Equal flow both ways, balances return to the start
        assert_eq!(store.balance_of(1).await.unwrap().balance, 10_000);
        assert_eq!(store.balance_of(2).await.unwrap().balance, 10_000);
    }
}
