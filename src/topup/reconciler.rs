//! Top-up reconciliation
//!
//! A top-up crosses an external payment rail, so it cannot settle in one
//! atomic unit. The flow is: record a PENDING transaction, call the rail
//! with no locks held, then settle in a second unit that re-validates the
//! transaction is still PENDING before crediting. Outcome events from the
//! rail arrive at-least-once and out of order; every path here is a
//! compare-and-set against the status state machine, which makes redelivery
//! a natural no-op.

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::core_types::{AmountMinor, TxnId, UserId, WalletId};
use crate::error::WalletError;
use crate::ledger::{LedgerEntry, LedgerSide, MAX_AMOUNT_MINOR};
use crate::store::LedgerStore;
use crate::topup::provider::{Invoice, InvoiceOutcome, InvoiceState, PaymentProvider, ProviderError};
use crate::transaction::{Transaction, TxnStatus, TxnType};

const TOPUP_MEMO: &str = "Wallet top-up";

/// Result of an initiate call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopupReceipt {
    pub transaction_id: TxnId,
    pub status: TxnStatus,
    /// Present only when the invoice settled inside this call.
    pub balance_after: Option<AmountMinor>,
    /// Provider invoice reference, when creation reached the rail.
    pub invoice_ref: Option<String>,
}

/// Result of one outcome-event delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyReceipt {
    /// Whether this delivery mutated anything.
    pub applied: bool,
    pub transaction_id: Option<TxnId>,
    /// Transaction status after the delivery was handled.
    pub status: Option<TxnStatus>,
}

pub struct TopupReconciler {
    store: Arc<LedgerStore>,
    provider: Arc<dyn PaymentProvider>,
}

impl TopupReconciler {
    pub fn new(store: Arc<LedgerStore>, provider: Arc<dyn PaymentProvider>) -> Self {
        Self { store, provider }
    }

    /// Start a top-up: record the intent, create the invoice on the rail,
    /// settle immediately if the rail already reports it paid.
    pub async fn initiate(
        &self,
        user: UserId,
        amount: AmountMinor,
        payment_method_ref: &str,
    ) -> Result<TopupReceipt, WalletError> {
        if amount == 0 || amount > MAX_AMOUNT_MINOR {
            return Err(WalletError::InvalidAmount);
        }
        let method = payment_method_ref.trim();
        if method.is_empty() {
            return Err(WalletError::Validation(
                "payment method reference must not be empty".into(),
            ));
        }
        let wallet_id = self
            .store
            .wallet_id_of(user)
            .ok_or_else(|| WalletError::NotFound(format!("wallet for user {}", user)))?;
        let wallet = self.store.wallet_snapshot(wallet_id).await?;
        if !wallet.is_active() {
            return Err(WalletError::WalletInactive(
                wallet.status().as_str().to_string(),
            ));
        }

        // Record intent before touching the rail, so a crash mid-call
        // leaves a PENDING record instead of silence.
        let txn_id = Uuid::new_v4();
        {
            let mut unit = self.store.begin_unit().await;
            unit.insert_txn(
                Transaction::new(txn_id, wallet_id, TxnType::Topup, TxnStatus::Pending, amount)
                    .with_memo(Some(TOPUP_MEMO.to_string())),
            )?;
            unit.commit();
        }
        info!(user, txn_id = %txn_id, amount, "top-up initiated, creating invoice");

        // No locks across the rail call.
        let invoice = match self.provider.create_invoice(method, amount, TOPUP_MEMO).await {
            Ok(invoice) => invoice,
            Err(ProviderError::Timeout(msg)) => {
                // The invoice may exist on the rail; leave the transaction
                // PENDING and let the outcome feed finish the job.
                warn!(txn_id = %txn_id, %msg, "invoice creation timed out, transaction stays pending");
                return Ok(TopupReceipt {
                    transaction_id: txn_id,
                    status: TxnStatus::Pending,
                    balance_after: None,
                    invoice_ref: None,
                });
            }
            Err(e) => {
                warn!(txn_id = %txn_id, error = %e, "invoice creation failed, failing transaction");
                let mut unit = self.store.begin_unit().await;
                match unit.transition(txn_id, TxnStatus::Pending, TxnStatus::Failed) {
                    Ok(_) => unit.commit(),
                    Err(cas) => {
                        debug!(txn_id = %txn_id, error = %cas, "transaction moved before it could be failed");
                    }
                }
                return Err(e.into());
            }
        };

        self.settle_created_invoice(txn_id, wallet_id, amount, invoice)
            .await
    }

    /// Second phase of initiate: attach the invoice reference and, when the
    /// rail already settled it, credit in the same unit.
    async fn settle_created_invoice(
        &self,
        txn_id: TxnId,
        wallet_id: WalletId,
        amount: AmountMinor,
        invoice: Invoice,
    ) -> Result<TopupReceipt, WalletError> {
        match invoice.state {
            InvoiceState::Pending => {
                let mut unit = self.store.begin_unit().await;
                unit.set_external_ref(txn_id, self.provider.name(), &invoice.invoice_ref)?;
                unit.commit();
                debug!(txn_id = %txn_id, invoice_ref = %invoice.invoice_ref, "awaiting outcome event");
                Ok(TopupReceipt {
                    transaction_id: txn_id,
                    status: TxnStatus::Pending,
                    balance_after: None,
                    invoice_ref: Some(invoice.invoice_ref),
                })
            }
            InvoiceState::Paid => {
                let mut wallet_guard = self.store.lock_wallet(wallet_id).await?;
                let mut unit = self.store.begin_unit().await;
                unit.set_external_ref(txn_id, self.provider.name(), &invoice.invoice_ref)?;

                // Re-validate: the transaction may have been cancelled while
                // the rail call was in flight.
                match unit.transition(txn_id, TxnStatus::Pending, TxnStatus::Succeeded) {
                    Ok(_) => {}
                    Err(WalletError::Conflict(msg)) => {
                        error!(
                            txn_id = %txn_id, invoice_ref = %invoice.invoice_ref, %msg,
                            "paid invoice for a transaction no longer pending"
                        );
                        // Keep the reference on record for audit; the credit
                        // is not applied.
                        unit.commit();
                        return Err(WalletError::Conflict(msg));
                    }
                    Err(e) => return Err(e),
                }

                let new_balance = wallet_guard.balance().checked_add(amount).ok_or_else(|| {
                    WalletError::Inconsistency("wallet balance overflow crediting top-up".into())
                })?;
                unit.append_entries(vec![
                    LedgerEntry::wallet_leg(
                        txn_id,
                        wallet_id,
                        LedgerSide::Credit,
                        amount,
                        new_balance,
                    ),
                    LedgerEntry::clearing_leg(txn_id, LedgerSide::Debit, amount),
                ])?;

                let credited = match wallet_guard.credit(amount) {
                    Ok(b) => b,
                    Err(e) => {
                        // The wallet froze while the rail was called. Keep
                        // the reference so a later outcome event can settle
                        // after reactivation.
                        warn!(
                            txn_id = %txn_id, invoice_ref = %invoice.invoice_ref, error = %e,
                            "wallet cannot accept paid invoice yet, keeping reference"
                        );
                        drop(unit);
                        let mut ref_unit = self.store.begin_unit().await;
                        ref_unit.set_external_ref(
                            txn_id,
                            self.provider.name(),
                            &invoice.invoice_ref,
                        )?;
                        ref_unit.commit();
                        return Err(e);
                    }
                };
                if credited != new_balance {
                    error!(
                        wallet_id, credited, new_balance,
                        "balance drifted inside locked unit"
                    );
                    return Err(WalletError::Inconsistency(
                        "balance drifted inside locked unit".to_string(),
                    ));
                }
                unit.note_balance(wallet_id, new_balance);
                unit.commit();

                info!(
                    txn_id = %txn_id, wallet_id, amount, balance = new_balance,
                    invoice_ref = %invoice.invoice_ref,
                    "top-up settled at creation"
                );
                Ok(TopupReceipt {
                    transaction_id: txn_id,
                    status: TxnStatus::Succeeded,
                    balance_after: Some(new_balance),
                    invoice_ref: Some(invoice.invoice_ref),
                })
            }
            InvoiceState::Failed => {
                let mut unit = self.store.begin_unit().await;
                unit.set_external_ref(txn_id, self.provider.name(), &invoice.invoice_ref)?;
                match unit.transition(txn_id, TxnStatus::Pending, TxnStatus::Failed) {
                    Ok(_) => {}
                    Err(WalletError::Conflict(msg)) => {
                        debug!(txn_id = %txn_id, %msg, "transaction already terminal");
                    }
                    Err(e) => return Err(e),
                }
                unit.commit();
                warn!(txn_id = %txn_id, invoice_ref = %invoice.invoice_ref, "invoice rejected by rail");
                Err(WalletError::Provider(format!(
                    "invoice {} rejected by provider",
                    invoice.invoice_ref
                )))
            }
        }
    }

    /// Apply one delivery from the provider's outcome feed. Deliveries are
    /// at-least-once; anything that does not move a PENDING transaction is
    /// acknowledged without effect.
    pub async fn apply_external_outcome(
        &self,
        invoice_ref: &str,
        outcome: InvoiceOutcome,
    ) -> Result<ApplyReceipt, WalletError> {
        let invoice_ref = invoice_ref.trim();
        if invoice_ref.is_empty() {
            return Err(WalletError::Validation(
                "invoice reference must not be empty".into(),
            ));
        }

        // Committed-state preview to find the wallet to lock. The settle
        // paths re-validate under the journal lock.
        let Some(txn) = self.store.find_by_external_ref(invoice_ref).await else {
            warn!(invoice_ref, "outcome event for unknown invoice reference");
            return Ok(ApplyReceipt {
                applied: false,
                transaction_id: None,
                status: None,
            });
        };

        if txn.status.is_terminal() {
            return Ok(self.acknowledge_terminal(&txn, outcome, invoice_ref));
        }

        match outcome {
            InvoiceOutcome::Succeeded => {
                self.settle_success(txn.id, txn.wallet_id, txn.amount, invoice_ref)
                    .await
            }
            InvoiceOutcome::Failed => self.settle_failure(txn.id, invoice_ref).await,
        }
    }

    fn acknowledge_terminal(
        &self,
        txn: &Transaction,
        outcome: InvoiceOutcome,
        invoice_ref: &str,
    ) -> ApplyReceipt {
        let consistent = matches!(
            (outcome, txn.status),
            (InvoiceOutcome::Succeeded, TxnStatus::Succeeded)
                | (InvoiceOutcome::Failed, TxnStatus::Failed)
        );
        if consistent {
            debug!(
                invoice_ref, txn_id = %txn.id, status = %txn.status,
                "outcome redelivery for settled transaction, no-op"
            );
        } else {
            error!(
                invoice_ref, txn_id = %txn.id, status = %txn.status, ?outcome,
                "outcome conflicts with stored terminal state, not mutating"
            );
        }
        ApplyReceipt {
            applied: false,
            transaction_id: Some(txn.id),
            status: Some(txn.status),
        }
    }

    async fn settle_success(
        &self,
        txn_id: TxnId,
        wallet_id: WalletId,
        amount: AmountMinor,
        invoice_ref: &str,
    ) -> Result<ApplyReceipt, WalletError> {
        let mut wallet_guard = self.store.lock_wallet(wallet_id).await?;
        let mut unit = self.store.begin_unit().await;

        match unit.transition(txn_id, TxnStatus::Pending, TxnStatus::Succeeded) {
            Ok(_) => {}
            Err(WalletError::Conflict(_)) => {
                // Lost the race to a concurrent delivery or a cancel.
                drop(unit);
                drop(wallet_guard);
                let current = self.store.get_transaction(txn_id).await.ok_or_else(|| {
                    WalletError::Inconsistency(format!("transaction {} vanished", txn_id))
                })?;
                return Ok(self.acknowledge_terminal(
                    &current,
                    InvoiceOutcome::Succeeded,
                    invoice_ref,
                ));
            }
            Err(e) => return Err(e),
        }

        let new_balance = wallet_guard.balance().checked_add(amount).ok_or_else(|| {
            WalletError::Inconsistency("wallet balance overflow crediting top-up".into())
        })?;
        unit.append_entries(vec![
            LedgerEntry::wallet_leg(txn_id, wallet_id, LedgerSide::Credit, amount, new_balance),
            LedgerEntry::clearing_leg(txn_id, LedgerSide::Debit, amount),
        ])?;

        // WalletInactive aborts the unit; the transaction stays PENDING and
        // a redelivery can settle it after reactivation.
        let credited = wallet_guard.credit(amount)?;
        if credited != new_balance {
            error!(
                wallet_id, credited, new_balance,
                "balance drifted inside locked unit"
            );
            return Err(WalletError::Inconsistency(
                "balance drifted inside locked unit".to_string(),
            ));
        }
        unit.note_balance(wallet_id, new_balance);
        unit.commit();

        info!(
            txn_id = %txn_id, wallet_id, amount, balance = new_balance, invoice_ref,
            "top-up settled by outcome event"
        );
        Ok(ApplyReceipt {
            applied: true,
            transaction_id: Some(txn_id),
            status: Some(TxnStatus::Succeeded),
        })
    }

    async fn settle_failure(
        &self,
        txn_id: TxnId,
        invoice_ref: &str,
    ) -> Result<ApplyReceipt, WalletError> {
        let mut unit = self.store.begin_unit().await;
        match unit.transition(txn_id, TxnStatus::Pending, TxnStatus::Failed) {
            Ok(_) => {
                unit.commit();
                info!(txn_id = %txn_id, invoice_ref, "top-up failed by outcome event");
                Ok(ApplyReceipt {
                    applied: true,
                    transaction_id: Some(txn_id),
                    status: Some(TxnStatus::Failed),
                })
            }
            Err(WalletError::Conflict(_)) => {
                drop(unit);
                let current = self.store.get_transaction(txn_id).await.ok_or_else(|| {
                    WalletError::Inconsistency(format!("transaction {} vanished", txn_id))
                })?;
                Ok(self.acknowledge_terminal(&current, InvoiceOutcome::Failed, invoice_ref))
            }
            Err(e) => Err(e),
        }
    }

    /// Withdraw a PENDING top-up before settlement. Terminal transactions
    /// are never touched; a settled top-up cannot be reversed here.
    pub async fn cancel(&self, user: UserId, txn_id: TxnId) -> Result<Transaction, WalletError> {
        let wallet_id = self
            .store
            .wallet_id_of(user)
            .ok_or_else(|| WalletError::NotFound(format!("wallet for user {}", user)))?;

        let mut unit = self.store.begin_unit().await;
        let (txn_wallet, txn_type) = {
            let txn = unit
                .get_txn(txn_id)
                .ok_or_else(|| WalletError::NotFound(format!("transaction {}", txn_id)))?;
            (txn.wallet_id, txn.txn_type)
        };
        // Another user's transaction is indistinguishable from a missing one.
        if txn_wallet != wallet_id {
            return Err(WalletError::NotFound(format!("transaction {}", txn_id)));
        }
        if txn_type != TxnType::Topup {
            return Err(WalletError::Validation(
                "only top-up transactions can be cancelled".into(),
            ));
        }

        let updated = unit.transition(txn_id, TxnStatus::Pending, TxnStatus::Cancelled)?;
        unit.commit();
        info!(txn_id = %txn_id, user, "pending top-up cancelled");
        Ok(updated)
    }
}
