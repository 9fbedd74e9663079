//! Authoritative wallet store and journal
//!
//! Single authoritative record per wallet behind a transactional in-process
//! core. Every wallet sits behind its own async mutex; a balance mutation,
//! its paired ledger writes and its transaction-status write all land while
//! that lock is held, which gives per-wallet serializability: no other
//! operation can observe or apply a delta between the sufficiency check and
//! the write. Two-wallet units lock in ascending wallet id order.
//!
//! Lock order: wallet mutexes (ascending id) before the journal write lock.
//! Never acquire a wallet lock while holding the journal.
//!
//! Committed effects stream out as [`CommitEvent`]s for the write-behind
//! durable journal.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use dashmap::DashMap;
use rustc_hash::FxHashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock, RwLockWriteGuard};
use tracing::warn;

use crate::core_types::{AmountMinor, LedgerEntryId, TxnId, UserId, WalletId};
use crate::error::WalletError;
use crate::ledger::LedgerEntry;
use crate::transaction::{Transaction, TxnStatus, TxnType};
use crate::wallet::{Wallet, WalletStatus};

/// Effects of one committed atomic unit, exactly as applied.
#[derive(Debug, Clone)]
pub struct CommittedUnit {
    pub new_txns: Vec<Transaction>,
    /// Records rewritten by this unit (status transition or external-ref
    /// attach), in their post-commit shape.
    pub updated_txns: Vec<Transaction>,
    pub entries: Vec<LedgerEntry>,
    /// Post-mutation balances of every wallet touched by the unit.
    pub balances: Vec<(WalletId, AmountMinor)>,
}

/// Stream of committed effects consumed by the durable journal worker.
#[derive(Debug, Clone)]
pub enum CommitEvent {
    /// Wallet provisioned or its status changed; full snapshot.
    WalletUpserted(Wallet),
    /// One atomic unit committed.
    Unit(CommittedUnit),
}

/// Optional filters for transaction listing.
#[derive(Debug, Clone, Default)]
pub struct TxnFilter {
    pub txn_type: Option<TxnType>,
    pub status: Option<TxnStatus>,
}

/// Pagination window. `limit` is clamped by the gateway to 1..=100.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

/// One page of a wallet's transaction history, newest first.
#[derive(Debug, Clone)]
pub struct TxnPage {
    pub items: Vec<Transaction>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

/// Point-in-time balance snapshot for the read path.
#[derive(Debug, Clone, Serialize)]
pub struct BalanceView {
    pub wallet_id: WalletId,
    pub balance: AmountMinor,
    pub currency: String,
    pub status: WalletStatus,
}

/// Store-wide counters for health reporting.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StoreStats {
    pub wallets: usize,
    pub transactions: usize,
    pub ledger_entries: usize,
}

#[derive(Default)]
struct Journal {
    transactions: Vec<Transaction>,
    entries: Vec<LedgerEntry>,
    txn_index: FxHashMap<TxnId, usize>,
    external_ref_index: FxHashMap<String, TxnId>,
}

pub struct LedgerStore {
    wallets: DashMap<WalletId, Arc<Mutex<Wallet>>>,
    /// Public routing tag -> wallet. Tags are unique system-wide.
    tags: DashMap<String, WalletId>,
    /// One wallet per user.
    owners: DashMap<UserId, WalletId>,
    journal: RwLock<Journal>,
    next_wallet_id: AtomicU64,
    next_entry_id: AtomicU64,
    events: Option<mpsc::Sender<CommitEvent>>,
}

impl LedgerStore {
    pub fn new() -> Self {
        Self {
            wallets: DashMap::new(),
            tags: DashMap::new(),
            owners: DashMap::new(),
            journal: RwLock::new(Journal::default()),
            next_wallet_id: AtomicU64::new(1),
            next_entry_id: AtomicU64::new(1),
            events: None,
        }
    }

    /// A store that streams committed effects to the durable journal worker.
    pub fn with_events(events: mpsc::Sender<CommitEvent>) -> Self {
        Self {
            events: Some(events),
            ..Self::new()
        }
    }

    fn emit(&self, event: CommitEvent) {
        if let Some(tx) = &self.events {
            if let Err(e) = tx.try_send(event) {
                // The authoritative state is already committed; only the
                // durable mirror lags.
                warn!(error = %e, "commit event dropped, durable journal lagging");
            }
        }
    }

    // === Provisioning ===

    /// Provision a wallet with an opening balance. One wallet per user;
    /// public tags are claimed atomically so two concurrent opens cannot
    /// share one.
    pub fn open_wallet(
        &self,
        owner: UserId,
        public_tag: &str,
        currency: &str,
        opening_balance: AmountMinor,
    ) -> Result<WalletId, WalletError> {
        let tag = public_tag.trim();
        if tag.is_empty() {
            return Err(WalletError::Validation("public tag must not be empty".into()));
        }
        if currency.trim().is_empty() {
            return Err(WalletError::Validation("currency must not be empty".into()));
        }

        let wallet_id = self.next_wallet_id.fetch_add(1, Ordering::Relaxed);

        // Claim the tag first; entry() makes the uniqueness check and the
        // claim one atomic step.
        match self.tags.entry(tag.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(WalletError::Conflict(format!(
                    "public tag '{}' is already taken",
                    tag
                )));
            }
            dashmap::mapref::entry::Entry::Vacant(vac) => {
                vac.insert(wallet_id);
            }
        }

        match self.owners.entry(owner) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                self.tags.remove(tag);
                return Err(WalletError::Conflict(format!(
                    "user {} already has a wallet",
                    owner
                )));
            }
            dashmap::mapref::entry::Entry::Vacant(vac) => {
                vac.insert(wallet_id);
            }
        }

        let wallet = Wallet::new(wallet_id, owner, tag, currency, opening_balance);
        self.emit(CommitEvent::WalletUpserted(wallet.clone()));
        self.wallets.insert(wallet_id, Arc::new(Mutex::new(wallet)));
        Ok(wallet_id)
    }

    /// Administrative status change (suspend/close/reactivate).
    pub async fn set_wallet_status(
        &self,
        wallet_id: WalletId,
        status: WalletStatus,
    ) -> Result<(), WalletError> {
        let mut guard = self.lock_wallet(wallet_id).await?;
        guard.set_status(status);
        self.emit(CommitEvent::WalletUpserted(guard.clone()));
        Ok(())
    }

    // === Lookups ===

    pub fn resolve_tag(&self, tag: &str) -> Option<WalletId> {
        self.tags.get(tag).map(|r| *r.value())
    }

    pub fn wallet_id_of(&self, owner: UserId) -> Option<WalletId> {
        self.owners.get(&owner).map(|r| *r.value())
    }

    /// Balance snapshot for the authenticated owner's read path.
    pub async fn balance_of(&self, owner: UserId) -> Result<BalanceView, WalletError> {
        let wallet_id = self
            .wallet_id_of(owner)
            .ok_or_else(|| WalletError::NotFound(format!("wallet for user {}", owner)))?;
        let guard = self.lock_wallet(wallet_id).await?;
        Ok(BalanceView {
            wallet_id,
            balance: guard.balance(),
            currency: guard.currency().to_string(),
            status: guard.status(),
        })
    }

    /// Clone the full wallet record (fixtures, durable bootstrap).
    pub async fn wallet_snapshot(&self, wallet_id: WalletId) -> Result<Wallet, WalletError> {
        Ok(self.lock_wallet(wallet_id).await?.clone())
    }

    // === Atomic unit primitives ===

    /// Exclusive access to one wallet. The guard is the atomic unit's
    /// isolation boundary for that wallet.
    pub async fn lock_wallet(
        &self,
        wallet_id: WalletId,
    ) -> Result<OwnedMutexGuard<Wallet>, WalletError> {
        let cell = self
            .wallets
            .get(&wallet_id)
            .map(|r| Arc::clone(r.value()))
            .ok_or_else(|| WalletError::NotFound(format!("wallet {}", wallet_id)))?;
        Ok(cell.lock_owned().await)
    }

    /// Lock two distinct wallets, always acquiring in ascending wallet id
    /// order so opposite-direction units cannot deadlock. Guards are
    /// returned in the order requested.
    pub async fn lock_pair(
        &self,
        a: WalletId,
        b: WalletId,
    ) -> Result<(OwnedMutexGuard<Wallet>, OwnedMutexGuard<Wallet>), WalletError> {
        if a == b {
            return Err(WalletError::SelfTransfer);
        }
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        let g_low = self.lock_wallet(low).await?;
        let g_high = self.lock_wallet(high).await?;
        if a < b {
            Ok((g_low, g_high))
        } else {
            Ok((g_high, g_low))
        }
    }

    /// Open an atomic journal unit. The returned guard holds the journal
    /// write lock until committed or dropped; staged writes apply all at
    /// once on commit and not at all on drop.
    pub async fn begin_unit(&self) -> UnitGuard<'_> {
        UnitGuard {
            store: self,
            journal: self.journal.write().await,
            new_txns: Vec::new(),
            status_changes: Vec::new(),
            external_refs: Vec::new(),
            entries: Vec::new(),
            balances: Vec::new(),
        }
    }

    // === Read path ===

    pub async fn get_transaction(&self, txn_id: TxnId) -> Option<Transaction> {
        let journal = self.journal.read().await;
        journal
            .txn_index
            .get(&txn_id)
            .map(|&i| journal.transactions[i].clone())
    }

    pub async fn find_by_external_ref(&self, external_ref: &str) -> Option<Transaction> {
        let journal = self.journal.read().await;
        let txn_id = journal.external_ref_index.get(external_ref)?;
        journal
            .txn_index
            .get(txn_id)
            .map(|&i| journal.transactions[i].clone())
    }

    pub async fn entries_for_txn(&self, txn_id: TxnId) -> Vec<LedgerEntry> {
        let journal = self.journal.read().await;
        journal
            .entries
            .iter()
            .filter(|e| e.txn_id == txn_id)
            .cloned()
            .collect()
    }

    /// A wallet's transaction history, newest first, restartable via
    /// limit/offset.
    pub async fn list_transactions(
        &self,
        wallet_id: WalletId,
        filter: &TxnFilter,
        page: Page,
    ) -> TxnPage {
        let journal = self.journal.read().await;
        let matches = |t: &Transaction| {
            t.wallet_id == wallet_id
                && filter.txn_type.is_none_or(|ty| t.txn_type == ty)
                && filter.status.is_none_or(|st| t.status == st)
        };

        // Append order is creation order, so reverse iteration is newest
        // first without sorting.
        let total = journal.transactions.iter().filter(|t| matches(t)).count();
        let items = journal
            .transactions
            .iter()
            .rev()
            .filter(|t| matches(t))
            .skip(page.offset)
            .take(page.limit)
            .cloned()
            .collect();

        TxnPage {
            items,
            total,
            limit: page.limit,
            offset: page.offset,
        }
    }

    pub async fn stats(&self) -> StoreStats {
        let journal = self.journal.read().await;
        StoreStats {
            wallets: self.wallets.len(),
            transactions: journal.transactions.len(),
            ledger_entries: journal.entries.len(),
        }
    }
}

impl Default for LedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

/// An open atomic unit over the journal.
///
/// Writes are staged on the guard and applied to the journal only by
/// [`UnitGuard::commit`]; dropping the guard aborts the unit with nothing
/// applied. The journal write lock is held for the guard's whole lifetime,
/// so a compare-and-set checked through this guard still holds at commit.
pub struct UnitGuard<'a> {
    store: &'a LedgerStore,
    journal: RwLockWriteGuard<'a, Journal>,
    new_txns: Vec<Transaction>,
    status_changes: Vec<Transaction>,
    external_refs: Vec<(TxnId, String, String)>,
    entries: Vec<LedgerEntry>,
    balances: Vec<(WalletId, AmountMinor)>,
}

impl UnitGuard<'_> {
    // --- reads against committed state ---

    pub fn get_txn(&self, txn_id: TxnId) -> Option<&Transaction> {
        self.journal
            .txn_index
            .get(&txn_id)
            .map(|&i| &self.journal.transactions[i])
    }

    pub fn find_by_external_ref(&self, external_ref: &str) -> Option<&Transaction> {
        let txn_id = self.journal.external_ref_index.get(external_ref)?;
        self.journal
            .txn_index
            .get(txn_id)
            .map(|&i| &self.journal.transactions[i])
    }

    // --- staged writes ---

    /// Stage a new transaction record.
    pub fn insert_txn(&mut self, txn: Transaction) -> Result<(), WalletError> {
        if self.journal.txn_index.contains_key(&txn.id) {
            return Err(WalletError::Inconsistency(format!(
                "transaction {} already recorded",
                txn.id
            )));
        }
        if let Some(ext) = &txn.external_ref {
            if self.journal.external_ref_index.contains_key(ext) {
                return Err(WalletError::Conflict(format!(
                    "external reference '{}' already recorded",
                    ext
                )));
            }
        }
        self.new_txns.push(txn);
        Ok(())
    }

    /// Compare-and-set status transition. Fails with `Conflict` when the
    /// record is not currently in `from`; the state machine itself rejects
    /// anything but PENDING -> terminal.
    pub fn transition(
        &mut self,
        txn_id: TxnId,
        from: TxnStatus,
        to: TxnStatus,
    ) -> Result<Transaction, WalletError> {
        let current = self
            .get_txn(txn_id)
            .ok_or_else(|| WalletError::NotFound(format!("transaction {}", txn_id)))?;
        if current.status != from {
            return Err(WalletError::Conflict(format!(
                "transaction {} is {}, expected {}",
                txn_id, current.status, from
            )));
        }
        if !from.can_transition_to(to) {
            return Err(WalletError::Conflict(format!(
                "illegal transition {} -> {}",
                from, to
            )));
        }
        let mut updated = current.clone();
        updated.status = to;
        updated.updated_at = Utc::now();
        self.status_changes.push(updated.clone());
        Ok(updated)
    }

    /// Attach the provider reference to a transaction so later outcome
    /// events can find it.
    pub fn set_external_ref(
        &mut self,
        txn_id: TxnId,
        provider: &str,
        external_ref: &str,
    ) -> Result<(), WalletError> {
        if self.get_txn(txn_id).is_none() {
            return Err(WalletError::NotFound(format!("transaction {}", txn_id)));
        }
        if self.journal.external_ref_index.contains_key(external_ref) {
            return Err(WalletError::Conflict(format!(
                "external reference '{}' already recorded",
                external_ref
            )));
        }
        self.external_refs
            .push((txn_id, provider.to_string(), external_ref.to_string()));
        Ok(())
    }

    /// Stage the ledger legs of this unit. Every settling transaction must
    /// carry exactly one balanced debit/credit pair; anything else is a
    /// conservation violation and nothing is staged.
    pub fn append_entries(&mut self, entries: Vec<LedgerEntry>) -> Result<(), WalletError> {
        let mut by_txn: FxHashMap<TxnId, (usize, i64)> = FxHashMap::default();
        for e in &entries {
            let slot = by_txn.entry(e.txn_id).or_insert((0, 0));
            slot.0 += 1;
            slot.1 += e.signed_amount();
        }
        for (txn_id, (count, sum)) in by_txn {
            if count != 2 || sum != 0 {
                return Err(WalletError::Inconsistency(format!(
                    "unbalanced ledger group for transaction {}: {} legs, signed sum {}",
                    txn_id, count, sum
                )));
            }
        }
        self.entries.extend(entries);
        Ok(())
    }

    /// Record a wallet's post-mutation balance for the committed-unit event.
    pub fn note_balance(&mut self, wallet_id: WalletId, balance: AmountMinor) {
        self.balances.push((wallet_id, balance));
    }

    /// Apply every staged write to the journal and publish the unit.
    pub fn commit(mut self) {
        for txn in &self.new_txns {
            let idx = self.journal.transactions.len();
            self.journal.txn_index.insert(txn.id, idx);
            if let Some(ext) = &txn.external_ref {
                self.journal.external_ref_index.insert(ext.clone(), txn.id);
            }
            self.journal.transactions.push(txn.clone());
        }

        for (txn_id, provider, external_ref) in &self.external_refs {
            if let Some(&idx) = self.journal.txn_index.get(txn_id) {
                let txn = &mut self.journal.transactions[idx];
                txn.external_provider = Some(provider.clone());
                txn.external_ref = Some(external_ref.clone());
                txn.updated_at = Utc::now();
                self.journal
                    .external_ref_index
                    .insert(external_ref.clone(), *txn_id);
            }
        }

        for updated in &self.status_changes {
            if let Some(&idx) = self.journal.txn_index.get(&updated.id) {
                let txn = &mut self.journal.transactions[idx];
                txn.status = updated.status;
                txn.updated_at = updated.updated_at;
            }
        }

        let mut appended = Vec::with_capacity(self.entries.len());
        for mut entry in std::mem::take(&mut self.entries) {
            entry.id = self.store.next_entry_id.fetch_add(1, Ordering::Relaxed);
            self.journal.entries.push(entry.clone());
            appended.push(entry);
        }

        // Publish rewritten records in their final shape, one per id even
        // when a unit both attaches a ref and transitions the status.
        let mut updated_ids: Vec<TxnId> = self.status_changes.iter().map(|t| t.id).collect();
        for (txn_id, _, _) in &self.external_refs {
            if !updated_ids.contains(txn_id) {
                updated_ids.push(*txn_id);
            }
        }
        let updated_txns = updated_ids
            .iter()
            .filter_map(|id| {
                self.journal
                    .txn_index
                    .get(id)
                    .map(|&i| self.journal.transactions[i].clone())
            })
            .collect::<Vec<_>>();

        let unit = CommittedUnit {
            new_txns: std::mem::take(&mut self.new_txns),
            updated_txns,
            entries: appended,
            balances: std::mem::take(&mut self.balances),
        };

        if !unit.new_txns.is_empty()
            || !unit.updated_txns.is_empty()
            || !unit.entries.is_empty()
            || !unit.balances.is_empty()
        {
            self.store.emit(CommitEvent::Unit(unit));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerSide;
    use uuid::Uuid;

    fn store() -> LedgerStore {
        LedgerStore::new()
    }

    #[tokio::test]
    async fn test_open_wallet_and_lookups() {
        let s = store();
        let id = s.open_wallet(100, "alice", "USD", 10_000).unwrap();
        assert_eq!(s.resolve_tag("alice"), Some(id));
        assert_eq!(s.wallet_id_of(100), Some(id));

        let view = s.balance_of(100).await.unwrap();
        assert_eq!(view.balance, 10_000);
        assert_eq!(view.currency, "USD");
        assert_eq!(view.status, WalletStatus::Active);
    }

    #[tokio::test]
    async fn test_duplicate_tag_rejected() {
        let s = store();
        s.open_wallet(100, "alice", "USD", 0).unwrap();
        let err = s.open_wallet(101, "alice", "USD", 0).unwrap_err();
        assert!(matches!(err, WalletError::Conflict(_)));
        // The second user holds no wallet after the failed open
        assert_eq!(s.wallet_id_of(101), None);
    }

    #[tokio::test]
    async fn test_one_wallet_per_user() {
        let s = store();
        s.open_wallet(100, "alice", "USD", 0).unwrap();
        let err = s.open_wallet(100, "alice2", "USD", 0).unwrap_err();
        assert!(matches!(err, WalletError::Conflict(_)));
        // The failed open must release its tag claim
        assert_eq!(s.resolve_tag("alice2"), None);
    }

    #[tokio::test]
    async fn test_unit_commit_appends_and_indexes() {
        let s = store();
        let wallet_id = s.open_wallet(100, "alice", "USD", 10_000).unwrap();
        let txn_id = Uuid::new_v4();

        let mut unit = s.begin_unit().await;
        unit.insert_txn(Transaction::new(
            txn_id,
            wallet_id,
            TxnType::Topup,
            TxnStatus::Pending,
            5_000,
        ))
        .unwrap();
        unit.commit();

        let got = s.get_transaction(txn_id).await.unwrap();
        assert_eq!(got.status, TxnStatus::Pending);
        assert_eq!(got.amount, 5_000);
    }

    #[tokio::test]
    async fn test_unit_drop_aborts() {
        let s = store();
        let wallet_id = s.open_wallet(100, "alice", "USD", 10_000).unwrap();
        let txn_id = Uuid::new_v4();

        {
            let mut unit = s.begin_unit().await;
            unit.insert_txn(Transaction::new(
                txn_id,
                wallet_id,
                TxnType::Topup,
                TxnStatus::Pending,
                5_000,
            ))
            .unwrap();
            // dropped without commit
        }

        assert!(s.get_transaction(txn_id).await.is_none());
    }

    #[tokio::test]
    async fn test_transition_cas() {
        let s = store();
        let wallet_id = s.open_wallet(100, "alice", "USD", 0).unwrap();
        let txn_id = Uuid::new_v4();

        let mut unit = s.begin_unit().await;
        unit.insert_txn(Transaction::new(
            txn_id,
            wallet_id,
            TxnType::Topup,
            TxnStatus::Pending,
            100,
        ))
        .unwrap();
        unit.commit();

        let mut unit = s.begin_unit().await;
        unit.transition(txn_id, TxnStatus::Pending, TxnStatus::Succeeded)
            .unwrap();
        unit.commit();

        // Terminal: a second transition must fail the expected-state check
        let mut unit = s.begin_unit().await;
        let err = unit
            .transition(txn_id, TxnStatus::Pending, TxnStatus::Cancelled)
            .unwrap_err();
        assert!(matches!(err, WalletError::Conflict(_)));
        drop(unit);

        let got = s.get_transaction(txn_id).await.unwrap();
        assert_eq!(got.status, TxnStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_unbalanced_entries_rejected() {
        let s = store();
        let wallet_id = s.open_wallet(100, "alice", "USD", 1_000).unwrap();
        let txn_id = Uuid::new_v4();

        let mut unit = s.begin_unit().await;
        unit.insert_txn(Transaction::new(
            txn_id,
            wallet_id,
            TxnType::Topup,
            TxnStatus::Succeeded,
            100,
        ))
        .unwrap();
        let err = unit
            .append_entries(vec![LedgerEntry::wallet_leg(
                txn_id,
                wallet_id,
                LedgerSide::Credit,
                100,
                1_100,
            )])
            .unwrap_err();
        assert!(matches!(err, WalletError::Inconsistency(_)));
    }

    #[tokio::test]
    async fn test_external_ref_lookup_and_uniqueness() {
        let s = store();
        let wallet_id = s.open_wallet(100, "alice", "USD", 0).unwrap();
        let txn_id = Uuid::new_v4();

        let mut unit = s.begin_unit().await;
        unit.insert_txn(Transaction::new(
            txn_id,
            wallet_id,
            TxnType::Topup,
            TxnStatus::Pending,
            100,
        ))
        .unwrap();
        unit.commit();

        let mut unit = s.begin_unit().await;
        unit.set_external_ref(txn_id, "provider", "inv_001").unwrap();
        unit.commit();

        let found = s.find_by_external_ref("inv_001").await.unwrap();
        assert_eq!(found.id, txn_id);
        assert_eq!(found.external_provider.as_deref(), Some("provider"));

        // Same reference cannot attach twice
        let other = Uuid::new_v4();
        let mut unit = s.begin_unit().await;
        unit.insert_txn(Transaction::new(
            other,
            wallet_id,
            TxnType::Topup,
            TxnStatus::Pending,
            100,
        ))
        .unwrap();
        unit.commit();
        let mut unit = s.begin_unit().await;
        let err = unit.set_external_ref(other, "provider", "inv_001").unwrap_err();
        assert!(matches!(err, WalletError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_list_newest_first_with_filters() {
        let s = store();
        let wallet_id = s.open_wallet(100, "alice", "USD", 0).unwrap();

        let mut ids = Vec::new();
        for i in 0..5u64 {
            let txn_id = Uuid::new_v4();
            ids.push(txn_id);
            let status = if i % 2 == 0 {
                TxnStatus::Succeeded
            } else {
                TxnStatus::Pending
            };
            let mut unit = s.begin_unit().await;
            unit.insert_txn(Transaction::new(
                txn_id,
                wallet_id,
                TxnType::Topup,
                status,
                100 + i,
            ))
            .unwrap();
            unit.commit();
        }

        let page = s
            .list_transactions(
                wallet_id,
                &TxnFilter::default(),
                Page {
                    limit: 2,
                    offset: 0,
                },
            )
            .await;
        assert_eq!(page.total, 5);
        assert_eq!(page.items.len(), 2);
        // Newest first
        assert_eq!(page.items[0].id, ids[4]);
        assert_eq!(page.items[1].id, ids[3]);

        let next = s
            .list_transactions(
                wallet_id,
                &TxnFilter::default(),
                Page {
                    limit: 2,
                    offset: 2,
                },
            )
            .await;
        assert_eq!(next.items[0].id, ids[2]);

        let succeeded = s
            .list_transactions(
                wallet_id,
                &TxnFilter {
                    status: Some(TxnStatus::Succeeded),
                    ..Default::default()
                },
                Page {
                    limit: 10,
                    offset: 0,
                },
            )
            .await;
        assert_eq!(succeeded.total, 3);
        assert!(succeeded.items.iter().all(|t| t.status == TxnStatus::Succeeded));
    }

    #[tokio::test]
    async fn test_lock_pair_opposite_order_completes() {
        let s = Arc::new(store());
        let a = s.open_wallet(1, "a", "USD", 1_000).unwrap();
        let b = s.open_wallet(2, "b", "USD", 1_000).unwrap();

        let mut handles = Vec::new();
        for i in 0..50u32 {
            let s = Arc::clone(&s);
            let (x, y) = if i % 2 == 0 { (a, b) } else { (b, a) };
            handles.push(tokio::spawn(async move {
                let (_gx, _gy) = s.lock_pair(x, y).await.unwrap();
                tokio::task::yield_now().await;
            }));
        }
        // Completes without deadlock
        for h in handles {
            h.await.unwrap();
        }
    }
}
