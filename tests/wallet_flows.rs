//! End-to-end wallet flows against the in-process engine.
//!
//! Covers balance conservation, ledger pairing, idempotent replay,
//! overdraw races, top-up settlement via external outcomes, and
//! deadlock-freedom of opposite-direction transfers.

use std::sync::Arc;
use std::time::Duration;

use walletd::error::WalletError;
use walletd::idempotency::IdempotencyGuard;
use walletd::ledger::conservation_holds;
use walletd::store::{LedgerStore, Page, TxnFilter};
use walletd::topup::{InvoiceOutcome, MockProvider, TopupReconciler};
use walletd::transaction::{TxnStatus, TxnType};
use walletd::transfer::TransferOrchestrator;

const ALICE: u64 = 1;
const BOB: u64 = 2;

fn engine() -> (Arc<LedgerStore>, Arc<TransferOrchestrator>) {
    let store = Arc::new(LedgerStore::new());
    let guard = Arc::new(IdempotencyGuard::new(
        Duration::from_secs(60),
        Duration::from_millis(500),
    ));
    let orchestrator = Arc::new(TransferOrchestrator::new(store.clone(), guard, 3));
    (store, orchestrator)
}

fn reconciler_with(store: &Arc<LedgerStore>, provider: MockProvider) -> TopupReconciler {
    TopupReconciler::new(store.clone(), Arc::new(provider))
}

async fn balance(store: &LedgerStore, user: u64) -> u64 {
    store
        .balance_of(user)
        .await
        .expect("wallet should exist")
        .balance
}

// ---------------------------------------------------------------------------
// Transfers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transfer_moves_funds_and_balances_ledger() {
    let (store, orchestrator) = engine();
    store.open_wallet(ALICE, "alice", "USD", 10_000).unwrap();
    store.open_wallet(BOB, "bob", "USD", 500).unwrap();

    let receipt = orchestrator
        .transfer(ALICE, "bob", 2_500, Some("rent".into()), None)
        .await
        .expect("transfer should settle");

    assert_eq!(receipt.balance_after, 7_500);
    assert_eq!(balance(&store, ALICE).await, 7_500);
    assert_eq!(balance(&store, BOB).await, 3_000);

    // The settling TRANSFER_OUT record carries exactly one balanced pair.
    let entries = store.entries_for_txn(receipt.transaction_id).await;
    assert_eq!(entries.len(), 2);
    assert!(conservation_holds(&entries));

    let out = store
        .get_transaction(receipt.transaction_id)
        .await
        .expect("record should exist");
    assert_eq!(out.status, TxnStatus::Succeeded);
    assert_eq!(out.txn_type, TxnType::TransferOut);
    assert_eq!(out.memo.as_deref(), Some("rent"));

    // The recipient sees a SUCCEEDED TRANSFER_IN mirror.
    let bob_wallet = store.wallet_id_of(BOB).unwrap();
    let page = store
        .list_transactions(bob_wallet, &TxnFilter::default(), Page { limit: 10, offset: 0 })
        .await;
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].txn_type, TxnType::TransferIn);
    assert_eq!(page.items[0].status, TxnStatus::Succeeded);
}

#[tokio::test]
async fn insufficient_funds_changes_nothing() {
    let (store, orchestrator) = engine();
    store.open_wallet(ALICE, "alice", "USD", 100).unwrap();
    store.open_wallet(BOB, "bob", "USD", 0).unwrap();

    let err = orchestrator
        .transfer(ALICE, "bob", 500, None, None)
        .await
        .expect_err("overdraw must fail");
    assert!(matches!(err, WalletError::InsufficientFunds));

    assert_eq!(balance(&store, ALICE).await, 100);
    assert_eq!(balance(&store, BOB).await, 0);

    let stats = store.stats().await;
    assert_eq!(stats.transactions, 0, "no record of the failed attempt");
    assert_eq!(stats.ledger_entries, 0);
}

#[tokio::test]
async fn replayed_idempotency_key_applies_once() {
    let (store, orchestrator) = engine();
    store.open_wallet(ALICE, "alice", "USD", 10_000).unwrap();
    store.open_wallet(BOB, "bob", "USD", 0).unwrap();

    let first = orchestrator
        .transfer(ALICE, "bob", 1_000, None, Some("k-replay".into()))
        .await
        .unwrap();

    for _ in 0..3 {
        let replay = orchestrator
            .transfer(ALICE, "bob", 1_000, None, Some("k-replay".into()))
            .await
            .unwrap();
        assert_eq!(replay.transaction_id, first.transaction_id);
        assert_eq!(replay.balance_after, first.balance_after);
    }

    assert_eq!(balance(&store, ALICE).await, 9_000, "debited exactly once");
    assert_eq!(balance(&store, BOB).await, 1_000);
}

#[tokio::test]
async fn concurrent_same_key_single_debit() {
    let (store, orchestrator) = engine();
    store.open_wallet(ALICE, "alice", "USD", 10_000).unwrap();
    store.open_wallet(BOB, "bob", "USD", 0).unwrap();

    let mut handles = Vec::new();
    for _ in 0..2 {
        let orch = orchestrator.clone();
        handles.push(tokio::spawn(async move {
            orch.transfer(ALICE, "bob", 1_000, None, Some("k1".into()))
                .await
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        let receipt = handle.await.unwrap().expect("both callers succeed");
        ids.push(receipt.transaction_id);
    }

    assert_eq!(ids[0], ids[1], "both callers observe the same settlement");
    assert_eq!(balance(&store, ALICE).await, 9_000);
    assert_eq!(balance(&store, BOB).await, 1_000);
}

#[tokio::test]
async fn overdraw_race_never_goes_negative() {
    let (store, orchestrator) = engine();
    store.open_wallet(ALICE, "alice", "USD", 1_000).unwrap();
    store.open_wallet(BOB, "bob", "USD", 0).unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let orch = orchestrator.clone();
        handles.push(tokio::spawn(async move {
            orch.transfer(ALICE, "bob", 300, None, None).await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(WalletError::InsufficientFunds) => {}
            Err(other) => panic!("unexpected failure: {other}"),
        }
    }

    // floor(1000 / 300) settlements win; the rest bounce.
    assert_eq!(succeeded, 3);
    assert_eq!(balance(&store, ALICE).await, 100);
    assert_eq!(balance(&store, BOB).await, 900);
}

#[tokio::test]
async fn opposite_direction_transfers_never_deadlock() {
    let (store, orchestrator) = engine();
    store.open_wallet(ALICE, "alice", "USD", 100_000).unwrap();
    store.open_wallet(BOB, "bob", "USD", 100_000).unwrap();

    let a_to_b = {
        let orch = orchestrator.clone();
        tokio::spawn(async move {
            for _ in 0..50 {
                orch.transfer(ALICE, "bob", 10, None, None).await.unwrap();
            }
        })
    };
    let b_to_a = {
        let orch = orchestrator.clone();
        tokio::spawn(async move {
            for _ in 0..50 {
                orch.transfer(BOB, "alice", 10, None, None).await.unwrap();
            }
        })
    };

    tokio::time::timeout(Duration::from_secs(5), async {
        a_to_b.await.unwrap();
        b_to_a.await.unwrap();
    })
    .await
    .expect("opposite-direction transfers must not deadlock");

    // Equal traffic both ways nets to zero.
    assert_eq!(balance(&store, ALICE).await, 100_000);
    assert_eq!(balance(&store, BOB).await, 100_000);
}

// ---------------------------------------------------------------------------
// Top-ups and external outcomes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pending_topup_settles_on_external_outcome() {
    let (store, _) = engine();
    let reconciler = reconciler_with(&store, MockProvider::pending());
    store.open_wallet(ALICE, "alice", "USD", 0).unwrap();

    let receipt = reconciler
        .initiate(ALICE, 5_000, "pm_card_visa")
        .await
        .expect("initiate should accept");
    assert_eq!(receipt.status, TxnStatus::Pending);
    assert_eq!(receipt.balance_after, None);
    let invoice_ref = receipt.invoice_ref.expect("rail issued an invoice");

    assert_eq!(balance(&store, ALICE).await, 0, "nothing lands while pending");

    let applied = reconciler
        .apply_external_outcome(&invoice_ref, InvoiceOutcome::Succeeded)
        .await
        .unwrap();
    assert!(applied.applied);
    assert_eq!(balance(&store, ALICE).await, 5_000);

    let txn = store
        .get_transaction(receipt.transaction_id)
        .await
        .expect("record should exist");
    assert_eq!(txn.status, TxnStatus::Succeeded);

    let entries = store.entries_for_txn(receipt.transaction_id).await;
    assert_eq!(entries.len(), 2, "one balanced pair per settlement");
    assert!(conservation_holds(&entries));
}

#[tokio::test]
async fn redelivered_success_credits_once() {
    let (store, _) = engine();
    let reconciler = reconciler_with(&store, MockProvider::pending());
    store.open_wallet(ALICE, "alice", "USD", 0).unwrap();

    let receipt = reconciler.initiate(ALICE, 5_000, "pm_card_visa").await.unwrap();
    let invoice_ref = receipt.invoice_ref.unwrap();

    let first = reconciler
        .apply_external_outcome(&invoice_ref, InvoiceOutcome::Succeeded)
        .await
        .unwrap();
    assert!(first.applied);

    let second = reconciler
        .apply_external_outcome(&invoice_ref, InvoiceOutcome::Succeeded)
        .await
        .unwrap();
    assert!(!second.applied, "redelivery acknowledged without effect");

    assert_eq!(balance(&store, ALICE).await, 5_000, "credited exactly once");
    let entries = store
        .entries_for_txn(receipt.transaction_id)
        .await;
    assert_eq!(entries.len(), 2, "no second ledger pair");
}

#[tokio::test]
async fn cancel_after_settlement_is_rejected() {
    let (store, _) = engine();
    let reconciler = reconciler_with(&store, MockProvider::paying());
    store.open_wallet(ALICE, "alice", "USD", 0).unwrap();

    let receipt = reconciler.initiate(ALICE, 2_000, "pm_card_visa").await.unwrap();
    assert_eq!(receipt.status, TxnStatus::Succeeded);
    assert_eq!(balance(&store, ALICE).await, 2_000);

    let err = reconciler
        .cancel(ALICE, receipt.transaction_id)
        .await
        .expect_err("settled top-up cannot be cancelled");
    assert!(matches!(err, WalletError::Conflict(_)));

    // The settlement stands.
    assert_eq!(balance(&store, ALICE).await, 2_000);
    let txn = store.get_transaction(receipt.transaction_id).await.unwrap();
    assert_eq!(txn.status, TxnStatus::Succeeded);
}

// ---------------------------------------------------------------------------
// Transaction history
// ---------------------------------------------------------------------------

#[tokio::test]
async fn history_pages_newest_first_and_is_finite() {
    let (store, orchestrator) = engine();
    store.open_wallet(ALICE, "alice", "USD", 10_000).unwrap();
    store.open_wallet(BOB, "bob", "USD", 0).unwrap();

    for _ in 0..5 {
        orchestrator
            .transfer(ALICE, "bob", 100, None, None)
            .await
            .unwrap();
    }

    let alice_wallet = store.wallet_id_of(ALICE).unwrap();
    let filter = TxnFilter::default();

    let first = store
        .list_transactions(alice_wallet, &filter, Page { limit: 2, offset: 0 })
        .await;
    assert_eq!(first.total, 5);
    assert_eq!(first.items.len(), 2);
    assert!(
        first.items[0].created_at >= first.items[1].created_at,
        "newest first"
    );

    // Restartable: pages walk the full set without overlap or loss.
    let mut seen = Vec::new();
    for offset in [0, 2, 4] {
        let page = store
            .list_transactions(alice_wallet, &filter, Page { limit: 2, offset })
            .await;
        seen.extend(page.items.iter().map(|t| t.id));
    }
    assert_eq!(seen.len(), 5);
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 5, "no duplicates across pages");

    // Finite: paging past the end yields an empty page.
    let past_end = store
        .list_transactions(alice_wallet, &filter, Page { limit: 2, offset: 10 })
        .await;
    assert!(past_end.items.is_empty());

    // Filtered view: only TRANSFER_OUT records on the sender side.
    let outs = store
        .list_transactions(
            alice_wallet,
            &TxnFilter {
                txn_type: Some(TxnType::TransferOut),
                status: Some(TxnStatus::Succeeded),
            },
            Page { limit: 10, offset: 0 },
        )
        .await;
    assert_eq!(outs.total, 5);
}
