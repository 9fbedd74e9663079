//! Idempotency Guard
//!
//! Atomic test-and-set claims keyed by (wallet, caller-supplied key).
//! Claiming happens before the protected effect runs, so two concurrent
//! identical requests can never both execute: the loser parks on the
//! winner's claim and replays the recorded result. Completed claims are
//! retained for a bounded window and treated as fresh afterwards.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::watch;

use crate::core_types::{AmountMinor, TxnId, WalletId};
use crate::error::WalletError;

/// Rounds of park-and-recheck a duplicate performs before giving up.
const MAX_CLAIM_ROUNDS: u32 = 3;

/// Scope key for a claim: idempotency keys are unique per wallet.
pub fn scope_key(wallet_id: WalletId, key: &str) -> String {
    format!("{}:{}", wallet_id, key)
}

/// Result recorded against a completed claim, replayed verbatim to
/// duplicate callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResult {
    pub transaction_id: TxnId,
    pub balance_after: AmountMinor,
}

#[derive(Debug, Clone)]
enum ClaimState {
    InFlight,
    Done(StoredResult),
    Released,
}

struct Claim {
    state_tx: watch::Sender<ClaimState>,
    nonce: u64,
    /// Set at claim time, refreshed when the result is recorded.
    /// The retention window runs from here.
    stamped_at: Instant,
}

/// Proof of claim ownership. `complete`/`release` act only on the claim
/// this token was issued for, never on a successor claim under the same key.
#[derive(Debug)]
pub struct ClaimToken {
    scope: String,
    nonce: u64,
}

/// Outcome of a single atomic test-and-set step.
pub enum CheckOutcome {
    /// Key unseen or expired: the caller owns the claim and must
    /// `complete` or `release` it.
    Fresh(ClaimToken),
    /// Key completed inside the retention window.
    Replay(StoredResult),
    /// Another caller holds the claim right now.
    InFlight(watch::Receiver<ClaimState>),
}

/// Decision for an operation protected by an idempotency key.
pub enum ClaimDecision {
    Execute(ClaimToken),
    Replay(StoredResult),
}

pub struct IdempotencyGuard {
    claims: DashMap<String, Claim>,
    retention: Duration,
    replay_wait: Duration,
    next_nonce: AtomicU64,
}

impl IdempotencyGuard {
    pub fn new(retention: Duration, replay_wait: Duration) -> Self {
        Self {
            claims: DashMap::new(),
            retention,
            replay_wait,
            next_nonce: AtomicU64::new(1),
        }
    }

    fn fresh_claim(&self) -> (Claim, u64) {
        let nonce = self.next_nonce.fetch_add(1, Ordering::Relaxed);
        let (tx, _rx) = watch::channel(ClaimState::InFlight);
        (
            Claim {
                state_tx: tx,
                nonce,
                stamped_at: Instant::now(),
            },
            nonce,
        )
    }

    fn is_expired(&self, claim: &Claim) -> bool {
        claim.stamped_at.elapsed() > self.retention
    }

    /// Atomic test-and-set: claim the key or report its current state.
    /// The entry lock makes the test and the set one step, so exactly one
    /// of N concurrent callers gets `Fresh`.
    pub fn check(&self, scope: &str) -> CheckOutcome {
        match self.claims.entry(scope.to_string()) {
            Entry::Occupied(mut occ) => {
                if self.is_expired(occ.get()) {
                    // Outside the retention window a repeated key is fresh
                    let (claim, nonce) = self.fresh_claim();
                    occ.insert(claim);
                    return CheckOutcome::Fresh(ClaimToken {
                        scope: scope.to_string(),
                        nonce,
                    });
                }
                let state = occ.get().state_tx.borrow().clone();
                match state {
                    ClaimState::Done(result) => CheckOutcome::Replay(result),
                    ClaimState::InFlight => {
                        CheckOutcome::InFlight(occ.get().state_tx.subscribe())
                    }
                    ClaimState::Released => {
                        // Released claims are removed before notification;
                        // seeing one here means we raced the removal. Take over.
                        let (claim, nonce) = self.fresh_claim();
                        occ.insert(claim);
                        CheckOutcome::Fresh(ClaimToken {
                            scope: scope.to_string(),
                            nonce,
                        })
                    }
                }
            }
            Entry::Vacant(vac) => {
                let (claim, nonce) = self.fresh_claim();
                vac.insert(claim);
                CheckOutcome::Fresh(ClaimToken {
                    scope: scope.to_string(),
                    nonce,
                })
            }
        }
    }

    /// Claim the key, or wait (bounded) for the in-flight winner and replay
    /// its result. Exhausting the wait surfaces `DuplicateIdempotencyKey`.
    pub async fn claim_or_replay(&self, scope: &str) -> Result<ClaimDecision, WalletError> {
        for _ in 0..MAX_CLAIM_ROUNDS {
            let mut rx = match self.check(scope) {
                CheckOutcome::Fresh(token) => return Ok(ClaimDecision::Execute(token)),
                CheckOutcome::Replay(result) => return Ok(ClaimDecision::Replay(result)),
                CheckOutcome::InFlight(rx) => rx,
            };

            // Snapshot first so a completion between subscribe and await
            // cannot be missed.
            let snapshot = rx.borrow_and_update().clone();
            match snapshot {
                ClaimState::Done(result) => return Ok(ClaimDecision::Replay(result)),
                ClaimState::Released => continue,
                ClaimState::InFlight => {}
            }

            match tokio::time::timeout(self.replay_wait, rx.changed()).await {
                Ok(Ok(())) => {
                    let state = rx.borrow().clone();
                    match state {
                        ClaimState::Done(result) => {
                            return Ok(ClaimDecision::Replay(result));
                        }
                        // Winner released (failed) or was superseded: retry
                        ClaimState::Released | ClaimState::InFlight => continue,
                    }
                }
                // Sender dropped: claim replaced or purged, retry
                Ok(Err(_)) => continue,
                Err(_elapsed) => return Err(WalletError::DuplicateIdempotencyKey),
            }
        }
        Err(WalletError::DuplicateIdempotencyKey)
    }

    /// Record the result against the claim and wake parked duplicates.
    /// Call while the producing atomic unit is still closed, so a replay
    /// can never observe the key before its effects.
    pub fn complete(&self, token: &ClaimToken, result: StoredResult) {
        if let Some(mut claim) = self.claims.get_mut(&token.scope) {
            if claim.nonce == token.nonce {
                claim.stamped_at = Instant::now();
                claim.state_tx.send_replace(ClaimState::Done(result));
            }
        }
    }

    /// Drop the claim after a failed attempt so a retry runs fresh.
    pub fn release(&self, token: &ClaimToken) {
        let removed = self
            .claims
            .remove_if(&token.scope, |_, claim| claim.nonce == token.nonce);
        if let Some((_, claim)) = removed {
            claim.state_tx.send_replace(ClaimState::Released);
        }
    }

    /// Drop every claim outside the retention window. Returns the number
    /// removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.claims.len();
        self.claims.retain(|_, claim| !self.is_expired(claim));
        before.saturating_sub(self.claims.len())
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}
