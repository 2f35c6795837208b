//! Tournament Gate
//!
//! Decides whether a viewer may join a tournament, charges the entry fee
//! through the viewer's [`WalletLedger`], and time-gates the match room
//! credentials.
//!
//! ## Membership
//!
//! ```text
//!   NotJoined ──join() + fee debited──▶ Joined   (terminal)
//!       │
//!       └──join() rejected (already joined / insufficient funds)──▶ NotJoined
//! ```
//!
//! A join either debits the fee and records the membership, or does
//! neither. Expected refusals come back as a [`JoinOutcome`] with
//! `success == false`; nothing here panics or returns `Err` for them.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::clock::{Clock, SystemClock};
use crate::core::hash::LedgerHasher;
use crate::core::money::Coins;
use crate::tournament::record::{RoomCredentials, Tournament, TournamentId};
use crate::wallet::ledger::{LedgerError, WalletLedger};
use crate::wallet::transaction::{TransactionId, TransactionKind};

/// Default lead time before the start during which credentials show.
pub const DEFAULT_REVEAL_WINDOW_MINUTES: i64 = 10;

/// [`DEFAULT_REVEAL_WINDOW_MINUTES`] as a duration.
pub fn default_reveal_window() -> Duration {
    Duration::minutes(DEFAULT_REVEAL_WINDOW_MINUTES)
}

/// Whether room credentials should be visible at `now`.
///
/// True iff `scheduled_start - now <= reveal_window`, which includes any
/// time after the start. Monotonic in `now`.
#[inline]
pub fn check_room_reveal(scheduled_start: DateTime<Utc>, reveal_window: Duration, now: DateTime<Utc>) -> bool {
    scheduled_start - now <= reveal_window
}

/// [`check_room_reveal`] with the window given in minutes. `None` when the
/// window is outside the representable duration range.
pub fn check_room_reveal_minutes(
    scheduled_start: DateTime<Utc>,
    reveal_window_minutes: i64,
    now: DateTime<Utc>,
) -> Option<bool> {
    let window = Duration::try_minutes(reveal_window_minutes)?;
    Some(check_room_reveal(scheduled_start, window, now))
}

// =============================================================================
// RESULTS
// =============================================================================

/// "This viewer has joined tournament X."
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    /// Tournament joined.
    pub tournament_id: TournamentId,
    /// When the join succeeded.
    pub joined_at: DateTime<Utc>,
    /// Fee charged (zero for free tournaments).
    pub fee_paid: Coins,
    /// Ledger entry for the fee, if one was charged.
    pub fee_transaction: Option<TransactionId>,
}

impl Membership {
    /// Feed every field into a digest, in a fixed order.
    pub(crate) fn hash_into(&self, hasher: &mut LedgerHasher) {
        hasher.update_str(self.tournament_id.as_str());
        hasher.update_i64(self.joined_at.timestamp());
        hasher.update_u64(u64::from(self.joined_at.timestamp_subsec_nanos()));
        hasher.update_coins(self.fee_paid);
        match &self.fee_transaction {
            Some(id) => {
                hasher.update_u8(1);
                hasher.update_uuid(id.as_bytes());
            }
            None => hasher.update_u8(0),
        }
    }
}

/// Why a join was refused.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum JoinRefusal {
    /// Viewer is already a member.
    AlreadyJoined,
    /// Balance does not cover the fee.
    InsufficientFunds {
        /// Missing amount.
        shortfall: Coins,
    },
    /// Fee on the descriptor cannot be charged.
    InvalidFee {
        /// Offending fee.
        fee: Coins,
    },
}

/// Result shown to the viewer after pressing "Join Tournament".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinOutcome {
    /// Whether the viewer is now a member because of this call.
    pub success: bool,
    /// Toast text.
    pub message: String,
    /// Machine-readable refusal, absent on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refusal: Option<JoinRefusal>,
}

impl JoinOutcome {
    fn joined(message: String) -> Self {
        Self { success: true, message, refusal: None }
    }

    fn refused(refusal: JoinRefusal, message: String) -> Self {
        Self { success: false, message, refusal: Some(refusal) }
    }
}

// =============================================================================
// GATE
// =============================================================================

/// One viewer's tournament memberships and room reveals.
#[derive(Debug, Clone)]
pub struct TournamentGate {
    memberships: BTreeMap<TournamentId, Membership>,
    /// Tournaments whose reveal window has been seen open.
    revealed: BTreeSet<TournamentId>,
    credentials: RoomCredentials,
    reveal_window: Duration,
    clock: Arc<dyn Clock>,
}

impl TournamentGate {
    /// Gate with the default window on the system clock.
    pub fn new(credentials: RoomCredentials) -> Self {
        Self::with_clock(credentials, default_reveal_window(), Arc::new(SystemClock))
    }

    /// Gate with an explicit reveal window and clock.
    pub fn with_clock(credentials: RoomCredentials, reveal_window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            memberships: BTreeMap::new(),
            revealed: BTreeSet::new(),
            credentials,
            reveal_window,
            clock,
        }
    }

    /// Configured reveal window.
    pub fn reveal_window(&self) -> Duration {
        self.reveal_window
    }

    /// Join `tournament`, charging its entry fee to `ledger`.
    pub fn join(&mut self, ledger: &mut WalletLedger, tournament: &Tournament) -> JoinOutcome {
        if self.memberships.contains_key(&tournament.id) {
            debug!(tournament = %tournament.id, "duplicate join attempt");
            return JoinOutcome::refused(
                JoinRefusal::AlreadyJoined,
                format!("You have already joined {}.", tournament.title),
            );
        }

        let fee = tournament.entry_fee;
        let fee_transaction = if fee.is_zero() {
            None
        } else {
            match ledger.debit_with_memo(fee, TransactionKind::EntryFee, tournament.title.clone()) {
                Ok(tx) => Some(tx.id()),
                Err(LedgerError::InsufficientFunds { shortfall, .. }) => {
                    info!(tournament = %tournament.id, %fee, %shortfall, "join refused: insufficient funds");
                    return JoinOutcome::refused(
                        JoinRefusal::InsufficientFunds { shortfall },
                        format!(
                            "Insufficient balance to join {}. You need {} more SR coins.",
                            tournament.title, shortfall
                        ),
                    );
                }
                Err(err) => {
                    info!(tournament = %tournament.id, %fee, error = %err, "join refused: fee not chargeable");
                    return JoinOutcome::refused(
                        JoinRefusal::InvalidFee { fee },
                        format!("{} has an invalid entry fee.", tournament.title),
                    );
                }
            }
        };

        // Fee is settled; record the membership before anything else can fail.
        let membership = Membership {
            tournament_id: tournament.id.clone(),
            joined_at: self.clock.now(),
            fee_paid: fee,
            fee_transaction,
        };
        self.memberships.insert(tournament.id.clone(), membership);
        info!(tournament = %tournament.id, %fee, "tournament joined");

        let message = if fee.is_zero() {
            format!("You have joined {}.", tournament.title)
        } else {
            format!("You have joined {}. {} SR coins were deducted.", tournament.title, fee)
        };
        JoinOutcome::joined(message)
    }

    /// Whether the viewer has joined.
    pub fn is_joined(&self, id: &TournamentId) -> bool {
        self.memberships.contains_key(id)
    }

    /// Membership record, if joined.
    pub fn membership(&self, id: &TournamentId) -> Option<&Membership> {
        self.memberships.get(id)
    }

    /// All memberships, ordered by tournament id.
    pub fn memberships(&self) -> impl Iterator<Item = &Membership> {
        self.memberships.values()
    }

    /// Reinstate memberships from a verified session snapshot. Fails on the
    /// first tournament that is already a member, leaving the gate as it was.
    pub(crate) fn restore_memberships(&mut self, memberships: Vec<Membership>) -> Result<(), TournamentId> {
        let mut restored = self.memberships.clone();
        for membership in memberships {
            if restored.contains_key(&membership.tournament_id) {
                return Err(membership.tournament_id);
            }
            restored.insert(membership.tournament_id.clone(), membership);
        }
        debug!(count = restored.len(), "memberships restored");
        self.memberships = restored;
        Ok(())
    }

    /// Evaluate the reveal for `tournament` at `now`, latching it open.
    ///
    /// Once a tournament has been seen inside its window it stays revealed,
    /// so a later call with an earlier clock reading still returns `true`.
    pub fn is_revealed_at(&mut self, tournament: &Tournament, now: DateTime<Utc>) -> bool {
        if self.revealed.contains(&tournament.id) {
            return true;
        }
        let open = check_room_reveal(tournament.scheduled_start, self.reveal_window, now);
        if open {
            debug!(tournament = %tournament.id, "room reveal window open");
            self.revealed.insert(tournament.id.clone());
        }
        open
    }

    /// [`is_revealed_at`](Self::is_revealed_at) on the gate's clock.
    pub fn is_revealed(&mut self, tournament: &Tournament) -> bool {
        let now = self.clock.now();
        self.is_revealed_at(tournament, now)
    }

    /// Room credentials, only for members once the window is open.
    pub fn room_credentials_at(&mut self, tournament: &Tournament, now: DateTime<Utc>) -> Option<&RoomCredentials> {
        if !self.is_joined(&tournament.id) {
            return None;
        }
        if self.is_revealed_at(tournament, now) {
            Some(&self.credentials)
        } else {
            None
        }
    }

    /// [`room_credentials_at`](Self::room_credentials_at) on the gate's clock.
    pub fn room_credentials(&mut self, tournament: &Tournament) -> Option<&RoomCredentials> {
        let now = self.clock.now();
        self.room_credentials_at(tournament, now)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, 15, 17, 0, 0).unwrap()
    }

    fn setup(balance: i64) -> (Arc<ManualClock>, WalletLedger, TournamentGate) {
        let clock = Arc::new(ManualClock::new(t0()));
        let ledger = WalletLedger::with_opening_balance(Coins::whole(balance), clock.clone()).unwrap();
        let gate = TournamentGate::with_clock(
            RoomCredentials::new("12345678", "pugb123"),
            default_reveal_window(),
            clock.clone(),
        );
        (clock, ledger, gate)
    }

    fn paid(id: &str, fee: i64) -> Tournament {
        Tournament::new(id, format!("Cup {id}"), Coins::whole(fee), t0() + Duration::hours(1))
    }

    #[test]
    fn test_join_then_duplicate() {
        let (_, mut ledger, mut gate) = setup(100);
        let t1 = paid("t1", 50);

        let first = gate.join(&mut ledger, &t1);
        assert!(first.success);
        assert!(first.refusal.is_none());
        assert_eq!(ledger.balance(), Coins::whole(50));
        assert!(gate.is_joined(&t1.id));

        let len_after_first = ledger.len();
        let second = gate.join(&mut ledger, &t1);
        assert!(!second.success);
        assert_eq!(second.refusal, Some(JoinRefusal::AlreadyJoined));
        assert!(second.message.contains("already joined"));
        assert_eq!(ledger.balance(), Coins::whole(50));
        assert_eq!(ledger.len(), len_after_first);
        assert_eq!(gate.memberships().count(), 1);
    }

    #[test]
    fn test_join_insufficient_funds_leaves_no_trace() {
        let (_, mut ledger, mut gate) = setup(30);
        let t = paid("big", 100);
        let len_before = ledger.len();

        let outcome = gate.join(&mut ledger, &t);

        assert!(!outcome.success);
        assert_eq!(
            outcome.refusal,
            Some(JoinRefusal::InsufficientFunds { shortfall: Coins::whole(70) })
        );
        assert!(outcome.message.contains("70.00"));
        assert!(!gate.is_joined(&t.id));
        assert_eq!(ledger.balance(), Coins::whole(30));
        assert_eq!(ledger.len(), len_before);
    }

    #[test]
    fn test_fee_entry_recorded_on_membership() {
        let (clock, mut ledger, mut gate) = setup(100);
        clock.advance(Duration::minutes(2));
        let t = paid("t1", 40);

        gate.join(&mut ledger, &t);

        let m = gate.membership(&t.id).unwrap();
        assert_eq!(m.joined_at, t0() + Duration::minutes(2));
        assert_eq!(m.fee_paid, Coins::whole(40));
        let tx = ledger.get(&m.fee_transaction.unwrap()).unwrap();
        assert_eq!(tx.kind(), TransactionKind::EntryFee);
        assert_eq!(tx.amount(), Coins::whole(-40));
        assert_eq!(tx.memo(), Some("Cup t1"));
    }

    #[test]
    fn test_free_tournament_skips_ledger() {
        let (_, mut ledger, mut gate) = setup(0);
        let t = paid("free", 0);

        let outcome = gate.join(&mut ledger, &t);

        assert!(outcome.success);
        assert!(ledger.is_empty());
        assert_eq!(gate.membership(&t.id).unwrap().fee_transaction, None);
    }

    #[test]
    fn test_negative_fee_refused() {
        let (_, mut ledger, mut gate) = setup(100);
        let t = paid("odd", -5);

        let outcome = gate.join(&mut ledger, &t);

        assert!(!outcome.success);
        assert_eq!(outcome.refusal, Some(JoinRefusal::InvalidFee { fee: Coins::whole(-5) }));
        assert_eq!(ledger.balance(), Coins::whole(100));
        assert!(!gate.is_joined(&t.id));
    }

    #[test]
    fn test_check_room_reveal_scenarios() {
        let now = t0();
        assert_eq!(check_room_reveal_minutes(now + Duration::minutes(15), 10, now), Some(false));
        assert_eq!(check_room_reveal_minutes(now + Duration::minutes(5), 10, now), Some(true));
        assert_eq!(check_room_reveal_minutes(now - Duration::minutes(1), 10, now), Some(true));
        // Boundary is inclusive.
        assert!(check_room_reveal(now + Duration::minutes(10), default_reveal_window(), now));
    }

    #[test]
    fn test_out_of_range_window_minutes() {
        let now = t0();
        assert_eq!(check_room_reveal_minutes(now, 9_000_000_000_000_000, now), None);
        assert_eq!(check_room_reveal_minutes(now, i64::MIN, now), None);
    }

    #[test]
    fn test_restored_membership_blocks_rejoin() {
        let (_, mut ledger, mut gate) = setup(100);
        let t = paid("t1", 25);
        assert!(gate.join(&mut ledger, &t).success);
        let saved: Vec<Membership> = gate.memberships().cloned().collect();

        let (_, mut fresh_ledger, mut fresh_gate) = setup(100);
        fresh_gate.restore_memberships(saved.clone()).unwrap();

        let again = fresh_gate.join(&mut fresh_ledger, &t);
        assert_eq!(again.refusal, Some(JoinRefusal::AlreadyJoined));
        assert_eq!(fresh_ledger.balance(), Coins::whole(100));

        assert_eq!(fresh_gate.restore_memberships(saved), Err(t.id.clone()));
        assert_eq!(fresh_gate.memberships().count(), 1);
    }

    #[test]
    fn test_credentials_need_membership_and_window() {
        let (clock, mut ledger, mut gate) = setup(100);
        let t = paid("t1", 10); // starts at t0 + 60 min

        clock.set(t.scheduled_start - Duration::minutes(5));
        assert!(gate.room_credentials(&t).is_none(), "not joined yet");

        clock.set(t0());
        gate.join(&mut ledger, &t);
        assert!(gate.room_credentials(&t).is_none(), "window not open");

        clock.set(t.scheduled_start - Duration::minutes(10));
        let creds = gate.room_credentials(&t).unwrap();
        assert_eq!(creds.room_id, "12345678");
        assert_eq!(creds.password, "pugb123");
    }

    #[test]
    fn test_reveal_latches_open() {
        let (_, _, mut gate) = setup(0);
        let t = paid("t1", 0);

        assert!(gate.is_revealed_at(&t, t.scheduled_start - Duration::minutes(1)));
        // A stale, earlier reading does not close it again.
        assert!(gate.is_revealed_at(&t, t.scheduled_start - Duration::hours(3)));
    }

    #[test]
    fn test_outcome_json_shape() {
        let outcome = JoinOutcome::refused(
            JoinRefusal::InsufficientFunds { shortfall: Coins::whole(50) },
            "nope".into(),
        );
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["refusal"]["reason"], "insufficient_funds");

        let ok = serde_json::to_value(JoinOutcome::joined("yes".into())).unwrap();
        assert!(ok.get("refusal").is_none());
    }

    proptest! {
        #[test]
        fn prop_reveal_monotonic(start_offset in -180i64..180, steps in proptest::collection::vec(0i64..600, 1..40)) {
            let start = t0() + Duration::minutes(start_offset);
            let mut now = t0();
            let mut seen_true = false;
            for step in steps {
                now += Duration::seconds(step);
                let open = check_room_reveal(start, default_reveal_window(), now);
                prop_assert!(!(seen_true && !open));
                seen_true |= open;
            }
        }

        #[test]
        fn prop_join_atomic(balance in 0i64..500, fee in 1i64..500) {
            let (_, mut ledger, mut gate) = setup(balance);
            let t = paid("p", fee);
            let len_before = ledger.len();

            let outcome = gate.join(&mut ledger, &t);

            if outcome.success {
                prop_assert!(gate.is_joined(&t.id));
                prop_assert_eq!(ledger.balance(), Coins::whole(balance - fee));
                prop_assert_eq!(ledger.len(), len_before + 1);
            } else {
                prop_assert!(!gate.is_joined(&t.id));
                prop_assert_eq!(ledger.balance(), Coins::whole(balance));
                prop_assert_eq!(ledger.len(), len_before);
            }
        }
    }
}
