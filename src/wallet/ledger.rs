//! Wallet Ledger
//!
//! The viewer's SR coin balance and its append-only transaction log.
//!
//! ## Balances
//!
//! ```text
//! balance   = Σ amount  where status == Completed
//! reserved  = Σ |amount| where status == Pending and kind is a debit
//! available = balance - reserved
//! ```
//!
//! Debits are admitted against `available`, so settling a pending
//! withdrawal can never push `balance` below zero. A rejected debit
//! appends nothing and leaves every figure unchanged.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::core::clock::{Clock, SystemClock};
use crate::core::hash::{compute_ledger_digest, LedgerDigest};
use crate::core::money::Coins;
use crate::wallet::transaction::{Transaction, TransactionId, TransactionKind, TransactionStatus};

/// Ledger errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Amount was zero or negative.
    #[error("amount must be positive, got {0}")]
    InvalidAmount(Coins),

    /// Debit exceeds the available balance.
    #[error("insufficient funds: short by {shortfall}")]
    InsufficientFunds {
        /// How much more the viewer would need.
        shortfall: Coins,
        /// Available balance at the time of the request.
        available: Coins,
    },

    /// Credit requested with a debit kind or the other way round.
    #[error("{kind:?} cannot be used for a {expected}")]
    KindMismatch {
        /// Kind that was passed.
        kind: TransactionKind,
        /// `"credit"` or `"debit"`.
        expected: &'static str,
    },

    /// No transaction with this id.
    #[error("unknown transaction {0}")]
    UnknownTransaction(TransactionId),

    /// Transaction already completed or failed.
    #[error("transaction {id} already settled as {status:?}")]
    AlreadySettled {
        /// Transaction id.
        id: TransactionId,
        /// Its final status.
        status: TransactionStatus,
    },

    /// Amount arithmetic left the representable range.
    #[error("amount overflow")]
    Overflow,
}

/// Append-only SR coin ledger for one viewer.
#[derive(Debug, Clone)]
pub struct WalletLedger {
    /// Entries in append order.
    transactions: Vec<Transaction>,
    /// Position of each entry in `transactions`.
    index: BTreeMap<TransactionId, usize>,
    /// Sum of completed amounts.
    balance: Coins,
    /// Funds held by pending debits (non-negative).
    reserved: Coins,
    clock: Arc<dyn Clock>,
}

impl WalletLedger {
    /// Empty ledger on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Empty ledger reading timestamps from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            transactions: Vec::new(),
            index: BTreeMap::new(),
            balance: Coins::ZERO,
            reserved: Coins::ZERO,
            clock,
        }
    }

    /// Ledger seeded with one completed `AddMoney` entry. Zero gives an
    /// empty ledger.
    pub fn with_opening_balance(amount: Coins, clock: Arc<dyn Clock>) -> Result<Self, LedgerError> {
        let mut ledger = Self::with_clock(clock);
        if !amount.is_zero() {
            ledger.credit(amount, TransactionKind::AddMoney)?;
        }
        Ok(ledger)
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    /// Add coins. Appends a completed entry with `+amount`.
    pub fn credit(&mut self, amount: Coins, kind: TransactionKind) -> Result<Transaction, LedgerError> {
        self.post_credit(amount, kind, TransactionStatus::Completed, None)
    }

    /// [`credit`](Self::credit) with a memo.
    pub fn credit_with_memo(
        &mut self,
        amount: Coins,
        kind: TransactionKind,
        memo: impl Into<String>,
    ) -> Result<Transaction, LedgerError> {
        self.post_credit(amount, kind, TransactionStatus::Completed, Some(memo.into()))
    }

    /// Take coins. Appends a completed entry with `-amount`, or fails with
    /// `InsufficientFunds` and appends nothing.
    pub fn debit(&mut self, amount: Coins, kind: TransactionKind) -> Result<Transaction, LedgerError> {
        self.post_debit(amount, kind, TransactionStatus::Completed, None)
    }

    /// [`debit`](Self::debit) with a memo.
    pub fn debit_with_memo(
        &mut self,
        amount: Coins,
        kind: TransactionKind,
        memo: impl Into<String>,
    ) -> Result<Transaction, LedgerError> {
        self.post_debit(amount, kind, TransactionStatus::Completed, Some(memo.into()))
    }

    /// Record a credit that is not yet paid (e.g. a deposit awaiting the
    /// payment provider). It does not count until [`complete`](Self::complete).
    pub fn begin_credit(&mut self, amount: Coins, kind: TransactionKind) -> Result<Transaction, LedgerError> {
        self.post_credit(amount, kind, TransactionStatus::Pending, None)
    }

    /// Record a debit awaiting payout. The amount is reserved immediately.
    pub fn begin_debit(&mut self, amount: Coins, kind: TransactionKind) -> Result<Transaction, LedgerError> {
        self.post_debit(amount, kind, TransactionStatus::Pending, None)
    }

    /// Settle a pending entry as completed.
    pub fn complete(&mut self, id: TransactionId) -> Result<&Transaction, LedgerError> {
        self.settle(id, TransactionStatus::Completed)
    }

    /// Settle a pending entry as failed. A failed debit releases its
    /// reservation.
    pub fn fail(&mut self, id: TransactionId) -> Result<&Transaction, LedgerError> {
        self.settle(id, TransactionStatus::Failed)
    }

    fn post_credit(
        &mut self,
        amount: Coins,
        kind: TransactionKind,
        status: TransactionStatus,
        memo: Option<String>,
    ) -> Result<Transaction, LedgerError> {
        if !kind.is_credit() {
            return Err(LedgerError::KindMismatch { kind, expected: "credit" });
        }
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let new_balance = if status == TransactionStatus::Completed {
            self.balance.checked_add(amount).ok_or(LedgerError::Overflow)?
        } else {
            self.balance
        };

        let tx = self.append(kind, amount, status, memo);
        self.balance = new_balance;
        Ok(tx)
    }

    fn post_debit(
        &mut self,
        amount: Coins,
        kind: TransactionKind,
        status: TransactionStatus,
        memo: Option<String>,
    ) -> Result<Transaction, LedgerError> {
        if !kind.is_debit() {
            return Err(LedgerError::KindMismatch { kind, expected: "debit" });
        }
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let available = self.available();
        if available < amount {
            let shortfall = amount - available;
            debug!(%amount, %available, %shortfall, ?kind, "debit rejected");
            return Err(LedgerError::InsufficientFunds { shortfall, available });
        }

        let (new_balance, new_reserved) = match status {
            TransactionStatus::Pending => (
                self.balance,
                self.reserved.checked_add(amount).ok_or(LedgerError::Overflow)?,
            ),
            _ => (
                self.balance.checked_sub(amount).ok_or(LedgerError::Overflow)?,
                self.reserved,
            ),
        };

        let tx = self.append(kind, -amount, status, memo);
        self.balance = new_balance;
        self.reserved = new_reserved;
        Ok(tx)
    }

    fn append(
        &mut self,
        kind: TransactionKind,
        signed: Coins,
        status: TransactionStatus,
        memo: Option<String>,
    ) -> Transaction {
        let tx = Transaction::new(kind, signed, status, self.clock.now(), memo);
        debug!(id = %tx.id(), ?kind, amount = %signed, ?status, "transaction appended");
        self.index.insert(tx.id(), self.transactions.len());
        self.transactions.push(tx.clone());
        tx
    }

    fn settle(&mut self, id: TransactionId, to: TransactionStatus) -> Result<&Transaction, LedgerError> {
        let pos = *self.index.get(&id).ok_or(LedgerError::UnknownTransaction(id))?;
        let tx = &self.transactions[pos];
        if tx.status().is_final() {
            return Err(LedgerError::AlreadySettled { id, status: tx.status() });
        }

        let amount = tx.amount();
        let is_debit = tx.kind().is_debit();

        let mut balance = self.balance;
        let mut reserved = self.reserved;
        if is_debit {
            reserved = reserved.checked_sub(amount.abs()).ok_or(LedgerError::Overflow)?;
        }
        if to == TransactionStatus::Completed {
            balance = balance.checked_add(amount).ok_or(LedgerError::Overflow)?;
        }

        self.balance = balance;
        self.reserved = reserved;
        let tx = &mut self.transactions[pos];
        tx.settle(to);
        debug!(%id, status = ?to, "transaction settled");
        Ok(tx)
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Sum of completed amounts.
    pub fn balance(&self) -> Coins {
        self.balance
    }

    /// Funds held back by pending debits.
    pub fn reserved(&self) -> Coins {
        self.reserved
    }

    /// What a new debit may spend.
    pub fn available(&self) -> Coins {
        self.balance - self.reserved
    }

    /// Entries in append order.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Entries newest first, as wallet history is shown.
    pub fn history(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter().rev()
    }

    /// Look up an entry.
    pub fn get(&self, id: &TransactionId) -> Option<&Transaction> {
        self.index.get(id).map(|&pos| &self.transactions[pos])
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// No entries yet.
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Digest over every entry in append order.
    pub fn digest(&self) -> LedgerDigest {
        digest_transactions(&self.transactions)
    }

    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Rebuild from entries already checked by snapshot restore.
    pub(crate) fn from_verified_parts(
        transactions: Vec<Transaction>,
        balance: Coins,
        reserved: Coins,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let index = transactions
            .iter()
            .enumerate()
            .map(|(pos, tx)| (tx.id(), pos))
            .collect();
        Self { transactions, index, balance, reserved, clock }
    }
}

impl Default for WalletLedger {
    fn default() -> Self {
        Self::new()
    }
}

/// Digest a slice of entries.
pub(crate) fn digest_transactions(transactions: &[Transaction]) -> LedgerDigest {
    compute_ledger_digest(transactions.len() as u64, |hasher| {
        for tx in transactions {
            tx.hash_into(hasher);
        }
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn test_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 10, 20, 12, 0, 0).unwrap()))
    }

    fn ledger_with(balance: i64) -> WalletLedger {
        WalletLedger::with_opening_balance(Coins::whole(balance), test_clock()).unwrap()
    }

    #[test]
    fn test_debit_entire_balance() {
        let mut ledger = ledger_with(1000);
        let before = ledger.len();

        let tx = ledger.debit(Coins::whole(1000), TransactionKind::EntryFee).unwrap();

        assert_eq!(ledger.balance(), Coins::ZERO);
        assert_eq!(ledger.len(), before + 1);
        assert_eq!(tx.amount(), Coins::whole(-1000));
        assert_eq!(tx.kind(), TransactionKind::EntryFee);
        assert_eq!(tx.status(), TransactionStatus::Completed);
    }

    #[test]
    fn test_debit_insufficient_funds() {
        let mut ledger = ledger_with(50);
        let before = ledger.len();

        let result = ledger.debit(Coins::whole(100), TransactionKind::EntryFee);

        assert_eq!(
            result,
            Err(LedgerError::InsufficientFunds {
                shortfall: Coins::whole(50),
                available: Coins::whole(50),
            })
        );
        assert_eq!(ledger.balance(), Coins::whole(50));
        assert_eq!(ledger.len(), before);
    }

    #[test]
    fn test_credit_on_empty_ledger() {
        let mut ledger = WalletLedger::with_clock(test_clock());

        let tx = ledger.credit(Coins::whole(500), TransactionKind::AddMoney).unwrap();

        assert_eq!(ledger.balance(), Coins::whole(500));
        assert_eq!(ledger.len(), 1);
        assert_eq!(tx.amount(), Coins::whole(500));
        assert_eq!(tx.status(), TransactionStatus::Completed);
    }

    #[test]
    fn test_non_positive_amounts_rejected() {
        let mut ledger = ledger_with(100);
        let before = ledger.len();

        assert_eq!(
            ledger.credit(Coins::ZERO, TransactionKind::AddMoney),
            Err(LedgerError::InvalidAmount(Coins::ZERO))
        );
        assert_eq!(
            ledger.debit(Coins::whole(-5), TransactionKind::Withdraw),
            Err(LedgerError::InvalidAmount(Coins::whole(-5)))
        );
        assert_eq!(ledger.len(), before);
        assert_eq!(ledger.balance(), Coins::whole(100));
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        let mut ledger = ledger_with(100);

        assert!(matches!(
            ledger.credit(Coins::whole(5), TransactionKind::EntryFee),
            Err(LedgerError::KindMismatch { expected: "credit", .. })
        ));
        assert!(matches!(
            ledger.debit(Coins::whole(5), TransactionKind::Prize),
            Err(LedgerError::KindMismatch { expected: "debit", .. })
        ));
    }

    #[test]
    fn test_exact_decimal_balance() {
        let mut ledger = WalletLedger::with_clock(test_clock());
        ledger.credit(Coins::new(dec!(0.10)), TransactionKind::AddMoney).unwrap();
        ledger.credit(Coins::new(dec!(0.20)), TransactionKind::Prize).unwrap();
        ledger.debit(Coins::new(dec!(0.30)), TransactionKind::Withdraw).unwrap();
        assert!(ledger.balance().is_zero());
    }

    #[test]
    fn test_timestamps_come_from_clock() {
        let clock = test_clock();
        let mut ledger = WalletLedger::with_clock(clock.clone());
        let first = ledger.credit(Coins::whole(1), TransactionKind::AddMoney).unwrap();
        clock.advance(Duration::minutes(3));
        let second = ledger.credit(Coins::whole(1), TransactionKind::AddMoney).unwrap();
        assert_eq!(second.timestamp() - first.timestamp(), Duration::minutes(3));
    }

    #[test]
    fn test_memo_recorded() {
        let mut ledger = ledger_with(100);
        let tx = ledger
            .debit_with_memo(Coins::whole(10), TransactionKind::EntryFee, "BGMI Ultimate Showdown")
            .unwrap();
        assert_eq!(ledger.get(&tx.id()).unwrap().memo(), Some("BGMI Ultimate Showdown"));
    }

    #[test]
    fn test_pending_withdrawal_reserves_funds() {
        let mut ledger = ledger_with(300);

        let pending = ledger.begin_debit(Coins::whole(200), TransactionKind::Withdraw).unwrap();
        assert_eq!(pending.status(), TransactionStatus::Pending);
        assert_eq!(ledger.balance(), Coins::whole(300));
        assert_eq!(ledger.available(), Coins::whole(100));

        // Reserved funds cannot be spent twice.
        let err = ledger.debit(Coins::whole(150), TransactionKind::EntryFee).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientFunds {
                shortfall: Coins::whole(50),
                available: Coins::whole(100),
            }
        );

        ledger.complete(pending.id()).unwrap();
        assert_eq!(ledger.balance(), Coins::whole(100));
        assert_eq!(ledger.reserved(), Coins::ZERO);
        assert_eq!(ledger.available(), Coins::whole(100));
    }

    #[test]
    fn test_failed_withdrawal_releases_reservation() {
        let mut ledger = ledger_with(300);
        let pending = ledger.begin_debit(Coins::whole(200), TransactionKind::Withdraw).unwrap();

        let settled = ledger.fail(pending.id()).unwrap();
        assert_eq!(settled.status(), TransactionStatus::Failed);
        assert_eq!(ledger.balance(), Coins::whole(300));
        assert_eq!(ledger.available(), Coins::whole(300));
    }

    #[test]
    fn test_pending_deposit_counts_only_when_completed() {
        let mut ledger = WalletLedger::with_clock(test_clock());
        let pending = ledger.begin_credit(Coins::whole(1000), TransactionKind::AddMoney).unwrap();
        assert_eq!(ledger.balance(), Coins::ZERO);
        assert!(ledger.debit(Coins::whole(1), TransactionKind::EntryFee).is_err());

        ledger.complete(pending.id()).unwrap();
        assert_eq!(ledger.balance(), Coins::whole(1000));
    }

    #[test]
    fn test_settle_only_once() {
        let mut ledger = ledger_with(300);
        let pending = ledger.begin_debit(Coins::whole(100), TransactionKind::Withdraw).unwrap();
        ledger.complete(pending.id()).unwrap();

        assert_eq!(
            ledger.fail(pending.id()).unwrap_err(),
            LedgerError::AlreadySettled {
                id: pending.id(),
                status: TransactionStatus::Completed,
            }
        );
        assert_eq!(ledger.balance(), Coins::whole(200));
    }

    #[test]
    fn test_settle_unknown_id() {
        let mut ledger = ledger_with(10);
        let id = TransactionId::new_v4();
        assert_eq!(ledger.complete(id).unwrap_err(), LedgerError::UnknownTransaction(id));
    }

    #[test]
    fn test_history_newest_first() {
        let mut ledger = WalletLedger::with_clock(test_clock());
        let a = ledger.credit(Coins::whole(1), TransactionKind::AddMoney).unwrap();
        let b = ledger.credit(Coins::whole(2), TransactionKind::Prize).unwrap();
        let ids: Vec<_> = ledger.history().map(|t| t.id()).collect();
        assert_eq!(ids, vec![b.id(), a.id()]);
    }

    #[test]
    fn test_digest_changes_on_append_and_settle() {
        let mut ledger = ledger_with(100);
        let d0 = ledger.digest();
        let pending = ledger.begin_debit(Coins::whole(10), TransactionKind::Withdraw).unwrap();
        let d1 = ledger.digest();
        ledger.complete(pending.id()).unwrap();
        let d2 = ledger.digest();
        assert_ne!(d0, d1);
        assert_ne!(d1, d2);
        assert_eq!(d2, ledger.digest());
    }

    // -------------------------------------------------------------------------
    // Property tests
    // -------------------------------------------------------------------------

    #[derive(Debug, Clone)]
    enum Op {
        Credit(i64),
        Debit(i64),
        BeginDebit(i64),
        SettleOldest(bool),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (-50i64..500).prop_map(Op::Credit),
            (-50i64..500).prop_map(Op::Debit),
            (1i64..300).prop_map(Op::BeginDebit),
            any::<bool>().prop_map(Op::SettleOldest),
        ]
    }

    proptest! {
        #[test]
        fn prop_balance_never_negative_and_log_append_only(ops in proptest::collection::vec(op_strategy(), 0..60)) {
            let mut ledger = WalletLedger::with_clock(test_clock());
            let mut seen: Vec<Transaction> = Vec::new();

            for op in ops {
                let balance_before = ledger.balance();
                let len_before = ledger.len();

                let result = match op {
                    Op::Credit(n) => ledger.credit(Coins::whole(n), TransactionKind::AddMoney).map(|_| ()),
                    Op::Debit(n) => ledger.debit(Coins::whole(n), TransactionKind::EntryFee).map(|_| ()),
                    Op::BeginDebit(n) => ledger.begin_debit(Coins::whole(n), TransactionKind::Withdraw).map(|_| ()),
                    Op::SettleOldest(ok) => {
                        let pending = ledger
                            .transactions()
                            .iter()
                            .find(|t| t.status() == TransactionStatus::Pending)
                            .map(|t| t.id());
                        match pending {
                            Some(id) if ok => ledger.complete(id).map(|_| ()),
                            Some(id) => ledger.fail(id).map(|_| ()),
                            None => Ok(()),
                        }
                    }
                };

                prop_assert!(!ledger.balance().is_negative());
                prop_assert!(!ledger.available().is_negative());
                prop_assert!(ledger.len() >= len_before);
                if result.is_err() {
                    prop_assert_eq!(ledger.balance(), balance_before);
                    prop_assert_eq!(ledger.len(), len_before);
                }

                // Earlier entries keep id, kind and amount.
                for (old, now) in seen.iter().zip(ledger.transactions()) {
                    prop_assert_eq!(old.id(), now.id());
                    prop_assert_eq!(old.kind(), now.kind());
                    prop_assert_eq!(old.amount(), now.amount());
                }
                seen = ledger.transactions().to_vec();

                let completed: Coins = ledger
                    .transactions()
                    .iter()
                    .filter(|t| t.is_completed())
                    .map(|t| t.amount())
                    .sum();
                prop_assert_eq!(completed, ledger.balance());
            }
        }
    }
}
