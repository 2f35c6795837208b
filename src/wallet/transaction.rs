//! Ledger Transactions
//!
//! One entry in the wallet's append-only log. Everything but `status` is
//! fixed at creation; the status may move once from `Pending` to
//! `Completed` or `Failed`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::hash::LedgerHasher;
use crate::core::money::Coins;

// =============================================================================
// TRANSACTION ID
// =============================================================================

/// Unique transaction identifier (UUID v4).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub uuid::Uuid);

impl TransactionId {
    /// Fresh random id.
    pub fn new_v4() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// =============================================================================
// KIND / STATUS
// =============================================================================

/// What moved the balance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TransactionKind {
    /// Coins bought / deposited.
    AddMoney = 0,
    /// Coins paid out to the viewer.
    Withdraw = 1,
    /// Tournament entry fee.
    EntryFee = 2,
    /// Tournament winnings.
    Prize = 3,
}

impl TransactionKind {
    /// Credits add to the balance; debits take from it.
    #[inline]
    pub fn is_credit(self) -> bool {
        matches!(self, TransactionKind::AddMoney | TransactionKind::Prize)
    }

    /// Opposite of [`is_credit`](Self::is_credit).
    #[inline]
    pub fn is_debit(self) -> bool {
        !self.is_credit()
    }

    /// Whether `amount` has the sign this kind requires.
    pub fn accepts_signed(self, amount: Coins) -> bool {
        if self.is_credit() {
            amount.is_positive()
        } else {
            amount.is_negative()
        }
    }

    /// Human-readable history title.
    pub fn title(self) -> &'static str {
        match self {
            TransactionKind::AddMoney => "Money Added",
            TransactionKind::Withdraw => "Money Withdrawn",
            TransactionKind::EntryFee => "Tournament Entry Fee",
            TransactionKind::Prize => "Tournament Winnings",
        }
    }
}

/// Settlement state of a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TransactionStatus {
    /// Awaiting payment or payout.
    Pending = 0,
    /// Counted in the balance.
    Completed = 1,
    /// Never counted.
    Failed = 2,
}

impl TransactionStatus {
    /// `Completed` or `Failed`.
    pub fn is_final(self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

// =============================================================================
// TRANSACTION
// =============================================================================

/// A ledger entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    id: TransactionId,
    kind: TransactionKind,
    amount: Coins,
    status: TransactionStatus,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    memo: Option<String>,
}

impl Transaction {
    /// Build an entry. `amount` is already signed; callers in the ledger
    /// have checked its polarity against `kind`.
    pub(crate) fn new(
        kind: TransactionKind,
        amount: Coins,
        status: TransactionStatus,
        timestamp: DateTime<Utc>,
        memo: Option<String>,
    ) -> Self {
        Self {
            id: TransactionId::new_v4(),
            kind,
            amount,
            status,
            timestamp,
            memo,
        }
    }

    /// Identifier.
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Kind.
    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    /// Signed amount.
    pub fn amount(&self) -> Coins {
        self.amount
    }

    /// Current status.
    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    /// Creation time.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Optional reason, e.g. the tournament title for an entry fee.
    pub fn memo(&self) -> Option<&str> {
        self.memo.as_deref()
    }

    /// Counted in the balance.
    pub fn is_completed(&self) -> bool {
        self.status == TransactionStatus::Completed
    }

    /// Pending debits hold back funds from the available balance.
    pub fn is_pending_debit(&self) -> bool {
        self.status == TransactionStatus::Pending && self.kind.is_debit()
    }

    pub(crate) fn settle(&mut self, status: TransactionStatus) {
        debug_assert!(self.status == TransactionStatus::Pending);
        debug_assert!(status.is_final());
        self.status = status;
    }

    /// Feed every field into a digest, in a fixed order.
    pub(crate) fn hash_into(&self, hasher: &mut LedgerHasher) {
        hasher.update_uuid(self.id.as_bytes());
        hasher.update_u8(self.kind as u8);
        hasher.update_coins(self.amount);
        hasher.update_u8(self.status as u8);
        hasher.update_i64(self.timestamp.timestamp());
        hasher.update_u64(u64::from(self.timestamp.timestamp_subsec_nanos()));
        match &self.memo {
            Some(memo) => {
                hasher.update_u8(1);
                hasher.update_str(memo);
            }
            None => hasher.update_u8(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_polarity() {
        assert!(TransactionKind::AddMoney.is_credit());
        assert!(TransactionKind::Prize.is_credit());
        assert!(TransactionKind::Withdraw.is_debit());
        assert!(TransactionKind::EntryFee.is_debit());

        assert!(TransactionKind::Prize.accepts_signed(Coins::whole(10)));
        assert!(!TransactionKind::Prize.accepts_signed(Coins::whole(-10)));
        assert!(TransactionKind::EntryFee.accepts_signed(Coins::whole(-10)));
        assert!(!TransactionKind::EntryFee.accepts_signed(Coins::ZERO));
    }

    #[test]
    fn test_kind_wire_names() {
        let json = serde_json::to_string(&TransactionKind::EntryFee).unwrap();
        assert_eq!(json, "\"entry_fee\"");
        let kind: TransactionKind = serde_json::from_str("\"add_money\"").unwrap();
        assert_eq!(kind, TransactionKind::AddMoney);
        assert_eq!(TransactionKind::EntryFee.title(), "Tournament Entry Fee");
        assert_eq!(TransactionKind::Prize.title(), "Tournament Winnings");
    }

    #[test]
    fn test_pending_debit_detection() {
        let now = Utc::now();
        let tx = Transaction::new(
            TransactionKind::Withdraw,
            Coins::whole(-200),
            TransactionStatus::Pending,
            now,
            None,
        );
        assert!(tx.is_pending_debit());
        assert!(!tx.is_completed());

        let credit = Transaction::new(
            TransactionKind::AddMoney,
            Coins::whole(300),
            TransactionStatus::Pending,
            now,
            None,
        );
        assert!(!credit.is_pending_debit());
    }

    #[test]
    fn test_ids_are_unique() {
        let now = Utc::now();
        let a = Transaction::new(TransactionKind::Prize, Coins::whole(1), TransactionStatus::Completed, now, None);
        let b = Transaction::new(TransactionKind::Prize, Coins::whole(1), TransactionStatus::Completed, now, None);
        assert_ne!(a.id(), b.id());
    }
}
