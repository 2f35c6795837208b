//! Ledger Snapshots
//!
//! Digest-sealed export of a wallet ledger for whatever storage layer sits
//! outside the core. Restoring replays the log and re-checks every ledger
//! invariant before handing back a usable [`WalletLedger`].

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::core::clock::Clock;
use crate::core::hash::LedgerDigest;
use crate::core::money::Coins;
use crate::wallet::ledger::{digest_transactions, WalletLedger};
use crate::wallet::transaction::{Transaction, TransactionId, TransactionStatus};

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u8 = 1;

/// Serialized form of a ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Format version.
    pub version: u8,
    /// Entries in append order.
    pub transactions: Vec<Transaction>,
    /// Digest of `transactions` at export time.
    pub digest: LedgerDigest,
}

/// Snapshot restore/encoding errors.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Version this build cannot read.
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u8),

    /// Entries do not hash to the sealed digest.
    #[error("snapshot digest mismatch")]
    DigestMismatch,

    /// Same id appears twice.
    #[error("duplicate transaction {0}")]
    DuplicateTransaction(TransactionId),

    /// Amount sign disagrees with the kind.
    #[error("transaction {0} has the wrong sign for its kind")]
    PolarityMismatch(TransactionId),

    /// Replaying the log drives the available balance below zero.
    #[error("available balance negative after transaction {0}")]
    NegativeBalance(TransactionId),

    /// Amount arithmetic overflow during replay.
    #[error("amount overflow during replay")]
    Overflow,

    /// JSON encoding failure.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary encoding failure.
    #[error("binary: {0}")]
    Binary(#[from] bincode::Error),
}

impl LedgerSnapshot {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON.
    pub fn from_json(text: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serialize to compact binary.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize from compact binary.
    pub fn from_bytes(data: &[u8]) -> Result<Self, SnapshotError> {
        Ok(bincode::deserialize(data)?)
    }
}

impl WalletLedger {
    /// Export the ledger.
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            version: SNAPSHOT_VERSION,
            transactions: self.transactions().to_vec(),
            digest: self.digest(),
        }
    }

    /// Rebuild a ledger from a snapshot, using `clock` for new entries.
    ///
    /// Rejects the snapshot unless ids are unique, every amount has its
    /// kind's sign, the available balance never dips below zero while
    /// replaying, and the entries hash to the sealed digest.
    pub fn restore(snapshot: LedgerSnapshot, clock: Arc<dyn Clock>) -> Result<Self, SnapshotError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(snapshot.version));
        }
        if digest_transactions(&snapshot.transactions) != snapshot.digest {
            warn!("ledger snapshot failed digest check");
            return Err(SnapshotError::DigestMismatch);
        }

        let mut ids = BTreeSet::new();
        let mut balance = Coins::ZERO;
        let mut reserved = Coins::ZERO;

        for tx in &snapshot.transactions {
            if !ids.insert(tx.id()) {
                return Err(SnapshotError::DuplicateTransaction(tx.id()));
            }
            if !tx.kind().accepts_signed(tx.amount()) {
                return Err(SnapshotError::PolarityMismatch(tx.id()));
            }
            match tx.status() {
                TransactionStatus::Completed => {
                    balance = balance.checked_add(tx.amount()).ok_or(SnapshotError::Overflow)?;
                }
                TransactionStatus::Pending if tx.kind().is_debit() => {
                    reserved = reserved.checked_add(tx.amount().abs()).ok_or(SnapshotError::Overflow)?;
                }
                _ => {}
            }
            if (balance - reserved).is_negative() {
                return Err(SnapshotError::NegativeBalance(tx.id()));
            }
        }

        Ok(WalletLedger::from_verified_parts(snapshot.transactions, balance, reserved, clock))
    }

    /// Restore with this ledger's clock; convenient for reload-in-place.
    pub fn reload(&self, snapshot: LedgerSnapshot) -> Result<Self, SnapshotError> {
        Self::restore(snapshot, Arc::clone(self.clock()))
    }
}
