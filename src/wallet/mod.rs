//! Wallet Module
//!
//! SR coin ledger: transactions, balances, and snapshots.
//!
//! - `transaction`: ledger entries, kinds and statuses
//! - `ledger`: the append-only ledger and its debit/credit rules
//! - `snapshot`: digest-sealed export and verified restore

pub mod transaction;
pub mod ledger;
pub mod snapshot;

pub use transaction::{Transaction, TransactionId, TransactionKind, TransactionStatus};
pub use ledger::{LedgerError, WalletLedger};
pub use snapshot::{LedgerSnapshot, SnapshotError, SNAPSHOT_VERSION};
