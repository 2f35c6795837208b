//! Session Snapshots
//!
//! A viewer's wallet together with their tournament memberships, sealed
//! under one digest. Memberships travel with the ledger so a restored
//! viewer cannot pay for the same tournament twice.
//!
//! Restore checks, in order: version, seal, the ledger's own invariants,
//! then every membership against the restored ledger:
//!
//! - a charged membership points at a completed `EntryFee` entry whose
//!   amount is exactly `-fee_paid`, and no entry backs two memberships
//! - a free membership has `fee_paid == 0`
//! - each tournament appears once

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::ArenaConfig;
use crate::core::clock::Clock;
use crate::core::hash::{LedgerDigest, LedgerHasher};
use crate::session::viewer::{ViewerId, ViewerSession};
use crate::tournament::gate::{Membership, TournamentGate};
use crate::tournament::record::TournamentId;
use crate::wallet::ledger::WalletLedger;
use crate::wallet::snapshot::{LedgerSnapshot, SnapshotError};
use crate::wallet::transaction::{TransactionKind, TransactionStatus};

/// Current session snapshot format version.
pub const SESSION_SNAPSHOT_VERSION: u8 = 1;

/// Wallet plus memberships of one viewer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Format version.
    pub version: u8,
    /// Sealed wallet.
    pub ledger: LedgerSnapshot,
    /// Memberships, ordered by tournament id.
    pub memberships: Vec<Membership>,
    /// Digest over the ledger digest and every membership.
    pub digest: LedgerDigest,
}

/// Session snapshot restore/encoding errors.
#[derive(Debug, Error)]
pub enum SessionSnapshotError {
    /// Version this build cannot read.
    #[error("unsupported session snapshot version {0}")]
    UnsupportedVersion(u8),

    /// Contents do not hash to the sealed digest.
    #[error("session snapshot digest mismatch")]
    DigestMismatch,

    /// Wallet part failed its own checks.
    #[error(transparent)]
    Ledger(#[from] SnapshotError),

    /// Tournament listed twice.
    #[error("duplicate membership for tournament {0}")]
    DuplicateMembership(TournamentId),

    /// Membership's fee does not match any ledger entry.
    #[error("membership for tournament {0} is not backed by its entry fee")]
    UnbackedMembership(TournamentId),

    /// JSON encoding failure.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary encoding failure.
    #[error("binary: {0}")]
    Binary(#[from] bincode::Error),
}

fn seal(ledger_digest: &LedgerDigest, memberships: &[Membership]) -> LedgerDigest {
    let mut hasher = LedgerHasher::for_session();
    hasher.update_bytes(ledger_digest);
    hasher.update_u64(memberships.len() as u64);
    for membership in memberships {
        membership.hash_into(&mut hasher);
    }
    hasher.finalize()
}

impl SessionSnapshot {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, SessionSnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON.
    pub fn from_json(text: &str) -> Result<Self, SessionSnapshotError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serialize to compact binary.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SessionSnapshotError> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize from compact binary.
    pub fn from_bytes(data: &[u8]) -> Result<Self, SessionSnapshotError> {
        Ok(bincode::deserialize(data)?)
    }
}

fn check_backing(ledger: &WalletLedger, memberships: &[Membership]) -> Result<(), SessionSnapshotError> {
    let mut used = BTreeSet::new();

    for membership in memberships {
        let unbacked = || SessionSnapshotError::UnbackedMembership(membership.tournament_id.clone());
        match membership.fee_transaction {
            None if membership.fee_paid.is_zero() => {}
            None => return Err(unbacked()),
            Some(id) => {
                let tx = ledger.get(&id).ok_or_else(unbacked)?;
                let matches = tx.kind() == TransactionKind::EntryFee
                    && tx.status() == TransactionStatus::Completed
                    && tx.amount() == -membership.fee_paid;
                if !matches || !used.insert(id) {
                    return Err(unbacked());
                }
            }
        }
    }
    Ok(())
}

impl ViewerSession {
    /// Export wallet and memberships.
    pub fn snapshot(&self) -> SessionSnapshot {
        let ledger = self.ledger().snapshot();
        let memberships: Vec<Membership> = self.gate().memberships().cloned().collect();
        let digest = seal(&ledger.digest, &memberships);
        SessionSnapshot { version: SESSION_SNAPSHOT_VERSION, ledger, memberships, digest }
    }

    /// Rebuild a session from a snapshot. The profile starts from its
    /// placeholder; it lives in the profile store, not here.
    pub fn restore(
        viewer_id: ViewerId,
        snapshot: SessionSnapshot,
        config: &ArenaConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SessionSnapshotError> {
        if snapshot.version != SESSION_SNAPSHOT_VERSION {
            return Err(SessionSnapshotError::UnsupportedVersion(snapshot.version));
        }
        if seal(&snapshot.ledger.digest, &snapshot.memberships) != snapshot.digest {
            warn!(viewer = %viewer_id, "session snapshot failed digest check");
            return Err(SessionSnapshotError::DigestMismatch);
        }

        let ledger = WalletLedger::restore(snapshot.ledger, clock.clone())?;
        check_backing(&ledger, &snapshot.memberships)?;

        let mut gate = TournamentGate::with_clock(config.room_credentials.clone(), config.reveal_window, clock);
        gate.restore_memberships(snapshot.memberships)
            .map_err(SessionSnapshotError::DuplicateMembership)?;

        info!(viewer = %viewer_id, entries = ledger.len(), "session state restored");
        Ok(ViewerSession::from_parts(viewer_id, ledger, gate))
    }
}
