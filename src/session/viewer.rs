//! Viewer Session
//!
//! Everything one signed-in viewer owns: wallet, tournament memberships,
//! profile. The session is the unit the [`SessionManager`] locks, so a join
//! sees the ledger and the membership set in one consistent state.
//!
//! [`SessionManager`]: crate::session::manager::SessionManager

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::ArenaConfig;
use crate::core::clock::Clock;
use crate::core::money::Coins;
use crate::session::profile::{
    Profile, ProfileChange, ProfileDocument, ProfileEditor, ProfileStore, ProfileStoreError,
};
use crate::tournament::gate::{JoinOutcome, TournamentGate};
use crate::tournament::record::{RoomCredentials, Tournament};
use crate::wallet::ledger::{LedgerError, WalletLedger};

// =============================================================================
// VIEWER ID
// =============================================================================

/// Viewer identifier (16 bytes, UUID-shaped).
///
/// Implements Ord for deterministic BTreeMap ordering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ViewerId(pub [u8; 16]);

impl ViewerId {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Parse from a UUID string.
    pub fn from_uuid_str(s: &str) -> Option<Self> {
        uuid::Uuid::parse_str(s).ok().map(|u| Self(*u.as_bytes()))
    }

    /// Render as a UUID string.
    pub fn to_uuid_string(&self) -> String {
        uuid::Uuid::from_bytes(self.0).to_string()
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for ViewerId {
    /// Short hex form for logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0[..6]))
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// One viewer's state.
#[derive(Debug, Clone)]
pub struct ViewerSession {
    viewer_id: ViewerId,
    ledger: WalletLedger,
    gate: TournamentGate,
    profile: ProfileEditor,
}

impl ViewerSession {
    /// Fresh session seeded from `config`.
    pub fn new(viewer_id: ViewerId, config: &ArenaConfig, clock: Arc<dyn Clock>) -> Result<Self, LedgerError> {
        let ledger = if config.opening_balance.is_zero() {
            WalletLedger::with_clock(clock.clone())
        } else {
            WalletLedger::with_opening_balance(config.opening_balance, clock.clone())?
        };
        let gate = TournamentGate::with_clock(config.room_credentials.clone(), config.reveal_window, clock);
        Ok(Self::from_parts(viewer_id, ledger, gate))
    }

    /// Session around an already verified ledger and gate.
    pub(crate) fn from_parts(viewer_id: ViewerId, ledger: WalletLedger, gate: TournamentGate) -> Self {
        Self { viewer_id, ledger, gate, profile: ProfileEditor::new(viewer_id) }
    }

    /// Take over wallet and memberships from `restored`, keeping the
    /// profile already loaded here.
    pub(crate) fn replace_state(&mut self, restored: ViewerSession) {
        self.ledger = restored.ledger;
        self.gate = restored.gate;
    }

    /// Owner.
    pub fn viewer_id(&self) -> ViewerId {
        self.viewer_id
    }

    /// Wallet.
    pub fn ledger(&self) -> &WalletLedger {
        &self.ledger
    }

    /// Wallet, mutable.
    pub fn ledger_mut(&mut self) -> &mut WalletLedger {
        &mut self.ledger
    }

    /// Memberships and reveals.
    pub fn gate(&self) -> &TournamentGate {
        &self.gate
    }

    /// Current balance.
    pub fn balance(&self) -> Coins {
        self.ledger.balance()
    }

    /// Join `tournament`, paying from this session's wallet.
    pub fn join_tournament(&mut self, tournament: &Tournament) -> JoinOutcome {
        let Self { ledger, gate, .. } = self;
        gate.join(ledger, tournament)
    }

    /// Room credentials if joined and the window is open.
    pub fn room_credentials(&mut self, tournament: &Tournament) -> Option<RoomCredentials> {
        self.gate.room_credentials(tournament).cloned()
    }

    /// Displayed profile.
    pub fn profile(&self) -> &Profile {
        self.profile.profile()
    }

    /// Replace the profile with a fresh store document.
    pub fn load_profile(&mut self, doc: ProfileDocument) {
        self.profile.load_document(doc);
    }

    /// Apply and persist a profile change, rolling back on failure.
    pub fn update_profile<S>(&mut self, store: &S, change: ProfileChange) -> Result<Profile, ProfileStoreError>
    where
        S: ProfileStore + ?Sized,
    {
        self.profile.update_with(store, change).cloned()
    }
}
