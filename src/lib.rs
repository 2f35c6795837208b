//! # Arena Wallet
//!
//! Viewer wallet and tournament entry for a gaming-tournament app.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       ARENA WALLET                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/             - Shared primitives                       │
//! │  ├── money.rs      - Exact decimal SR coins                  │
//! │  ├── clock.rs      - Injectable time source                  │
//! │  ├── hash.rs       - Ledger digest (SHA-256)                 │
//! │  └── optimistic.rs - Apply / confirm / revert values         │
//! │                                                              │
//! │  wallet/           - SR coin ledger                          │
//! │  ├── transaction.rs- Entries, kinds, statuses                │
//! │  ├── ledger.rs     - Balance rules, pending settlement       │
//! │  └── snapshot.rs   - Sealed export / verified restore        │
//! │                                                              │
//! │  tournament/       - Joining and room reveal                 │
//! │  ├── record.rs     - Descriptors from catalog documents      │
//! │  ├── gate.rs       - Membership, entry fee, reveal rule      │
//! │  └── reveal.rs     - Background reveal watcher               │
//! │                                                              │
//! │  session/          - Per-viewer state (async)                │
//! │  ├── auth.rs       - ID token verification                   │
//! │  ├── viewer.rs     - ViewerId and ViewerSession              │
//! │  ├── profile.rs    - Profile with optimistic edits           │
//! │  ├── snapshot.rs   - Wallet plus memberships, sealed         │
//! │  └── manager.rs    - Session registry and locking            │
//! │                                                              │
//! │  config.rs         - Environment configuration               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ledger Guarantees
//!
//! - Balance is always the sum of completed amounts and never negative
//! - Entries are append-only; only a pending status may change, once
//! - A tournament join debits the fee and records membership, or neither
//! - Room credentials, once revealed, stay revealed

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod session;
pub mod tournament;
pub mod wallet;

// Re-export commonly used types
pub use crate::config::{ArenaConfig, AuthConfig, ConfigError};
pub use crate::core::clock::{Clock, ManualClock, SystemClock};
pub use crate::core::money::Coins;
pub use session::{SessionManager, SessionSnapshot, ViewerId, ViewerSession};
pub use tournament::{check_room_reveal, JoinOutcome, RevealWatcher, Tournament, TournamentGate, TournamentId};
pub use wallet::{LedgerError, LedgerSnapshot, Transaction, TransactionKind, TransactionStatus, WalletLedger};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Currency label used in user-facing text.
pub const CURRENCY: &str = "SR coins";
