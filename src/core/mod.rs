//! Core primitives shared by the wallet and tournament layers.
//!
//! Exact decimal money, an injectable clock, ledger hashing, and the
//! two-phase optimistic value used for UI-facing edits.

pub mod money;
pub mod clock;
pub mod hash;
pub mod optimistic;

pub use money::{Coins, ParseCoinsError};
pub use clock::{Clock, ManualClock, SystemClock};
pub use hash::{LedgerDigest, LedgerHasher};
pub use optimistic::Optimistic;
