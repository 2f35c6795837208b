//! Tournament Module
//!
//! Joining paid tournaments and revealing match rooms on a timer.
//!
//! - `record`: typed tournament descriptors from loose catalog documents
//! - `gate`: membership state, entry-fee charging, reveal rule
//! - `reveal`: background poller for the reveal window

pub mod record;
pub mod gate;
pub mod reveal;

pub use record::{RecordError, RoomCredentials, Tournament, TournamentDocument, TournamentId};
pub use gate::{
    check_room_reveal, check_room_reveal_minutes, default_reveal_window, JoinOutcome, JoinRefusal,
    Membership, TournamentGate, DEFAULT_REVEAL_WINDOW_MINUTES,
};
pub use reveal::{RevealWatcher, DEFAULT_POLL_INTERVAL};
