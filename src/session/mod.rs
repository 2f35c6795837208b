//! Session Layer
//!
//! Per-viewer state behind async locks, plus token verification, sealed
//! session snapshots and the optimistic profile editor.

pub mod auth;
pub mod manager;
pub mod profile;
pub mod snapshot;
pub mod viewer;

pub use auth::{AuthError, Authenticator, ViewerClaims};
pub use manager::{SessionError, SessionHandle, SessionManager};
pub use profile::{
    InMemoryProfileStore, Profile, ProfileChange, ProfileDocument, ProfileEditor, ProfileLink, ProfileStore,
    ProfileStoreError, ProfileUpdate,
};
pub use snapshot::{SessionSnapshot, SessionSnapshotError, SESSION_SNAPSHOT_VERSION};
pub use viewer::{ViewerId, ViewerSession};
