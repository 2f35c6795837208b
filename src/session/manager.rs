//! Session Manager
//!
//! Registry of live viewer sessions. Each session sits behind its own
//! `RwLock`; a join holds the write lock for the whole check-debit-record
//! sequence, so two concurrent joins by one viewer cannot both pass the
//! "not yet joined" or "enough funds" checks.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, instrument};

use crate::config::ArenaConfig;
use crate::core::clock::{Clock, SystemClock};
use crate::session::auth::{AuthError, Authenticator};
use crate::session::snapshot::{SessionSnapshot, SessionSnapshotError};
use crate::session::viewer::{ViewerId, ViewerSession};
use crate::tournament::gate::JoinOutcome;
use crate::tournament::record::{RoomCredentials, Tournament};
use crate::wallet::ledger::LedgerError;

/// Session errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No open session for the viewer.
    #[error("no session for viewer {0}")]
    ViewerNotFound(ViewerId),

    /// Token rejected.
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Seeding the wallet failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Stored session could not be restored.
    #[error(transparent)]
    Snapshot(#[from] SessionSnapshotError),
}

/// Shared handle to one viewer's session.
pub type SessionHandle = Arc<RwLock<ViewerSession>>;

/// Manages all live viewer sessions.
pub struct SessionManager {
    sessions: RwLock<BTreeMap<ViewerId, SessionHandle>>,
    config: ArenaConfig,
    clock: Arc<dyn Clock>,
    authenticator: Option<Authenticator>,
}

impl SessionManager {
    /// Manager on the system clock.
    pub fn new(config: ArenaConfig) -> Result<Self, SessionError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Manager on an explicit clock. Token verification is enabled when
    /// `config.auth` carries a key.
    pub fn with_clock(config: ArenaConfig, clock: Arc<dyn Clock>) -> Result<Self, SessionError> {
        let authenticator = if config.auth.is_configured() {
            Some(Authenticator::new(&config.auth)?)
        } else {
            None
        };
        info!(authenticated = authenticator.is_some(), "session manager ready");
        Ok(Self { sessions: RwLock::new(BTreeMap::new()), config, clock, authenticator })
    }

    /// Active config.
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Whether [`open_authenticated`](Self::open_authenticated) can verify tokens.
    pub fn verifies_tokens(&self) -> bool {
        self.authenticator.is_some()
    }

    /// Session for `viewer`, opening a fresh one if needed.
    pub async fn open_session(&self, viewer: ViewerId) -> Result<SessionHandle, SessionError> {
        let mut sessions = self.sessions.write().await;
        if let Some(existing) = sessions.get(&viewer) {
            return Ok(existing.clone());
        }

        let session = ViewerSession::new(viewer, &self.config, self.clock.clone())?;
        let handle = Arc::new(RwLock::new(session));
        sessions.insert(viewer, handle.clone());
        info!(viewer = %viewer, "session opened");
        Ok(handle)
    }

    /// Verify `token` and open the session of the viewer it names.
    pub async fn open_authenticated(&self, token: &str) -> Result<(ViewerId, SessionHandle), SessionError> {
        let authenticator = self.authenticator.as_ref().ok_or(AuthError::NotConfigured)?;
        let viewer = authenticator.authenticate(token)?;
        let handle = self.open_session(viewer).await?;
        Ok((viewer, handle))
    }

    /// Load a stored session. A live session is updated in place under its
    /// write lock, so handles already held see the restored state; its
    /// profile is kept.
    pub async fn restore_session(&self, viewer: ViewerId, snapshot: SessionSnapshot) -> Result<SessionHandle, SessionError> {
        let restored = ViewerSession::restore(viewer, snapshot, &self.config, self.clock.clone())?;

        let mut sessions = self.sessions.write().await;
        if let Some(existing) = sessions.get(&viewer) {
            let handle = existing.clone();
            handle.write().await.replace_state(restored);
            info!(viewer = %viewer, "live session restored in place");
            return Ok(handle);
        }

        let handle = Arc::new(RwLock::new(restored));
        sessions.insert(viewer, handle.clone());
        info!(viewer = %viewer, "session restored");
        Ok(handle)
    }

    /// Live session, if any.
    pub async fn get_session(&self, viewer: &ViewerId) -> Option<SessionHandle> {
        let sessions = self.sessions.read().await;
        sessions.get(viewer).cloned()
    }

    /// Drop a session. Returns whether one was open.
    pub async fn close_session(&self, viewer: &ViewerId) -> bool {
        let mut sessions = self.sessions.write().await;
        let removed = sessions.remove(viewer).is_some();
        if removed {
            info!(viewer = %viewer, "session closed");
        }
        removed
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        let sessions = self.sessions.read().await;
        sessions.len()
    }

    /// Join on behalf of `viewer`, serialized with that viewer's other
    /// wallet operations.
    #[instrument(skip(self, tournament), fields(tournament = %tournament.id))]
    pub async fn join_tournament(&self, viewer: ViewerId, tournament: &Tournament) -> Result<JoinOutcome, SessionError> {
        let handle = self.get_session(&viewer).await.ok_or(SessionError::ViewerNotFound(viewer))?;
        let mut session = handle.write().await;
        Ok(session.join_tournament(tournament))
    }

    /// Room credentials for `viewer`, if joined and the window is open.
    pub async fn room_credentials(
        &self,
        viewer: ViewerId,
        tournament: &Tournament,
    ) -> Result<Option<RoomCredentials>, SessionError> {
        let handle = self.get_session(&viewer).await.ok_or(SessionError::ViewerNotFound(viewer))?;
        let mut session = handle.write().await;
        Ok(session.room_credentials(tournament))
    }

    /// Digest-sealed copy of `viewer`'s wallet and memberships.
    pub async fn snapshot(&self, viewer: ViewerId) -> Result<SessionSnapshot, SessionError> {
        let handle = self.get_session(&viewer).await.ok_or(SessionError::ViewerNotFound(viewer))?;
        let session = handle.read().await;
        Ok(session.snapshot())
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.config)
            .field("authenticated", &self.authenticator.is_some())
            .finish_non_exhaustive()
    }
}
