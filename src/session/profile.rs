//! Viewer Profile
//!
//! Typed profile record plus the optimistic edit flow for avatar, banner
//! and details: the new value shows at once, the durable write runs, and a
//! failed write restores the previous profile.
//!
//! Document defaults (applied in one place, [`Profile::merge_document`]):
//! missing text fields become `""`, a missing `username` gives an empty
//! handle, missing avatar/banner keep the current (initially placeholder)
//! image, missing `links` is an empty list.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::optimistic::Optimistic;
use crate::session::viewer::ViewerId;

/// Avatar shown before the viewer uploads one.
pub const PLACEHOLDER_AVATAR_URL: &str = "https://placehold.co/128x128.png";

/// Banner shown before the viewer uploads one.
pub const PLACEHOLDER_BANNER_URL: &str = "https://placehold.co/1080x240.png";

/// A link on the channel page.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileLink {
    /// Label.
    pub title: String,
    /// Target.
    pub url: String,
}

/// Viewer profile as the app displays it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Display name.
    pub name: String,
    /// `@username`, or empty.
    pub handle: String,
    /// Avatar image.
    pub avatar_url: String,
    /// Channel banner image.
    pub banner_url: String,
    /// About text.
    pub description: String,
    /// Contact email.
    pub email: String,
    /// Channel links.
    pub links: Vec<ProfileLink>,
    /// Date of birth, as entered.
    pub dob: String,
    /// Gender, as entered.
    pub gender: String,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            name: String::new(),
            handle: String::new(),
            avatar_url: PLACEHOLDER_AVATAR_URL.into(),
            banner_url: PLACEHOLDER_BANNER_URL.into(),
            description: String::new(),
            email: String::new(),
            links: Vec::new(),
            dob: String::new(),
            gender: String::new(),
        }
    }
}

/// User document as stored; every field optional.
#[allow(missing_docs)]
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDocument {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub banner_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub links: Option<Vec<ProfileLink>>,
    #[serde(default)]
    pub dob: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl Profile {
    /// Profile from a fresh document snapshot, keeping `self`'s images
    /// where the document has none.
    pub fn merge_document(&self, doc: ProfileDocument) -> Profile {
        Profile {
            name: doc.display_name.unwrap_or_default(),
            handle: non_empty(doc.username).map(|u| format!("@{u}")).unwrap_or_default(),
            avatar_url: non_empty(doc.avatar_url).unwrap_or_else(|| self.avatar_url.clone()),
            banner_url: non_empty(doc.banner_url).unwrap_or_else(|| self.banner_url.clone()),
            description: doc.description.unwrap_or_default(),
            email: doc.email.unwrap_or_default(),
            links: doc.links.unwrap_or_default(),
            dob: doc.dob.unwrap_or_default(),
            gender: doc.gender.unwrap_or_default(),
        }
    }
}

/// Partial profile update; `None` leaves a field alone.
#[allow(missing_docs)]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub handle: Option<String>,
    pub description: Option<String>,
    pub email: Option<String>,
    pub links: Option<Vec<ProfileLink>>,
    pub dob: Option<String>,
    pub gender: Option<String>,
}

/// One edit the viewer can make.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProfileChange {
    /// New avatar image URL.
    Avatar(String),
    /// New banner image URL.
    Banner(String),
    /// Text details.
    Details(ProfileUpdate),
}

impl ProfileChange {
    fn apply_to(self, profile: &mut Profile) {
        match self {
            ProfileChange::Avatar(url) => profile.avatar_url = url,
            ProfileChange::Banner(url) => profile.banner_url = url,
            ProfileChange::Details(update) => {
                let ProfileUpdate { name, handle, description, email, links, dob, gender } = update;
                let fields = [
                    (name, &mut profile.name),
                    (handle, &mut profile.handle),
                    (description, &mut profile.description),
                    (email, &mut profile.email),
                    (dob, &mut profile.dob),
                    (gender, &mut profile.gender),
                ];
                for (value, slot) in fields {
                    if let Some(value) = value {
                        *slot = value;
                    }
                }
                if let Some(links) = links {
                    profile.links = links;
                }
            }
        }
    }
}

// =============================================================================
// STORE
// =============================================================================

/// Durable write failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("profile store write failed: {0}")]
pub struct ProfileStoreError(pub String);

/// Where confirmed profiles are written.
pub trait ProfileStore: Send + Sync {
    /// Persist `profile` for `viewer`.
    fn save(&self, viewer: &ViewerId, profile: &Profile) -> Result<(), ProfileStoreError>;
}

/// Process-local store. Can be switched offline to exercise rollbacks.
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    profiles: Mutex<BTreeMap<ViewerId, Profile>>,
    offline: AtomicBool,
}

impl InMemoryProfileStore {
    /// Empty, online store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail (or succeed again).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Last saved profile for `viewer`.
    pub fn get(&self, viewer: &ViewerId) -> Option<Profile> {
        self.profiles.lock().unwrap_or_else(|e| e.into_inner()).get(viewer).cloned()
    }
}

impl ProfileStore for InMemoryProfileStore {
    fn save(&self, viewer: &ViewerId, profile: &Profile) -> Result<(), ProfileStoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ProfileStoreError("store offline".into()));
        }
        self.profiles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(*viewer, profile.clone());
        Ok(())
    }
}

// =============================================================================
// EDITOR
// =============================================================================

/// A viewer's profile with tentative-apply / confirm-or-revert edits.
#[derive(Debug, Clone)]
pub struct ProfileEditor {
    viewer_id: ViewerId,
    state: Optimistic<Profile>,
}

impl ProfileEditor {
    /// Editor starting from the placeholder profile.
    pub fn new(viewer_id: ViewerId) -> Self {
        Self { viewer_id, state: Optimistic::new(Profile::default()) }
    }

    /// What the UI should show now.
    pub fn profile(&self) -> &Profile {
        self.state.current()
    }

    /// Last profile the store accepted.
    pub fn confirmed(&self) -> &Profile {
        self.state.confirmed()
    }

    /// Replace with a fresh store snapshot.
    pub fn load_document(&mut self, doc: ProfileDocument) {
        let merged = self.state.confirmed().merge_document(doc);
        self.state.reset(merged);
    }

    /// Apply `change` immediately, write it, then confirm or roll back.
    pub fn update_with<S>(&mut self, store: &S, change: ProfileChange) -> Result<&Profile, ProfileStoreError>
    where
        S: ProfileStore + ?Sized,
    {
        self.state.apply(|profile| change.apply_to(profile));

        match store.save(&self.viewer_id, self.state.current()) {
            Ok(()) => {
                self.state.confirm();
                debug!(viewer = %self.viewer_id, "profile change saved");
                Ok(self.state.current())
            }
            Err(err) => {
                self.state.revert();
                warn!(viewer = %self.viewer_id, error = %err, "profile change rolled back");
                Err(err)
            }
        }
    }
}
