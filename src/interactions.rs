//! Favorites, likes, and view records.
//!
//! Three parallel relation lists in one document. They reference application
//! and user ids by value only: deleting an application does not cascade into
//! the lists here.

use std::sync::Arc;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::backend::KvBackend;
use crate::config::keys;
use crate::error::{StoreError, StoreResult};
use crate::ids::now_iso;

/// Viewer recorded when nobody is signed in.
pub const ANONYMOUS_VIEWER: &str = "anonymous";

/// One user bookmarking one application. At most one per `(user, app)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    pub user_id: String,
    pub app_id: String,
    pub created_at: String,
}

/// An anonymous like. Carries no user identity; the count per application is
/// the population of these tuples.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Like {
    pub app_id: String,
    pub created_at: String,
}

/// One page visit. Never deduplicated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct View {
    pub user_id: String,
    pub app_id: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InteractionDoc {
    #[serde(default)]
    pub favorites: Vec<Favorite>,
    #[serde(default)]
    pub likes: Vec<Like>,
    #[serde(default)]
    pub views: Vec<View>,
}

/// Outcome of a like toggle: the new state and the resulting count for the
/// application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeToggle {
    pub liked: bool,
    pub count: u64,
}

/// Relation lists tying users to applications.
pub struct InteractionStore {
    backend: Arc<dyn KvBackend>,
}

impl InteractionStore {
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self { backend }
    }

    /// Writes an empty relation document if none exists yet. Idempotent.
    pub fn init(&self) -> StoreResult<()> {
        if self.backend.get(keys::INTERACTIONS)?.is_none() {
            self.save(&InteractionDoc::default())?;
        }
        Ok(())
    }

    /// Current state of all three relation lists.
    pub fn snapshot(&self) -> InteractionDoc {
        self.load()
    }

    /// Flips the favorite state of `(user_id, app_id)` and returns the new
    /// state. Requires a signed-in user.
    pub fn toggle_favorite(&self, user_id: Option<&str>, app_id: &str) -> StoreResult<bool> {
        let user_id = match present(user_id) {
            Some(user_id) => user_id,
            None => return Err(StoreError::NotLoggedIn),
        };

        let mut doc = self.load();
        let existing = doc
            .favorites
            .iter()
            .position(|f| f.user_id == user_id && f.app_id == app_id);
        let favorited = match existing {
            Some(index) => {
                doc.favorites.remove(index);
                false
            }
            None => {
                doc.favorites.push(Favorite {
                    user_id: user_id.to_string(),
                    app_id: app_id.to_string(),
                    created_at: now_iso(),
                });
                true
            }
        };
        self.save(&doc)?;
        Ok(favorited)
    }

    pub fn is_favorited(&self, user_id: Option<&str>, app_id: &str) -> bool {
        let user_id = match present(user_id) {
            Some(user_id) => user_id,
            None => return false,
        };
        self.load()
            .favorites
            .iter()
            .any(|f| f.user_id == user_id && f.app_id == app_id)
    }

    /// Application ids the user has favorited, in the order they were added.
    pub fn user_favorites(&self, user_id: &str) -> Vec<String> {
        self.load()
            .favorites
            .into_iter()
            .filter(|f| f.user_id == user_id)
            .map(|f| f.app_id)
            .collect()
    }

    /// Flips the global like state for the application: appends a like when
    /// none exists, otherwise removes the most recent one.
    pub fn toggle_like(&self, app_id: &str) -> StoreResult<LikeToggle> {
        let mut doc = self.load();
        let liked = match doc.likes.iter().rposition(|l| l.app_id == app_id) {
            Some(index) => {
                doc.likes.remove(index);
                false
            }
            None => {
                doc.likes.push(Like {
                    app_id: app_id.to_string(),
                    created_at: now_iso(),
                });
                true
            }
        };
        let count = doc.likes.iter().filter(|l| l.app_id == app_id).count() as u64;
        self.save(&doc)?;
        Ok(LikeToggle { liked, count })
    }

    pub fn is_liked(&self, app_id: &str) -> bool {
        self.load().likes.iter().any(|l| l.app_id == app_id)
    }

    pub fn likes_count(&self, app_id: &str) -> u64 {
        self.load().likes.iter().filter(|l| l.app_id == app_id).count() as u64
    }

    /// Appends a view record; every call counts. Absent viewers are recorded
    /// under [`ANONYMOUS_VIEWER`].
    pub fn record_view(&self, user_id: Option<&str>, app_id: &str) -> StoreResult<()> {
        let viewer = present(user_id).unwrap_or(ANONYMOUS_VIEWER);
        let mut doc = self.load();
        doc.views.push(View {
            user_id: viewer.to_string(),
            app_id: app_id.to_string(),
            created_at: now_iso(),
        });
        self.save(&doc)
    }

    pub fn views_count(&self, app_id: &str) -> u64 {
        self.load().views.iter().filter(|v| v.app_id == app_id).count() as u64
    }

    fn load(&self) -> InteractionDoc {
        let raw = match self.backend.get(keys::INTERACTIONS) {
            Ok(Some(raw)) => raw,
            Ok(None) => return InteractionDoc::default(),
            Err(e) => {
                warn!("Failed to read {}: {e}", keys::INTERACTIONS);
                return InteractionDoc::default();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(
                    "Malformed document at {}; starting fresh: {e}",
                    keys::INTERACTIONS
                );
                InteractionDoc::default()
            }
        }
    }

    fn save(&self, doc: &InteractionDoc) -> StoreResult<()> {
        let raw = serde_json::to_string_pretty(doc)?;
        self.backend.put(keys::INTERACTIONS, &raw)
    }
}

/// Normalizes an optional user id: trimmed, with blanks treated as absent.
fn present(user_id: Option<&str>) -> Option<&str> {
    user_id.map(str::trim).filter(|u| !u.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    fn store() -> InteractionStore {
        let store = InteractionStore::new(Arc::new(MemoryBackend::new()));
        store.init().unwrap();
        store
    }

    #[test]
    fn favorite_toggle_is_an_involution() {
        let store = store();
        assert!(!store.is_favorited(Some("u1"), "a1"));

        assert!(store.toggle_favorite(Some("u1"), "a1").unwrap());
        assert!(store.is_favorited(Some("u1"), "a1"));

        assert!(!store.toggle_favorite(Some("u1"), "a1").unwrap());
        assert!(!store.is_favorited(Some("u1"), "a1"));
        assert!(store.snapshot().favorites.is_empty());
    }

    #[test]
    fn favorites_require_a_user() {
        let store = store();
        let err = store.toggle_favorite(None, "a1").unwrap_err();
        assert!(matches!(err, StoreError::NotLoggedIn));
        let err = store.toggle_favorite(Some("   "), "a1").unwrap_err();
        assert!(matches!(err, StoreError::NotLoggedIn));

        assert!(!store.is_favorited(None, "a1"));
    }

    #[test]
    fn favorites_are_scoped_per_user() {
        let store = store();
        store.toggle_favorite(Some("u1"), "a1").unwrap();
        store.toggle_favorite(Some("u1"), "a2").unwrap();
        store.toggle_favorite(Some("u2"), "a1").unwrap();

        assert_eq!(store.user_favorites("u1"), vec!["a1", "a2"]);
        assert_eq!(store.user_favorites("u2"), vec!["a1"]);
        assert!(store.user_favorites("u3").is_empty());

        // u2 removing theirs leaves u1's intact.
        store.toggle_favorite(Some("u2"), "a1").unwrap();
        assert!(store.is_favorited(Some("u1"), "a1"));
        assert!(!store.is_favorited(Some("u2"), "a1"));
    }

    #[test]
    fn like_toggle_reports_state_and_count() {
        let store = store();
        assert!(!store.is_liked("a1"));
        assert_eq!(store.likes_count("a1"), 0);

        let toggle = store.toggle_like("a1").unwrap();
        assert!(toggle.liked);
        assert_eq!(toggle.count, 1);
        assert!(store.is_liked("a1"));

        let toggle = store.toggle_like("a1").unwrap();
        assert!(!toggle.liked);
        assert_eq!(toggle.count, 0);
        assert!(!store.is_liked("a1"));
    }

    #[test]
    fn likes_are_tracked_per_application() {
        let store = store();
        store.toggle_like("a1").unwrap();
        store.toggle_like("a2").unwrap();

        assert_eq!(store.likes_count("a1"), 1);
        assert_eq!(store.likes_count("a2"), 1);

        store.toggle_like("a1").unwrap();
        assert_eq!(store.likes_count("a1"), 0);
        assert_eq!(store.likes_count("a2"), 1);
    }

    #[test]
    fn views_accumulate_without_dedup() {
        let store = store();
        store.record_view(Some("u1"), "a1").unwrap();
        store.record_view(Some("u1"), "a1").unwrap();
        store.record_view(None, "a1").unwrap();
        store.record_view(Some(""), "a1").unwrap();
        store.record_view(Some("u2"), "a2").unwrap();

        assert_eq!(store.views_count("a1"), 4);
        assert_eq!(store.views_count("a2"), 1);
        assert_eq!(store.views_count("a3"), 0);

        let snapshot = store.snapshot();
        let anonymous = snapshot
            .views
            .iter()
            .filter(|v| v.user_id == ANONYMOUS_VIEWER)
            .count();
        assert_eq!(anonymous, 2);
    }

    #[test]
    fn no_referential_integrity_with_applications() {
        // Deleting an application elsewhere leaves its relations behind;
        // counts only ever reflect this document.
        let store = store();
        store.toggle_like("ghost-app").unwrap();
        store.record_view(None, "ghost-app").unwrap();
        assert_eq!(store.likes_count("ghost-app"), 1);
        assert_eq!(store.views_count("ghost-app"), 1);
    }
}
