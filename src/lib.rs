//! # Miniapp Store
//!
//! Local data-storage layer for a client-side micro-application marketplace:
//! versioned JSON collections, search and tag aggregation, hot/recent
//! ranking, user accounts with sessions, and favorite/like/view tracking.
//! Built on LMDB (Lightning Memory-Mapped Database) so a single client keeps
//! durable state across restarts without running a server.
//!
//! ## Features
//!
//! - **Versioned collections**: one JSON document per entity kind, stamped
//!   with a schema version and migrated on read
//! - **Self-healing reads**: missing or corrupt documents come back empty
//!   instead of failing the caller; writes always report their errors
//! - **Composable stores**: one generic collection store configured per
//!   entity with validation and pre-insert strategies, no inheritance
//! - **Real password hashing**: Argon2id PHC strings with a per-installation
//!   pepper, no reversible fallback
//! - **Swappable backend**: LMDB for durable deployments, in-memory for
//!   tests
//!
//! ## Quick Start
//!
//! ```no_run
//! use miniapp_store::{App, AppKind, Stores};
//!
//! let stores = Stores::open("marketplace.lmdb")?;
//!
//! let session = stores.users.register("ada", "ada@example.com", "correct horse")?;
//! let app = stores.apps.add(
//!     App::new("Todo", "Track your day", AppKind::Tool)
//!         .with_author(session.user.id.clone(), session.user.username.clone()),
//! )?;
//!
//! stores.interactions.record_view(Some(&session.user.id), &app.meta.id)?;
//! let hot = stores.apps.hot_apps(10);
//! println!("{} applications trending", hot.len());
//! # Ok::<(), miniapp_store::StoreError>(())
//! ```
//!
//! ## Store surface
//!
//! - [`Stores`] - every store constructed once over one shared backend
//! - [`CollectionStore`] - generic CRUD, search, and tag aggregation
//! - [`UserStore`] - registration, login, sessions, profile sanitization
//! - [`InteractionStore`] - favorites, likes, and view records

pub mod backend;
pub mod collection;
pub mod config;
pub mod error;
pub mod ids;
pub mod interactions;
pub mod models;
pub mod users;

mod validate;

use std::path::Path;
use std::sync::Arc;

pub use backend::{KvBackend, LmdbBackend, MemoryBackend};
pub use collection::{
    CollectionDoc, CollectionStore, Record, RecordMeta, SearchCriteria, TagCount, TagMatch,
};
pub use error::{StoreError, StoreResult};
pub use interactions::{InteractionStore, LikeToggle, ANONYMOUS_VIEWER};
pub use models::{app_store, article_store, demand_store, App, AppKind, Article, Demand};
pub use users::{AuthSession, ProfileUpdate, PublicProfile, SanitizedUser, UserStore};

/// Every store over one shared backend, constructed once at startup and
/// passed by reference to whatever needs it.
pub struct Stores {
    pub apps: CollectionStore<App>,
    pub demands: CollectionStore<Demand>,
    pub articles: CollectionStore<Article>,
    pub users: UserStore,
    pub interactions: InteractionStore,
}

impl Stores {
    /// Opens (creating if needed) the LMDB environment at `path` and
    /// initializes every backing document.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let backend = Arc::new(LmdbBackend::open(path.as_ref())?);
        Self::with_backend(backend)
    }

    /// Builds the stores over any backend. Pair with [`MemoryBackend`] for
    /// tests and ephemeral runs.
    pub fn with_backend(backend: Arc<dyn KvBackend>) -> StoreResult<Self> {
        let stores = Self {
            apps: models::app_store(Arc::clone(&backend)),
            demands: models::demand_store(Arc::clone(&backend)),
            articles: models::article_store(Arc::clone(&backend)),
            users: UserStore::new(Arc::clone(&backend)),
            interactions: InteractionStore::new(backend),
        };
        stores.apps.init()?;
        stores.demands.init()?;
        stores.articles.init()?;
        stores.users.init()?;
        stores.interactions.init()?;
        Ok(stores)
    }
}
