//! Storage layout constants.
//!
//! Every durable key the crate touches lives here, together with the document
//! version and the bounds enforced by entity validation. The key strings are
//! part of the persisted-state contract: changing one orphans existing data.

/// Version stamped into every collection document on save. Documents carrying
/// any other value are migrated on read.
pub const STORAGE_VERSION: &str = "1.0";

/// Session token lifetime: 7 days, in milliseconds.
pub const TOKEN_TTL_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// Tag appended to the password hash input so the scheme can be rotated
/// without guessing which scheme produced a stored hash.
pub const HASH_VERSION_TAG: &str = "_v1";

/// Longest accepted application name, in characters.
pub const NAME_MAX: usize = 50;

/// Longest accepted application description, in characters.
pub const DESCRIPTION_MAX: usize = 200;

/// Size of the LMDB memory map. Roomy for a single client's documents.
pub const MAP_SIZE: usize = 32 * 1024 * 1024;

/// Durable storage keys.
pub mod keys {
    /// Application collection document.
    pub const APPS: &str = "mini_apps";
    /// Demand collection document.
    pub const DEMANDS: &str = "mini_demands";
    /// Article collection document.
    pub const ARTICLES: &str = "mini_articles";
    /// User account list.
    pub const USERS: &str = "mini_users";
    /// Favorite/like/view relation lists.
    pub const INTERACTIONS: &str = "mini_interactions";
    /// Session bearer token.
    pub const TOKEN: &str = "mini_token";
    /// User id the active session was issued for.
    pub const USER_ID: &str = "mini_userId";
    /// Installation-wide password pepper, base64.
    pub const PASSWORD_PEPPER: &str = "mini_app_salt_v1";
}
