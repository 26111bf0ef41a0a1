//! Error taxonomy shared by every store.
//!
//! One enum covers the whole crate: input validation, uniqueness and
//! authentication failures, and backend read/write trouble. Reads of backing
//! documents self-heal internally and never surface [`StoreError::StorageRead`]
//! to callers of the collection API; writes always propagate.

use thiserror::Error;

/// Crate-wide result alias.
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Every input rule the candidate record violated, aggregated so the
    /// caller can surface the full list at once.
    #[error("validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("email is already registered")]
    DuplicateEmail,

    #[error("username is already taken")]
    DuplicateUsername,

    #[error("no account matches that email")]
    UserNotFound,

    #[error("incorrect password")]
    InvalidCredentials,

    #[error("not logged in")]
    NotLoggedIn,

    /// The backend rejected a write, e.g. the map is full.
    #[error("storage write failed: {0}")]
    StorageWrite(String),

    /// The backend could not produce a value. Collection reads recover from
    /// this by substituting an empty document; it reaches callers only from
    /// operations that cannot safely self-heal.
    #[error("storage read failed: {0}")]
    StorageRead(String),

    /// The storage environment itself could not be opened.
    #[error("storage backend unavailable: {0}")]
    Backend(String),

    #[error("password hashing failed: {0}")]
    PasswordHash(String),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
