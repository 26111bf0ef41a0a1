//! User accounts and sessions.
//!
//! Accounts persist as one JSON document holding the whole user list. The
//! session is a pair of companion keys: a bearer token plus the user id it
//! was issued for. Password hashes are Argon2id PHC strings; the hash input
//! mixes in a per-installation pepper and a scheme version tag, so hashes
//! lifted from one installation are useless against another.
//!
//! The full [`User`] record never crosses the public boundary. Callers see
//! [`SanitizedUser`] (everything but the password hash) or [`PublicProfile`]
//! (no email either); neither type has a password field to leak.

use std::sync::Arc;

use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use log::warn;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::backend::KvBackend;
use crate::config::{keys, HASH_VERSION_TAG, TOKEN_TTL_MS};
use crate::error::{StoreError, StoreResult};
use crate::ids::{generate_id, now_iso, now_millis};

/// Stored account record, including the password hash. Crate-private so the
/// hash cannot leak through a public signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub avatar: String,
    #[serde(default)]
    pub bio: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct UsersDoc {
    #[serde(default)]
    users: Vec<User>,
}

/// Account view with the password hash stripped. What registration, login,
/// profile updates, and [`UserStore::current_user`] hand back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizedUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub avatar: String,
    pub bio: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl From<&User> for SanitizedUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            avatar: user.avatar.clone(),
            bio: user.bio.clone(),
            created_at: user.created_at.clone(),
            updated_at: user.updated_at.clone(),
        }
    }
}

/// What anyone may see about an account: no email, no password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub id: String,
    pub username: String,
    pub avatar: String,
    pub bio: String,
    pub created_at: String,
}

impl From<&User> for PublicProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            avatar: user.avatar.clone(),
            bio: user.bio.clone(),
            created_at: user.created_at.clone(),
        }
    }
}

/// Profile fields a signed-in user may change. `None` leaves a field as it
/// is.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
}

/// Successful registration or login: the account plus its bearer token.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: SanitizedUser,
    pub token: String,
}

/// Claims packed into the session token.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenClaims {
    user_id: String,
    issued_at: i64,
    expires_at: i64,
}

/// Account registry and session management over the shared backend.
pub struct UserStore {
    backend: Arc<dyn KvBackend>,
}

impl UserStore {
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self { backend }
    }

    /// Writes an empty account document if none exists yet. Idempotent.
    pub fn init(&self) -> StoreResult<()> {
        if self.backend.get(keys::USERS)?.is_none() {
            self.save(&UsersDoc::default())?;
        }
        Ok(())
    }

    /// Creates an account and signs it in. The username is stored trimmed,
    /// the email trimmed and lower-cased; each must be unique across the
    /// installation.
    pub fn register(&self, username: &str, email: &str, password: &str) -> StoreResult<AuthSession> {
        let username = username.trim();
        let email = email.trim().to_lowercase();

        let mut doc = self.load();
        if doc.users.iter().any(|u| u.email == email) {
            return Err(StoreError::DuplicateEmail);
        }
        if doc.users.iter().any(|u| u.username == username) {
            return Err(StoreError::DuplicateUsername);
        }

        let user = User {
            id: generate_id(),
            username: username.to_string(),
            email,
            password: self.hash_password(password)?,
            avatar: avatar_url(username),
            bio: String::new(),
            created_at: now_iso(),
            updated_at: None,
        };
        let sanitized = SanitizedUser::from(&user);

        doc.users.push(user);
        self.save(&doc)?;

        let token = self.establish_session(&sanitized.id)?;
        Ok(AuthSession { user: sanitized, token })
    }

    /// Verifies credentials and signs the account in.
    pub fn login(&self, email: &str, password: &str) -> StoreResult<AuthSession> {
        let email = email.to_lowercase();
        let doc = self.load();
        let user = match doc.users.iter().find(|u| u.email == email) {
            Some(user) => user,
            None => return Err(StoreError::UserNotFound),
        };
        if !self.verify_password(password, &user.password)? {
            return Err(StoreError::InvalidCredentials);
        }

        let token = self.establish_session(&user.id)?;
        Ok(AuthSession {
            user: SanitizedUser::from(user),
            token,
        })
    }

    /// Clears the session keys unconditionally. Logging out twice is fine.
    pub fn logout(&self) -> StoreResult<()> {
        self.backend.remove(keys::TOKEN)?;
        self.backend.remove(keys::USER_ID)
    }

    /// Resolves the active session to its account. Missing credentials and
    /// failed verification both read as signed-out; verification failure
    /// also clears the stale session. A verified session whose account has
    /// been deleted resolves to `None` with the session left in place.
    pub fn current_user(&self) -> Option<SanitizedUser> {
        let user_id = self.verified_session()?;
        self.load()
            .users
            .iter()
            .find(|u| u.id == user_id)
            .map(SanitizedUser::from)
    }

    /// Applies profile changes for the signed-in account and returns the new
    /// state.
    pub fn update_profile(&self, updates: &ProfileUpdate) -> StoreResult<SanitizedUser> {
        let user_id = match self.verified_session() {
            Some(user_id) => user_id,
            None => return Err(StoreError::NotLoggedIn),
        };

        let mut doc = self.load();
        if let Some(new_username) = updates.username.as_deref().map(str::trim) {
            let taken = doc
                .users
                .iter()
                .any(|u| u.username == new_username && u.id != user_id);
            if taken {
                return Err(StoreError::DuplicateUsername);
            }
        }

        let user = match doc.users.iter_mut().find(|u| u.id == user_id) {
            Some(user) => user,
            None => return Err(StoreError::UserNotFound),
        };
        if let Some(username) = updates.username.as_deref() {
            user.username = username.trim().to_string();
        }
        if let Some(bio) = &updates.bio {
            user.bio = bio.clone();
        }
        if let Some(avatar) = &updates.avatar {
            user.avatar = avatar.clone();
        }
        user.updated_at = Some(now_iso());

        let sanitized = SanitizedUser::from(&*user);
        self.save(&doc)?;
        Ok(sanitized)
    }

    /// Public view of any account.
    pub fn user_profile(&self, user_id: &str) -> Option<PublicProfile> {
        self.load()
            .users
            .iter()
            .find(|u| u.id == user_id)
            .map(PublicProfile::from)
    }

    fn load(&self) -> UsersDoc {
        let raw = match self.backend.get(keys::USERS) {
            Ok(Some(raw)) => raw,
            Ok(None) => return UsersDoc::default(),
            Err(e) => {
                warn!("Failed to read {}: {e}", keys::USERS);
                return UsersDoc::default();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(doc) => doc,
            Err(e) => {
                warn!("Malformed document at {}; starting fresh: {e}", keys::USERS);
                UsersDoc::default()
            }
        }
    }

    fn save(&self, doc: &UsersDoc) -> StoreResult<()> {
        let raw = serde_json::to_string_pretty(doc)?;
        self.backend.put(keys::USERS, &raw)
    }

    /// Issues a fresh token and stores both session keys.
    fn establish_session(&self, user_id: &str) -> StoreResult<String> {
        let token = issue_token(user_id)?;
        self.backend.put(keys::TOKEN, &token)?;
        self.backend.put(keys::USER_ID, user_id)?;
        Ok(token)
    }

    /// Verified user id of the active session. Clears the session, best
    /// effort, when the token fails verification.
    fn verified_session(&self) -> Option<String> {
        let token = self.read_session_key(keys::TOKEN)?;
        let user_id = self.read_session_key(keys::USER_ID)?;
        if verify_token(&token, &user_id) {
            Some(user_id)
        } else {
            if let Err(e) = self.logout() {
                warn!("Failed to clear stale session: {e}");
            }
            None
        }
    }

    fn read_session_key(&self, key: &str) -> Option<String> {
        match self.backend.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to read {key}: {e}");
                None
            }
        }
    }

    /// Argon2id PHC hash over the password mixed with the installation
    /// pepper and the scheme version tag.
    fn hash_password(&self, password: &str) -> StoreResult<String> {
        let material = self.hash_material(password)?;
        let salt = SaltString::generate(OsRng);
        let hash = Argon2::default()
            .hash_password(material.as_bytes(), &salt)
            .map_err(|e| StoreError::PasswordHash(e.to_string()))?;
        Ok(hash.to_string())
    }

    fn verify_password(&self, password: &str, stored: &str) -> StoreResult<bool> {
        let parsed = match PasswordHash::new(stored) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Stored password hash is unreadable: {e}");
                return Ok(false);
            }
        };
        let material = self.hash_material(password)?;
        Ok(Argon2::default()
            .verify_password(material.as_bytes(), &parsed)
            .is_ok())
    }

    fn hash_material(&self, password: &str) -> StoreResult<String> {
        let pepper = self.install_pepper()?;
        Ok(format!("{password}{pepper}{HASH_VERSION_TAG}"))
    }

    /// Returns the installation pepper, generating and persisting it on
    /// first use. Regenerating would orphan every stored hash, so a failed
    /// read is an error here rather than a self-heal.
    fn install_pepper(&self) -> StoreResult<String> {
        if let Some(pepper) = self.backend.get(keys::PASSWORD_PEPPER)? {
            return Ok(pepper);
        }
        let mut bytes = [0u8; 16];
        OsRng.fill_bytes(&mut bytes);
        let pepper = BASE64.encode(bytes);
        self.backend.put(keys::PASSWORD_PEPPER, &pepper)?;
        Ok(pepper)
    }
}

fn avatar_url(username: &str) -> String {
    format!("https://api.dicebear.com/7.x/avataaars/svg?seed={username}")
}

/// Encodes session claims as base64 JSON. Opaque to the holder; there is no
/// signature, which suits a single-client credential.
fn issue_token(user_id: &str) -> StoreResult<String> {
    let issued_at = now_millis();
    let claims = TokenClaims {
        user_id: user_id.to_string(),
        issued_at,
        expires_at: issued_at + TOKEN_TTL_MS,
    };
    Ok(BASE64.encode(serde_json::to_string(&claims)?))
}

/// A token verifies when it decodes, names the companion user id, and has
/// not expired. Every failure mode reads as signed-out.
fn verify_token(token: &str, user_id: &str) -> bool {
    let bytes = match BASE64.decode(token) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let claims: TokenClaims = match serde_json::from_slice(&bytes) {
        Ok(claims) => claims,
        Err(_) => return false,
    };
    claims.user_id == user_id && claims.expires_at > now_millis()
}
