//! Session Module
//!
//! Owns the access token and user identity, restores them from the
//! credential store on startup, and verifies them against the backend
//! before any protected view is entered.

mod store;

pub use store::{CredentialStore, FileCredentialStore, ACCESS_TOKEN_KEY, USER_KEY};

#[cfg(test)]
pub use store::MemoryCredentialStore;

use std::time::Duration;

use crate::app::Route;
use crate::error::StorageError;
use crate::http::{Backend, User};

/// Username recorded when the backend does not echo a user on login
const UNKNOWN_USER: &str = "unknown";

/// Authentication state of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Credentials not yet read from storage
    Unverified,
    /// Stored credentials are being checked with the backend
    Verifying,
    /// Token and user are present and accepted by the backend
    Valid,
    /// No usable credentials; terminal until the next login
    Invalid,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Unverified => "unverified",
            SessionStatus::Verifying => "verifying",
            SessionStatus::Valid => "valid",
            SessionStatus::Invalid => "invalid",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authenticated identity
///
/// `Valid` implies token and user are both present; `Invalid` implies both
/// are absent.
#[derive(Debug, Clone)]
pub struct Session {
    token: Option<String>,
    user: Option<User>,
    status: SessionStatus,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            token: None,
            user: None,
            status: SessionStatus::Unverified,
        }
    }
}

impl Session {
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }
}

/// Owns the [`Session`] and its persisted credentials
pub struct SessionManager {
    store: Box<dyn CredentialStore>,
    session: Session,
    verify_timeout: Duration,
}

impl SessionManager {
    pub fn new(store: Box<dyn CredentialStore>, verify_timeout: Duration) -> Self {
        Self {
            store,
            session: Session::default(),
            verify_timeout,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status()
    }

    pub fn token(&self) -> Option<&str> {
        self.session.token()
    }

    pub fn user(&self) -> Option<&User> {
        self.session.user()
    }

    /// Restore credentials from storage and verify them with the backend
    ///
    /// Missing, malformed or rejected credentials are purged and leave the
    /// session `Invalid`. A verification that outlives the timeout counts
    /// as rejected.
    pub async fn initialize(&mut self, backend: &dyn Backend) -> SessionStatus {
        let token = self.stored_token();
        let user = self.stored_user();

        let (token, user) = match (token, user) {
            (Some(token), Some(user)) => (token, user),
            _ => {
                tracing::debug!("No stored session, credentials cleared");
                self.invalidate();
                return self.session.status;
            }
        };

        self.session = Session {
            token: Some(token),
            user: Some(user),
            status: SessionStatus::Verifying,
        };

        if self.verify(backend).await {
            self.session.status = SessionStatus::Valid;
            tracing::info!(
                username = self.user().map(|u| u.username.as_str()).unwrap_or_default(),
                "Session restored"
            );
        } else {
            tracing::info!("Stored session rejected, credentials cleared");
            self.invalidate();
        }

        self.session.status
    }

    /// Ask the backend whether the current token is still accepted
    ///
    /// Never fails: any transport error, rejection, malformed reply or
    /// timeout yields `false`.
    pub async fn verify(&self, backend: &dyn Backend) -> bool {
        let Some(token) = self.session.token() else {
            return false;
        };

        match tokio::time::timeout(self.verify_timeout, backend.protected(token)).await {
            Ok(Ok(identity)) => {
                if let Some(message) = &identity.message {
                    tracing::debug!(message = %message, "Token accepted by backend");
                }
                identity
                    .username
                    .as_deref()
                    .map(|name| !name.is_empty())
                    .unwrap_or(false)
            }
            Ok(Err(e)) => {
                tracing::warn!("Token verification failed: {}", e);
                false
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.verify_timeout.as_millis() as u64,
                    "Token verification timed out"
                );
                false
            }
        }
    }

    /// Record a fresh login
    ///
    /// Repeating the same login leaves the same state behind.
    pub fn login(&mut self, token: &str, user: Option<User>) -> Result<(), StorageError> {
        let user = user.unwrap_or_else(|| User::new(UNKNOWN_USER));
        let encoded = serde_json::to_string(&user).map_err(|e| StorageError::WriteError {
            path: USER_KEY.to_string(),
            source: e.into(),
        })?;

        self.store.set(ACCESS_TOKEN_KEY, token)?;
        self.store.set(USER_KEY, &encoded)?;

        tracing::info!(username = %user.username, "Logged in");
        self.session = Session {
            token: Some(token.to_string()),
            user: Some(user),
            status: SessionStatus::Valid,
        };
        Ok(())
    }

    /// Drop the session and return to the login entry point
    pub fn logout(&mut self) -> Route {
        self.invalidate();
        tracing::info!("Logged out");
        Route::Login
    }

    fn invalidate(&mut self) {
        for key in [ACCESS_TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.store.remove(key) {
                tracing::warn!("Failed to purge '{}': {}", key, e);
            }
        }
        self.session = Session {
            token: None,
            user: None,
            status: SessionStatus::Invalid,
        };
    }

    fn stored_token(&self) -> Option<String> {
        match self.store.get(ACCESS_TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                tracing::warn!("Failed to read stored token: {}", e);
                None
            }
        }
    }

    /// Stored user, treating the literal `undefined` and bad JSON as absent
    fn stored_user(&mut self) -> Option<User> {
        let raw = match self.store.get(USER_KEY) {
            Ok(Some(raw)) if !raw.is_empty() && raw != "undefined" => raw,
            Ok(_) => return None,
            Err(e) => {
                tracing::warn!("Failed to read stored user: {}", e);
                return None;
            }
        };

        match serde_json::from_str::<User>(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!("Stored user is malformed: {}", e);
                if let Err(e) = self.store.remove(USER_KEY) {
                    tracing::warn!("Failed to purge '{}': {}", USER_KEY, e);
                }
                None
            }
        }
    }
}
