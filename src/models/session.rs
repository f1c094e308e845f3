use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Separator used when scopes are persisted as a single column.
pub const SCOPE_SEPARATOR: char = ',';

/// A stored session record.
///
/// `session_id` doubles as the bearer token handed to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque token, primary key.
    pub session_id: String,
    /// The principal owning this session.
    pub username: String,
    /// Permissions granted at login, in grant order.
    pub scopes: Vec<String>,
    /// Set once at creation.
    pub created_at: DateTime<Utc>,
    /// Bumped on every successful validation.
    pub last_activity: DateTime<Utc>,
}

impl Session {
    /// Whether the session has been idle for longer than `timeout` at `now`.
    ///
    /// A session idle for exactly `timeout` is still live. A deadline past the
    /// representable range never arrives.
    pub fn is_expired(&self, now: DateTime<Utc>, timeout: chrono::Duration) -> bool {
        self.last_activity
            .checked_add_signed(timeout)
            .is_some_and(|expires_at| now > expires_at)
    }

    pub fn identity(&self) -> SessionIdentity {
        SessionIdentity {
            username: self.username.clone(),
            scopes: self.scopes.clone(),
            session_id: self.session_id.clone(),
        }
    }
}

/// The identity a validated token resolves to.
///
/// Inserted into request extensions by the auth middleware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub username: String,
    pub scopes: Vec<String>,
    pub session_id: String,
}

impl SessionIdentity {
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    /// Fails with `Forbidden` unless the session carries `scope`.
    pub fn require_scope(&self, scope: &str) -> crate::error::Result<()> {
        if self.has_scope(scope) {
            Ok(())
        } else {
            Err(crate::error::AppError::Forbidden(scope.to_string()))
        }
    }
}

/// Encodes scopes for the `scopes` column.
pub fn join_scopes(scopes: &[String]) -> String {
    scopes.join(&SCOPE_SEPARATOR.to_string())
}

/// Decodes the `scopes` column. An empty column means no scopes.
pub fn split_scopes(raw: &str) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split(SCOPE_SEPARATOR).map(str::to_string).collect()
}
