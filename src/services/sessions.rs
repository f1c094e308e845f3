//! Database-backed session lifecycle.
//!
//! The manager holds no session state of its own: every decision is made
//! against the shared sessions table, so several server replicas can use the
//! same store. Storage errors are never folded into "invalid session"; they
//! propagate as infrastructure failures and the caller decides what to do.

use std::{future::Future, sync::Arc, time::Duration};

use uuid::Uuid;

use crate::{
    clock::{Clock, SystemClock},
    error::{AppError, Result},
    models::session::{Session, SessionIdentity},
    repositories::session::SessionRepository,
    validation::auth::{validate_scopes, validate_username},
};

/// Creation-time limits and the bound on each storage call.
#[derive(Debug, Clone, Copy)]
pub struct SessionPolicy {
    /// Sessions a single username may hold after a login completes.
    pub max_sessions_per_user: u32,
    /// Bound applied to every storage call.
    pub op_timeout: Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            max_sessions_per_user: 2,
            op_timeout: Duration::from_secs(10),
        }
    }
}

/// Creates, validates, renews and removes sessions.
#[derive(Clone)]
pub struct SessionManager {
    repo: Arc<dyn SessionRepository>,
    clock: Arc<dyn Clock>,
    policy: SessionPolicy,
}

impl SessionManager {
    pub fn new(repo: Arc<dyn SessionRepository>, policy: SessionPolicy) -> Self {
        Self::with_clock(repo, Arc::new(SystemClock), policy)
    }

    pub fn with_clock(
        repo: Arc<dyn SessionRepository>,
        clock: Arc<dyn Clock>,
        policy: SessionPolicy,
    ) -> Self {
        Self { repo, clock, policy }
    }

    pub fn policy(&self) -> SessionPolicy {
        self.policy
    }

    /// Guarantees the sessions table and its indexes exist.
    pub async fn ensure_store(&self) -> Result<()> {
        self.bounded(self.repo.ensure_store()).await
    }

    /// Drops the sessions table. Later calls recreate it on first use.
    pub async fn reset_store(&self) -> Result<()> {
        self.bounded(self.repo.drop_store()).await?;
        tracing::warn!("🗑️ Session store dropped");
        Ok(())
    }

    /// Creates a session for `username` and returns its token.
    ///
    /// If the user already holds `max_sessions_per_user` sessions, the one with
    /// the oldest `last_activity` is deleted first, in the same unit of work as
    /// the insert. The evicted holder is not notified; their next validation
    /// simply fails.
    ///
    /// # Arguments
    ///
    /// * `username` - The principal the session belongs to.
    /// * `scopes` - Permissions granted for the life of the session.
    ///
    /// # Returns
    ///
    /// A `Result` containing the new session id.
    pub async fn create(&self, username: &str, scopes: &[String]) -> Result<String> {
        validate_username(username)?;
        let scopes = validate_scopes(scopes)?;
        let max_sessions = u64::from(self.policy.max_sessions_per_user);

        let now = self.clock.now();
        let session = Session {
            session_id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            scopes,
            created_at: now,
            last_activity: now,
        };
        let session_ref = &session;
        let evicted = self
            .on_store(move || self.repo.insert_capped(session_ref, max_sessions))
            .await?;

        for session_id in &evicted {
            tracing::info!(
                "♻️ Evicted session {} for user {} (limit {})",
                session_id,
                username,
                max_sessions
            );
        }

        tracing::info!("✅ Session created for user: {}", username);
        Ok(session.session_id)
    }

    /// Resolves a token to its identity and slides its expiration forward.
    ///
    /// Returns `Ok(None)` when the token is unknown or has been idle for longer
    /// than `timeout`; an expired row is deleted on the way out. `Err` means
    /// validity could not be determined.
    pub async fn validate_and_renew(
        &self,
        session_id: &str,
        timeout: chrono::Duration,
    ) -> Result<Option<SessionIdentity>> {
        let Some(session) = self.on_store(move || self.repo.find(session_id)).await? else {
            tracing::debug!("Unknown session token");
            return Ok(None);
        };

        let now = self.clock.now();
        if session.is_expired(now, timeout) {
            self.on_store(move || self.repo.delete(session_id)).await?;
            tracing::info!(
                "⌛ Session expired for user {} (idle since {})",
                session.username,
                session.last_activity
            );
            return Ok(None);
        }

        if !self.on_store(move || self.repo.touch(session_id, now)).await? {
            tracing::debug!("Session removed while renewing");
            return Ok(None);
        }

        Ok(Some(session.identity()))
    }

    /// Deletes one session. Returns whether it existed.
    pub async fn invalidate(&self, session_id: &str) -> Result<bool> {
        let deleted = self.on_store(move || self.repo.delete(session_id)).await?;
        if deleted {
            tracing::info!("👋 Session invalidated");
        }
        Ok(deleted)
    }

    /// Deletes every session of `username`. Returns how many were removed.
    pub async fn invalidate_all(&self, username: &str) -> Result<u64> {
        let deleted = self
            .on_store(move || self.repo.delete_for_user(username))
            .await?;
        tracing::info!("👋 Invalidated {} session(s) for user: {}", deleted, username);
        Ok(deleted)
    }

    /// Lists sessions, most recently active first. `None` lists every user.
    pub async fn list_sessions(&self, username: Option<&str>) -> Result<Vec<Session>> {
        self.on_store(move || self.repo.list(username)).await
    }

    /// Deletes every session idle for longer than `timeout`.
    pub async fn sweep_expired(&self, timeout: chrono::Duration) -> Result<u64> {
        let Some(cutoff) = self.clock.now().checked_sub_signed(timeout) else {
            tracing::debug!("Sweep cutoff out of range, nothing to sweep");
            return Ok(0);
        };
        let removed = self
            .on_store(move || self.repo.delete_idle_since(cutoff))
            .await?;
        tracing::debug!("Swept {} expired session(s)", removed);
        Ok(removed)
    }

    /// Runs `op` against the table, recreating the table and retrying once if
    /// it turns out to be missing. The whole sequence shares one time budget.
    async fn on_store<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.bounded(async {
            match op().await {
                Err(AppError::StoreMissing) => {
                    tracing::warn!("⚠️ Session store missing, creating it");
                    self.repo.ensure_store().await?;
                    op().await
                }
                other => other,
            }
        })
        .await
    }

    async fn bounded<T, Fut>(&self, fut: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.policy.op_timeout, fut)
            .await
            .map_err(|_| AppError::Timeout(self.policy.op_timeout))?
    }
}
