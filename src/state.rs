use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::repositories::session::PgSessionRepository;
use crate::services::sessions::{SessionManager, SessionPolicy};

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration.
    pub config: Config,
    /// The session lifecycle manager.
    pub sessions: SessionManager,
}

impl AppState {
    /// Creates a new `AppState` backed by PostgreSQL.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `AppState`.
    pub async fn new(config: &Config) -> Result<Self> {
        let db = crate::db::create_pool(
            &config.database_url,
            config.db_pool_size,
            config.db_timeout(),
        )?;
        tracing::info!("✅ PostgreSQL Pool initialized with deadpool-postgres");

        let state = Self::from_manager(
            config,
            SessionManager::new(Arc::new(PgSessionRepository::new(db)), policy_for(config)),
        );

        match state.sessions.ensure_store().await {
            Ok(()) => tracing::info!("✅ Session store ready"),
            // Not fatal: the table is created lazily on first use.
            Err(e) => tracing::warn!("⚠️ Could not prepare session store at startup: {}", e),
        }

        Ok(state)
    }

    pub fn from_manager(config: &Config, sessions: SessionManager) -> Self {
        AppState {
            config: config.clone(),
            sessions,
        }
    }
}

/// The manager limits derived from configuration.
pub fn policy_for(config: &Config) -> SessionPolicy {
    SessionPolicy {
        max_sessions_per_user: config.max_sessions_per_user,
        op_timeout: config.db_timeout(),
    }
}
