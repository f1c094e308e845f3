use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use tokio_postgres::{error::SqlState, Row};

use crate::{
    error::{AppError, Result},
    models::session::{join_scopes, split_scopes, Session},
};

/// Single-table storage primitives the session manager is composed from.
///
/// Every method maps to one statement, or one short transaction, against the
/// sessions table. A missing table is reported as [`AppError::StoreMissing`]
/// so the caller can create it and retry.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Creates the table and its indexes if absent. Idempotent and safe to
    /// race.
    async fn ensure_store(&self) -> Result<()>;

    /// Drops the table and everything in it.
    async fn drop_store(&self) -> Result<()>;

    /// Inserts `session`, first evicting the owner's least recently active
    /// sessions so at most `max_per_user` remain afterwards. Ties are broken by
    /// lowest `session_id`. Concurrent calls for the same user are serialized.
    /// Returns the evicted ids.
    async fn insert_capped(&self, session: &Session, max_per_user: u64) -> Result<Vec<String>>;

    async fn find(&self, session_id: &str) -> Result<Option<Session>>;

    /// Moves `last_activity` forward to `at`. Returns `false` when the row no
    /// longer exists.
    async fn touch(&self, session_id: &str, at: DateTime<Utc>) -> Result<bool>;

    async fn delete(&self, session_id: &str) -> Result<bool>;

    async fn delete_for_user(&self, username: &str) -> Result<u64>;

    /// Deletes every session whose `last_activity` is strictly before `cutoff`.
    async fn delete_idle_since(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    /// Sessions ordered by `last_activity`, most recent first.
    async fn list(&self, username: Option<&str>) -> Result<Vec<Session>>;
}

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS user_sessions (
        session_id    TEXT PRIMARY KEY,
        username      TEXT NOT NULL,
        created_at    TIMESTAMPTZ NOT NULL,
        last_activity TIMESTAMPTZ NOT NULL,
        scopes        TEXT NOT NULL DEFAULT '',
        CHECK (last_activity >= created_at)
    )
"#;

const CREATE_USERNAME_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_user_sessions_username ON user_sessions (username)";

const CREATE_LAST_ACTIVITY_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_user_sessions_last_activity ON user_sessions (last_activity)";

/// PostgreSQL-backed [`SessionRepository`].
#[derive(Clone)]
pub struct PgSessionRepository {
    pool: Pool,
}

impl PgSessionRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

/// A helper function to map a `tokio_postgres::Row` to a `Session`.
fn row_to_session(row: &Row) -> Result<Session> {
    let scopes: String = row
        .try_get("scopes")
        .map_err(|_| AppError::MissingData("scopes".to_string()))?;

    Ok(Session {
        session_id: row.try_get("session_id").map_err(|_| AppError::MissingData("session_id".to_string()))?,
        username: row.try_get("username").map_err(|_| AppError::MissingData("username".to_string()))?,
        scopes: split_scopes(&scopes),
        created_at: row.try_get("created_at").map_err(|_| AppError::MissingData("created_at".to_string()))?,
        last_activity: row.try_get("last_activity").map_err(|_| AppError::MissingData("last_activity".to_string()))?,
    })
}

/// Concurrent `IF NOT EXISTS` DDL can still collide in the catalog; the
/// loser sees one of these codes while the object exists.
fn is_already_exists(e: &tokio_postgres::Error) -> bool {
    matches!(
        e.code(),
        Some(code) if *code == SqlState::DUPLICATE_TABLE
            || *code == SqlState::DUPLICATE_OBJECT
            || *code == SqlState::UNIQUE_VIOLATION
    )
}

#[async_trait]
impl SessionRepository for PgSessionRepository {
    async fn ensure_store(&self) -> Result<()> {
        let client = self.pool.get().await?;

        for statement in [CREATE_TABLE, CREATE_USERNAME_INDEX, CREATE_LAST_ACTIVITY_INDEX] {
            if let Err(e) = client.batch_execute(statement).await {
                if is_already_exists(&e) {
                    tracing::debug!("Session store object created concurrently: {}", e);
                    continue;
                }
                return Err(AppError::Database(e));
            }
        }

        Ok(())
    }

    async fn drop_store(&self) -> Result<()> {
        let client = self.pool.get().await?;
        client
            .batch_execute("DROP TABLE IF EXISTS user_sessions")
            .await
            .map_err(AppError::Database)?;
        Ok(())
    }

    async fn insert_capped(&self, session: &Session, max_per_user: u64) -> Result<Vec<String>> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        // Held until commit; serializes logins of one user across connections.
        let lock = tx
            .prepare_cached("SELECT pg_advisory_xact_lock(hashtext($1))")
            .await?;
        tx.execute(&lock, &[&session.username]).await?;

        let count = tx
            .prepare_cached("SELECT COUNT(*) AS total FROM user_sessions WHERE username = $1")
            .await?;
        let total: i64 = tx
            .query_one(&count, &[&session.username])
            .await?
            .try_get("total")
            .map_err(|_| AppError::MissingData("total".to_string()))?;
        let cap = i64::try_from(max_per_user).unwrap_or(i64::MAX);
        let excess = (total + 1 - cap).max(0);

        let mut evicted = Vec::new();
        if excess > 0 {
            let evict = tx
                .prepare_cached(
                    r#"
                    DELETE FROM user_sessions
                    WHERE session_id IN (
                        SELECT session_id
                        FROM user_sessions
                        WHERE username = $1
                        ORDER BY last_activity ASC, session_id ASC
                        LIMIT $2
                    )
                    RETURNING session_id
                    "#,
                )
                .await?;
            for row in tx.query(&evict, &[&session.username, &excess]).await? {
                evicted.push(
                    row.try_get("session_id")
                        .map_err(|_| AppError::MissingData("session_id".to_string()))?,
                );
            }
        }

        let insert = tx
            .prepare_cached(
                r#"
                INSERT INTO user_sessions (session_id, username, created_at, last_activity, scopes)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .await?;
        tx.execute(
            &insert,
            &[
                &session.session_id,
                &session.username,
                &session.created_at,
                &session.last_activity,
                &join_scopes(&session.scopes),
            ],
        )
        .await?;

        tx.commit().await?;
        Ok(evicted)
    }

    async fn find(&self, session_id: &str) -> Result<Option<Session>> {
        let client = self.pool.get().await?;
        let statement = client
            .prepare_cached(
                r#"
                SELECT session_id, username, created_at, last_activity, scopes
                FROM user_sessions
                WHERE session_id = $1
                "#,
            )
            .await?;
        let row = client.query_opt(&statement, &[&session_id]).await?;
        row.map(|r| row_to_session(&r)).transpose()
    }

    async fn touch(&self, session_id: &str, at: DateTime<Utc>) -> Result<bool> {
        let client = self.pool.get().await?;
        let statement = client
            .prepare_cached(
                r#"
                UPDATE user_sessions
                SET last_activity = GREATEST(last_activity, $2)
                WHERE session_id = $1
                "#,
            )
            .await?;
        let updated = client.execute(&statement, &[&session_id, &at]).await?;
        Ok(updated > 0)
    }

    async fn delete(&self, session_id: &str) -> Result<bool> {
        let client = self.pool.get().await?;
        let statement = client
            .prepare_cached("DELETE FROM user_sessions WHERE session_id = $1")
            .await?;
        let deleted = client.execute(&statement, &[&session_id]).await?;
        Ok(deleted > 0)
    }

    async fn delete_for_user(&self, username: &str) -> Result<u64> {
        let client = self.pool.get().await?;
        let statement = client
            .prepare_cached("DELETE FROM user_sessions WHERE username = $1")
            .await?;
        Ok(client.execute(&statement, &[&username]).await?)
    }

    async fn delete_idle_since(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let client = self.pool.get().await?;
        let statement = client
            .prepare_cached("DELETE FROM user_sessions WHERE last_activity < $1")
            .await?;
        Ok(client.execute(&statement, &[&cutoff]).await?)
    }

    async fn list(&self, username: Option<&str>) -> Result<Vec<Session>> {
        let client = self.pool.get().await?;
        let rows = match username {
            Some(username) => {
                let statement = client
                    .prepare_cached(
                        r#"
                        SELECT session_id, username, created_at, last_activity, scopes
                        FROM user_sessions
                        WHERE username = $1
                        ORDER BY last_activity DESC, session_id ASC
                        "#,
                    )
                    .await?;
                client.query(&statement, &[&username]).await?
            }
            None => {
                let statement = client
                    .prepare_cached(
                        r#"
                        SELECT session_id, username, created_at, last_activity, scopes
                        FROM user_sessions
                        ORDER BY last_activity DESC, session_id ASC
                        "#,
                    )
                    .await?;
                client.query(&statement, &[]).await?
            }
        };
        rows.iter().map(row_to_session).collect()
    }
}
