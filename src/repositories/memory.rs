use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::{
    error::{AppError, Result},
    models::session::Session,
    repositories::session::SessionRepository,
};

/// In-process [`SessionRepository`] with the same semantics as the
/// PostgreSQL one, including a table that is absent until
/// [`SessionRepository::ensure_store`] runs.
///
/// State is private to one process, so this only suits tests and
/// single-instance experiments.
#[derive(Clone, Default)]
pub struct MemorySessionRepository {
    table: Arc<Mutex<Option<HashMap<String, Session>>>>,
}

impl MemorySessionRepository {
    /// Creates a repository whose table does not exist yet.
    pub fn new() -> Self {
        Self::default()
    }
}

fn table_mut(
    table: &mut Option<HashMap<String, Session>>,
) -> Result<&mut HashMap<String, Session>> {
    table.as_mut().ok_or(AppError::StoreMissing)
}

fn by_recency(a: &Session, b: &Session) -> std::cmp::Ordering {
    b.last_activity
        .cmp(&a.last_activity)
        .then_with(|| a.session_id.cmp(&b.session_id))
}

#[async_trait]
impl SessionRepository for MemorySessionRepository {
    async fn ensure_store(&self) -> Result<()> {
        self.table.lock().await.get_or_insert_with(HashMap::new);
        Ok(())
    }

    async fn drop_store(&self) -> Result<()> {
        *self.table.lock().await = None;
        Ok(())
    }

    async fn insert_capped(&self, session: &Session, max_per_user: u64) -> Result<Vec<String>> {
        let mut guard = self.table.lock().await;
        let table = table_mut(&mut guard)?;
        if table.contains_key(&session.session_id) {
            return Err(AppError::Internal(format!(
                "duplicate session id {}",
                session.session_id
            )));
        }

        let mut owned: Vec<&Session> = table
            .values()
            .filter(|s| s.username == session.username)
            .collect();
        owned.sort_by(|a, b| {
            a.last_activity
                .cmp(&b.last_activity)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        let excess = (owned.len() as u64 + 1).saturating_sub(max_per_user) as usize;
        let evicted: Vec<String> = owned
            .into_iter()
            .take(excess)
            .map(|s| s.session_id.clone())
            .collect();

        for session_id in &evicted {
            table.remove(session_id);
        }
        table.insert(session.session_id.clone(), session.clone());
        Ok(evicted)
    }

    async fn find(&self, session_id: &str) -> Result<Option<Session>> {
        let mut guard = self.table.lock().await;
        Ok(table_mut(&mut guard)?.get(session_id).cloned())
    }

    async fn touch(&self, session_id: &str, at: DateTime<Utc>) -> Result<bool> {
        let mut guard = self.table.lock().await;
        match table_mut(&mut guard)?.get_mut(session_id) {
            Some(session) => {
                session.last_activity = session.last_activity.max(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, session_id: &str) -> Result<bool> {
        let mut guard = self.table.lock().await;
        Ok(table_mut(&mut guard)?.remove(session_id).is_some())
    }

    async fn delete_for_user(&self, username: &str) -> Result<u64> {
        let mut guard = self.table.lock().await;
        let table = table_mut(&mut guard)?;
        let before = table.len();
        table.retain(|_, s| s.username != username);
        Ok((before - table.len()) as u64)
    }

    async fn delete_idle_since(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut guard = self.table.lock().await;
        let table = table_mut(&mut guard)?;
        let before = table.len();
        table.retain(|_, s| s.last_activity >= cutoff);
        Ok((before - table.len()) as u64)
    }

    async fn list(&self, username: Option<&str>) -> Result<Vec<Session>> {
        let mut guard = self.table.lock().await;
        let table = table_mut(&mut guard)?;
        let mut sessions: Vec<Session> = table
            .values()
            .filter(|s| username.is_none_or(|u| s.username == u))
            .cloned()
            .collect();
        sessions.sort_by(by_recency);
        Ok(sessions)
    }
}
