#![allow(dead_code)]

use std::collections::HashMap;
use std::future::pending;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Algorithm, Argon2, Params, Version,
};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{DateTime, TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use vendor_sync_api::{
    clock::Clock,
    config::Config,
    error::{AppError, Result},
    models::session::Session,
    repositories::{memory::MemorySessionRepository, session::SessionRepository},
    routes::build_router,
    services::sessions::{SessionManager, SessionPolicy},
    state::{policy_for, AppState},
};

pub const USERNAME: &str = "integrator";
pub const PASSWORD: &str = "correct horse battery staple";

/// A clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

pub fn minutes(n: i64) -> chrono::Duration {
    chrono::Duration::minutes(n)
}

pub fn scopes(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn policy(max_sessions_per_user: u32) -> SessionPolicy {
    SessionPolicy {
        max_sessions_per_user,
        op_timeout: Duration::from_secs(5),
    }
}

/// Manager over a fresh in-memory store (table not yet created) and a manual
/// clock starting at [`t0`].
pub fn memory_manager(max_sessions_per_user: u32) -> (SessionManager, Arc<ManualClock>, MemorySessionRepository) {
    let repo = MemorySessionRepository::new();
    let clock = Arc::new(ManualClock::new(t0()));
    let manager = SessionManager::with_clock(
        Arc::new(repo.clone()),
        clock.clone(),
        policy(max_sessions_per_user),
    );
    (manager, clock, repo)
}

/// Cheap Argon2 parameters keep the suite fast; verification reads the
/// parameters back out of the hash.
pub fn password_hash() -> String {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| {
        let params = Params::new(1024, 1, 1, None).unwrap();
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let salt = SaltString::encode_b64(b"fixed-test-salt!").unwrap();
        argon2
            .hash_password(PASSWORD.as_bytes(), &salt)
            .unwrap()
            .to_string()
    })
    .clone()
}

pub fn test_config(overrides: &[(&str, &str)]) -> Config {
    let hash = password_hash();
    let mut vars: HashMap<String, String> = HashMap::from([
        ("DATABASE_URL".to_string(), "postgres://unused/sessions".to_string()),
        ("API_USERNAME".to_string(), USERNAME.to_string()),
        ("API_PASSWORD_HASH".to_string(), hash),
        ("DB_TIMEOUT_SECS".to_string(), "5".to_string()),
    ]);
    for (k, v) in overrides {
        vars.insert(k.to_string(), v.to_string());
    }
    Config::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

/// The router over an in-memory store, plus the clock driving it.
pub fn memory_app(config: &Config) -> (Router, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(t0()));
    let manager = SessionManager::with_clock(
        Arc::new(MemorySessionRepository::new()),
        clock.clone(),
        policy_for(config),
    );
    (build_router(AppState::from_manager(config, manager)), clock)
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

pub fn login_request(username: &str, password: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::json!({ "username": username, "password": password }).to_string(),
        ))
        .unwrap()
}

pub fn authed(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

/// Logs in with the configured credentials and returns the token.
pub async fn login(app: &Router) -> String {
    let (status, body) = send(app, login_request(USERNAME, PASSWORD)).await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    body["access_token"].as_str().unwrap().to_string()
}

/// A store that never answers.
pub struct StalledRepository;

#[async_trait]
impl SessionRepository for StalledRepository {
    async fn ensure_store(&self) -> Result<()> {
        pending().await
    }
    async fn drop_store(&self) -> Result<()> {
        pending().await
    }
    async fn insert_capped(&self, _session: &Session, _max_per_user: u64) -> Result<Vec<String>> {
        pending().await
    }
    async fn find(&self, _session_id: &str) -> Result<Option<Session>> {
        pending().await
    }
    async fn touch(&self, _session_id: &str, _at: DateTime<Utc>) -> Result<bool> {
        pending().await
    }
    async fn delete(&self, _session_id: &str) -> Result<bool> {
        pending().await
    }
    async fn delete_for_user(&self, _username: &str) -> Result<u64> {
        pending().await
    }
    async fn delete_idle_since(&self, _cutoff: DateTime<Utc>) -> Result<u64> {
        pending().await
    }
    async fn list(&self, _username: Option<&str>) -> Result<Vec<Session>> {
        pending().await
    }
}

/// A store whose table can never be created. Counts creation attempts.
#[derive(Default)]
pub struct UncreatableRepository {
    pub ensure_calls: AtomicUsize,
}

impl UncreatableRepository {
    pub fn ensure_calls(&self) -> usize {
        self.ensure_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionRepository for UncreatableRepository {
    async fn ensure_store(&self) -> Result<()> {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    async fn drop_store(&self) -> Result<()> {
        Ok(())
    }
    async fn insert_capped(&self, _session: &Session, _max_per_user: u64) -> Result<Vec<String>> {
        Err(AppError::StoreMissing)
    }
    async fn find(&self, _session_id: &str) -> Result<Option<Session>> {
        Err(AppError::StoreMissing)
    }
    async fn touch(&self, _session_id: &str, _at: DateTime<Utc>) -> Result<bool> {
        Err(AppError::StoreMissing)
    }
    async fn delete(&self, _session_id: &str) -> Result<bool> {
        Err(AppError::StoreMissing)
    }
    async fn delete_for_user(&self, _username: &str) -> Result<u64> {
        Err(AppError::StoreMissing)
    }
    async fn delete_idle_since(&self, _cutoff: DateTime<Utc>) -> Result<u64> {
        Err(AppError::StoreMissing)
    }
    async fn list(&self, _username: Option<&str>) -> Result<Vec<Session>> {
        Err(AppError::StoreMissing)
    }
}

/// A store whose table is always missing and which answers only after
/// `delay`, creation included.
pub struct SluggishMissingRepository {
    pub delay: Duration,
}

impl SluggishMissingRepository {
    async fn missing<T>(&self) -> Result<T> {
        tokio::time::sleep(self.delay).await;
        Err(AppError::StoreMissing)
    }
}

#[async_trait]
impl SessionRepository for SluggishMissingRepository {
    async fn ensure_store(&self) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
    async fn drop_store(&self) -> Result<()> {
        Ok(())
    }
    async fn insert_capped(&self, _session: &Session, _max_per_user: u64) -> Result<Vec<String>> {
        self.missing().await
    }
    async fn find(&self, _session_id: &str) -> Result<Option<Session>> {
        self.missing().await
    }
    async fn touch(&self, _session_id: &str, _at: DateTime<Utc>) -> Result<bool> {
        self.missing().await
    }
    async fn delete(&self, _session_id: &str) -> Result<bool> {
        self.missing().await
    }
    async fn delete_for_user(&self, _username: &str) -> Result<u64> {
        self.missing().await
    }
    async fn delete_idle_since(&self, _cutoff: DateTime<Utc>) -> Result<u64> {
        self.missing().await
    }
    async fn list(&self, _username: Option<&str>) -> Result<Vec<Session>> {
        self.missing().await
    }
}

/// An empty store whose sweeps take `delay` and record when they start and
/// finish.
pub struct SlowSweepRepository {
    pub delay: Duration,
    pub started: AtomicBool,
    pub finished: AtomicBool,
}

impl SlowSweepRepository {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            started: AtomicBool::new(false),
            finished: AtomicBool::new(false),
        }
    }

    pub fn started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionRepository for SlowSweepRepository {
    async fn ensure_store(&self) -> Result<()> {
        Ok(())
    }
    async fn drop_store(&self) -> Result<()> {
        Ok(())
    }
    async fn insert_capped(&self, _session: &Session, _max_per_user: u64) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
    async fn find(&self, _session_id: &str) -> Result<Option<Session>> {
        Ok(None)
    }
    async fn touch(&self, _session_id: &str, _at: DateTime<Utc>) -> Result<bool> {
        Ok(false)
    }
    async fn delete(&self, _session_id: &str) -> Result<bool> {
        Ok(false)
    }
    async fn delete_for_user(&self, _username: &str) -> Result<u64> {
        Ok(0)
    }
    async fn delete_idle_since(&self, _cutoff: DateTime<Utc>) -> Result<u64> {
        self.started.store(true, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.finished.store(true, Ordering::SeqCst);
        Ok(0)
    }
    async fn list(&self, _username: Option<&str>) -> Result<Vec<Session>> {
        Ok(Vec::new())
    }
}
