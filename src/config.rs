use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

/// Scopes granted at login when `API_SCOPES` is not set.
pub const DEFAULT_SCOPES: &str =
    "mcp:tools:list,mcp:tools:call,mcp:resources:list,mcp:resources:read,sessions:admin";

/// Longest accepted idle timeout: one year.
pub const MAX_SESSION_TIMEOUT_MINUTES: i64 = 365 * 24 * 60;

/// The application's configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// The URL of the PostgreSQL database.
    pub database_url: String,
    /// The address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// Idle minutes after which a session is dead.
    pub session_timeout_minutes: i64,
    /// Cap on stored sessions per username, enforced at login.
    pub max_sessions_per_user: u32,
    /// Seconds between expiration sweeps.
    pub sweep_interval_secs: u64,
    /// Upper bound on a single storage call.
    pub db_timeout_secs: u64,
    /// Maximum size of the connection pool.
    pub db_pool_size: usize,
    /// The principal allowed to log in.
    pub api_username: String,
    /// Argon2 PHC hash of that principal's password.
    pub api_password_hash: String,
    /// Scopes attached to every session created at login.
    pub api_scopes: Vec<String>,
    /// Whether cookies are marked `Secure`.
    pub production: bool,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a `Config` from an arbitrary key lookup.
    ///
    /// # Arguments
    ///
    /// * `lookup` - Returns the raw value for a variable name, if set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let session_timeout_minutes: i64 = parse_or(&lookup, "SESSION_TIMEOUT_MINUTES", 30)?;
        if session_timeout_minutes <= 0 {
            anyhow::bail!("SESSION_TIMEOUT_MINUTES must be greater than zero");
        }
        if session_timeout_minutes > MAX_SESSION_TIMEOUT_MINUTES {
            anyhow::bail!(
                "SESSION_TIMEOUT_MINUTES must be at most {} (one year)",
                MAX_SESSION_TIMEOUT_MINUTES
            );
        }

        let max_sessions_per_user: u32 = parse_or(&lookup, "MAX_SESSIONS_PER_USER", 2)?;
        if max_sessions_per_user == 0 {
            anyhow::bail!("MAX_SESSIONS_PER_USER must be at least 1");
        }

        let sweep_interval_secs: u64 = parse_or(&lookup, "SESSION_SWEEP_INTERVAL_SECS", 3600)?;
        if sweep_interval_secs == 0 {
            anyhow::bail!("SESSION_SWEEP_INTERVAL_SECS must be greater than zero");
        }

        let api_scopes = lookup("API_SCOPES")
            .unwrap_or_else(|| DEFAULT_SCOPES.to_string())
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            database_url: lookup("DATABASE_URL").context("DATABASE_URL must be set")?,
            bind_addr: parse_or(&lookup, "BIND_ADDR", SocketAddr::from(([127, 0, 0, 1], 3000)))?,
            session_timeout_minutes,
            max_sessions_per_user,
            sweep_interval_secs,
            db_timeout_secs: parse_or(&lookup, "DB_TIMEOUT_SECS", 10)?,
            db_pool_size: parse_or(&lookup, "DB_POOL_SIZE", 16)?,
            api_username: lookup("API_USERNAME").context("API_USERNAME must be set")?,
            api_password_hash: lookup("API_PASSWORD_HASH")
                .context("API_PASSWORD_HASH must be set (an Argon2 PHC string)")?,
            api_scopes,
            production: lookup("APP_ENV").as_deref() == Some("production"),
        })
    }

    pub fn session_timeout(&self) -> chrono::Duration {
        chrono::TimeDelta::try_minutes(self.session_timeout_minutes)
            .unwrap_or(chrono::TimeDelta::MAX)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn db_timeout(&self) -> Duration {
        Duration::from_secs(self.db_timeout_secs)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}", key)),
        None => Ok(default),
    }
}
