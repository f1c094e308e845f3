//! Authenticated API for the consolidated supplier master-data store.
//!
//! Every endpoint except login and health is guarded by a server-side,
//! PostgreSQL-backed session with sliding expiration and a per-user cap.

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod state;

pub mod models {
    pub mod session;
}

pub mod repositories {
    pub mod memory;
    pub mod session;
}

pub mod services {
    pub mod auth;
    pub mod sessions;
    pub mod sweeper;
}

pub mod handlers {
    pub mod admin;
    pub mod auth;
    pub mod health;
}

pub mod middleware_layer {
    pub mod auth;
}

pub mod validation {
    pub mod auth;
}
