//! Formforge Daemon Library
//!
//! This library exposes the daemon's API, configuration and background tasks
//! for testing and embedding.

pub mod api;
pub mod config;
pub mod reaper;

pub use api::{ApiState, ServerHandle, start_server};
pub use config::{DaemonConfig, load_config};
pub use reaper::{reap_expired_sessions, spawn_session_reaper};
