//! Configuration management for rally
//!
//! Supports dual-location configuration:
//! - User-level: ~/.rally/rally.toml
//! - Project-level: ./.rally/rally.toml
//!
//! Project-level config overrides user-level config, and `RALLY_URL` /
//! `RALLY_ANON_KEY` override both.

mod loader;
mod schema;

pub use loader::ConfigLoader;
pub use schema::{
    BackendConfig, FeedConfig, HttpConfig, IdentityConfig, LoggingConfig, RallyConfig,
    RealtimeConfig,
};
