//! Configuration validation functions.

use super::Config;

/// Validate configuration fields that require more than a `serde(default)`.
///
/// Currently only checks the event store backend; kept as its own function
/// (rather than inlined into `loader::load`) so `main.rs` can call it again
/// and propagate a hard failure, while `load()` on its own only warns.
pub fn validate_config(config: &Config) -> anyhow::Result<()> {
    if let super::event_store::EventStoreConfig::Postgres { database_url, .. } =
        &config.event_store
    {
        if database_url.trim().is_empty() {
            anyhow::bail!("event_store.database_url must be set when backend = \"postgres\"");
        }
    }

    if config.room.mailbox_capacity == 0 {
        anyhow::bail!("room.mailbox_capacity must be greater than zero");
    }

    if is_production_mode() && matches!(config.event_store, super::event_store::EventStoreConfig::InMemory) {
        eprintln!(
            "\nWARNING: running in production mode with the in-memory event store.\n\
             All rooms and events are lost on restart; set event_store.backend = \"postgres\"\n\
             (and event_store.database_url) for durable storage.\n"
        );
    }

    Ok(())
}

/// Detect if we're running in production mode.
///
/// Checks `GRIMOIRE__ENVIRONMENT` or the generic `PRODUCTION` / `PROD`
/// environment variables.
fn is_production_mode() -> bool {
    use std::env;

    if let Ok(mode) = env::var("GRIMOIRE__ENVIRONMENT") {
        return mode.eq_ignore_ascii_case("production") || mode.eq_ignore_ascii_case("prod");
    }

    env::var("GRIMOIRE_PRODUCTION").is_ok()
        || env::var("PRODUCTION").is_ok()
        || env::var("PROD").is_ok()
}
