//! Default value functions for configuration fields.
//!
//! Organized by category for easier maintenance, matching serde's
//! `#[serde(default = ...)]` usage throughout the configuration types.

use super::logging::LogFormat;

// =============================================================================
// Root / transport defaults
// =============================================================================

pub fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

pub const fn default_port() -> u16 {
    7777
}

// =============================================================================
// Room actor defaults
// =============================================================================

/// Mailbox capacity for a room actor's command channel.
pub const fn default_mailbox_capacity() -> usize {
    256
}

/// Per-subscriber bounded channel capacity for projected event delivery.
pub const fn default_subscriber_buffer_size() -> usize {
    64
}

/// Take a snapshot every `snapshot_interval` events (0 disables snapshotting).
pub const fn default_snapshot_interval() -> u64 {
    50
}

/// How long a room actor may sit with no subscribers and no commands before
/// the registry retires it.
pub const fn default_idle_timeout_secs() -> u64 {
    1800
}

// =============================================================================
// Event store defaults
// =============================================================================

pub const fn default_postgres_max_connections() -> u32 {
    10
}

// =============================================================================
// Logging defaults
// =============================================================================

pub fn default_log_dir() -> String {
    "logs".to_string()
}

pub fn default_log_filename() -> String {
    "grimoire-server.log".to_string()
}

pub fn default_rotation() -> String {
    "daily".to_string()
}

pub const fn default_enable_file_logging() -> bool {
    true
}

pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}
