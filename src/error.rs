//! Error kinds the core produces or propagates to a command submitter.
//! `Duplicate` is deliberately not a variant here — a dedup hit is a
//! success surface (`CommandResult::Duplicate`), not an error.

use thiserror::Error;

use crate::event_store::EventStoreError;

/// A small, focused `thiserror` enum per concern rather than one global
/// error type.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("authorization failed: {0}")]
    Authorization(String),
    #[error("rule violation [{code}]: {message}")]
    RuleViolation { code: String, message: String },
    #[error("storage error: {0}")]
    Storage(#[from] EventStoreError),
    #[error("internal error: {0}")]
    Internal(String),
}
