//! Outcome types crossing the rule-engine boundary and returned to submitters.

use serde::{Deserialize, Serialize};

use super::event::NewEvent;

/// Outcome of dispatching one command, returned to the submitting client.
///
/// `Duplicate` is a success surface (a dedup hit), returned with the cached
/// result rather than as an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommandResult {
    Accepted {
        applied_seq_from: u64,
        applied_seq_to: u64,
        data: serde_json::Value,
    },
    Rejected {
        code: String,
        message: String,
    },
    Duplicate {
        applied_seq_from: u64,
        applied_seq_to: u64,
        data: serde_json::Value,
    },
}

/// What a rule engine returns from `handle_command` on the accepting path:
/// the events to persist plus whatever result payload goes back to the caller.
#[derive(Debug, Clone)]
pub struct HandledCommand {
    pub events: Vec<NewEvent>,
    pub result_data: serde_json::Value,
}

/// What a rule engine returns from `handle_command` on the rejecting path.
#[derive(Debug, Clone)]
pub struct Rejection {
    pub code: String,
    pub message: String,
}
