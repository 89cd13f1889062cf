#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::too_many_arguments,
    clippy::too_many_lines,
    clippy::similar_names
)]

//! # Grimoire Core
//!
//! The event-sourced room core for a hidden-information social-deduction
//! game server: a single-writer room actor per room, an append-only event
//! store with idempotent command dedup, an in-memory state reducer with
//! snapshotting, a viewer-projection filter, and realtime subscription
//! fan-out with resync.
//!
//! HTTP routing/authentication, the LLM-driven storyteller agent, and the
//! domain-specific game rule table are out of scope — the core consumes a
//! pluggable [`rule_engine::RuleEngine`] for the latter and a thin
//! [`transport`] adapter stands in for the former.

/// Server/room-actor/event-store/logging configuration.
pub mod config;

/// The minimal, demonstration rule engine used by tests and the default binary.
pub mod demo_rules;

/// Room membership/lifecycle lookups the transport layer authorizes against.
pub mod directory;

/// Error kinds the core produces or propagates to a command submitter.
pub mod error;

/// The durable, append-only event log: sequence allocation, dedup, snapshots.
pub mod event_store;

/// Structured logging initialization.
pub mod logging;

/// Core data model: command envelope, events, dedup records, snapshots, viewers.
pub mod model;

/// The visibility projection filter.
pub mod projection;

/// Off-actor reads: reconstruct and project a room's state from the durable log.
pub mod read_model;

/// Folds a `RuleEngine` over a slice of events in sequence order.
pub mod reducer;

/// The single-writer room actor.
pub mod room_actor;

/// The process-wide room registry.
pub mod room_registry;

/// The rule-engine injection boundary.
pub mod rule_engine;

/// The axum WebSocket transport adapter implementing the subscribe/command protocol.
pub mod transport;

/// Wire message shapes exchanged with a client socket.
pub mod wire;
