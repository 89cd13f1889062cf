//! The thin helper that folds a `RuleEngine` over a slice of events in
//! sequence order. Used both by the room actor's optimistic next-state
//! projection and by its recovery-time replay, so the two paths can't
//! drift apart.

use crate::model::Event;
use crate::rule_engine::RuleEngine;

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("event out of order: expected seq > {expected_after}, got {actual}")]
    OutOfOrder { expected_after: u64, actual: u64 },
}

/// Fold `events` (must be in strictly ascending `seq` order, each greater
/// than `state`'s current `last_seq`) over `state` using `engine.reduce`.
pub fn apply_history<R: RuleEngine>(
    engine: &R,
    mut state: R::State,
    events: &[Event],
    mut last_seq: u64,
) -> Result<R::State, ReplayError> {
    for event in events {
        if event.seq <= last_seq {
            return Err(ReplayError::OutOfOrder {
                expected_after: last_seq,
                actual: event.seq,
            });
        }
        state = engine.reduce(&state, event);
        last_seq = event.seq;
    }
    Ok(state)
}
