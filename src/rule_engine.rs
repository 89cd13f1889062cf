//! The injection boundary across which domain logic lives. The core depends
//! on an implementor of this trait; it never inspects state or command
//! payloads itself.

use thiserror::Error;

use crate::model::{CommandEnvelope, Event, HandledCommand, Rejection};

#[derive(Debug, Error)]
pub enum RuleEngineError {
    #[error("state failed to unmarshal: {0}")]
    Unmarshal(String),
}

/// A pluggable engine combining the state reducer and the command handler
/// into one injected object, rather than splitting them into two traits.
///
/// The associated `State` type keeps the core generic over the engine's
/// state representation without needing `dyn Any`: each `RoomActor<R>` is
/// monomorphized for one rule engine (the same engine serves the whole
/// process), so the state never needs to cross an object-safety boundary.
pub trait RuleEngine: Send + Sync + 'static {
    type State: Send + Sync;

    /// The canonical empty state, with `last_seq = 0`.
    fn new_state(&self) -> Self::State;

    /// Fold one event into `state`, returning a new state with
    /// `last_seq = event.seq`. Must not mutate `state` observably.
    fn reduce(&self, state: &Self::State, event: &Event) -> Self::State;

    /// An independent copy, safe for a concurrent broadcaster to read from
    /// while the actor continues processing.
    fn copy_state(&self, state: &Self::State) -> Self::State;

    /// Losslessly serialize state for snapshotting.
    fn marshal(&self, state: &Self::State) -> serde_json::Value;

    /// The inverse of `marshal`. Replaying the same events over
    /// `unmarshal(marshal(s))` must behave identically to replaying them
    /// over `s` — this determinism is what makes snapshots safe.
    fn unmarshal(&self, data: serde_json::Value) -> Result<Self::State, RuleEngineError>;

    /// Evaluate a command against `state`. Pure: reads state but never
    /// mutates it, and performs no I/O (the actor relies on this being
    /// prompt, CPU-only work).
    fn handle_command(
        &self,
        state: &Self::State,
        cmd: &CommandEnvelope,
    ) -> Result<HandledCommand, Rejection>;
}
