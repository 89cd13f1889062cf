//! Core data model: the command envelope, durable events, dedup records,
//! snapshots, viewers and the outcome types that cross the rule-engine
//! boundary. One file per concern.

pub mod command;
pub mod dedup;
pub mod event;
pub mod result;
pub mod snapshot;
pub mod viewer;

pub use command::{CommandEnvelope, CommandId, PlayerId, RoomId};
pub use dedup::{DedupRecord, NewDedupRecord};
pub use event::{Event, EventId, NewEvent, ProjectedEvent};
pub use result::{CommandResult, HandledCommand, Rejection};
pub use snapshot::{NewSnapshot, Snapshot};
pub use viewer::Viewer;
