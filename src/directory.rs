//! `RoomDirectory`: the injected collaborator the core queries for room
//! membership and lifecycle when authorizing commands. Room *creation* and
//! the room's
//! `lobby/playing/ended` status live in an external API the core treats as
//! an opaque key; this trait is the narrow read seam the transport layer
//! uses to decide whether an incoming viewer may subscribe to or dispatch
//! into a room at all, before anything reaches the room actor.
//!
//! A small `Send + Sync` trait with an in-memory implementation standing in
//! for a real membership service.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{PlayerId, RoomId};

/// A room member's role, as recorded by the external room-management API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberRole {
    Player,
    Storyteller,
}

/// A room's lifecycle status. The core never transitions this itself; it is
/// set by the external API that owns room creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomStatus {
    Lobby,
    Playing,
    Ended,
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("room {0} is not known to the directory")]
    UnknownRoom(RoomId),
}

/// Read-only membership/lifecycle lookups the transport layer uses to
/// authorize a viewer before forwarding to a room actor. Mutation (adding a
/// room, seating a player) is an external API's job; this trait only reads.
pub trait RoomDirectory: Send + Sync {
    /// `None` if `user_id` is not seated in `room_id` at all.
    fn role_of(&self, room_id: RoomId, user_id: PlayerId) -> Option<MemberRole>;

    /// The room's lifecycle status, or an error if the directory has never
    /// heard of the room (the external API is expected to register rooms
    /// before the core's transport layer sees any traffic for them).
    fn status_of(&self, room_id: RoomId) -> Result<RoomStatus, DirectoryError>;

    /// `true` if `user_id` has any seat (player or storyteller) in the room.
    fn is_member(&self, room_id: RoomId, user_id: PlayerId) -> bool {
        self.role_of(room_id, user_id).is_some()
    }
}

#[derive(Debug, Clone)]
struct RoomRecord {
    status: RoomStatus,
    members: HashMap<PlayerId, MemberRole>,
}

/// A fixed-membership, process-local `RoomDirectory` backed by a
/// `HashMap` behind an `RwLock`. Used by tests and the default binary in
/// place of the external room-management service the core doesn't own.
#[derive(Default)]
pub struct StaticRoomDirectory {
    rooms: RwLock<HashMap<RoomId, RoomRecord>>,
}

impl StaticRoomDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a room with an initial status and no members.
    pub fn register_room(&self, room_id: RoomId, status: RoomStatus) {
        self.rooms.write().unwrap_or_else(|e| e.into_inner()).insert(
            room_id,
            RoomRecord {
                status,
                members: HashMap::new(),
            },
        );
    }

    /// Seat `user_id` in `room_id` with the given role. A no-op if the room
    /// was never registered.
    pub fn add_member(&self, room_id: RoomId, user_id: PlayerId, role: MemberRole) {
        if let Some(record) = self
            .rooms
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(&room_id)
        {
            record.members.insert(user_id, role);
        }
    }

    pub fn set_status(&self, room_id: RoomId, status: RoomStatus) {
        if let Some(record) = self
            .rooms
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(&room_id)
        {
            record.status = status;
        }
    }
}

impl RoomDirectory for StaticRoomDirectory {
    fn role_of(&self, room_id: RoomId, user_id: PlayerId) -> Option<MemberRole> {
        self.rooms
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&room_id)
            .and_then(|record| record.members.get(&user_id).copied())
    }

    fn status_of(&self, room_id: RoomId) -> Result<RoomStatus, DirectoryError> {
        self.rooms
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&room_id)
            .map(|record| record.status)
            .ok_or(DirectoryError::UnknownRoom(room_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn unregistered_room_has_no_members_and_unknown_status() {
        let directory = StaticRoomDirectory::new();
        let room_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();

        assert!(directory.role_of(room_id, user_id).is_none());
        assert!(matches!(
            directory.status_of(room_id),
            Err(DirectoryError::UnknownRoom(_))
        ));
    }

    #[test]
    fn registered_member_is_found_by_role() {
        let directory = StaticRoomDirectory::new();
        let room_id = Uuid::new_v4();
        let storyteller = Uuid::new_v4();
        let player = Uuid::new_v4();

        directory.register_room(room_id, RoomStatus::Lobby);
        directory.add_member(room_id, storyteller, MemberRole::Storyteller);
        directory.add_member(room_id, player, MemberRole::Player);

        assert_eq!(directory.role_of(room_id, storyteller), Some(MemberRole::Storyteller));
        assert_eq!(directory.role_of(room_id, player), Some(MemberRole::Player));
        assert!(directory.is_member(room_id, player));
        assert!(!directory.is_member(room_id, Uuid::new_v4()));
    }

    #[test]
    fn status_transitions_are_observed() {
        let directory = StaticRoomDirectory::new();
        let room_id = Uuid::new_v4();
        directory.register_room(room_id, RoomStatus::Lobby);
        assert_eq!(directory.status_of(room_id).unwrap(), RoomStatus::Lobby);

        directory.set_status(room_id, RoomStatus::Playing);
        assert_eq!(directory.status_of(room_id).unwrap(), RoomStatus::Playing);
    }
}
