//! The visibility projection filter: `project_event` and `project_state`.
//! Implemented as a tagged-variant dispatch — `event_type` is looked up in a
//! table built once at startup.

use std::collections::HashMap;
use std::sync::LazyLock;

use serde_json::Value;

use crate::model::{Event, ProjectedEvent, Viewer};

/// How one event class is shown to a viewer. Field names name keys inside
/// the event's JSON payload that carry the relevant player ids.
#[derive(Debug, Clone, Copy)]
pub enum VisibilityRule {
    /// Visible to every room member.
    Public,
    /// Visible only to the storyteller.
    StorytellerOnly,
    /// Visible to the two named participants and the storyteller (e.g. a whisper).
    Pair {
        sender_field: &'static str,
        recipient_field: &'static str,
    },
    /// Visible to one targeted player and the storyteller; payload fields
    /// tagged private are stripped for everyone else (e.g. role assignment).
    SelfAndStoryteller {
        target_field: &'static str,
        private_fields: &'static [&'static str],
    },
    /// Visible to the acting player, the targeted player, and the storyteller.
    AbilityResolution {
        actor_field: &'static str,
        target_field: &'static str,
    },
}

/// The canonical visibility table the core implements. Extending it is a
/// rule-engine concern, but it uses this same mechanism; the demo rule
/// engine only emits event types that fall into `Public`, so this table
/// documents the full policy even where the shipped demo never exercises a
/// branch.
static VISIBILITY_RULES: LazyLock<HashMap<&'static str, VisibilityRule>> = LazyLock::new(|| {
    let mut m = HashMap::new();
    m.insert(
        "night_action.queued",
        VisibilityRule::StorytellerOnly,
    );
    m.insert(
        "night_action.completed",
        VisibilityRule::StorytellerOnly,
    );
    m.insert(
        "demon_bluff.assigned",
        VisibilityRule::StorytellerOnly,
    );
    m.insert(
        "whisper.sent",
        VisibilityRule::Pair {
            sender_field: "sender_id",
            recipient_field: "recipient_id",
        },
    );
    m.insert(
        "role.assigned",
        VisibilityRule::SelfAndStoryteller {
            target_field: "target_id",
            private_fields: &["role", "alignment", "team"],
        },
    );
    m.insert(
        "ability.resolved",
        VisibilityRule::AbilityResolution {
            actor_field: "actor_id",
            target_field: "target_id",
        },
    );
    m
});

fn rule_for(event_type: &str) -> VisibilityRule {
    VISIBILITY_RULES
        .get(event_type)
        .copied()
        .unwrap_or(VisibilityRule::Public)
}

fn field_matches_user(payload: &Value, field: &str, user_id: uuid::Uuid) -> bool {
    payload
        .get(field)
        .and_then(Value::as_str)
        .and_then(|s| uuid::Uuid::parse_str(s).ok())
        .is_some_and(|id| id == user_id)
}

fn redact(payload: &Value, private_fields: &[&str]) -> Value {
    let Value::Object(map) = payload else {
        return payload.clone();
    };
    let mut redacted = map.clone();
    for field in private_fields {
        redacted.remove(*field);
    }
    Value::Object(redacted)
}

/// Project one durable event into what `viewer` should receive, or `None`
/// if the event is not visible to them. Pure: never mutates `event`.
#[must_use]
pub fn project_event(event: &Event, viewer: Viewer) -> Option<ProjectedEvent> {
    let rule = rule_for(&event.event_type);

    let data = match rule {
        VisibilityRule::Public => event.payload.clone(),
        VisibilityRule::StorytellerOnly => {
            if !viewer.is_storyteller {
                return None;
            }
            event.payload.clone()
        }
        VisibilityRule::Pair {
            sender_field,
            recipient_field,
        } => {
            let is_participant = viewer.is_storyteller
                || field_matches_user(&event.payload, sender_field, viewer.user_id)
                || field_matches_user(&event.payload, recipient_field, viewer.user_id);
            if !is_participant {
                return None;
            }
            event.payload.clone()
        }
        VisibilityRule::SelfAndStoryteller {
            target_field,
            private_fields,
        } => {
            let is_target = field_matches_user(&event.payload, target_field, viewer.user_id);
            if viewer.is_storyteller || is_target {
                event.payload.clone()
            } else {
                redact(&event.payload, private_fields)
            }
        }
        VisibilityRule::AbilityResolution {
            actor_field,
            target_field,
        } => {
            let is_participant = viewer.is_storyteller
                || field_matches_user(&event.payload, actor_field, viewer.user_id)
                || field_matches_user(&event.payload, target_field, viewer.user_id);
            if !is_participant {
                return None;
            }
            event.payload.clone()
        }
    };

    Some(ProjectedEvent {
        room_id: event.room_id,
        seq: event.seq,
        event_type: event.event_type.clone(),
        data,
        server_timestamp: event.server_timestamp,
    })
}

/// Project a marshalled state document for `viewer`, stripping any
/// per-player private fields for everyone but the storyteller. The core
/// treats `state` as opaque except for a `players` object keyed by user id
/// whose entries may carry the same `private_fields` convention as
/// `role.assigned` events; a rule engine whose state doesn't follow that
/// convention gets the state back unredacted (the core cannot guess its
/// shape beyond this one, documented convention).
#[must_use]
pub fn project_state(state: &Value, viewer: Viewer) -> Value {
    if viewer.is_storyteller {
        return state.clone();
    }

    let Some(players) = state.get("players").and_then(Value::as_object) else {
        return state.clone();
    };

    let mut redacted_state = state.clone();
    if let Some(Value::Object(players_out)) = redacted_state.get_mut("players") {
        for (user_id, entry) in players.iter() {
            let is_self = uuid::Uuid::parse_str(user_id).is_ok_and(|id| id == viewer.user_id);
            if is_self {
                continue;
            }
            players_out.insert(user_id.clone(), redact(entry, &["role", "alignment", "team"]));
        }
    }
    redacted_state
}
