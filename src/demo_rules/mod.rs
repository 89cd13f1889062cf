//! A minimal rule engine exercising the pipeline end to end: `create_game`,
//! `send_chat`, `nominate`. This is not a full social-deduction game rule
//! table — it implements just enough to prove the envelope, the way the
//! binary and the integration tests need a concrete `RuleEngine` to run
//! against.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{CommandEnvelope, Event, HandledCommand, NewEvent, Rejection};
use crate::rule_engine::{RuleEngine, RuleEngineError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Phase {
    Lobby,
    Playing,
    Ended,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoPlayer {
    pub seat: u32,
    pub alive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoState {
    pub last_seq: u64,
    pub phase: Phase,
    pub players: HashMap<Uuid, DemoPlayer>,
    pub day_count: u32,
}

impl DemoState {
    #[must_use]
    pub const fn last_seq(state: &Self) -> u64 {
        state.last_seq
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DemoRuleEngine;

impl RuleEngine for DemoRuleEngine {
    type State = DemoState;

    fn new_state(&self) -> Self::State {
        DemoState {
            last_seq: 0,
            phase: Phase::Lobby,
            players: HashMap::new(),
            day_count: 0,
        }
    }

    fn reduce(&self, state: &Self::State, event: &Event) -> Self::State {
        let mut next = state.clone();
        next.last_seq = event.seq;

        match event.event_type.as_str() {
            "game.created" => {
                next.phase = Phase::Playing;
                next.day_count = 1;
                if let Some(players) = event.payload.get("players").and_then(|v| v.as_array()) {
                    for (seat, entry) in players.iter().enumerate() {
                        if let Some(user_id) = entry
                            .get("user_id")
                            .and_then(|v| v.as_str())
                            .and_then(|s| Uuid::parse_str(s).ok())
                        {
                            next.players.insert(
                                user_id,
                                DemoPlayer {
                                    seat: seat as u32,
                                    alive: true,
                                },
                            );
                        }
                    }
                }
            }
            "night.started" => {
                next.day_count += 1;
            }
            "chat.sent" | "nomination.created" | "day.ended" => {
                // No state change beyond `last_seq`; purely informational
                // facts the demo engine doesn't need to track.
            }
            _ => {}
        }

        next
    }

    fn copy_state(&self, state: &Self::State) -> Self::State {
        state.clone()
    }

    fn marshal(&self, state: &Self::State) -> serde_json::Value {
        serde_json::to_value(state).unwrap_or(serde_json::Value::Null)
    }

    fn unmarshal(&self, data: serde_json::Value) -> Result<Self::State, RuleEngineError> {
        serde_json::from_value(data).map_err(|e| RuleEngineError::Unmarshal(e.to_string()))
    }

    fn handle_command(
        &self,
        state: &Self::State,
        cmd: &CommandEnvelope,
    ) -> Result<HandledCommand, Rejection> {
        match cmd.command_type.as_str() {
            "create_game" => {
                if state.phase != Phase::Lobby {
                    return Err(Rejection {
                        code: "already_started".to_string(),
                        message: "the game has already started".to_string(),
                    });
                }
                let event = NewEvent {
                    event_id: Uuid::new_v4(),
                    event_type: "game.created".to_string(),
                    actor_user_id: cmd.actor_user_id,
                    causation_command_id: Some(cmd.command_id),
                    payload: cmd.payload.clone(),
                };
                Ok(HandledCommand {
                    events: vec![event],
                    result_data: serde_json::json!({}),
                })
            }
            "send_chat" => {
                if state.phase != Phase::Playing {
                    return Err(Rejection {
                        code: "not_started".to_string(),
                        message: "the game has not started yet".to_string(),
                    });
                }
                let text = cmd
                    .payload
                    .get("text")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                let event = NewEvent {
                    event_id: Uuid::new_v4(),
                    event_type: "chat.sent".to_string(),
                    actor_user_id: cmd.actor_user_id,
                    causation_command_id: Some(cmd.command_id),
                    payload: serde_json::json!({"actor_id": cmd.actor_user_id, "text": text}),
                };
                Ok(HandledCommand {
                    events: vec![event],
                    result_data: serde_json::json!({}),
                })
            }
            "nominate" => {
                if state.phase != Phase::Playing {
                    return Err(Rejection {
                        code: "not_started".to_string(),
                        message: "the game has not started yet".to_string(),
                    });
                }
                let Some(nominator) = state.players.get(&cmd.actor_user_id) else {
                    return Err(Rejection {
                        code: "not_a_player".to_string(),
                        message: "actor is not seated in this room".to_string(),
                    });
                };
                if !nominator.alive {
                    return Err(Rejection {
                        code: "nominator_not_alive".to_string(),
                        message: "dead players cannot nominate".to_string(),
                    });
                }
                let event = NewEvent {
                    event_id: Uuid::new_v4(),
                    event_type: "nomination.created".to_string(),
                    actor_user_id: cmd.actor_user_id,
                    causation_command_id: Some(cmd.command_id),
                    payload: serde_json::json!({
                        "nominator_id": cmd.actor_user_id,
                        "nominee_id": cmd.payload.get("nominee_id"),
                    }),
                };
                Ok(HandledCommand {
                    events: vec![event],
                    result_data: serde_json::json!({}),
                })
            }
            "end_day" => {
                if state.phase != Phase::Playing {
                    return Err(Rejection {
                        code: "not_started".to_string(),
                        message: "the game has not started yet".to_string(),
                    });
                }
                // A single command producing more than one event: the day
                // closes and the following night opens atomically, in that
                // order, as one `handle_command` call.
                let day_ended = NewEvent {
                    event_id: Uuid::new_v4(),
                    event_type: "day.ended".to_string(),
                    actor_user_id: cmd.actor_user_id,
                    causation_command_id: Some(cmd.command_id),
                    payload: serde_json::json!({"day_count": state.day_count}),
                };
                let night_started = NewEvent {
                    event_id: Uuid::new_v4(),
                    event_type: "night.started".to_string(),
                    actor_user_id: cmd.actor_user_id,
                    causation_command_id: Some(cmd.command_id),
                    payload: serde_json::json!({"day_count": state.day_count}),
                };
                Ok(HandledCommand {
                    events: vec![day_ended, night_started],
                    result_data: serde_json::json!({}),
                })
            }
            other => Err(Rejection {
                code: "unknown_command".to_string(),
                message: format!("no handler for command type '{other}'"),
            }),
        }
    }
}
