//! The viewer identity projection decisions are made against.

use serde::{Deserialize, Serialize};

use super::command::PlayerId;

/// `(user_id, is_storyteller)` — determines what a subscriber is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewer {
    pub user_id: PlayerId,
    pub is_storyteller: bool,
}

impl Viewer {
    #[must_use]
    pub const fn player(user_id: PlayerId) -> Self {
        Self {
            user_id,
            is_storyteller: false,
        }
    }

    #[must_use]
    pub const fn storyteller(user_id: PlayerId) -> Self {
        Self {
            user_id,
            is_storyteller: true,
        }
    }
}
