//! Game state payloads shared by the player and admin APIs.

use serde::Serialize;
use utoipa::ToSchema;

use crate::state::{game::GameState, levels::Level};

/// Current level as shown to players. The expected answer is never included.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LevelView {
    /// Catalog id, `0` for the placeholder.
    pub id: u32,
    pub question: String,
}

/// Game progression plus the question for the current level.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GameStateView {
    pub current_level: u32,
    pub is_level_active: bool,
    pub is_level_locked: bool,
    pub level: LevelView,
}

impl GameStateView {
    pub fn new(state: GameState, level: &Level) -> Self {
        Self {
            current_level: state.current_level,
            is_level_active: state.is_level_active,
            is_level_locked: state.is_level_locked,
            level: LevelView {
                id: level.id,
                question: level.question.to_string(),
            },
        }
    }
}

/// Catalog entry as listed for admins, answer included.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LevelDefinition {
    pub id: u32,
    pub question: String,
    pub answer: String,
}

impl From<&Level> for LevelDefinition {
    fn from(level: &Level) -> Self {
        Self {
            id: level.id,
            question: level.question.to_string(),
            answer: level.answer.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::levels;

    #[test]
    fn player_view_hides_the_answer() {
        let view = GameStateView::new(GameState::default(), levels::level_or_placeholder(1));
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["current_level"], 1);
        assert_eq!(json["level"]["id"], 1);
        assert!(json["level"].get("answer").is_none());
    }
}
