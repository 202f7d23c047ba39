use std::{collections::BTreeMap, time::SystemTime};

use crate::dao::models::{AnswerEntity, GameStateEntity, PlayerEntity, PlayerStatus};

/// Player as projected into a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Room code, which doubles as the player identifier.
    pub id: String,
    /// Display name, `None` while the code is unclaimed.
    pub name: Option<String>,
    /// Status, `None` while the code is unclaimed.
    pub status: Option<PlayerStatus>,
    /// When the code was claimed.
    pub joined_at: Option<SystemTime>,
    /// Submissions keyed by level.
    pub answers: BTreeMap<u32, Answer>,
}

/// A recorded submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub value: String,
    pub timestamp: SystemTime,
}

/// Shared game progression as seen by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameState {
    pub current_level: u32,
    pub is_level_active: bool,
    pub is_level_locked: bool,
}

impl Player {
    /// Local view right after a successful claim, before the store echoes it.
    ///
    /// Join time stays empty until the store-assigned value arrives.
    pub fn claimed(existing: PlayerEntity, name: String) -> Self {
        Self {
            name: Some(name),
            status: Some(PlayerStatus::Alive),
            joined_at: None,
            ..existing.into()
        }
    }

    pub fn is_alive(&self) -> bool {
        self.status == Some(PlayerStatus::Alive)
    }

    /// Answer recorded for `level`, if any.
    pub fn answer(&self, level: u32) -> Option<&Answer> {
        self.answers.get(&level)
    }
}

impl Default for GameState {
    fn default() -> Self {
        GameStateEntity::default().into()
    }
}

impl From<AnswerEntity> for Answer {
    fn from(value: AnswerEntity) -> Self {
        Self {
            value: value.value,
            timestamp: value.timestamp,
        }
    }
}

impl From<PlayerEntity> for Player {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.code,
            name: value.name,
            status: value.status,
            joined_at: value.joined_at,
            answers: value
                .answers
                .into_iter()
                .map(|(level, answer)| (level, answer.into()))
                .collect(),
        }
    }
}

impl From<GameStateEntity> for GameState {
    fn from(value: GameStateEntity) -> Self {
        Self {
            current_level: value.current_level,
            is_level_active: value.is_level_active,
            is_level_locked: value.is_level_locked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::PlayerUpdate;

    #[test]
    fn claimed_projection_keeps_existing_answers() {
        let mut entity = PlayerEntity::unclaimed("Q4R8TZ");
        entity.apply(
            PlayerUpdate::Answer {
                level: 2,
                value: "triangulo".into(),
            },
            SystemTime::UNIX_EPOCH,
        );

        let player = Player::claimed(entity, "Ali".into());
        assert_eq!(player.id, "Q4R8TZ");
        assert!(player.is_alive());
        assert_eq!(player.joined_at, None);
        assert_eq!(player.answer(2).map(|a| a.value.as_str()), Some("triangulo"));
    }

    #[test]
    fn default_game_state_starts_on_open_first_level() {
        let state = GameState::default();
        assert_eq!(state.current_level, 1);
        assert!(state.is_level_active);
        assert!(!state.is_level_locked);
    }
}
