use std::{collections::BTreeMap, time::SystemTime};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::dao::level_map;

/// Collection holding one document per room code.
pub const PLAYERS_COLLECTION: &str = "players";
/// Collection holding the singleton game state document.
pub const GAME_STATE_COLLECTION: &str = "game_state";
/// Key of the only document stored in [`GAME_STATE_COLLECTION`].
pub const GAME_STATE_DOC_ID: &str = "global";

/// Whether a player is still in the game.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerStatus {
    Alive,
    Eliminated,
}

/// Answer submitted by a player for one level.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerEntity {
    /// Raw answer text as typed by the player.
    pub value: String,
    /// Time the store accepted the answer.
    pub timestamp: SystemTime,
}

/// Player document keyed by its room code.
///
/// Seeded unclaimed (no name, no status) and claimed at login.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerEntity {
    /// Room code, also the document key.
    pub code: String,
    /// Display name supplied at login.
    #[serde(default)]
    pub name: Option<String>,
    /// Absent until the code has been claimed.
    #[serde(default)]
    pub status: Option<PlayerStatus>,
    /// Time the code was claimed.
    #[serde(default)]
    pub joined_at: Option<SystemTime>,
    /// Submissions keyed by level number, stored as `level_N`.
    #[serde(default, with = "level_map")]
    pub answers: BTreeMap<u32, AnswerEntity>,
}

impl PlayerEntity {
    /// Fresh document for a seeded room code nobody has claimed yet.
    pub fn unclaimed(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: None,
            status: None,
            joined_at: None,
            answers: BTreeMap::new(),
        }
    }

    /// Apply a field-level update, stamping it with `now`.
    pub fn apply(&mut self, update: PlayerUpdate, now: SystemTime) {
        match update {
            PlayerUpdate::Claim { name } => {
                self.name = Some(name);
                self.status = Some(PlayerStatus::Alive);
                self.joined_at = Some(now);
            }
            PlayerUpdate::Answer { level, value } => {
                self.answers.insert(
                    level,
                    AnswerEntity {
                        value,
                        timestamp: now,
                    },
                );
            }
            PlayerUpdate::Status(status) => self.status = Some(status),
        }
    }
}

/// Field-level mutation of an existing player document.
///
/// Timestamps are never supplied by callers: the store assigns them when it
/// applies the update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerUpdate {
    /// Claim an unclaimed code: sets name, `ALIVE` status and join time.
    Claim { name: String },
    /// Record (or overwrite) the answer for a level.
    Answer { level: u32, value: String },
    /// Change the player's status.
    Status(PlayerStatus),
}

/// Singleton game state document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameStateEntity {
    pub current_level: u32,
    pub is_level_active: bool,
    #[serde(default)]
    pub is_level_locked: bool,
}

impl Default for GameStateEntity {
    fn default() -> Self {
        Self {
            current_level: 1,
            is_level_active: true,
            is_level_locked: false,
        }
    }
}

/// Partial update of the game state; `None` fields are left untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GameStatePatch {
    pub current_level: Option<u32>,
    pub is_level_active: Option<bool>,
    pub is_level_locked: Option<bool>,
}

impl GameStatePatch {
    /// Move to `level` with submissions open.
    pub fn enter_level(level: u32) -> Self {
        Self {
            current_level: Some(level),
            is_level_active: Some(true),
            is_level_locked: Some(false),
        }
    }

    /// Only flip the submission lock.
    pub fn lock(locked: bool) -> Self {
        Self {
            is_level_locked: Some(locked),
            ..Self::default()
        }
    }

    /// Merge the patch into an existing document.
    pub fn apply(&self, target: &mut GameStateEntity) {
        if let Some(level) = self.current_level {
            target.current_level = level;
        }
        if let Some(active) = self.is_level_active {
            target.is_level_active = active;
        }
        if let Some(locked) = self.is_level_locked {
            target.is_level_locked = locked;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_sets_alive_and_join_time() {
        let now = SystemTime::now();
        let mut player = PlayerEntity::unclaimed("ABC123");
        player.apply(
            PlayerUpdate::Claim {
                name: "Gi-hun".into(),
            },
            now,
        );

        assert_eq!(player.name.as_deref(), Some("Gi-hun"));
        assert_eq!(player.status, Some(PlayerStatus::Alive));
        assert_eq!(player.joined_at, Some(now));
    }

    #[test]
    fn answer_overwrites_same_level() {
        let mut player = PlayerEntity::unclaimed("ABC123");
        let now = SystemTime::now();
        player.apply(
            PlayerUpdate::Answer {
                level: 2,
                value: "first".into(),
            },
            now,
        );
        player.apply(
            PlayerUpdate::Answer {
                level: 2,
                value: "second".into(),
            },
            now,
        );

        assert_eq!(player.answers.len(), 1);
        assert_eq!(player.answers[&2].value, "second");
    }

    #[test]
    fn lock_patch_leaves_level_and_active_flag() {
        let mut state = GameStateEntity {
            current_level: 4,
            is_level_active: false,
            is_level_locked: false,
        };
        GameStatePatch::lock(true).apply(&mut state);

        assert_eq!(state.current_level, 4);
        assert!(!state.is_level_active);
        assert!(state.is_level_locked);
    }

    #[test]
    fn player_document_uses_wire_field_names() {
        let mut player = PlayerEntity::unclaimed("XYZ789");
        player.apply(
            PlayerUpdate::Answer {
                level: 6,
                value: "Silva".into(),
            },
            SystemTime::UNIX_EPOCH,
        );
        let json = serde_json::to_value(&player).unwrap();

        assert!(json.get("joinedAt").is_some());
        assert_eq!(json["answers"]["level_6"]["value"], "Silva");
        assert_eq!(
            serde_json::to_value(PlayerStatus::Eliminated).unwrap(),
            "ELIMINATED"
        );
    }
}
