//! DTO definitions used by the admin REST API and documentation layer.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dao::models::PlayerStatus,
    dto::{player::PlayerView, validation::validate_not_blank},
    state::{game::Player, levels::Level},
};

/// Largest batch of room codes a single setup call may create.
pub const MAX_SEED_COUNT: u32 = 500;

/// Admin sign-in credentials.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AdminLoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(custom(function = "validate_not_blank"))]
    pub password: String,
}

/// Move the game to another level.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SetLevelRequest {
    #[validate(range(min = 1))]
    pub level: u32,
}

/// Lock or unlock submissions for the current level.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LevelLockRequest {
    pub locked: bool,
}

/// Create fresh unclaimed room codes.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SetupRequest {
    #[validate(range(min = 1, max = MAX_SEED_COUNT))]
    pub count: u32,
}

/// Room codes created by a setup call.
#[derive(Debug, Serialize, ToSchema)]
pub struct SetupResponse {
    pub created: Vec<String>,
}

/// Generic action acknowledgement used by admin endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    pub message: String,
}

impl ActionResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Player row on the admin dashboard: the player plus its current-level submission.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdminPlayerView {
    #[serde(flatten)]
    pub player: PlayerView,
    /// Whether the room code has been claimed.
    pub claimed: bool,
    /// Answer given for the current level, if any.
    pub current_answer: Option<String>,
    /// Whether `current_answer` matches the catalog answer; `None` without an answer.
    pub current_answer_correct: Option<bool>,
}

impl AdminPlayerView {
    pub fn new(player: &Player, level: &Level) -> Self {
        let current_answer = player.answer(level.id).map(|answer| answer.value.clone());
        Self {
            player: PlayerView::from(player),
            claimed: player.status.is_some(),
            current_answer_correct: current_answer
                .as_deref()
                .map(|answer| level.matches(answer)),
            current_answer,
        }
    }
}

/// Dashboard totals.
#[derive(Debug, Default, Serialize, ToSchema)]
pub struct PlayerCounts {
    pub alive: usize,
    pub eliminated: usize,
    pub unclaimed: usize,
}

impl PlayerCounts {
    pub fn tally<'a>(players: impl IntoIterator<Item = &'a Player>) -> Self {
        players
            .into_iter()
            .fold(Self::default(), |mut counts, player| {
                match player.status {
                    Some(PlayerStatus::Alive) => counts.alive += 1,
                    Some(PlayerStatus::Eliminated) => counts.eliminated += 1,
                    None => counts.unclaimed += 1,
                }
                counts
            })
    }
}

/// Response of `GET /admin/players`.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayersResponse {
    pub counts: PlayerCounts,
    pub players: Vec<AdminPlayerView>,
}

impl PlayersResponse {
    pub fn new(players: &[Player], level: &Level) -> Self {
        Self {
            counts: PlayerCounts::tally(players),
            players: players
                .iter()
                .map(|player| AdminPlayerView::new(player, level))
                .collect(),
        }
    }
}
