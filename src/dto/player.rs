//! DTO definitions used by the player REST API.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::PlayerStatus,
    dto::{
        format_system_time,
        validation::{validate_not_blank, validate_room_code},
    },
    state::game::Player,
};

/// Credentials a player types on the join screen.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct LoginRequest {
    #[validate(length(max = 40), custom(function = "validate_not_blank"))]
    pub name: String,
    #[validate(custom(function = "validate_room_code"))]
    pub code: String,
}

/// Outcome of a login attempt. `token` is present only on success.
#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<Uuid>,
}

impl LoginResponse {
    pub fn accepted(token: Uuid) -> Self {
        Self {
            success: true,
            token: Some(token),
        }
    }

    pub fn rejected() -> Self {
        Self {
            success: false,
            token: None,
        }
    }
}

/// Answer submission for a level.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AnswerRequest {
    #[validate(range(min = 1))]
    pub level: u32,
    #[validate(length(max = 200), custom(function = "validate_not_blank"))]
    pub answer: String,
}

/// A recorded answer.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AnswerView {
    pub level: u32,
    pub value: String,
    /// RFC 3339 time the store accepted the answer.
    pub submitted_at: String,
}

/// Player projection sent to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerView {
    /// Room code.
    pub id: String,
    pub name: Option<String>,
    pub status: Option<PlayerStatus>,
    /// RFC 3339 join time, absent until the store has stamped it.
    pub joined_at: Option<String>,
    pub answers: Vec<AnswerView>,
}

impl From<&Player> for PlayerView {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id.clone(),
            name: player.name.clone(),
            status: player.status,
            joined_at: player.joined_at.map(format_system_time),
            answers: player
                .answers
                .iter()
                .map(|(level, answer)| AnswerView {
                    level: *level,
                    value: answer.value.clone(),
                    submitted_at: format_system_time(answer.timestamp),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;
    use crate::dao::models::{PlayerEntity, PlayerUpdate};

    #[test]
    fn login_request_validation() {
        let ok = LoginRequest {
            name: "Gi-hun".into(),
            code: "k7p2qx".into(),
        };
        assert!(ok.validate().is_ok());

        let blank = LoginRequest {
            name: "  ".into(),
            code: "K7P2QX".into(),
        };
        assert!(blank.validate().is_err());

        let bad_code = LoginRequest {
            name: "Gi-hun".into(),
            code: "K7/P2".into(),
        };
        assert!(bad_code.validate().is_err());
    }

    #[test]
    fn answer_request_rejects_level_zero() {
        let request = AnswerRequest {
            level: 0,
            answer: "Silva".into(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn answer_request_rejects_whitespace_only_answers() {
        let blank = AnswerRequest {
            level: 6,
            answer: "   ".into(),
        };
        assert!(blank.validate().is_err());

        let padded = AnswerRequest {
            level: 6,
            answer: " Silva ".into(),
        };
        assert!(padded.validate().is_ok());
    }

    #[test]
    fn player_view_lists_answers_in_level_order() {
        let mut entity = PlayerEntity::unclaimed("K7P2QX");
        let at = SystemTime::UNIX_EPOCH + Duration::from_secs(60);
        entity.apply(PlayerUpdate::Claim { name: "Ali".into() }, at);
        entity.apply(
            PlayerUpdate::Answer {
                level: 6,
                value: "Silva".into(),
            },
            at,
        );
        entity.apply(
            PlayerUpdate::Answer {
                level: 3,
                value: "familia primero".into(),
            },
            at,
        );

        let view = PlayerView::from(&Player::from(entity));
        assert_eq!(view.joined_at.as_deref(), Some("1970-01-01T00:01:00Z"));
        let levels: Vec<u32> = view.answers.iter().map(|a| a.level).collect();
        assert_eq!(levels, vec![3, 6]);

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["status"], "ALIVE");
    }
}
