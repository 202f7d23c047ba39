use std::{collections::BTreeMap, time::SystemTime};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{TimestampMilliSeconds, serde_as};

use crate::dao::{
    level_map,
    models::{AnswerEntity, GAME_STATE_DOC_ID, GameStateEntity, PlayerEntity, PlayerStatus},
};

pub const PLAYER_PREFIX: &str = "player::";
pub const GAME_STATE_ID: &str = "game_state::global";
pub const END_SUFFIX: &str = "\u{ffff}";

pub fn player_doc_id(code: &str) -> String {
    format!("{PLAYER_PREFIX}{code}")
}

pub fn is_player_doc(id: &str) -> bool {
    id.starts_with(PLAYER_PREFIX)
}

/// Room code encoded in a player document id.
pub fn code_from_doc_id(id: &str) -> Option<&str> {
    id.strip_prefix(PLAYER_PREFIX).filter(|code| !code.is_empty())
}

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    #[serde(default)]
    pub doc: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseInfo {
    pub update_seq: Value,
}

#[derive(Debug, Deserialize)]
pub struct ChangesResponse {
    pub results: Vec<ChangeRow>,
    pub last_seq: Value,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRow {
    pub id: String,
}

/// CouchDB 1.x reports sequences as integers, 2.x+ as opaque strings.
pub fn seq_to_string(seq: &Value) -> String {
    match seq {
        Value::String(value) => value.clone(),
        other => other.to_string(),
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchAnswer {
    pub value: String,
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    pub timestamp: SystemTime,
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerBody {
    /// Seeding tools may leave this out; the document id carries the code too.
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<PlayerStatus>,
    #[serde_as(as = "Option<TimestampMilliSeconds<i64>>")]
    pub joined_at: Option<SystemTime>,
    #[serde(default, with = "level_map")]
    pub answers: BTreeMap<u32, CouchAnswer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchPlayerDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub player: PlayerBody,
}

impl CouchPlayerDocument {
    pub fn from_entity(player: PlayerEntity, rev: Option<String>) -> Self {
        Self {
            id: player_doc_id(&player.code),
            rev,
            player: PlayerBody {
                code: player.code,
                name: player.name,
                status: player.status,
                joined_at: player.joined_at,
                answers: player
                    .answers
                    .into_iter()
                    .map(|(level, answer)| {
                        (
                            level,
                            CouchAnswer {
                                value: answer.value,
                                timestamp: answer.timestamp,
                            },
                        )
                    })
                    .collect(),
            },
        }
    }

    pub fn into_entity(self) -> PlayerEntity {
        let body = self.player;
        let code = match code_from_doc_id(&self.id) {
            Some(code) => code.to_string(),
            None => body.code,
        };
        PlayerEntity {
            code,
            name: body.name,
            status: body.status,
            joined_at: body.joined_at,
            answers: body
                .answers
                .into_iter()
                .map(|(level, answer)| {
                    (
                        level,
                        AnswerEntity {
                            value: answer.value,
                            timestamp: answer.timestamp,
                        },
                    )
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchGameStateDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub state: GameStateEntity,
}

impl CouchGameStateDocument {
    pub fn new(state: GameStateEntity, rev: Option<String>) -> Self {
        Self {
            id: GAME_STATE_ID.to_string(),
            rev,
            state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_document_round_trips_through_couch_layout() {
        let mut entity = PlayerEntity::unclaimed("K7P2QX");
        entity.apply(
            crate::dao::models::PlayerUpdate::Answer {
                level: 6,
                value: "Silva".into(),
            },
            SystemTime::UNIX_EPOCH + std::time::Duration::from_millis(1_500),
        );

        let doc = CouchPlayerDocument::from_entity(entity.clone(), Some("1-abc".into()));
        let json = serde_json::to_value(&doc).unwrap();

        assert_eq!(json["_id"], "player::K7P2QX");
        assert_eq!(json["_rev"], "1-abc");
        assert_eq!(json["answers"]["level_6"]["value"], "Silva");
        assert_eq!(json["answers"]["level_6"]["timestamp"], 1_500);

        let parsed: CouchPlayerDocument = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.into_entity(), entity);
    }

    #[test]
    fn seeded_document_without_body_decodes() {
        let doc: CouchPlayerDocument =
            serde_json::from_value(serde_json::json!({"_id": "player::ABC123", "_rev": "1-x"}))
                .unwrap();
        let entity = doc.into_entity();
        assert_eq!(entity.code, "ABC123");
        assert!(entity.name.is_none());
        assert!(entity.status.is_none());
        assert!(entity.joined_at.is_none());
        assert!(entity.answers.is_empty());
    }

    #[test]
    fn document_id_wins_over_body_code() {
        let doc: CouchPlayerDocument = serde_json::from_value(
            serde_json::json!({"_id": "player::K7P2QX", "code": "stale", "name": "Ali"}),
        )
        .unwrap();
        assert_eq!(doc.into_entity().code, "K7P2QX");
        assert_eq!(code_from_doc_id("player::"), None);
    }

    #[test]
    fn sequences_accept_numbers_and_strings() {
        assert_eq!(seq_to_string(&Value::from(42)), "42");
        assert_eq!(seq_to_string(&Value::from("12-g1AAAA")), "12-g1AAAA");
    }

    #[test]
    fn game_state_document_keeps_camel_case_fields() {
        let doc = CouchGameStateDocument::new(GameStateEntity::default(), None);
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["_id"], GAME_STATE_ID);
        assert!(json.get("_rev").is_none());
        assert_eq!(json["currentLevel"], 1);
        assert_eq!(json["isLevelLocked"], false);
        assert!(GAME_STATE_ID.ends_with(GAME_STATE_DOC_ID));
    }
}
