//! Data model for rooms, players, questions and game settings.
//!
//! These structs serialize 1:1 into the persisted document layout, so
//! every field rename here is part of the stored schema, not just style.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use triviarena_protocol::{
    ClientQuestion, PlayerInfo, PlayerRole, RoomCode, RoomId, RoomState, Uid,
};

use crate::RoomError;

/// Maximum participants with the `player` role per room.
pub const MAX_PLAYERS: usize = 8;
/// Maximum spectators per room.
pub const MAX_SPECTATORS: usize = 5;
/// Maximum total occupants per room.
pub const MAX_OCCUPANTS: usize = MAX_PLAYERS + MAX_SPECTATORS;

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// GameSettings
// ---------------------------------------------------------------------------

/// Mutable per-room game settings. Field names match the wire/store keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSettings {
    #[serde(rename = "questionsPerPlayer")]
    pub questions_per_player: u32,
    #[serde(rename = "turnTimeoutSec")]
    pub turn_timeout_sec: u32,
    #[serde(rename = "stealTimeoutSec")]
    pub steal_timeout_sec: u32,
    #[serde(rename = "allowSteal")]
    pub allow_steal: bool,
    #[serde(rename = "bonusForSteal")]
    pub bonus_for_steal: u32,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            questions_per_player: 5,
            turn_timeout_sec: 30,
            steal_timeout_sec: 15,
            allow_steal: true,
            bonus_for_steal: 1,
        }
    }
}

impl GameSettings {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// An in-progress steal attempt: the stealer and the question it belongs
/// to. While this is set, `current_turn_uid` still names the original
/// turn-taker — the steal belongs to that question, not a new turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StealAttempt {
    pub stealer_uid: Uid,
    pub question_index: u32,
}

/// The room document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: RoomId,
    pub code: RoomCode,
    pub host_uid: Uid,
    pub state: RoomState,
    pub created_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<u64>,
    pub question_count: u32,
    /// 0-based index of the live question while active.
    pub current_question_index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_turn_uid: Option<Uid>,
    /// Rotation snapshot taken at game start. Trimmed on voluntary
    /// leave, preserved across disconnects.
    pub active_turn_order: Vec<Uid>,
    /// Index into `active_turn_order`, or -1 when no turn is live.
    pub turn_cursor: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steal_attempt: Option<StealAttempt>,
    pub settings: GameSettings,
}

impl Room {
    /// A fresh waiting room hosted by `host_uid`.
    pub fn new_waiting(id: RoomId, code: RoomCode, host_uid: Uid) -> Self {
        Self {
            id,
            code,
            host_uid,
            state: RoomState::Waiting,
            created_at: now_millis(),
            started_at: None,
            question_count: 0,
            current_question_index: 0,
            current_turn_uid: None,
            active_turn_order: Vec::new(),
            turn_cursor: -1,
            steal_attempt: None,
            settings: GameSettings::default(),
        }
    }

    /// The document id of the question at the current cursor.
    pub fn current_question_id(&self) -> String {
        self.current_question_index.to_string()
    }

    pub fn from_doc(doc: Value) -> Result<Self, RoomError> {
        serde_json::from_value(doc)
            .map_err(|e| RoomError::Corrupt(format!("room document: {e}")))
    }

    pub fn to_doc(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// A player document, scoped to one room.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub uid: Uid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub join_order: u32,
    pub score: u32,
    pub online: bool,
    pub role: PlayerRole,
    pub joined_at: u64,
}

impl Player {
    pub fn is_active_player(&self) -> bool {
        self.online && self.role == PlayerRole::Player
    }

    pub fn info(&self) -> PlayerInfo {
        PlayerInfo {
            uid: self.uid.clone(),
            name: self.name.clone(),
            avatar_url: self.avatar_url.clone(),
            join_order: self.join_order,
            score: self.score,
            online: self.online,
            role: self.role,
        }
    }

    pub fn from_doc(doc: Value) -> Result<Self, RoomError> {
        serde_json::from_value(doc)
            .map_err(|e| RoomError::Corrupt(format!("player document: {e}")))
    }

    pub fn to_doc(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

// ---------------------------------------------------------------------------
// Question
// ---------------------------------------------------------------------------

/// A question document. `id` is the stringified 0-based index within the
/// room's question list; `options` are pre-shuffled and `correct_index`
/// points at the correct one post-shuffle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub text: String,
    pub options: Vec<String>,
    pub correct_index: u8,
    pub category: String,
    pub difficulty: String,
}

impl Question {
    /// The view sent to clients — no correct index.
    pub fn client_view(&self) -> ClientQuestion {
        ClientQuestion {
            id: self.id.clone(),
            text: self.text.clone(),
            options: self.options.clone(),
            category: self.category.clone(),
            difficulty: self.difficulty.clone(),
        }
    }

    pub fn from_doc(doc: Value) -> Result<Self, RoomError> {
        serde_json::from_value(doc)
            .map_err(|e| RoomError::Corrupt(format!("question document: {e}")))
    }

    pub fn to_doc(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_match_contract() {
        let s = GameSettings::default();
        assert_eq!(s.questions_per_player, 5);
        assert_eq!(s.turn_timeout_sec, 30);
        assert_eq!(s.steal_timeout_sec, 15);
        assert!(s.allow_steal);
        assert_eq!(s.bonus_for_steal, 1);
    }

    #[test]
    fn test_settings_serialize_with_wire_keys() {
        let json: Value = serde_json::to_value(GameSettings::default()).unwrap();
        assert_eq!(json["questionsPerPlayer"], 5);
        assert_eq!(json["turnTimeoutSec"], 30);
        assert_eq!(json["stealTimeoutSec"], 15);
        assert_eq!(json["allowSteal"], true);
        assert_eq!(json["bonusForSteal"], 1);
    }

    #[test]
    fn test_room_doc_round_trip() {
        let room = Room::new_waiting(
            RoomId(3),
            RoomCode::parse("ABCDEF").unwrap(),
            Uid::from("host"),
        );
        let doc = room.to_doc();
        assert_eq!(doc["state"], "waiting");
        assert_eq!(doc["turnCursor"], -1);

        let back = Room::from_doc(doc).unwrap();
        assert_eq!(back.id, RoomId(3));
        assert_eq!(back.host_uid, Uid::from("host"));
        assert!(back.steal_attempt.is_none());
    }

    #[test]
    fn test_room_from_malformed_doc_is_corrupt() {
        let result = Room::from_doc(serde_json::json!({"state": "waiting"}));
        assert!(matches!(result, Err(RoomError::Corrupt(_))));
    }

    #[test]
    fn test_question_client_view_hides_correct_index() {
        let q = Question {
            id: "0".into(),
            text: "capital of France?".into(),
            options: vec!["Lyon".into(), "Paris".into(), "Nice".into(), "Metz".into()],
            correct_index: 1,
            category: "geography".into(),
            difficulty: "easy".into(),
        };
        let view = serde_json::to_value(q.client_view()).unwrap();
        assert!(view.get("correctIndex").is_none());
        assert_eq!(view["options"][1], "Paris");
    }
}
