//! Event types for the Triviarena wire protocol.
//!
//! Inbound traffic is a [`ClientFrame`]: a client-chosen sequence number
//! plus one [`ClientEvent`]. Every frame is answered by exactly one
//! [`Ack`] carrying the same sequence number; state changes additionally
//! fan out as [`ServerEvent`]s to the affected room.
//!
//! The enums are closed: an unknown `type` tag fails to decode, and the
//! dispatcher is an exhaustive match.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{RoomId, Uid};

/// Maximum length of a lobby or private chat message, in characters.
pub const MAX_CHAT_LEN: usize = 500;

// ---------------------------------------------------------------------------
// Shared wire views
// ---------------------------------------------------------------------------

/// A participant's role within a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerRole {
    /// Holds turns and can score.
    Player,
    /// Observes only.
    Spectator,
}

/// The lifecycle state of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomState {
    Waiting,
    Active,
    Ended,
}

impl RoomState {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn is_waiting(self) -> bool {
        matches!(self, Self::Waiting)
    }

    pub fn is_ended(self) -> bool {
        matches!(self, Self::Ended)
    }
}

/// A player entry as shown to clients in `updatePlayerList` and snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    pub uid: Uid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub join_order: u32,
    pub score: u32,
    pub online: bool,
    pub role: PlayerRole,
}

/// A question as sent to clients. The correct index never leaves the
/// server while the question is live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientQuestion {
    pub id: String,
    pub text: String,
    pub options: Vec<String>,
    pub category: String,
    pub difficulty: String,
}

/// An in-progress steal, as exposed on rejoin snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StealView {
    pub stealer_uid: Uid,
    pub question_id: String,
}

/// The full game snapshot sent on `gameStarted` and in rejoin replies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub question: ClientQuestion,
    pub turn_uid: Uid,
    /// Seconds the current phase has left (full timeout on game start).
    pub timeout: u64,
    pub scores: BTreeMap<Uid, u32>,
    pub players: Vec<PlayerInfo>,
    pub total_questions: u32,
    pub current_question_num: u32,
    pub game_settings: serde_json::Value,
    pub host_id: Uid,
    /// Every question of the game, for client-side progress UI.
    pub questions: Vec<ClientQuestion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steal_attempt: Option<StealView>,
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// One inbound frame: client sequence number plus the event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientFrame {
    pub seq: u64,
    pub event: ClientEvent,
}

/// Everything a client can send.
///
/// Wire names follow the event contract, including the namespaced forms
/// (`room:updateSettings`, `game:start`, `game:rejoin`). Client-supplied
/// uids never appear here — identity is stapled to the connection during
/// the hello handshake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// First frame on a connection: presents the bearer identity token.
    #[serde(rename = "hello", rename_all = "camelCase")]
    Hello { token: String },

    #[serde(rename = "createRoom", rename_all = "camelCase")]
    CreateRoom {
        #[serde(default)]
        player_name: Option<String>,
    },

    #[serde(rename = "joinRoom", rename_all = "camelCase")]
    JoinRoom {
        room_code: String,
        #[serde(default)]
        player_name: Option<String>,
    },

    #[serde(rename = "leaveRoom", rename_all = "camelCase")]
    LeaveRoom { room_id: RoomId },

    #[serde(rename = "room:updateSettings", rename_all = "camelCase")]
    UpdateSettings {
        room_id: RoomId,
        settings_to_update: serde_json::Value,
    },

    #[serde(rename = "game:start", rename_all = "camelCase")]
    StartGame {
        room_id: RoomId,
        #[serde(default)]
        settings: Option<serde_json::Value>,
    },

    #[serde(rename = "submitAnswer", rename_all = "camelCase")]
    SubmitAnswer {
        room_id: RoomId,
        question_id: String,
        answer_index: i32,
    },

    #[serde(rename = "submitSteal", rename_all = "camelCase")]
    SubmitSteal {
        room_id: RoomId,
        question_id: String,
        answer_index: i32,
    },

    #[serde(rename = "playAgainRequest", rename_all = "camelCase")]
    PlayAgainRequest { room_id: RoomId },

    #[serde(rename = "game:rejoin", rename_all = "camelCase")]
    Rejoin { room_id: RoomId },

    #[serde(rename = "lobbyMessage", rename_all = "camelCase")]
    LobbyMessage { room_id: RoomId, message: String },

    #[serde(rename = "privateMessage", rename_all = "camelCase")]
    PrivateMessage {
        #[serde(default)]
        room_id: Option<RoomId>,
        to_uid: Uid,
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Acknowledgements
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Ok,
    Error,
}

/// The reply to one inbound frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ack {
    pub seq: u64,
    pub status: AckStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Set when a stale event was dropped without touching state.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub no_action_taken: bool,
    /// Operation-specific result payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Ack {
    pub fn ok(seq: u64, data: serde_json::Value) -> Self {
        Self {
            seq,
            status: AckStatus::Ok,
            message: None,
            no_action_taken: false,
            data: Some(data),
        }
    }

    pub fn ok_empty(seq: u64) -> Self {
        Self {
            seq,
            status: AckStatus::Ok,
            message: None,
            no_action_taken: false,
            data: None,
        }
    }

    pub fn no_action(seq: u64) -> Self {
        Self {
            seq,
            status: AckStatus::Ok,
            message: None,
            no_action_taken: true,
            data: None,
        }
    }

    pub fn error(seq: u64, message: impl Into<String>) -> Self {
        Self {
            seq,
            status: AckStatus::Error,
            message: Some(message.into()),
            no_action_taken: false,
            data: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// One outbound frame: either the ack for an inbound frame or a
/// server-initiated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum ServerFrame {
    Ack(Ack),
    Event(ServerEvent),
}

/// Everything the server can emit. Broadcast to the room unless noted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Point-to-point: handshake accepted.
    #[serde(rename = "welcome", rename_all = "camelCase")]
    Welcome {
        uid: Uid,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },

    #[serde(rename = "playerJoined", rename_all = "camelCase")]
    PlayerJoined {
        uid: Uid,
        name: String,
        role: PlayerRole,
    },

    #[serde(rename = "playerLeft", rename_all = "camelCase")]
    PlayerLeft {
        uid: Uid,
        #[serde(skip_serializing_if = "Option::is_none")]
        new_host_uid: Option<Uid>,
    },

    #[serde(rename = "playerOffline", rename_all = "camelCase")]
    PlayerOffline { uid: Uid },

    #[serde(rename = "playerRejoined", rename_all = "camelCase")]
    PlayerRejoined { uid: Uid, role: PlayerRole },

    #[serde(rename = "updatePlayerList", rename_all = "camelCase")]
    UpdatePlayerList {
        players: Vec<PlayerInfo>,
        host_id: Uid,
        room_state: RoomState,
        #[serde(skip_serializing_if = "Option::is_none")]
        game_settings: Option<serde_json::Value>,
    },

    #[serde(rename = "gameStarted", rename_all = "camelCase")]
    GameStarted { snapshot: GameSnapshot },

    #[serde(rename = "nextTurn", rename_all = "camelCase")]
    NextTurn {
        question: ClientQuestion,
        turn_uid: Uid,
        timeout: u64,
        current_question_num: u32,
        total_questions: u32,
    },

    #[serde(rename = "answerResult", rename_all = "camelCase")]
    AnswerResult {
        uid: Uid,
        question_id: String,
        correct: bool,
        correct_index: u8,
        was_timeout: bool,
    },

    #[serde(rename = "stealOpportunity", rename_all = "camelCase")]
    StealOpportunity {
        question_id: String,
        next_uid: Uid,
        steal_timeout: u64,
    },

    #[serde(rename = "stealResult", rename_all = "camelCase")]
    StealResult {
        uid: Uid,
        question_id: String,
        correct: bool,
        points_awarded: u32,
    },

    #[serde(rename = "scoreUpdate", rename_all = "camelCase")]
    ScoreUpdate { scores: BTreeMap<Uid, u32> },

    #[serde(rename = "gameEnded", rename_all = "camelCase")]
    GameEnded {
        final_scores: BTreeMap<Uid, u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    #[serde(rename = "gameError", rename_all = "camelCase")]
    GameError { message: String },

    #[serde(rename = "playAgainStatus", rename_all = "camelCase")]
    PlayAgainStatus {
        votes: u32,
        total_online: u32,
        required: u32,
    },

    #[serde(rename = "playAgainFailed")]
    PlayAgainFailed,

    #[serde(rename = "lobbyMessage", rename_all = "camelCase")]
    LobbyMessage {
        from_uid: Uid,
        from_name: String,
        message: String,
    },

    /// Point-to-point.
    #[serde(rename = "privateMessage", rename_all = "camelCase")]
    PrivateMessage { from_uid: Uid, message: String },

    /// Point-to-point: sent to a user who enters a room mid-game.
    #[serde(rename = "spectatingActiveGame", rename_all = "camelCase")]
    SpectatingActiveGame { room_id: RoomId },

    /// Server notice.
    #[serde(rename = "message", rename_all = "camelCase")]
    Notice { message: String },

    /// Point-to-point.
    #[serde(rename = "rejoinError", rename_all = "camelCase")]
    RejoinError { message: String },
}

/// Who should receive an outbound event within a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// Every participant in the room.
    All,
    /// One specific user.
    User(Uid),
}
