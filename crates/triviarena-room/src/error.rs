//! Error types for the room layer.

use triviarena_protocol::Uid;
use triviarena_store::StoreError;

/// Errors that can occur during room and membership operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// No room with that code or id.
    #[error("room not found")]
    NotFound,

    /// The room has already ended.
    #[error("room has ended")]
    Ended,

    /// All player slots are taken and no spectator slot can absorb the
    /// join.
    #[error("room is full")]
    RoomFull,

    /// All spectator slots are taken.
    #[error("spectator slots are full")]
    SpectatorsFull,

    /// The caller is not the host of the room.
    #[error("only the host may do that")]
    NotHost,

    /// The user has no player record in this room.
    #[error("{0} is not in this room")]
    NotInRoom(Uid),

    /// The operation is not allowed in the room's current state.
    #[error("invalid room state for this operation: {0}")]
    InvalidState(String),

    /// A settings patch contained an out-of-range or mistyped value.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// Code generation exhausted its retry budget.
    #[error("could not allocate a unique room code")]
    CodesExhausted,

    /// A persisted document failed to deserialize.
    #[error("corrupt document: {0}")]
    Corrupt(String),

    /// The store failed underneath us.
    #[error(transparent)]
    Store(#[from] StoreError),
}
