//! Error types for the engine layer.

use triviarena_room::RoomError;
use triviarena_store::StoreError;

/// Errors that can occur inside the game engine and room actors.
///
/// Stale events are not errors — they resolve to a no-action outcome so
/// the client gets an ok ack with `noActionTaken`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The submission came from someone other than the turn-taker.
    #[error("not your turn")]
    NotYourTurn,

    /// The steal submission came from someone other than the stealer.
    #[error("you are not the stealer")]
    NotTheStealer,

    /// Only the host may start the game.
    #[error("only the host can start the game")]
    NotHost,

    /// Fewer than two online players hold the player role.
    #[error("at least 2 online players are required to start")]
    NotEnoughPlayers,

    /// The question source returned fewer items than the game needs.
    #[error("the question source could not supply enough questions")]
    NotEnoughQuestions,

    /// The operation is not valid in the room's current state.
    #[error("{0}")]
    InvalidState(String),

    /// The question source failed.
    #[error("question source error: {0}")]
    Source(String),

    /// The room's mailbox is gone (room destroyed or shutting down).
    #[error("room is unavailable")]
    Unavailable,

    /// A room-layer failure (not found, full, invalid settings, ...).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A store failure outside the room layer.
    #[error(transparent)]
    Store(#[from] StoreError),
}
