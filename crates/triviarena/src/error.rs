//! Unified error type for the server.

use triviarena_engine::EngineError;
use triviarena_protocol::ProtocolError;
use triviarena_room::RoomError;
use triviarena_session::SessionError;
use triviarena_store::StoreError;
use triviarena_transport::TransportError;

use crate::ConfigError;

/// Top-level error that wraps all layer-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum TriviarenaError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Room(#[from] RoomError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}
