//! # Triviarena
//!
//! Server-authoritative core of a real-time multiplayer trivia game.
//! Rooms progress through a deterministic turn/steal protocol driven by
//! server timers; clients connect over WebSocket, authenticate with a
//! bearer token, and exchange tagged JSON events.
//!
//! This meta crate wires the layers together — see the sub-crates for
//! the protocol, the document store, room membership, the game engine,
//! and the transport.

mod config;
mod error;
mod handler;
mod server;

pub use config::{ConfigError, ServerConfig};
pub use error::TriviarenaError;
pub use server::{TriviarenaServer, TriviarenaServerBuilder};

/// Re-exports everything needed to embed or test the server.
pub mod prelude {
    pub use crate::{
        ConfigError, ServerConfig, TriviarenaError, TriviarenaServer,
        TriviarenaServerBuilder,
    };

    pub use triviarena_engine::{
        EngineError, FixtureSource, QuestionSource, RoomService, TriviaItem,
    };
    pub use triviarena_protocol::{
        Ack, AckStatus, ClientEvent, ClientFrame, ClientQuestion, Codec,
        GameSnapshot, JsonCodec, PlayerInfo, PlayerRole, ProtocolError, RoomCode,
        RoomId, RoomState, ServerEvent, ServerFrame, Uid,
    };
    pub use triviarena_room::{GameSettings, RoomError};
    pub use triviarena_session::{AuthIdentity, Authenticator, SessionError};
    pub use triviarena_store::{DocumentStore, MemoryStore, StoreError};
    pub use triviarena_transport::{Connection, Transport, TransportError};
}
