//! Wire protocol for Triviarena.
//!
//! This crate defines the language clients and server speak:
//!
//! - **Ids** ([`Uid`], [`RoomId`], [`RoomCode`], [`ConnectionId`]) — the
//!   identities everything else is keyed by.
//! - **Events** ([`ClientEvent`], [`ServerEvent`], [`Ack`] and the frame
//!   wrappers) — the structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how frames become bytes.
//!
//! The protocol layer sits between transport (raw bytes) and the session
//! layer (connection identity). It knows nothing about rooms or games —
//! only shapes.

mod codec;
mod error;
mod events;
mod ids;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use events::{
    Ack, AckStatus, ClientEvent, ClientFrame, ClientQuestion, GameSnapshot,
    PlayerInfo, PlayerRole, Recipient, RoomState, ServerEvent, ServerFrame,
    StealView, MAX_CHAT_LEN,
};
pub use ids::{
    ConnectionId, InvalidRoomCode, RoomCode, RoomId, Uid, ROOM_CODE_ALPHABET,
    ROOM_CODE_LEN,
};
