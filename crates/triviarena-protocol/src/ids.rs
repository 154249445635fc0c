//! Identity types shared across the stack.
//!
//! Everything that crosses the wire or keys a map is a newtype here:
//! a [`Uid`] comes from the identity provider, a [`RoomId`] is minted by
//! the server, and a [`RoomCode`] is the human-facing handle players type
//! to join a room.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A stable user id minted by the identity collaborator.
///
/// Opaque to the server — never parsed, only compared and used as a map
/// key. Serializes as the bare string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uid(pub String);

impl Uid {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Uid {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A unique identifier for a room. Process-unique, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

/// The alphabet room codes are drawn from.
///
/// 32 characters: uppercase letters and digits minus the lookalikes
/// `I O 0 1`. Six characters give 32^6 ≈ 1.07e9 combinations.
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of a room code.
pub const ROOM_CODE_LEN: usize = 6;

/// A six-character human-readable room handle.
///
/// Construction goes through [`RoomCode::parse`], which uppercases input
/// and rejects anything outside the alphabet, so a held `RoomCode` is
/// always canonical.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Parses user input into a canonical room code.
    pub fn parse(input: &str) -> Result<Self, InvalidRoomCode> {
        let canon: String = input.trim().to_ascii_uppercase();
        if canon.len() != ROOM_CODE_LEN {
            return Err(InvalidRoomCode);
        }
        if !canon.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b)) {
            return Err(InvalidRoomCode);
        }
        Ok(Self(canon))
    }

    /// Wraps a string already known to be canonical (e.g. generated
    /// server-side from the alphabet).
    pub fn from_canonical(code: String) -> Self {
        debug_assert!(
            code.len() == ROOM_CODE_LEN
                && code.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b))
        );
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RoomCode {
    type Err = InvalidRoomCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// The input was not a valid room code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid room code")]
pub struct InvalidRoomCode;

/// Opaque identifier for a transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}
