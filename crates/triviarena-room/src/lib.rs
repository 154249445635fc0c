//! Room lifecycle for Triviarena: the data model, the registry that
//! mints rooms and codes, membership management with host migration,
//! and settings validation.
//!
//! Game-turn semantics live one layer up in `triviarena-engine`; this
//! crate only knows documents and membership rules.

mod error;
mod manager;
mod model;
mod registry;
mod settings;

pub use error::RoomError;
pub use manager::{player_infos, JoinOutcome, LeaveOutcome, RoomManager};
pub use model::{
    now_millis, GameSettings, Player, Question, Room, StealAttempt, MAX_OCCUPANTS,
    MAX_PLAYERS, MAX_SPECTATORS,
};
pub use registry::RoomRegistry;
pub use settings::apply_settings_patch;
