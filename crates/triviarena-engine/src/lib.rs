//! Game engine for Triviarena.
//!
//! The pieces, bottom-up:
//!
//! - [`GameEngine`] — the turn/steal reducer over the document store.
//!   One submission path serves both client answers and
//!   timer-synthesized timeouts.
//! - [`TimerScheduler`] — per-room one-shot timers keyed by phase, with
//!   stale fencing.
//! - [`PlayAgainQuorum`] — the restart vote tally for ended rooms.
//! - [`RoomHandle`] / room actors — one task per room serializing every
//!   mutation.
//! - [`RoomService`] — the process-wide map of live rooms.

mod actor;
mod engine;
mod error;
mod quorum;
mod service;
mod source;
mod timer;

pub use actor::{CmdReply, OutboundSender, RoomCommand, RoomHandle};
pub use engine::{
    build_snapshot, find_next_online_player, rejoin_role, scores_map, GameEngine,
    Outcome,
};
pub use error::EngineError;
pub use quorum::{PlayAgainQuorum, PLAY_AGAIN_REQUIRED, PLAY_AGAIN_WINDOW};
pub use service::RoomService;
pub use source::{shuffle_options, FixtureSource, QuestionSource, TriviaItem};
pub use timer::{TimerAction, TimerFence, TimerPhase, TimerScheduler};
