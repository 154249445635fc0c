//! Play-again vote tally for an ended room.

use std::collections::HashSet;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use triviarena_protocol::Uid;

use crate::actor::RoomCommand;

/// Votes required to restart, and the minimum online count for a
/// restart to make sense.
pub const PLAY_AGAIN_REQUIRED: u32 = 2;

/// How long the first vote stays open before the attempt fails.
pub const PLAY_AGAIN_WINDOW: Duration = Duration::from_secs(30);

/// In-memory play-again tally for one room. Lives inside the room actor
/// and is cleared whenever the room leaves the `ended` state.
#[derive(Default)]
pub struct PlayAgainQuorum {
    votes: HashSet<Uid>,
    timeout: Option<JoinHandle<()>>,
}

impl PlayAgainQuorum {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a vote. Returns `false` for a duplicate (idempotent).
    pub fn vote(&mut self, uid: Uid) -> bool {
        self.votes.insert(uid)
    }

    /// Removes a voter (they disconnected). Returns `true` if they had
    /// voted.
    pub fn remove_vote(&mut self, uid: &Uid) -> bool {
        self.votes.remove(uid)
    }

    pub fn votes(&self) -> u32 {
        self.votes.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    /// Whether the quorum is met: enough votes and enough people still
    /// online to restart.
    pub fn reached(&self, total_online: u32) -> bool {
        self.votes() >= PLAY_AGAIN_REQUIRED && total_online >= PLAY_AGAIN_REQUIRED
    }

    /// Arms the inactivity window if it is not already running.
    pub fn arm_timeout(&mut self, tx: mpsc::Sender<RoomCommand>) {
        if self.timeout.is_some() {
            return;
        }
        self.timeout = Some(tokio::spawn(async move {
            tokio::time::sleep(PLAY_AGAIN_WINDOW).await;
            let _ = tx.send(RoomCommand::PlayAgainTimeout).await;
        }));
    }

    /// Drops all votes and the pending timeout.
    pub fn clear(&mut self) {
        self.votes.clear();
        if let Some(handle) = self.timeout.take() {
            handle.abort();
        }
    }
}

impl Drop for PlayAgainQuorum {
    fn drop(&mut self) {
        if let Some(handle) = self.timeout.take() {
            handle.abort();
        }
    }
}
