//! Per-room one-shot timers with stale fencing.
//!
//! Each room actor owns one [`TimerScheduler`]. At most one timer exists
//! per phase; arming a phase aborts whatever was armed there before. A
//! fired timer does not touch state itself — it posts a `TimerFired`
//! command (carrying the [`TimerFence`] captured at arm time) back into
//! the actor mailbox, and the engine's guards drop it if the room has
//! moved on. Abort may race an in-flight send; the fence makes that
//! harmless.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use triviarena_protocol::Uid;

use crate::actor::RoomCommand;

/// Which game phase a timer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerPhase {
    Turn,
    Steal,
}

/// The state a timer was armed against. A fired timer is only acted on
/// if this still matches the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerFence {
    pub question_id: String,
    pub uid: Uid,
}

/// A timer side effect requested by an engine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerAction {
    Arm {
        phase: TimerPhase,
        secs: u64,
        fence: TimerFence,
    },
    Cancel(TimerPhase),
    CancelAll,
}

struct ArmedTimer {
    handle: JoinHandle<()>,
    deadline: Instant,
}

impl Drop for ArmedTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// One-shot timers for a single room, keyed by phase.
pub struct TimerScheduler {
    tx: mpsc::Sender<RoomCommand>,
    armed: HashMap<TimerPhase, ArmedTimer>,
}

impl TimerScheduler {
    /// `tx` is the owning room actor's own mailbox.
    pub fn new(tx: mpsc::Sender<RoomCommand>) -> Self {
        Self {
            tx,
            armed: HashMap::new(),
        }
    }

    /// Applies the timer side effects of one engine transition, in order.
    pub fn apply(&mut self, actions: Vec<TimerAction>) {
        for action in actions {
            match action {
                TimerAction::Arm { phase, secs, fence } => self.arm(phase, secs, fence),
                TimerAction::Cancel(phase) => self.cancel(phase),
                TimerAction::CancelAll => self.cancel_all(),
            }
        }
    }

    fn arm(&mut self, phase: TimerPhase, secs: u64, fence: TimerFence) {
        self.cancel(phase);
        let duration = Duration::from_secs(secs);
        let deadline = Instant::now() + duration;
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            // The actor may already be gone; a dead mailbox is fine.
            let _ = tx.send(RoomCommand::TimerFired { phase, fence }).await;
        });
        tracing::debug!(?phase, secs, "timer armed");
        self.armed.insert(phase, ArmedTimer { handle, deadline });
    }

    /// Best-effort cancel: the sleep task is aborted, but a send that
    /// already happened will still be delivered and fenced out.
    pub fn cancel(&mut self, phase: TimerPhase) {
        if self.armed.remove(&phase).is_some() {
            tracing::debug!(?phase, "timer cancelled");
        }
    }

    pub fn cancel_all(&mut self) {
        self.cancel(TimerPhase::Turn);
        self.cancel(TimerPhase::Steal);
    }

    /// Seconds until the given phase fires, if armed. Used to tell a
    /// rejoining client how much time is left.
    pub fn remaining_secs(&self, phase: TimerPhase) -> Option<u64> {
        self.armed.get(&phase).map(|t| {
            t.deadline
                .saturating_duration_since(Instant::now())
                .as_secs()
        })
    }

    pub fn is_armed(&self, phase: TimerPhase) -> bool {
        self.armed.contains_key(&phase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fence(q: &str, uid: &str) -> TimerFence {
        TimerFence {
            question_id: q.into(),
            uid: Uid::from(uid),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_armed_timer_fires_with_its_fence() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut timers = TimerScheduler::new(tx);

        timers.apply(vec![TimerAction::Arm {
            phase: TimerPhase::Turn,
            secs: 30,
            fence: fence("2", "alice"),
        }]);

        tokio::time::advance(Duration::from_secs(31)).await;
        match rx.recv().await {
            Some(RoomCommand::TimerFired { phase, fence: f }) => {
                assert_eq!(phase, TimerPhase::Turn);
                assert_eq!(f, fence("2", "alice"));
            }
            other => panic!("expected TimerFired, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearming_replaces_previous_timer() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut timers = TimerScheduler::new(tx);

        timers.apply(vec![TimerAction::Arm {
            phase: TimerPhase::Turn,
            secs: 10,
            fence: fence("0", "alice"),
        }]);
        timers.apply(vec![TimerAction::Arm {
            phase: TimerPhase::Turn,
            secs: 10,
            fence: fence("1", "bob"),
        }]);

        tokio::time::advance(Duration::from_secs(60)).await;
        // Only the second arm should ever fire.
        match rx.recv().await {
            Some(RoomCommand::TimerFired { fence: f, .. }) => {
                assert_eq!(f.uid, Uid::from("bob"));
            }
            other => panic!("expected TimerFired, got {other:?}"),
        }
        assert!(rx.try_recv().is_err(), "first timer must not fire");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut timers = TimerScheduler::new(tx);

        timers.apply(vec![TimerAction::Arm {
            phase: TimerPhase::Steal,
            secs: 15,
            fence: fence("3", "carol"),
        }]);
        timers.apply(vec![TimerAction::Cancel(TimerPhase::Steal)]);

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(rx.try_recv().is_err());
        assert!(!timers.is_armed(TimerPhase::Steal));
    }

    #[tokio::test(start_paused = true)]
    async fn test_turn_and_steal_keys_are_independent() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut timers = TimerScheduler::new(tx);

        timers.apply(vec![
            TimerAction::Arm {
                phase: TimerPhase::Turn,
                secs: 30,
                fence: fence("0", "alice"),
            },
            TimerAction::Arm {
                phase: TimerPhase::Steal,
                secs: 5,
                fence: fence("0", "bob"),
            },
        ]);
        timers.apply(vec![TimerAction::Cancel(TimerPhase::Turn)]);

        tokio::time::advance(Duration::from_secs(6)).await;
        match rx.recv().await {
            Some(RoomCommand::TimerFired { phase, .. }) => {
                assert_eq!(phase, TimerPhase::Steal);
            }
            other => panic!("expected steal TimerFired, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_secs_counts_down() {
        let (tx, _rx) = mpsc::channel(8);
        let mut timers = TimerScheduler::new(tx);
        timers.apply(vec![TimerAction::Arm {
            phase: TimerPhase::Turn,
            secs: 30,
            fence: fence("0", "alice"),
        }]);

        tokio::time::advance(Duration::from_secs(10)).await;
        let remaining = timers.remaining_secs(TimerPhase::Turn).unwrap();
        assert!(remaining <= 20, "expected <= 20, got {remaining}");
        assert!(timers.remaining_secs(TimerPhase::Steal).is_none());
    }
}
