//! Room actor: an isolated Tokio task that owns one room.
//!
//! Every mutation for a room — client events, disconnect notifications,
//! timer firings, play-again votes — arrives as a [`RoomCommand`] on the
//! actor's mailbox and runs to completion before the next one, which is
//! the per-room total order the engine's invariants assume. Timer tasks
//! post back into the same mailbox, so a timeout re-enters the exact
//! code path a client submission takes.

use std::collections::HashMap;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot, Mutex};
use triviarena_protocol::{
    PlayerRole, Recipient, RoomCode, RoomId, ServerEvent, ServerFrame, Uid,
    MAX_CHAT_LEN,
};
use triviarena_room::{player_infos, RoomError, RoomManager, RoomRegistry};
use triviarena_store::DocumentStore;

use crate::engine::{build_snapshot, rejoin_role, GameEngine, Outcome};
use crate::quorum::{PlayAgainQuorum, PLAY_AGAIN_REQUIRED};
use crate::source::QuestionSource;
use crate::timer::{TimerFence, TimerPhase, TimerScheduler};
use crate::EngineError;

/// Channel sender for delivering outbound frames to one connection.
pub type OutboundSender = mpsc::UnboundedSender<ServerFrame>;

/// The successful reply to a room command: the ack payload plus the
/// stale-event marker.
#[derive(Debug, Clone)]
pub struct CmdReply {
    pub data: Value,
    pub no_action: bool,
}

impl CmdReply {
    fn ok(data: Value) -> Self {
        Self {
            data,
            no_action: false,
        }
    }
}

type Reply = oneshot::Sender<Result<CmdReply, EngineError>>;

/// Commands a room actor processes, one at a time.
pub enum RoomCommand {
    Join {
        uid: Uid,
        name: String,
        avatar_url: Option<String>,
        sender: OutboundSender,
        reply: Reply,
    },
    Leave {
        uid: Uid,
        reply: Reply,
    },
    UpdateSettings {
        uid: Uid,
        patch: Value,
        reply: Reply,
    },
    StartGame {
        uid: Uid,
        overrides: Option<Value>,
        reply: Reply,
    },
    SubmitAnswer {
        uid: Uid,
        question_id: String,
        answer_index: i32,
        reply: Reply,
    },
    SubmitSteal {
        uid: Uid,
        question_id: String,
        answer_index: i32,
        reply: Reply,
    },
    PlayAgain {
        uid: Uid,
        reply: Reply,
    },
    Rejoin {
        uid: Uid,
        sender: OutboundSender,
        reply: Reply,
    },
    LobbyMessage {
        uid: Uid,
        message: String,
        reply: Reply,
    },
    /// The user's connection dropped. Fire-and-forget.
    Disconnected { uid: Uid },
    /// A phase timer elapsed. The fence is validated against fresh
    /// state by the engine guards.
    TimerFired { phase: TimerPhase, fence: TimerFence },
    /// The play-again inactivity window elapsed.
    PlayAgainTimeout,
    Shutdown,
}

impl fmt::Debug for RoomCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Join { .. } => "Join",
            Self::Leave { .. } => "Leave",
            Self::UpdateSettings { .. } => "UpdateSettings",
            Self::StartGame { .. } => "StartGame",
            Self::SubmitAnswer { .. } => "SubmitAnswer",
            Self::SubmitSteal { .. } => "SubmitSteal",
            Self::PlayAgain { .. } => "PlayAgain",
            Self::Rejoin { .. } => "Rejoin",
            Self::LobbyMessage { .. } => "LobbyMessage",
            Self::Disconnected { .. } => "Disconnected",
            Self::TimerFired { .. } => "TimerFired",
            Self::PlayAgainTimeout => "PlayAgainTimeout",
            Self::Shutdown => "Shutdown",
        };
        f.write_str(name)
    }
}

/// Handle to a running room actor. Cheap to clone.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    tx: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    async fn request<F>(&self, make: F) -> Result<CmdReply, EngineError>
    where
        F: FnOnce(Reply) -> RoomCommand,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| EngineError::Unavailable)?;
        reply_rx.await.map_err(|_| EngineError::Unavailable)?
    }

    pub async fn join(
        &self,
        uid: Uid,
        name: String,
        avatar_url: Option<String>,
        sender: OutboundSender,
    ) -> Result<CmdReply, EngineError> {
        self.request(|reply| RoomCommand::Join {
            uid,
            name,
            avatar_url,
            sender,
            reply,
        })
        .await
    }

    pub async fn leave(&self, uid: Uid) -> Result<CmdReply, EngineError> {
        self.request(|reply| RoomCommand::Leave { uid, reply }).await
    }

    pub async fn update_settings(
        &self,
        uid: Uid,
        patch: Value,
    ) -> Result<CmdReply, EngineError> {
        self.request(|reply| RoomCommand::UpdateSettings { uid, patch, reply })
            .await
    }

    pub async fn start_game(
        &self,
        uid: Uid,
        overrides: Option<Value>,
    ) -> Result<CmdReply, EngineError> {
        self.request(|reply| RoomCommand::StartGame {
            uid,
            overrides,
            reply,
        })
        .await
    }

    pub async fn submit_answer(
        &self,
        uid: Uid,
        question_id: String,
        answer_index: i32,
    ) -> Result<CmdReply, EngineError> {
        self.request(|reply| RoomCommand::SubmitAnswer {
            uid,
            question_id,
            answer_index,
            reply,
        })
        .await
    }

    pub async fn submit_steal(
        &self,
        uid: Uid,
        question_id: String,
        answer_index: i32,
    ) -> Result<CmdReply, EngineError> {
        self.request(|reply| RoomCommand::SubmitSteal {
            uid,
            question_id,
            answer_index,
            reply,
        })
        .await
    }

    pub async fn play_again(&self, uid: Uid) -> Result<CmdReply, EngineError> {
        self.request(|reply| RoomCommand::PlayAgain { uid, reply })
            .await
    }

    pub async fn rejoin(
        &self,
        uid: Uid,
        sender: OutboundSender,
    ) -> Result<CmdReply, EngineError> {
        self.request(|reply| RoomCommand::Rejoin { uid, sender, reply })
            .await
    }

    pub async fn lobby_message(
        &self,
        uid: Uid,
        message: String,
    ) -> Result<CmdReply, EngineError> {
        self.request(|reply| RoomCommand::LobbyMessage { uid, message, reply })
            .await
    }

    /// Notifies the actor that the user's connection dropped.
    pub async fn disconnected(&self, uid: Uid) {
        let _ = self.tx.send(RoomCommand::Disconnected { uid }).await;
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(RoomCommand::Shutdown).await;
    }
}

/// The room actor. Runs inside its own Tokio task.
struct RoomActor<S, Q> {
    room_id: RoomId,
    code: RoomCode,
    engine: GameEngine<S, Q>,
    manager: RoomManager<S>,
    registry: Arc<RoomRegistry<S>>,
    handles: Arc<Mutex<HashMap<RoomId, RoomHandle>>>,
    senders: HashMap<Uid, OutboundSender>,
    timers: TimerScheduler,
    quorum: PlayAgainQuorum,
    tx: mpsc::Sender<RoomCommand>,
    rx: mpsc::Receiver<RoomCommand>,
}

impl<S: DocumentStore, Q: QuestionSource> RoomActor<S, Q> {
    async fn run(mut self) {
        tracing::info!(room_id = %self.room_id, "room actor started");

        while let Some(cmd) = self.rx.recv().await {
            if self.handle(cmd).await.is_break() {
                break;
            }
        }

        tracing::info!(room_id = %self.room_id, "room actor stopped");
    }

    async fn handle(&mut self, cmd: RoomCommand) -> ControlFlow<()> {
        match cmd {
            RoomCommand::Join {
                uid,
                name,
                avatar_url,
                sender,
                reply,
            } => {
                let result = self.handle_join(uid, name, avatar_url, sender).await;
                let _ = reply.send(result);
            }
            RoomCommand::Leave { uid, reply } => {
                let (result, destroyed) = self.handle_leave(uid).await;
                let _ = reply.send(result);
                if destroyed {
                    return ControlFlow::Break(());
                }
            }
            RoomCommand::UpdateSettings { uid, patch, reply } => {
                let result = self.handle_update_settings(uid, patch).await;
                let _ = reply.send(result);
            }
            RoomCommand::StartGame {
                uid,
                overrides,
                reply,
            } => {
                let result = self.handle_start_game(Some(uid), overrides).await;
                let _ = reply.send(result);
            }
            RoomCommand::SubmitAnswer {
                uid,
                question_id,
                answer_index,
                reply,
            } => {
                let result = self
                    .engine
                    .submit_answer(self.room_id, &uid, &question_id, answer_index, false)
                    .await;
                let _ = reply.send(self.finish(result));
            }
            RoomCommand::SubmitSteal {
                uid,
                question_id,
                answer_index,
                reply,
            } => {
                let result = self
                    .engine
                    .submit_steal(self.room_id, &uid, &question_id, answer_index, false)
                    .await;
                let _ = reply.send(self.finish(result));
            }
            RoomCommand::PlayAgain { uid, reply } => {
                let result = self.handle_play_again(uid).await;
                let _ = reply.send(result);
            }
            RoomCommand::Rejoin { uid, sender, reply } => {
                let result = self.handle_rejoin(uid, sender).await;
                let _ = reply.send(result);
            }
            RoomCommand::LobbyMessage { uid, message, reply } => {
                let result = self.handle_lobby(uid, message).await;
                let _ = reply.send(result);
            }
            RoomCommand::Disconnected { uid } => {
                if self.handle_disconnected(uid).await {
                    return ControlFlow::Break(());
                }
            }
            RoomCommand::TimerFired { phase, fence } => {
                self.handle_timer_fired(phase, fence).await;
            }
            RoomCommand::PlayAgainTimeout => {
                self.handle_play_again_timeout().await;
            }
            RoomCommand::Shutdown => {
                self.timers.cancel_all();
                self.quorum.clear();
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    // -- Command handlers --------------------------------------------------

    async fn handle_join(
        &mut self,
        uid: Uid,
        name: String,
        avatar_url: Option<String>,
        sender: OutboundSender,
    ) -> Result<CmdReply, EngineError> {
        let outcome = self
            .manager
            .join(self.room_id, uid.clone(), name.clone(), avatar_url)
            .await?;

        self.senders.insert(uid.clone(), sender);

        let event = if outcome.rejoined {
            ServerEvent::PlayerRejoined {
                uid: uid.clone(),
                role: outcome.player.role,
            }
        } else {
            ServerEvent::PlayerJoined {
                uid: uid.clone(),
                name,
                role: outcome.player.role,
            }
        };
        self.dispatch(vec![(Recipient::All, event)]);
        self.broadcast_player_list(false).await;

        if outcome.room_state.is_active() && outcome.player.role == PlayerRole::Spectator
        {
            self.dispatch(vec![(
                Recipient::User(uid),
                ServerEvent::SpectatingActiveGame {
                    room_id: self.room_id,
                },
            )]);
        }

        Ok(CmdReply::ok(json!({
            "roomId": self.room_id,
            "roomCode": self.code,
            "role": outcome.player.role,
            "roomState": outcome.room_state,
        })))
    }

    /// Voluntary leave. Returns the reply plus whether the room was
    /// destroyed (which stops the actor).
    async fn handle_leave(&mut self, uid: Uid) -> (Result<CmdReply, EngineError>, bool) {
        match self.leave_inner(uid).await {
            Ok((reply, destroyed)) => (Ok(reply), destroyed),
            Err(e) => (Err(e), false),
        }
    }

    async fn leave_inner(&mut self, uid: Uid) -> Result<(CmdReply, bool), EngineError> {
        let room = self.manager.require_room(self.room_id).await?;

        // If the leaver holds the live phase, run their timeout through
        // the normal submission path before the membership change.
        if room.state.is_active() {
            self.synthesize_timeout_for(&room, &uid).await;
        }

        let outcome = self.manager.leave(self.room_id, &uid).await?;
        self.senders.remove(&uid);
        self.drop_vote_of(&uid).await;

        if outcome.room_deleted {
            self.destroy().await;
            return Ok((
                CmdReply::ok(json!({
                    "hostChanged": false,
                    "roomDeleted": true,
                })),
                true,
            ));
        }

        self.dispatch(vec![(
            Recipient::All,
            ServerEvent::PlayerLeft {
                uid: uid.clone(),
                new_host_uid: outcome.new_host_uid.clone(),
            },
        )]);
        self.broadcast_player_list(false).await;

        if let Ok(Some(ended)) = self.engine.end_if_underpopulated(self.room_id).await {
            self.apply(ended);
        }

        Ok((
            CmdReply::ok(json!({
                "hostChanged": outcome.host_changed,
                "newHostUid": outcome.new_host_uid,
                "roomDeleted": false,
            })),
            false,
        ))
    }

    async fn handle_update_settings(
        &mut self,
        uid: Uid,
        patch: Value,
    ) -> Result<CmdReply, EngineError> {
        let merged = self
            .manager
            .update_settings(self.room_id, &uid, &patch)
            .await?;
        self.broadcast_player_list(true).await;
        Ok(CmdReply::ok(json!({ "updatedSettings": merged.to_value() })))
    }

    async fn handle_start_game(
        &mut self,
        caller: Option<Uid>,
        overrides: Option<Value>,
    ) -> Result<CmdReply, EngineError> {
        let outcome = self
            .engine
            .start_game(self.room_id, caller.as_ref(), overrides.as_ref())
            .await?;
        self.quorum.clear();
        Ok(self.apply(outcome))
    }

    async fn handle_play_again(&mut self, uid: Uid) -> Result<CmdReply, EngineError> {
        let room = self.manager.require_room(self.room_id).await?;
        if !room.state.is_ended() {
            return Err(EngineError::InvalidState("the game is not over".into()));
        }
        let players = self.manager.load_players(self.room_id).await?;
        if !players.iter().any(|p| p.uid == uid) {
            return Err(EngineError::Room(RoomError::NotInRoom(uid)));
        }

        self.quorum.vote(uid);
        let total_online = players.iter().filter(|p| p.online).count() as u32;

        if self.quorum.reached(total_online) {
            self.quorum.clear();
            let outcome = self.engine.start_game(self.room_id, None, None).await?;
            return Ok(self.apply(outcome));
        }

        if total_online >= PLAY_AGAIN_REQUIRED {
            self.quorum.arm_timeout(self.tx.clone());
        }
        let votes = self.quorum.votes();
        self.dispatch(vec![(
            Recipient::All,
            ServerEvent::PlayAgainStatus {
                votes,
                total_online,
                required: PLAY_AGAIN_REQUIRED,
            },
        )]);
        Ok(CmdReply::ok(json!({
            "votes": votes,
            "totalOnline": total_online,
            "required": PLAY_AGAIN_REQUIRED,
        })))
    }

    async fn handle_rejoin(
        &mut self,
        uid: Uid,
        sender: OutboundSender,
    ) -> Result<CmdReply, EngineError> {
        let room = self.manager.require_room(self.room_id).await?;
        if self.manager.load_player(self.room_id, &uid).await?.is_none() {
            return Err(EngineError::Room(RoomError::NotInRoom(uid)));
        }
        self.senders.insert(uid.clone(), sender);

        if !room.state.is_active() {
            self.manager.set_online(self.room_id, &uid, true).await?;
            self.manager
                .set_role(self.room_id, &uid, PlayerRole::Player)
                .await?;
            self.dispatch(vec![(
                Recipient::All,
                ServerEvent::PlayerRejoined {
                    uid,
                    role: PlayerRole::Player,
                },
            )]);
            self.broadcast_player_list(false).await;
            return Ok(CmdReply::ok(json!({
                "role": PlayerRole::Player,
                "roomState": room.state,
            })));
        }

        let role = rejoin_role(&room, &uid);
        self.manager.set_online(self.room_id, &uid, true).await?;
        self.manager.set_role(self.room_id, &uid, role).await?;

        self.dispatch(vec![(
            Recipient::All,
            ServerEvent::PlayerRejoined {
                uid: uid.clone(),
                role,
            },
        )]);
        self.broadcast_player_list(false).await;

        let players = self.manager.load_players(self.room_id).await?;
        let questions = self.manager.load_questions(self.room_id).await?;
        let current = questions
            .get(room.current_question_index as usize)
            .cloned()
            .ok_or_else(|| {
                EngineError::InvalidState("current question is missing".into())
            })?;
        let remaining = if room.steal_attempt.is_some() {
            self.timers
                .remaining_secs(TimerPhase::Steal)
                .unwrap_or(room.settings.steal_timeout_sec as u64)
        } else {
            self.timers
                .remaining_secs(TimerPhase::Turn)
                .unwrap_or(room.settings.turn_timeout_sec as u64)
        };
        let snapshot = build_snapshot(&room, &players, &questions, &current, remaining);

        if role == PlayerRole::Spectator {
            self.dispatch(vec![(
                Recipient::User(uid),
                ServerEvent::SpectatingActiveGame {
                    room_id: self.room_id,
                },
            )]);
        }

        Ok(CmdReply::ok(json!({
            "role": role,
            "roomState": room.state,
            "snapshot": snapshot,
        })))
    }

    async fn handle_lobby(
        &mut self,
        uid: Uid,
        message: String,
    ) -> Result<CmdReply, EngineError> {
        if message.chars().count() > MAX_CHAT_LEN {
            return Err(EngineError::InvalidState(format!(
                "message exceeds {MAX_CHAT_LEN} characters"
            )));
        }
        let player = self
            .manager
            .load_player(self.room_id, &uid)
            .await?
            .ok_or(EngineError::Room(RoomError::NotInRoom(uid.clone())))?;
        self.dispatch(vec![(
            Recipient::All,
            ServerEvent::LobbyMessage {
                from_uid: uid,
                from_name: player.name,
                message,
            },
        )]);
        Ok(CmdReply::ok(Value::Null))
    }

    /// Returns `true` when the disconnect destroyed the room.
    async fn handle_disconnected(&mut self, uid: Uid) -> bool {
        self.senders.remove(&uid);

        let Ok(Some(room)) = self.manager.load_room(self.room_id).await else {
            return false;
        };
        let Ok(Some(player)) = self.manager.load_player(self.room_id, &uid).await else {
            return false;
        };

        if room.state.is_active() {
            if !player.online {
                return false;
            }
            if self.manager.set_online(self.room_id, &uid, false).await.is_err() {
                return false;
            }
            self.dispatch(vec![(
                Recipient::All,
                ServerEvent::PlayerOffline { uid: uid.clone() },
            )]);
            self.broadcast_player_list(false).await;

            // A disconnected turn-taker or stealer forfeits the phase
            // immediately rather than stalling the room until the timer.
            self.synthesize_timeout_for(&room, &uid).await;

            if let Ok(Some(ended)) = self.engine.end_if_underpopulated(self.room_id).await
            {
                self.apply(ended);
            }
            return false;
        }

        // Waiting or ended rooms treat a disconnect as a full leave.
        self.drop_vote_of(&uid).await;
        match self.manager.leave(self.room_id, &uid).await {
            Ok(outcome) if outcome.room_deleted => {
                self.destroy().await;
                true
            }
            Ok(outcome) => {
                self.dispatch(vec![(
                    Recipient::All,
                    ServerEvent::PlayerLeft {
                        uid,
                        new_host_uid: outcome.new_host_uid,
                    },
                )]);
                self.broadcast_player_list(false).await;
                false
            }
            Err(e) => {
                tracing::warn!(room_id = %self.room_id, %uid, error = %e, "disconnect cleanup failed");
                false
            }
        }
    }

    async fn handle_timer_fired(&mut self, phase: TimerPhase, fence: TimerFence) {
        // Step one of the firing contract: the timer's own entry leaves
        // the active table before any state is touched.
        self.timers.cancel(phase);

        let result = match phase {
            TimerPhase::Turn => {
                self.engine
                    .submit_answer(self.room_id, &fence.uid, &fence.question_id, -1, true)
                    .await
            }
            TimerPhase::Steal => {
                self.engine
                    .submit_steal(self.room_id, &fence.uid, &fence.question_id, -1, true)
                    .await
            }
        };
        match result {
            Ok(outcome) => {
                if outcome.no_action {
                    tracing::debug!(room_id = %self.room_id, ?phase, "stale timer dropped");
                } else {
                    self.apply(outcome);
                }
            }
            Err(e) => {
                tracing::warn!(room_id = %self.room_id, ?phase, error = %e, "timer transition failed");
            }
        }
    }

    async fn handle_play_again_timeout(&mut self) {
        if self.quorum.is_empty() {
            return;
        }
        self.quorum.clear();
        self.dispatch(vec![(Recipient::All, ServerEvent::PlayAgainFailed)]);
    }

    // -- Internals ---------------------------------------------------------

    /// Runs the leaver's pending phase through the timeout path: a steal
    /// forfeit if they are the stealer, a turn forfeit if they hold the
    /// turn.
    async fn synthesize_timeout_for(&mut self, room: &triviarena_room::Room, uid: &Uid) {
        let question_id = room.current_question_id();
        let is_stealer = room
            .steal_attempt
            .as_ref()
            .is_some_and(|s| &s.stealer_uid == uid);

        let result = if is_stealer {
            self.engine
                .submit_steal(self.room_id, uid, &question_id, -1, true)
                .await
        } else if room.current_turn_uid.as_ref() == Some(uid) && room.steal_attempt.is_none()
        {
            self.engine
                .submit_answer(self.room_id, uid, &question_id, -1, true)
                .await
        } else {
            return;
        };

        match result {
            Ok(outcome) if !outcome.no_action => {
                self.apply(outcome);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(room_id = %self.room_id, %uid, error = %e, "synthesized timeout failed");
            }
        }
    }

    /// Removes a departing user's play-again vote and re-broadcasts or
    /// clears the tally.
    async fn drop_vote_of(&mut self, uid: &Uid) {
        if !self.quorum.remove_vote(uid) {
            return;
        }
        if self.quorum.is_empty() {
            self.quorum.clear();
            return;
        }
        let total_online = match self.manager.load_players(self.room_id).await {
            Ok(players) => players.iter().filter(|p| p.online).count() as u32,
            Err(_) => 0,
        };
        self.dispatch(vec![(
            Recipient::All,
            ServerEvent::PlayAgainStatus {
                votes: self.quorum.votes(),
                total_online,
                required: PLAY_AGAIN_REQUIRED,
            },
        )]);
    }

    /// Queues an outcome's events, applies its timers, and shapes the
    /// command reply.
    fn apply(&mut self, outcome: Outcome) -> CmdReply {
        self.dispatch(outcome.events);
        self.timers.apply(outcome.timers);
        CmdReply {
            data: outcome.reply,
            no_action: outcome.no_action,
        }
    }

    fn finish(
        &mut self,
        result: Result<Outcome, EngineError>,
    ) -> Result<CmdReply, EngineError> {
        result.map(|outcome| self.apply(outcome))
    }

    /// Fans events out to the room's connections. A dead sender means
    /// the connection is gone; the frame is silently dropped.
    fn dispatch(&self, events: Vec<(Recipient, ServerEvent)>) {
        for (recipient, event) in events {
            match recipient {
                Recipient::All => {
                    for sender in self.senders.values() {
                        let _ = sender.send(ServerFrame::Event(event.clone()));
                    }
                }
                Recipient::User(uid) => {
                    if let Some(sender) = self.senders.get(&uid) {
                        let _ = sender.send(ServerFrame::Event(event));
                    }
                }
            }
        }
    }

    async fn broadcast_player_list(&mut self, include_settings: bool) {
        let (room, players) = match (
            self.manager.load_room(self.room_id).await,
            self.manager.load_players(self.room_id).await,
        ) {
            (Ok(Some(room)), Ok(players)) => (room, players),
            _ => return,
        };
        self.dispatch(vec![(
            Recipient::All,
            ServerEvent::UpdatePlayerList {
                players: player_infos(&players),
                host_id: room.host_uid.clone(),
                room_state: room.state,
                game_settings: include_settings.then(|| room.settings.to_value()),
            },
        )]);
    }

    /// Tears down process-local room state after the documents are gone.
    async fn destroy(&mut self) {
        self.timers.cancel_all();
        self.quorum.clear();
        self.registry.release(&self.code).await;
        self.handles.lock().await.remove(&self.room_id);
        self.senders.clear();
    }
}

/// Spawns a room actor task and returns its handle. `initial` attaches
/// the creator's outbound channel so the host receives broadcasts from
/// the first transition on.
pub(crate) fn spawn_room<S: DocumentStore, Q: QuestionSource>(
    room_id: RoomId,
    code: RoomCode,
    engine: GameEngine<S, Q>,
    manager: RoomManager<S>,
    registry: Arc<RoomRegistry<S>>,
    handles: Arc<Mutex<HashMap<RoomId, RoomHandle>>>,
    initial: Option<(Uid, OutboundSender)>,
    channel_size: usize,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(channel_size);

    let mut senders = HashMap::new();
    if let Some((uid, sender)) = initial {
        senders.insert(uid, sender);
    }

    let actor = RoomActor {
        room_id,
        code,
        engine,
        manager,
        registry,
        handles,
        senders,
        timers: TimerScheduler::new(tx.clone()),
        quorum: PlayAgainQuorum::new(),
        tx: tx.clone(),
        rx,
    };

    tokio::spawn(actor.run());

    RoomHandle { room_id, tx }
}
