//! The turn/steal game engine.
//!
//! Every entrypoint is a reducer: load the room, guard, mutate through
//! the store, and hand back an [`Outcome`] — the ack payload for the
//! caller plus the events to broadcast and the timer side effects to
//! apply. The owning room actor applies those after the writes commit,
//! so a transition is visible to timers only once it is durable.
//!
//! Natural submissions and timer-synthesized ones share the same two
//! entrypoints (`submit_answer`, `submit_steal`, with `is_timeout`
//! flagging the synthetic case), which is what keeps the timeout race
//! safe: a stale timer fails the same guards a stale client event does
//! and resolves to a no-action outcome.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Value};
use triviarena_protocol::{
    GameSnapshot, PlayerRole, Recipient, RoomId, RoomState, ServerEvent, StealView,
    Uid,
};
use triviarena_room::{
    apply_settings_patch, now_millis, Player, Question, Room, RoomManager,
    StealAttempt,
};
use triviarena_store::{paths, DocumentStore, WriteOp};

use crate::source::{shuffle_options, QuestionSource};
use crate::timer::{TimerAction, TimerFence, TimerPhase};
use crate::EngineError;

/// The result of one engine transition.
#[derive(Debug, Default)]
pub struct Outcome {
    /// Ack payload for the originating caller.
    pub reply: Value,
    /// True when the event was stale and nothing changed.
    pub no_action: bool,
    /// Events to fan out, in emission order.
    pub events: Vec<(Recipient, ServerEvent)>,
    /// Timer side effects, applied after the events are queued.
    pub timers: Vec<TimerAction>,
}

impl Outcome {
    fn no_action() -> Self {
        Self {
            no_action: true,
            ..Self::default()
        }
    }
}

/// Turn/steal state machine over the document store.
pub struct GameEngine<S, Q> {
    store: Arc<S>,
    source: Arc<Q>,
    manager: RoomManager<S>,
}

impl<S, Q> Clone for GameEngine<S, Q> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            source: Arc::clone(&self.source),
            manager: self.manager.clone(),
        }
    }
}

impl<S: DocumentStore, Q: QuestionSource> GameEngine<S, Q> {
    pub fn new(store: Arc<S>, source: Arc<Q>) -> Self {
        let manager = RoomManager::new(Arc::clone(&store));
        Self {
            store,
            source,
            manager,
        }
    }

    // -- startGame ---------------------------------------------------------

    /// Starts the game. `caller` is `None` when the play-again quorum
    /// restarts the room (host authorization already implied).
    pub async fn start_game(
        &self,
        room_id: RoomId,
        caller: Option<&Uid>,
        overrides: Option<&Value>,
    ) -> Result<Outcome, EngineError> {
        let mut room = self.manager.require_room(room_id).await?;
        if room.state.is_active() {
            return Err(EngineError::InvalidState("game already started".into()));
        }
        if let Some(caller) = caller {
            if caller != &room.host_uid {
                return Err(EngineError::NotHost);
            }
            // An ended room restarts through the play-again vote only.
            if room.state.is_ended() {
                return Err(EngineError::InvalidState(
                    "the game is over; vote to play again".into(),
                ));
            }
        }

        let mut players = self.manager.load_players(room_id).await?;
        let participants: Vec<Uid> = players
            .iter()
            .filter(|p| p.is_active_player())
            .map(|p| p.uid.clone())
            .collect();
        if participants.len() < 2 {
            return Err(EngineError::NotEnoughPlayers);
        }

        let settings = match overrides {
            Some(patch) => apply_settings_patch(&room.settings, patch)?,
            None => room.settings.clone(),
        };
        let question_count = participants.len() as u32 * settings.questions_per_player;

        let items = self.source.fetch(question_count as usize).await?;
        if (items.len() as u32) < question_count {
            return Err(EngineError::NotEnoughQuestions);
        }

        // Scoped so the thread-local rng is gone before the next await.
        let questions: Vec<Question> = {
            let mut rng = rand::rng();
            items
                .into_iter()
                .take(question_count as usize)
                .enumerate()
                .map(|(i, item)| {
                    let (options, correct_index) = shuffle_options(
                        &mut rng,
                        item.correct_answer,
                        item.incorrect_answers,
                    );
                    Question {
                        id: i.to_string(),
                        text: item.text,
                        options,
                        correct_index,
                        category: item.category,
                        difficulty: item.difficulty,
                    }
                })
                .collect()
        };

        room.state = RoomState::Active;
        room.started_at = Some(now_millis());
        room.question_count = question_count;
        room.current_question_index = 0;
        room.active_turn_order = participants.clone();
        room.turn_cursor = 0;
        room.current_turn_uid = Some(participants[0].clone());
        room.steal_attempt = None;
        room.settings = settings;

        // Questions, score resets, and the state flip land in one batch:
        // a room is never active with half its questions missing. A
        // restart may have fewer questions than the previous game, so
        // stale leftovers past the new count are deleted too.
        let mut ops: Vec<WriteOp> = Vec::new();
        for (id, _) in self.store.list(&paths::questions(room_id.0)).await? {
            if let Ok(index) = id.parse::<u32>() {
                if index >= question_count {
                    ops.push(WriteOp::delete(paths::question(room_id.0, index)));
                }
            }
        }
        ops.extend(
            questions
                .iter()
                .enumerate()
                .map(|(i, q)| WriteOp::set(paths::question(room_id.0, i as u32), q.to_doc())),
        );
        for uid in &participants {
            ops.push(WriteOp::update(
                paths::player(room_id.0, uid.as_str()),
                json!({ "score": 0 }),
            ));
        }
        ops.push(WriteOp::set(paths::room(room_id.0), room.to_doc()));
        self.store.batch(ops).await?;

        for p in &mut players {
            if participants.contains(&p.uid) {
                p.score = 0;
            }
        }

        let first = &questions[0];
        let snapshot = build_snapshot(
            &room,
            &players,
            &questions,
            first,
            room.settings.turn_timeout_sec as u64,
        );
        let fence = TimerFence {
            question_id: first.id.clone(),
            uid: participants[0].clone(),
        };

        tracing::info!(
            room_id = %room_id,
            players = participants.len(),
            questions = question_count,
            "game started"
        );

        Ok(Outcome {
            reply: serde_json::to_value(&snapshot).unwrap_or(Value::Null),
            no_action: false,
            events: vec![(Recipient::All, ServerEvent::GameStarted { snapshot })],
            timers: vec![TimerAction::Arm {
                phase: TimerPhase::Turn,
                secs: room.settings.turn_timeout_sec as u64,
                fence,
            }],
        })
    }

    // -- submitAnswer ------------------------------------------------------

    /// Processes a turn answer. `is_timeout` marks a server-synthesized
    /// submission (`answer_index` is -1 there).
    pub async fn submit_answer(
        &self,
        room_id: RoomId,
        uid: &Uid,
        question_id: &str,
        answer_index: i32,
        is_timeout: bool,
    ) -> Result<Outcome, EngineError> {
        let Some(mut room) = self.manager.load_room(room_id).await? else {
            return stale_or(is_timeout, EngineError::Room(triviarena_room::RoomError::NotFound));
        };
        if !room.state.is_active() {
            return Ok(Outcome::no_action());
        }
        // While a steal is live the original question is already
        // consumed; any turn submission against it is stale.
        if room.steal_attempt.is_some() {
            return Ok(Outcome::no_action());
        }
        if room.current_turn_uid.as_ref() != Some(uid) {
            return stale_or(is_timeout, EngineError::NotYourTurn);
        }

        let question = match self
            .manager
            .load_question(room_id, room.current_question_index)
            .await?
        {
            Some(q) => q,
            // Live question missing mid-game: integrity fault.
            None => {
                let players = self.manager.load_players(room_id).await?;
                return self
                    .end_game(&mut room, &players, Some("question could not be loaded"), true)
                    .await;
            }
        };
        if question.id != question_id {
            return Ok(Outcome::no_action());
        }

        let mut outcome = Outcome::default();
        outcome.timers.push(TimerAction::Cancel(TimerPhase::Turn));

        let correct = !is_timeout
            && answer_index >= 0
            && answer_index as usize == question.correct_index as usize;

        outcome.events.push((
            Recipient::All,
            ServerEvent::AnswerResult {
                uid: uid.clone(),
                question_id: question.id.clone(),
                correct,
                correct_index: question.correct_index,
                was_timeout: is_timeout,
            },
        ));

        let mut players = self.manager.load_players(room_id).await?;

        if correct {
            self.award_points(room_id, &mut players, uid, 1).await?;
            outcome.events.push((
                Recipient::All,
                ServerEvent::ScoreUpdate {
                    scores: scores_map(&players),
                },
            ));
            outcome.reply = json!({ "correct": true });
            let next = next_turn_candidate(&room, &players, uid);
            let next_question = room.current_question_index + 1;
            self.advance_or_end(&mut room, &players, next, next_question, &mut outcome)
                .await?;
            return Ok(outcome);
        }

        // Wrong (or timed out): offer a steal if the settings allow it
        // and a distinct online player exists.
        let stealer = find_next_online_player(&room, &players, uid)
            .filter(|(_, candidate)| candidate != uid);
        match stealer {
            Some((_, stealer_uid)) if room.settings.allow_steal => {
                room.steal_attempt = Some(StealAttempt {
                    stealer_uid: stealer_uid.clone(),
                    question_index: room.current_question_index,
                });
                self.manager.save_room(&room).await?;

                let steal_secs = room.settings.steal_timeout_sec as u64;
                outcome.events.push((
                    Recipient::All,
                    ServerEvent::StealOpportunity {
                        question_id: question.id.clone(),
                        next_uid: stealer_uid.clone(),
                        steal_timeout: steal_secs,
                    },
                ));
                outcome.timers.push(TimerAction::Arm {
                    phase: TimerPhase::Steal,
                    secs: steal_secs,
                    fence: TimerFence {
                        question_id: question.id,
                        uid: stealer_uid.clone(),
                    },
                });
                outcome.reply = json!({
                    "correct": false,
                    "phase": "steal",
                    "stealerUid": stealer_uid,
                    "stealTimeout": steal_secs,
                });
            }
            _ => {
                outcome.reply = json!({ "correct": false });
                let next = next_turn_candidate(&room, &players, uid);
                let next_question = room.current_question_index + 1;
                self.advance_or_end(&mut room, &players, next, next_question, &mut outcome)
                    .await?;
            }
        }
        Ok(outcome)
    }

    // -- submitSteal -------------------------------------------------------

    pub async fn submit_steal(
        &self,
        room_id: RoomId,
        uid: &Uid,
        question_id: &str,
        answer_index: i32,
        is_timeout: bool,
    ) -> Result<Outcome, EngineError> {
        let Some(mut room) = self.manager.load_room(room_id).await? else {
            return stale_or(is_timeout, EngineError::Room(triviarena_room::RoomError::NotFound));
        };
        if !room.state.is_active() {
            return stale_or(
                is_timeout,
                EngineError::InvalidState("room is not active".into()),
            );
        }
        let Some(steal) = room.steal_attempt.clone() else {
            return stale_or(is_timeout, EngineError::NotTheStealer);
        };
        if &steal.stealer_uid != uid {
            return stale_or(is_timeout, EngineError::NotTheStealer);
        }
        if steal.question_index != room.current_question_index {
            return stale_or(
                is_timeout,
                EngineError::InvalidState("steal no longer applies to this question".into()),
            );
        }

        let question = match self
            .manager
            .load_question(room_id, room.current_question_index)
            .await?
        {
            Some(q) => q,
            None => {
                let players = self.manager.load_players(room_id).await?;
                return self
                    .end_game(&mut room, &players, Some("question could not be loaded"), true)
                    .await;
            }
        };
        if question.id != question_id {
            return stale_or(
                is_timeout,
                EngineError::InvalidState("steal no longer applies to this question".into()),
            );
        }

        let mut outcome = Outcome::default();
        outcome.timers.push(TimerAction::Cancel(TimerPhase::Steal));

        let correct = !is_timeout
            && answer_index >= 0
            && answer_index as usize == question.correct_index as usize;
        let points = if correct {
            1 + room.settings.bonus_for_steal
        } else {
            0
        };

        let mut players = self.manager.load_players(room_id).await?;
        if correct {
            self.award_points(room_id, &mut players, uid, points).await?;
        }

        outcome.events.push((
            Recipient::All,
            ServerEvent::StealResult {
                uid: uid.clone(),
                question_id: question.id.clone(),
                correct,
                points_awarded: points,
            },
        ));
        if correct {
            outcome.events.push((
                Recipient::All,
                ServerEvent::ScoreUpdate {
                    scores: scores_map(&players),
                },
            ));
        }
        outcome.reply = json!({ "correct": correct, "pointsAwarded": points });

        // Win or lose, the stealer holds the next question.
        let next_question = room.current_question_index + 1;
        self.advance_or_end(
            &mut room,
            &players,
            Some(uid.clone()),
            next_question,
            &mut outcome,
        )
        .await?;
        Ok(outcome)
    }

    // -- Shared transitions ------------------------------------------------

    /// Moves the room to `new_question_index` with `proposed_uid` as the
    /// turn-taker, or ends the game: out of questions, a missing
    /// question document, no eligible turn-taker, or fewer than two
    /// online players left in the rotation.
    async fn advance_or_end(
        &self,
        room: &mut Room,
        players: &[Player],
        proposed_uid: Option<Uid>,
        new_question_index: u32,
        outcome: &mut Outcome,
    ) -> Result<(), EngineError> {
        if online_players_in_order(room, players) < 2 {
            let ended = self
                .end_game(room, players, Some("not enough players to continue"), false)
                .await?;
            merge_end(outcome, ended);
            return Ok(());
        }

        if new_question_index >= room.question_count {
            let ended = self.end_game(room, players, None, false).await?;
            merge_end(outcome, ended);
            return Ok(());
        }

        let question = match self.manager.load_question(room.id, new_question_index).await {
            Ok(Some(q)) => q,
            // Missing or unreadable question mid-game is unrecoverable.
            Ok(None) | Err(_) => {
                let ended = self
                    .end_game(room, players, Some("question could not be loaded"), true)
                    .await?;
                merge_end(outcome, ended);
                return Ok(());
            }
        };

        // The proposed turn-taker may have gone offline since they were
        // chosen; fall back to rotation order from their slot.
        let resolved = proposed_uid
            .and_then(|uid| {
                let still_eligible = room.active_turn_order.contains(&uid)
                    && players
                        .iter()
                        .any(|p| p.uid == uid && p.is_active_player());
                if still_eligible {
                    room.active_turn_order
                        .iter()
                        .position(|u| *u == uid)
                        .map(|idx| (idx, uid))
                } else {
                    find_next_online_player(room, players, &uid)
                }
            })
            .or_else(|| {
                room.current_turn_uid
                    .clone()
                    .and_then(|uid| find_next_online_player(room, players, &uid))
            });

        let Some((index, uid)) = resolved else {
            let ended = self
                .end_game(room, players, Some("no eligible player for the next turn"), false)
                .await?;
            merge_end(outcome, ended);
            return Ok(());
        };

        room.current_question_index = new_question_index;
        room.current_turn_uid = Some(uid.clone());
        room.turn_cursor = index as i32;
        room.steal_attempt = None;
        self.manager.save_room(room).await?;

        outcome.events.push((
            Recipient::All,
            ServerEvent::NextTurn {
                question: question.client_view(),
                turn_uid: uid.clone(),
                timeout: room.settings.turn_timeout_sec as u64,
                current_question_num: new_question_index + 1,
                total_questions: room.question_count,
            },
        ));
        outcome.timers.push(TimerAction::Arm {
            phase: TimerPhase::Turn,
            secs: room.settings.turn_timeout_sec as u64,
            fence: TimerFence {
                question_id: question.id,
                uid,
            },
        });
        Ok(())
    }

    /// Ends the game and clears all turn state. `integrity_fault` adds a
    /// `gameError` broadcast ahead of the final scores.
    async fn end_game(
        &self,
        room: &mut Room,
        players: &[Player],
        message: Option<&str>,
        integrity_fault: bool,
    ) -> Result<Outcome, EngineError> {
        room.state = RoomState::Ended;
        room.current_turn_uid = None;
        room.turn_cursor = -1;
        room.steal_attempt = None;
        self.manager.save_room(room).await?;

        let mut events: Vec<(Recipient, ServerEvent)> = Vec::new();
        if integrity_fault {
            if let Some(message) = message {
                events.push((
                    Recipient::All,
                    ServerEvent::GameError {
                        message: message.to_string(),
                    },
                ));
            }
        }
        events.push((
            Recipient::All,
            ServerEvent::GameEnded {
                final_scores: scores_map(players),
                message: message.map(str::to_string),
            },
        ));

        tracing::info!(room_id = %room.id, reason = message.unwrap_or("complete"), "game ended");

        Ok(Outcome {
            reply: json!({ "gameEnded": true }),
            no_action: false,
            events,
            timers: vec![TimerAction::CancelAll],
        })
    }

    /// Ends the game if the rotation has dropped below two online
    /// players. Used after leaves and disconnects that bypass the
    /// submission path.
    pub async fn end_if_underpopulated(
        &self,
        room_id: RoomId,
    ) -> Result<Option<Outcome>, EngineError> {
        let Some(mut room) = self.manager.load_room(room_id).await? else {
            return Ok(None);
        };
        if !room.state.is_active() {
            return Ok(None);
        }
        let players = self.manager.load_players(room_id).await?;
        if online_players_in_order(&room, &players) >= 2 {
            return Ok(None);
        }
        let outcome = self
            .end_game(&mut room, &players, Some("not enough players to continue"), false)
            .await?;
        Ok(Some(outcome))
    }

    async fn award_points(
        &self,
        room_id: RoomId,
        players: &mut [Player],
        uid: &Uid,
        points: u32,
    ) -> Result<(), EngineError> {
        let Some(player) = players.iter_mut().find(|p| &p.uid == uid) else {
            return Err(EngineError::InvalidState(format!(
                "{uid} has no player record"
            )));
        };
        player.score += points;
        self.store
            .update(
                &paths::player(room_id.0, uid.as_str()),
                json!({ "score": player.score }),
            )
            .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Pure helpers
// ---------------------------------------------------------------------------

fn stale_or(is_timeout: bool, err: EngineError) -> Result<Outcome, EngineError> {
    if is_timeout {
        tracing::debug!(%err, "stale timer dropped");
        Ok(Outcome::no_action())
    } else {
        Err(err)
    }
}

fn merge_end(outcome: &mut Outcome, ended: Outcome) {
    outcome.events.extend(ended.events);
    outcome.timers.extend(ended.timers);
    if outcome.reply.is_null() {
        outcome.reply = ended.reply;
    }
}

/// Walks the fixed rotation starting after `start_after` and returns the
/// first entry that is an online player, scanning at most one full lap.
///
/// Falls back to the turn cursor when `start_after` is not in the order
/// (it may have been trimmed by a voluntary leave).
pub fn find_next_online_player(
    room: &Room,
    players: &[Player],
    start_after: &Uid,
) -> Option<(usize, Uid)> {
    let order = &room.active_turn_order;
    let n = order.len();
    if n == 0 {
        return None;
    }
    let start = order
        .iter()
        .position(|u| u == start_after)
        .map(|i| i as i64)
        .unwrap_or_else(|| i64::from(room.turn_cursor.clamp(-1, n as i32 - 1)));

    for step in 1..=n as i64 {
        let idx = (start + step).rem_euclid(n as i64) as usize;
        let uid = &order[idx];
        let eligible = players
            .iter()
            .any(|p| &p.uid == uid && p.is_active_player());
        if eligible {
            return Some((idx, uid.clone()));
        }
    }
    None
}

/// Candidate for the turn after `current` — the next online player,
/// allowing wraparound back to `current` themselves.
fn next_turn_candidate(room: &Room, players: &[Player], current: &Uid) -> Option<Uid> {
    find_next_online_player(room, players, current).map(|(_, uid)| uid)
}

/// Online participants of the rotation that still hold the player role.
fn online_players_in_order(room: &Room, players: &[Player]) -> usize {
    room.active_turn_order
        .iter()
        .filter(|uid| {
            players
                .iter()
                .any(|p| p.uid == **uid && p.is_active_player())
        })
        .count()
}

pub fn scores_map(players: &[Player]) -> BTreeMap<Uid, u32> {
    players
        .iter()
        .filter(|p| p.role == PlayerRole::Player)
        .map(|p| (p.uid.clone(), p.score))
        .collect()
}

/// Role a rejoining user gets in an active room: spectator if they were
/// never in the rotation or their slot has already passed this cycle,
/// player otherwise. Once demoted they stay spectator for the rest of
/// the game instance.
pub fn rejoin_role(room: &Room, uid: &Uid) -> PlayerRole {
    let Some(idx) = room.active_turn_order.iter().position(|u| u == uid) else {
        return PlayerRole::Spectator;
    };
    let idx = idx as i32;
    if idx < room.turn_cursor {
        return PlayerRole::Spectator;
    }
    if idx == room.turn_cursor && room.current_turn_uid.as_ref() != Some(uid) {
        return PlayerRole::Spectator;
    }
    PlayerRole::Player
}

/// Assembles the client-facing game snapshot.
pub fn build_snapshot(
    room: &Room,
    players: &[Player],
    questions: &[Question],
    current: &Question,
    remaining_secs: u64,
) -> GameSnapshot {
    GameSnapshot {
        question: current.client_view(),
        turn_uid: room
            .current_turn_uid
            .clone()
            .unwrap_or_else(|| room.host_uid.clone()),
        timeout: remaining_secs,
        scores: scores_map(players),
        players: triviarena_room::player_infos(players),
        total_questions: room.question_count,
        current_question_num: room.current_question_index + 1,
        game_settings: room.settings.to_value(),
        host_id: room.host_uid.clone(),
        questions: questions.iter().map(Question::client_view).collect(),
        steal_attempt: room.steal_attempt.as_ref().map(|s| StealView {
            stealer_uid: s.stealer_uid.clone(),
            question_id: s.question_index.to_string(),
        }),
    }
}
