//! Room membership: joins, leaves, host migration, settings updates.
//!
//! The manager performs document-level mutations only. Game-level
//! consequences of membership changes (synthesizing a timeout when the
//! turn-taker leaves, ending a game that drops below two players) are
//! the room actor's job — it calls the engine before and after these
//! operations. All calls for one room are serialized by that actor.

use std::sync::Arc;

use serde_json::json;
use triviarena_protocol::{PlayerInfo, PlayerRole, RoomId, RoomState, Uid};
use triviarena_store::{paths, DocumentStore, WriteOp};

use crate::model::{now_millis, Player, Question, Room, MAX_PLAYERS, MAX_SPECTATORS};
use crate::settings::apply_settings_patch;
use crate::{GameSettings, RoomError};

/// Result of a join.
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub player: Player,
    /// True when the user already had a player record (rejoining).
    pub rejoined: bool,
    pub room_state: RoomState,
}

/// Result of a leave.
#[derive(Debug, Clone)]
pub struct LeaveOutcome {
    pub room_deleted: bool,
    pub host_changed: bool,
    pub new_host_uid: Option<Uid>,
}

/// Document-level membership operations for rooms.
pub struct RoomManager<S> {
    store: Arc<S>,
}

impl<S> Clone for RoomManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: DocumentStore> RoomManager<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    // -- Loading -----------------------------------------------------------

    pub async fn load_room(&self, room_id: RoomId) -> Result<Option<Room>, RoomError> {
        match self.store.get(&paths::room(room_id.0)).await? {
            Some(doc) => Ok(Some(Room::from_doc(doc)?)),
            None => Ok(None),
        }
    }

    pub async fn require_room(&self, room_id: RoomId) -> Result<Room, RoomError> {
        self.load_room(room_id).await?.ok_or(RoomError::NotFound)
    }

    /// All players in the room, ordered by `join_order` ascending.
    pub async fn load_players(&self, room_id: RoomId) -> Result<Vec<Player>, RoomError> {
        let docs = self.store.list(&paths::players(room_id.0)).await?;
        let mut players = docs
            .into_iter()
            .map(|(_, doc)| Player::from_doc(doc))
            .collect::<Result<Vec<_>, _>>()?;
        players.sort_by_key(|p| p.join_order);
        Ok(players)
    }

    pub async fn load_player(
        &self,
        room_id: RoomId,
        uid: &Uid,
    ) -> Result<Option<Player>, RoomError> {
        match self
            .store
            .get(&paths::player(room_id.0, uid.as_str()))
            .await?
        {
            Some(doc) => Ok(Some(Player::from_doc(doc)?)),
            None => Ok(None),
        }
    }

    pub async fn load_question(
        &self,
        room_id: RoomId,
        index: u32,
    ) -> Result<Option<Question>, RoomError> {
        match self.store.get(&paths::question(room_id.0, index)).await? {
            Some(doc) => Ok(Some(Question::from_doc(doc)?)),
            None => Ok(None),
        }
    }

    pub async fn load_questions(&self, room_id: RoomId) -> Result<Vec<Question>, RoomError> {
        let docs = self.store.list(&paths::questions(room_id.0)).await?;
        docs.into_iter()
            .map(|(_, doc)| Question::from_doc(doc))
            .collect()
    }

    // -- Mutations ---------------------------------------------------------

    /// Adds `uid` to the room, or re-marks an existing record online.
    ///
    /// Role assignment and capacity rules:
    /// - existing record: keep role, except a non-player rejoining an
    ///   active room stays spectator
    /// - new join while waiting: player, demoted to spectator if all 8
    ///   player slots are taken and a spectator slot is free
    /// - new join while active: spectator
    pub async fn join(
        &self,
        room_id: RoomId,
        uid: Uid,
        name: String,
        avatar_url: Option<String>,
    ) -> Result<JoinOutcome, RoomError> {
        let room = self.require_room(room_id).await?;
        if room.state.is_ended() {
            return Err(RoomError::Ended);
        }

        let players = self.load_players(room_id).await?;

        if let Some(existing) = players.iter().find(|p| p.uid == uid) {
            let mut player = existing.clone();
            player.online = true;
            if room.state.is_active() && player.role != PlayerRole::Player {
                player.role = PlayerRole::Spectator;
            }
            self.store
                .set(&paths::player(room_id.0, uid.as_str()), player.to_doc())
                .await?;
            return Ok(JoinOutcome {
                player,
                rejoined: true,
                room_state: room.state,
            });
        }

        let player_count = players
            .iter()
            .filter(|p| p.role == PlayerRole::Player)
            .count();
        let spectator_count = players
            .iter()
            .filter(|p| p.role == PlayerRole::Spectator)
            .count();

        let mut role = if room.state.is_waiting() {
            PlayerRole::Player
        } else {
            PlayerRole::Spectator
        };

        if role == PlayerRole::Player && player_count >= MAX_PLAYERS {
            if room.state.is_waiting() && spectator_count < MAX_SPECTATORS {
                role = PlayerRole::Spectator;
            } else {
                return Err(RoomError::RoomFull);
            }
        }
        if role == PlayerRole::Spectator && spectator_count >= MAX_SPECTATORS {
            return Err(RoomError::SpectatorsFull);
        }

        let player = Player {
            uid: uid.clone(),
            name,
            avatar_url,
            join_order: players.len() as u32 + 1,
            score: 0,
            online: true,
            role,
            joined_at: now_millis(),
        };
        self.store
            .set(&paths::player(room_id.0, uid.as_str()), player.to_doc())
            .await?;

        tracing::info!(room_id = %room_id, %uid, role = ?role, "player joined");
        Ok(JoinOutcome {
            player,
            rejoined: false,
            room_state: room.state,
        })
    }

    /// Removes `uid` from the room, migrating the host and trimming the
    /// turn order as needed. Deletes the room when the last participant
    /// leaves.
    ///
    /// If the leaver currently holds the turn (or a steal), the caller
    /// must have advanced the game past them before calling this.
    pub async fn leave(&self, room_id: RoomId, uid: &Uid) -> Result<LeaveOutcome, RoomError> {
        let mut room = self.require_room(room_id).await?;
        if self.load_player(room_id, uid).await?.is_none() {
            return Err(RoomError::NotInRoom(uid.clone()));
        }

        self.store
            .delete(&paths::player(room_id.0, uid.as_str()))
            .await?;
        let remaining = self.load_players(room_id).await?;

        if remaining.is_empty() {
            self.delete_room(&room).await?;
            tracing::info!(room_id = %room_id, "last participant left, room deleted");
            return Ok(LeaveOutcome {
                room_deleted: true,
                host_changed: false,
                new_host_uid: None,
            });
        }

        let mut ops: Vec<WriteOp> = Vec::new();

        // Voluntary leave trims the rotation snapshot; disconnects do not.
        if room.state.is_active() {
            if let Some(idx) = room.active_turn_order.iter().position(|u| u == uid) {
                room.active_turn_order.remove(idx);
                room.turn_cursor = recompute_cursor(&room, idx);
            }
        }

        let mut host_changed = false;
        let mut new_host_uid = None;
        if &room.host_uid == uid {
            let successor = pick_new_host(&remaining);
            room.host_uid = successor.uid.clone();
            host_changed = true;
            new_host_uid = Some(successor.uid.clone());
            if successor.role == PlayerRole::Spectator {
                ops.push(WriteOp::update(
                    paths::player(room_id.0, successor.uid.as_str()),
                    json!({ "role": PlayerRole::Player }),
                ));
            }
            tracing::info!(room_id = %room_id, new_host = %successor.uid, "host migrated");
        }

        ops.push(WriteOp::set(paths::room(room_id.0), room.to_doc()));
        self.store.batch(ops).await?;

        Ok(LeaveOutcome {
            room_deleted: false,
            host_changed,
            new_host_uid,
        })
    }

    /// Validates and persists a settings patch. Host-only, waiting-only.
    pub async fn update_settings(
        &self,
        room_id: RoomId,
        caller: &Uid,
        patch: &serde_json::Value,
    ) -> Result<GameSettings, RoomError> {
        let room = self.require_room(room_id).await?;
        if !room.state.is_waiting() {
            return Err(RoomError::InvalidState(
                "settings can only change before the game starts".into(),
            ));
        }
        if &room.host_uid != caller {
            return Err(RoomError::NotHost);
        }

        let merged = apply_settings_patch(&room.settings, patch)?;
        self.store
            .update(
                &paths::room(room_id.0),
                json!({ "settings": merged.to_value() }),
            )
            .await?;
        Ok(merged)
    }

    /// Flips a player's online flag.
    pub async fn set_online(
        &self,
        room_id: RoomId,
        uid: &Uid,
        online: bool,
    ) -> Result<(), RoomError> {
        self.store
            .update(
                &paths::player(room_id.0, uid.as_str()),
                json!({ "online": online }),
            )
            .await
            .map_err(Into::into)
    }

    /// Sets a player's role.
    pub async fn set_role(
        &self,
        room_id: RoomId,
        uid: &Uid,
        role: PlayerRole,
    ) -> Result<(), RoomError> {
        self.store
            .update(
                &paths::player(room_id.0, uid.as_str()),
                json!({ "role": role }),
            )
            .await
            .map_err(Into::into)
    }

    /// Persists a replacement room document.
    pub async fn save_room(&self, room: &Room) -> Result<(), RoomError> {
        self.store
            .set(&paths::room(room.id.0), room.to_doc())
            .await
            .map_err(Into::into)
    }

    /// Deletes the room document and cascades over its players and
    /// questions.
    pub async fn delete_room(&self, room: &Room) -> Result<(), RoomError> {
        let mut ops = vec![WriteOp::delete(paths::room(room.id.0))];
        for (id, _) in self.store.list(&paths::players(room.id.0)).await? {
            ops.push(WriteOp::delete(paths::player(room.id.0, &id)));
        }
        for (id, _) in self.store.list(&paths::questions(room.id.0)).await? {
            if let Ok(index) = id.parse::<u32>() {
                ops.push(WriteOp::delete(paths::question(room.id.0, index)));
            }
        }
        self.store.batch(ops).await.map_err(Into::into)
    }
}

/// Wire views for a player list, in join order.
pub fn player_infos(players: &[Player]) -> Vec<PlayerInfo> {
    players.iter().map(Player::info).collect()
}

/// Host succession order: first online player, else any player, else
/// first online spectator, else whoever remains. `players` is sorted by
/// join order, so "first" means earliest joiner.
fn pick_new_host(players: &[Player]) -> &Player {
    players
        .iter()
        .find(|p| p.online && p.role == PlayerRole::Player)
        .or_else(|| players.iter().find(|p| p.role == PlayerRole::Player))
        .or_else(|| players.iter().find(|p| p.online))
        .unwrap_or(&players[0])
}

/// Re-derives the turn cursor after removing index `removed` from the
/// rotation. Prefers anchoring on the current turn uid when it is still
/// in the order.
fn recompute_cursor(room: &Room, removed: usize) -> i32 {
    if room.active_turn_order.is_empty() {
        return -1;
    }
    if let Some(turn_uid) = &room.current_turn_uid {
        if let Some(pos) = room.active_turn_order.iter().position(|u| u == turn_uid) {
            return pos as i32;
        }
    }
    let mut cursor = room.turn_cursor;
    if cursor > removed as i32 {
        cursor -= 1;
    }
    cursor.clamp(-1, room.active_turn_order.len() as i32 - 1)
}
