//! Room service: the composition of registry, engine and actors.
//!
//! Higher layers (the connection handler) talk to rooms exclusively
//! through this service — look up a handle, send it a command.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use triviarena_protocol::{RoomCode, RoomId, Uid};
use triviarena_room::{RoomManager, RoomRegistry};
use triviarena_store::DocumentStore;

use crate::actor::{spawn_room, OutboundSender, RoomHandle};
use crate::engine::GameEngine;
use crate::source::QuestionSource;
use crate::EngineError;

/// Default command channel size for room actors.
const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Owns every live room actor in the process.
pub struct RoomService<S, Q> {
    engine: GameEngine<S, Q>,
    manager: RoomManager<S>,
    registry: Arc<RoomRegistry<S>>,
    handles: Arc<Mutex<HashMap<RoomId, RoomHandle>>>,
}

impl<S, Q> Clone for RoomService<S, Q> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            manager: self.manager.clone(),
            registry: Arc::clone(&self.registry),
            handles: Arc::clone(&self.handles),
        }
    }
}

impl<S: DocumentStore, Q: QuestionSource> RoomService<S, Q> {
    pub fn new(store: Arc<S>, source: Arc<Q>) -> Self {
        Self {
            engine: GameEngine::new(Arc::clone(&store), source),
            manager: RoomManager::new(Arc::clone(&store)),
            registry: Arc::new(RoomRegistry::new(store)),
            handles: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Creates a room hosted by `uid`, spawns its actor, and attaches
    /// the host's outbound channel.
    pub async fn create_room(
        &self,
        uid: Uid,
        display_name: String,
        avatar_url: Option<String>,
        sender: OutboundSender,
    ) -> Result<(RoomId, RoomCode), EngineError> {
        let room = self
            .registry
            .create_room(uid.clone(), display_name, avatar_url)
            .await?;

        let handle = spawn_room(
            room.id,
            room.code.clone(),
            self.engine.clone(),
            self.manager.clone(),
            Arc::clone(&self.registry),
            Arc::clone(&self.handles),
            Some((uid, sender)),
            DEFAULT_CHANNEL_SIZE,
        );
        self.handles.lock().await.insert(room.id, handle);
        Ok((room.id, room.code))
    }

    /// Resolves a room code to its live handle.
    pub async fn lookup_code(&self, code: &RoomCode) -> Option<RoomHandle> {
        let room_id = self.registry.lookup(code).await?;
        self.handle(room_id).await
    }

    /// The live handle for a room id, if the room still exists.
    pub async fn handle(&self, room_id: RoomId) -> Option<RoomHandle> {
        self.handles.lock().await.get(&room_id).cloned()
    }

    pub async fn room_count(&self) -> usize {
        self.handles.lock().await.len()
    }

    /// Stops every room actor. Used on server shutdown.
    pub async fn shutdown_all(&self) {
        let handles: Vec<RoomHandle> =
            self.handles.lock().await.values().cloned().collect();
        for handle in handles {
            handle.shutdown().await;
        }
    }
}
