//! Room registry: mints room ids, allocates unique codes, and owns the
//! code → room index.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rand::Rng;
use tokio::sync::Mutex;
use triviarena_protocol::{PlayerRole, RoomCode, RoomId, Uid, ROOM_CODE_ALPHABET, ROOM_CODE_LEN};
use triviarena_store::{paths, DocumentStore, WriteOp};

use crate::model::{now_millis, Player, Room};
use crate::RoomError;

/// Counter for generating unique room IDs.
static NEXT_ROOM_ID: AtomicU64 = AtomicU64::new(1);

/// Collision retry budget for code generation. At 32^6 codes the odds of
/// eight consecutive collisions are negligible for any realistic room
/// count; hitting the budget means something is wrong.
const CODE_RETRIES: usize = 8;

/// Generates a random 6-character room code from the restricted alphabet.
fn generate_code() -> RoomCode {
    let mut rng = rand::rng();
    let code: String = (0..ROOM_CODE_LEN)
        .map(|_| {
            let i = rng.random_range(0..ROOM_CODE_ALPHABET.len());
            ROOM_CODE_ALPHABET[i] as char
        })
        .collect();
    RoomCode::from_canonical(code)
}

/// Creates rooms and resolves codes to room ids.
///
/// The code index is process-local; in a multi-replica deployment rooms
/// must be sharded so one replica owns a given room.
pub struct RoomRegistry<S> {
    store: Arc<S>,
    codes: Mutex<HashMap<RoomCode, RoomId>>,
}

impl<S: DocumentStore> RoomRegistry<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            codes: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a room hosted by `uid` and commits the room document plus
    /// the host's player document in one batch.
    pub async fn create_room(
        &self,
        uid: Uid,
        display_name: String,
        avatar_url: Option<String>,
    ) -> Result<Room, RoomError> {
        let room_id = RoomId(NEXT_ROOM_ID.fetch_add(1, Ordering::Relaxed));

        let code = {
            let mut codes = self.codes.lock().await;
            let mut picked = None;
            for _ in 0..CODE_RETRIES {
                let candidate = generate_code();
                if !codes.contains_key(&candidate) {
                    picked = Some(candidate);
                    break;
                }
            }
            let code = picked.ok_or(RoomError::CodesExhausted)?;
            codes.insert(code.clone(), room_id);
            code
        };

        let room = Room::new_waiting(room_id, code.clone(), uid.clone());
        let host = Player {
            uid: uid.clone(),
            name: display_name,
            avatar_url,
            join_order: 1,
            score: 0,
            online: true,
            role: PlayerRole::Player,
            joined_at: now_millis(),
        };

        let result = self
            .store
            .batch(vec![
                WriteOp::set(paths::room(room_id.0), room.to_doc()),
                WriteOp::set(paths::player(room_id.0, uid.as_str()), host.to_doc()),
            ])
            .await;

        if let Err(e) = result {
            // Roll the code reservation back so the failed id doesn't
            // squat a code forever.
            self.codes.lock().await.remove(&code);
            return Err(e.into());
        }

        tracing::info!(room_id = %room_id, code = %code, host = %uid, "room created");
        Ok(room)
    }

    /// Resolves a room code to its room id.
    pub async fn lookup(&self, code: &RoomCode) -> Option<RoomId> {
        self.codes.lock().await.get(code).copied()
    }

    /// Releases a destroyed room's code back to the pool.
    pub async fn release(&self, code: &RoomCode) {
        self.codes.lock().await.remove(code);
    }

    /// Number of live codes. Test helper.
    pub async fn code_count(&self) -> usize {
        self.codes.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use triviarena_store::MemoryStore;

    #[test]
    fn test_generated_codes_use_the_restricted_alphabet() {
        for _ in 0..200 {
            let code = generate_code();
            assert_eq!(code.as_str().len(), ROOM_CODE_LEN);
            assert!(code
                .as_str()
                .bytes()
                .all(|b| ROOM_CODE_ALPHABET.contains(&b)));
        }
    }

    #[tokio::test]
    async fn test_create_room_commits_room_and_host_atomically() {
        let store = Arc::new(MemoryStore::new());
        let registry = RoomRegistry::new(Arc::clone(&store));

        let room = registry
            .create_room(Uid::from("alice"), "Alice".into(), None)
            .await
            .unwrap();

        let room_doc = store.get(&paths::room(room.id.0)).await.unwrap().unwrap();
        assert_eq!(room_doc["state"], "waiting");
        assert_eq!(room_doc["hostUid"], "alice");

        let host_doc = store
            .get(&paths::player(room.id.0, "alice"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(host_doc["joinOrder"], 1);
        assert_eq!(host_doc["score"], 0);
        assert_eq!(host_doc["online"], true);
        assert_eq!(host_doc["role"], "player");
    }

    #[tokio::test]
    async fn test_lookup_resolves_created_code() {
        let registry = RoomRegistry::new(Arc::new(MemoryStore::new()));
        let room = registry
            .create_room(Uid::from("a"), "A".into(), None)
            .await
            .unwrap();
        assert_eq!(registry.lookup(&room.code).await, Some(room.id));
    }

    #[tokio::test]
    async fn test_release_frees_the_code() {
        let registry = RoomRegistry::new(Arc::new(MemoryStore::new()));
        let room = registry
            .create_room(Uid::from("a"), "A".into(), None)
            .await
            .unwrap();
        registry.release(&room.code).await;
        assert_eq!(registry.lookup(&room.code).await, None);
    }

    #[tokio::test]
    async fn test_room_ids_are_unique() {
        let registry = RoomRegistry::new(Arc::new(MemoryStore::new()));
        let a = registry
            .create_room(Uid::from("a"), "A".into(), None)
            .await
            .unwrap();
        let b = registry
            .create_room(Uid::from("b"), "B".into(), None)
            .await
            .unwrap();
        assert_ne!(a.id, b.id);
        assert_ne!(a.code, b.code);
    }
}
