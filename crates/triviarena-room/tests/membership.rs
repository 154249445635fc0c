//! Integration tests for membership: joins, capacity, host migration.

use std::sync::Arc;

use serde_json::json;
use triviarena_protocol::{PlayerRole, RoomState, Uid};
use triviarena_room::{RoomError, RoomManager, RoomRegistry, MAX_PLAYERS, MAX_SPECTATORS};
use triviarena_store::MemoryStore;

// =========================================================================
// Helpers
// =========================================================================

fn uid(s: &str) -> Uid {
    Uid::from(s)
}

struct Fixture {
    store: Arc<MemoryStore>,
    registry: RoomRegistry<MemoryStore>,
    manager: RoomManager<MemoryStore>,
}

fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    Fixture {
        store: Arc::clone(&store),
        registry: RoomRegistry::new(Arc::clone(&store)),
        manager: RoomManager::new(store),
    }
}

/// Creates a room hosted by "host" and returns it.
async fn hosted_room(fx: &Fixture) -> triviarena_room::Room {
    fx.registry
        .create_room(uid("host"), "Host".into(), None)
        .await
        .expect("create_room")
}

// =========================================================================
// Join
// =========================================================================

#[tokio::test]
async fn test_join_waiting_room_as_player() {
    let fx = fixture();
    let room = hosted_room(&fx).await;

    let outcome = fx
        .manager
        .join(room.id, uid("bob"), "Bob".into(), None)
        .await
        .unwrap();

    assert_eq!(outcome.player.role, PlayerRole::Player);
    assert_eq!(outcome.player.join_order, 2);
    assert_eq!(outcome.player.score, 0);
    assert!(!outcome.rejoined);
    assert_eq!(outcome.room_state, RoomState::Waiting);
}

#[tokio::test]
async fn test_join_unknown_room_fails() {
    let fx = fixture();
    let result = fx
        .manager
        .join(triviarena_protocol::RoomId(404), uid("bob"), "Bob".into(), None)
        .await;
    assert!(matches!(result, Err(RoomError::NotFound)));
}

#[tokio::test]
async fn test_join_ended_room_fails() {
    let fx = fixture();
    let mut room = hosted_room(&fx).await;
    room.state = RoomState::Ended;
    fx.manager.save_room(&room).await.unwrap();

    let result = fx
        .manager
        .join(room.id, uid("bob"), "Bob".into(), None)
        .await;
    assert!(matches!(result, Err(RoomError::Ended)));
}

#[tokio::test]
async fn test_rejoin_marks_online_and_keeps_role() {
    let fx = fixture();
    let room = hosted_room(&fx).await;
    fx.manager
        .join(room.id, uid("bob"), "Bob".into(), None)
        .await
        .unwrap();
    fx.manager.set_online(room.id, &uid("bob"), false).await.unwrap();

    let outcome = fx
        .manager
        .join(room.id, uid("bob"), "Bob".into(), None)
        .await
        .unwrap();

    assert!(outcome.rejoined);
    assert!(outcome.player.online);
    assert_eq!(outcome.player.role, PlayerRole::Player);
    assert_eq!(outcome.player.join_order, 2, "join order is stable");
}

#[tokio::test]
async fn test_join_active_room_enters_as_spectator() {
    let fx = fixture();
    let mut room = hosted_room(&fx).await;
    room.state = RoomState::Active;
    fx.manager.save_room(&room).await.unwrap();

    let outcome = fx
        .manager
        .join(room.id, uid("late"), "Late".into(), None)
        .await
        .unwrap();
    assert_eq!(outcome.player.role, PlayerRole::Spectator);
}

// =========================================================================
// Capacity (scenario S5)
// =========================================================================

#[tokio::test]
async fn test_ninth_player_demoted_to_spectator() {
    let fx = fixture();
    let room = hosted_room(&fx).await;

    // Host occupies slot 1; fill the remaining player slots.
    for i in 2..=MAX_PLAYERS {
        fx.manager
            .join(room.id, uid(&format!("p{i}")), format!("P{i}"), None)
            .await
            .unwrap();
    }

    let ninth = fx
        .manager
        .join(room.id, uid("ninth"), "Ninth".into(), None)
        .await
        .unwrap();
    assert_eq!(ninth.player.role, PlayerRole::Spectator);
}

#[tokio::test]
async fn test_fourteenth_join_rejected_room_full() {
    let fx = fixture();
    let room = hosted_room(&fx).await;

    for i in 2..=MAX_PLAYERS {
        fx.manager
            .join(room.id, uid(&format!("p{i}")), format!("P{i}"), None)
            .await
            .unwrap();
    }
    for i in 1..=MAX_SPECTATORS {
        fx.manager
            .join(room.id, uid(&format!("s{i}")), format!("S{i}"), None)
            .await
            .unwrap();
    }

    let result = fx
        .manager
        .join(room.id, uid("overflow"), "Overflow".into(), None)
        .await;
    assert!(matches!(result, Err(RoomError::RoomFull)));

    // Capacity invariant holds after the whole sequence.
    let players = fx.manager.load_players(room.id).await.unwrap();
    let player_count = players
        .iter()
        .filter(|p| p.role == PlayerRole::Player)
        .count();
    let spectator_count = players
        .iter()
        .filter(|p| p.role == PlayerRole::Spectator)
        .count();
    assert_eq!(player_count, MAX_PLAYERS);
    assert_eq!(spectator_count, MAX_SPECTATORS);
}

#[tokio::test]
async fn test_spectator_join_rejected_when_spectators_full() {
    let fx = fixture();
    let mut room = hosted_room(&fx).await;
    room.state = RoomState::Active;
    fx.manager.save_room(&room).await.unwrap();

    for i in 1..=MAX_SPECTATORS {
        fx.manager
            .join(room.id, uid(&format!("s{i}")), format!("S{i}"), None)
            .await
            .unwrap();
    }

    let result = fx
        .manager
        .join(room.id, uid("extra"), "Extra".into(), None)
        .await;
    assert!(matches!(result, Err(RoomError::SpectatorsFull)));
}

// =========================================================================
// Leave and host migration (scenario S4)
// =========================================================================

#[tokio::test]
async fn test_host_leaves_first_online_player_inherits() {
    let fx = fixture();
    let room = hosted_room(&fx).await;
    fx.manager.join(room.id, uid("bob"), "Bob".into(), None).await.unwrap();
    fx.manager.join(room.id, uid("carol"), "Carol".into(), None).await.unwrap();

    let outcome = fx.manager.leave(room.id, &uid("host")).await.unwrap();

    assert!(outcome.host_changed);
    assert_eq!(outcome.new_host_uid, Some(uid("bob")), "earliest joiner wins");
    assert!(!outcome.room_deleted);

    let updated = fx.manager.require_room(room.id).await.unwrap();
    assert_eq!(updated.host_uid, uid("bob"));
}

#[tokio::test]
async fn test_host_migration_skips_offline_players() {
    let fx = fixture();
    let room = hosted_room(&fx).await;
    fx.manager.join(room.id, uid("bob"), "Bob".into(), None).await.unwrap();
    fx.manager.join(room.id, uid("carol"), "Carol".into(), None).await.unwrap();
    fx.manager.set_online(room.id, &uid("bob"), false).await.unwrap();

    let outcome = fx.manager.leave(room.id, &uid("host")).await.unwrap();
    assert_eq!(outcome.new_host_uid, Some(uid("carol")));
}

#[tokio::test]
async fn test_host_migration_promotes_spectator_when_no_players_remain() {
    let fx = fixture();
    let mut room = hosted_room(&fx).await;
    // Force the room active so the newcomer lands as spectator.
    room.state = RoomState::Active;
    fx.manager.save_room(&room).await.unwrap();
    fx.manager.join(room.id, uid("watcher"), "Watcher".into(), None).await.unwrap();

    let outcome = fx.manager.leave(room.id, &uid("host")).await.unwrap();

    assert_eq!(outcome.new_host_uid, Some(uid("watcher")));
    let promoted = fx
        .manager
        .load_player(room.id, &uid("watcher"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(promoted.role, PlayerRole::Player, "new host is promoted");
}

#[tokio::test]
async fn test_last_leaver_deletes_room_and_questions() {
    use triviarena_store::{paths, DocumentStore};

    let fx = fixture();
    let room = hosted_room(&fx).await;
    // Plant a question doc to verify the cascade.
    fx.store
        .set(
            &paths::question(room.id.0, 0),
            serde_json::json!({"id": "0"}),
        )
        .await
        .unwrap();

    let outcome = fx.manager.leave(room.id, &uid("host")).await.unwrap();
    assert!(outcome.room_deleted);
    assert!(fx.manager.load_room(room.id).await.unwrap().is_none());
    assert!(
        fx.store
            .get(&paths::question(room.id.0, 0))
            .await
            .unwrap()
            .is_none(),
        "questions must be deleted with the room"
    );
}

#[tokio::test]
async fn test_leave_not_in_room_fails() {
    let fx = fixture();
    let room = hosted_room(&fx).await;
    let result = fx.manager.leave(room.id, &uid("stranger")).await;
    assert!(matches!(result, Err(RoomError::NotInRoom(_))));
}

#[tokio::test]
async fn test_voluntary_leave_trims_turn_order() {
    let fx = fixture();
    let mut room = hosted_room(&fx).await;
    fx.manager.join(room.id, uid("bob"), "Bob".into(), None).await.unwrap();
    fx.manager.join(room.id, uid("carol"), "Carol".into(), None).await.unwrap();

    room.state = RoomState::Active;
    room.active_turn_order = vec![uid("host"), uid("bob"), uid("carol")];
    room.turn_cursor = 2;
    room.current_turn_uid = Some(uid("carol"));
    fx.manager.save_room(&room).await.unwrap();

    fx.manager.leave(room.id, &uid("bob")).await.unwrap();

    let updated = fx.manager.require_room(room.id).await.unwrap();
    assert_eq!(updated.active_turn_order, vec![uid("host"), uid("carol")]);
    assert_eq!(updated.turn_cursor, 1, "cursor follows the current turn uid");
}

// =========================================================================
// Settings
// =========================================================================

#[tokio::test]
async fn test_update_settings_host_only() {
    let fx = fixture();
    let room = hosted_room(&fx).await;
    fx.manager.join(room.id, uid("bob"), "Bob".into(), None).await.unwrap();

    let result = fx
        .manager
        .update_settings(room.id, &uid("bob"), &json!({"turnTimeoutSec": 10}))
        .await;
    assert!(matches!(result, Err(RoomError::NotHost)));
}

#[tokio::test]
async fn test_update_settings_waiting_only() {
    let fx = fixture();
    let mut room = hosted_room(&fx).await;
    room.state = RoomState::Active;
    fx.manager.save_room(&room).await.unwrap();

    let result = fx
        .manager
        .update_settings(room.id, &uid("host"), &json!({"turnTimeoutSec": 10}))
        .await;
    assert!(matches!(result, Err(RoomError::InvalidState(_))));
}

#[tokio::test]
async fn test_update_settings_persists_merge() {
    let fx = fixture();
    let room = hosted_room(&fx).await;

    let merged = fx
        .manager
        .update_settings(
            room.id,
            &uid("host"),
            &json!({"questionsPerPlayer": 2, "bonusForSteal": 3}),
        )
        .await
        .unwrap();
    assert_eq!(merged.questions_per_player, 2);
    assert_eq!(merged.bonus_for_steal, 3);

    let reloaded = fx.manager.require_room(room.id).await.unwrap();
    assert_eq!(reloaded.settings.questions_per_player, 2);
    assert_eq!(reloaded.settings.bonus_for_steal, 3);
    assert_eq!(reloaded.settings.turn_timeout_sec, 30, "untouched field kept");
}

#[tokio::test]
async fn test_update_settings_rejects_out_of_range_without_partial_write() {
    let fx = fixture();
    let room = hosted_room(&fx).await;

    let result = fx
        .manager
        .update_settings(
            room.id,
            &uid("host"),
            &json!({"questionsPerPlayer": 2, "turnTimeoutSec": 999}),
        )
        .await;
    assert!(matches!(result, Err(RoomError::InvalidSettings(_))));

    let reloaded = fx.manager.require_room(room.id).await.unwrap();
    assert_eq!(
        reloaded.settings.questions_per_player, 5,
        "failed patch must not leak partial values"
    );
}
