//! Document path helpers for the persisted layout.

/// Path of a user profile document.
pub fn user(uid: &str) -> String {
    format!("users/{uid}")
}

/// Path of a room document.
pub fn room(room_id: u64) -> String {
    format!("rooms/{room_id}")
}

/// Path of one player document inside a room.
pub fn player(room_id: u64, uid: &str) -> String {
    format!("rooms/{room_id}/players/{uid}")
}

/// Prefix of a room's player subcollection.
pub fn players(room_id: u64) -> String {
    format!("rooms/{room_id}/players")
}

/// Path of one question document inside a room.
pub fn question(room_id: u64, index: u32) -> String {
    format!("rooms/{room_id}/questions/{index}")
}

/// Prefix of a room's question subcollection.
pub fn questions(room_id: u64) -> String {
    format!("rooms/{room_id}/questions")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_nest_under_room() {
        assert_eq!(room(4), "rooms/4");
        assert_eq!(player(4, "alice"), "rooms/4/players/alice");
        assert_eq!(question(4, 0), "rooms/4/questions/0");
        assert!(question(4, 0).starts_with(&questions(4)));
    }
}
