//! User profile upserts on connect.

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::json;
use triviarena_store::{paths, DocumentStore};

use crate::{AuthIdentity, SessionError};

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Writes (or refreshes) the `users/{uid}` profile document after a
/// successful handshake.
pub async fn upsert_profile<S: DocumentStore>(
    store: &S,
    identity: &AuthIdentity,
) -> Result<(), SessionError> {
    let path = paths::user(identity.uid.as_str());
    let patch = json!({
        "displayName": identity.name,
        "avatarUrl": identity.picture,
        "lastLogin": now_millis(),
    });
    match store.update(&path, patch.clone()).await {
        Ok(()) => Ok(()),
        // First login: no document yet.
        Err(_) => store.set(&path, patch).await.map_err(Into::into),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use triviarena_protocol::Uid;
    use triviarena_store::MemoryStore;

    #[tokio::test]
    async fn test_upsert_creates_then_refreshes() {
        let store = MemoryStore::new();
        let identity = AuthIdentity {
            uid: Uid::from("u1"),
            name: Some("Alice".into()),
            picture: None,
        };
        upsert_profile(&store, &identity).await.unwrap();
        let doc = store.get("users/u1").await.unwrap().unwrap();
        assert_eq!(doc["displayName"], "Alice");

        let renamed = AuthIdentity {
            name: Some("Alicia".into()),
            ..identity
        };
        upsert_profile(&store, &renamed).await.unwrap();
        let doc = store.get("users/u1").await.unwrap().unwrap();
        assert_eq!(doc["displayName"], "Alicia");
    }
}
