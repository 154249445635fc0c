//! In-memory [`DocumentStore`] used in development and tests.

use std::collections::BTreeMap;

use serde_json::Value;
use tokio::sync::Mutex;

use crate::{DocumentStore, StoreError, WriteOp};

/// A document store backed by a `BTreeMap` behind an async mutex.
///
/// Every operation takes the store lock for its whole duration, so a
/// batch is trivially atomic and list sees a consistent snapshot.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: Mutex<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently stored. Test helper.
    pub async fn len(&self) -> usize {
        self.docs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.docs.lock().await.is_empty()
    }
}

/// Shallow-merges `patch` into `doc`. Both must be objects.
fn merge_into(doc: &mut Value, patch: &Value, path: &str) -> Result<(), StoreError> {
    let target = doc
        .as_object_mut()
        .ok_or_else(|| StoreError::NotAnObject(path.to_string()))?;
    let source = patch
        .as_object()
        .ok_or_else(|| StoreError::NotAnObject(path.to_string()))?;
    for (key, value) in source {
        target.insert(key.clone(), value.clone());
    }
    Ok(())
}

/// Orders subcollection ids numerically when both parse as integers,
/// lexicographically otherwise. Keeps `"10"` after `"9"`.
fn compare_ids(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

impl DocumentStore for MemoryStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.docs.lock().await.get(path).cloned())
    }

    async fn set(&self, path: &str, doc: Value) -> Result<(), StoreError> {
        self.docs.lock().await.insert(path.to_string(), doc);
        Ok(())
    }

    async fn update(&self, path: &str, patch: Value) -> Result<(), StoreError> {
        let mut docs = self.docs.lock().await;
        let doc = docs
            .get_mut(path)
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        merge_into(doc, &patch, path)
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.docs.lock().await.remove(path);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<(String, Value)>, StoreError> {
        let docs = self.docs.lock().await;
        let want = format!("{prefix}/");
        let mut out: Vec<(String, Value)> = docs
            .range(want.clone()..)
            .take_while(|(path, _)| path.starts_with(&want))
            .filter_map(|(path, doc)| {
                let id = &path[want.len()..];
                // Direct children only — skip nested subcollections.
                if id.contains('/') {
                    None
                } else {
                    Some((id.to_string(), doc.clone()))
                }
            })
            .collect();
        out.sort_by(|(a, _), (b, _)| compare_ids(a, b));
        Ok(out)
    }

    async fn batch(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        let mut docs = self.docs.lock().await;

        // Validate against a scratch copy first so a failing op leaves
        // the store untouched.
        let mut staged = docs.clone();
        for op in &ops {
            match op {
                WriteOp::Set { path, doc } => {
                    staged.insert(path.clone(), doc.clone());
                }
                WriteOp::Update { path, patch } => {
                    let doc = staged
                        .get_mut(path)
                        .ok_or_else(|| StoreError::NotFound(path.clone()))?;
                    merge_into(doc, patch, path)?;
                }
                WriteOp::Delete { path } => {
                    staged.remove(path);
                }
            }
        }

        *docs = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_then_get_round_trips() {
        let store = MemoryStore::new();
        store.set("users/a", json!({"name": "Alice"})).await.unwrap();
        let doc = store.get("users/a").await.unwrap().unwrap();
        assert_eq!(doc["name"], "Alice");
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let store = MemoryStore::new();
        assert!(store.get("users/nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_merges_shallowly() {
        let store = MemoryStore::new();
        store
            .set("rooms/1", json!({"state": "waiting", "hostUid": "a"}))
            .await
            .unwrap();
        store
            .update("rooms/1", json!({"state": "active"}))
            .await
            .unwrap();
        let doc = store.get("rooms/1").await.unwrap().unwrap();
        assert_eq!(doc["state"], "active");
        assert_eq!(doc["hostUid"], "a");
    }

    #[tokio::test]
    async fn test_update_missing_fails() {
        let store = MemoryStore::new();
        let result = store.update("rooms/9", json!({"state": "active"})).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryStore::new();
        store.set("rooms/1", json!({})).await.unwrap();
        store.delete("rooms/1").await.unwrap();
        store.delete("rooms/1").await.unwrap();
        assert!(store.get("rooms/1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_orders_numeric_ids_numerically() {
        let store = MemoryStore::new();
        for i in [0u32, 2, 10, 9, 1] {
            store
                .set(&crate::paths::question(1, i), json!({"i": i}))
                .await
                .unwrap();
        }
        let listed = store.list(&crate::paths::questions(1)).await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["0", "1", "2", "9", "10"]);
    }

    #[tokio::test]
    async fn test_list_returns_direct_children_only() {
        let store = MemoryStore::new();
        store.set("rooms/1", json!({"state": "waiting"})).await.unwrap();
        store
            .set("rooms/1/players/a", json!({"uid": "a"}))
            .await
            .unwrap();
        store
            .set("rooms/1/questions/0", json!({"id": "0"}))
            .await
            .unwrap();

        let players = store.list("rooms/1/players").await.unwrap();
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].0, "a");

        // Listing the room prefix must not leak nested subcollections.
        let rooms = store.list("rooms").await.unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].0, "1");
    }

    #[tokio::test]
    async fn test_batch_applies_all_ops() {
        let store = MemoryStore::new();
        store.set("rooms/1", json!({"state": "waiting"})).await.unwrap();
        store
            .batch(vec![
                WriteOp::update("rooms/1", json!({"state": "active"})),
                WriteOp::set("rooms/1/questions/0", json!({"id": "0"})),
                WriteOp::delete("rooms/1/players/gone"),
            ])
            .await
            .unwrap();
        assert_eq!(
            store.get("rooms/1").await.unwrap().unwrap()["state"],
            "active"
        );
        assert!(store.get("rooms/1/questions/0").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_batch_is_all_or_nothing() {
        let store = MemoryStore::new();
        store.set("rooms/1", json!({"state": "waiting"})).await.unwrap();

        let result = store
            .batch(vec![
                WriteOp::update("rooms/1", json!({"state": "active"})),
                // Update on a missing doc fails the whole batch.
                WriteOp::update("rooms/2", json!({"state": "active"})),
            ])
            .await;

        assert!(result.is_err());
        assert_eq!(
            store.get("rooms/1").await.unwrap().unwrap()["state"],
            "waiting",
            "first op must not have been applied"
        );
    }
}
