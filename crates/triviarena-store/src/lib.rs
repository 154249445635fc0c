//! Persistence collaborator for Triviarena.
//!
//! The game core reads and writes JSON documents through the
//! [`DocumentStore`] trait and never talks to a database directly. The
//! bundled [`MemoryStore`] backs development and tests; a production
//! deployment plugs in a real document database behind the same trait.
//!
//! # Document layout
//!
//! ```text
//! users/{uid}                      — user profile
//! rooms/{roomId}                   — room document
//! rooms/{roomId}/players/{uid}     — player document
//! rooms/{roomId}/questions/{index} — question document, index is the
//!                                    stringified 0-based integer
//! ```
//!
//! Listing a subcollection orders by document id, numerically when every
//! id parses as an integer (so `"10"` sorts after `"9"`).

mod error;
mod memory;
pub mod paths;

pub use error::StoreError;
pub use memory::MemoryStore;

use std::future::Future;

use serde_json::Value;

/// One write in an atomic batch.
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Create or replace the document at `path`.
    Set { path: String, doc: Value },
    /// Shallow-merge `patch` into an existing document. Fails the batch
    /// if the document does not exist.
    Update { path: String, patch: Value },
    /// Delete the document at `path`. Deleting a missing document is a
    /// no-op.
    Delete { path: String },
}

impl WriteOp {
    pub fn set(path: impl Into<String>, doc: Value) -> Self {
        Self::Set {
            path: path.into(),
            doc,
        }
    }

    pub fn update(path: impl Into<String>, patch: Value) -> Self {
        Self::Update {
            path: path.into(),
            patch,
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::Delete { path: path.into() }
    }
}

/// A document database with single-document operations and atomic
/// batches.
///
/// Implementations must apply a batch all-or-nothing: if any op fails
/// validation, no op is applied. Per-room serialization of compound
/// read-modify-write sequences is the caller's responsibility (the room
/// actor provides it).
///
/// The returned futures are `Send` because the store is awaited from
/// spawned room-actor and connection-handler tasks; implementations can
/// still write plain `async fn`s.
pub trait DocumentStore: Send + Sync + 'static {
    /// Reads the document at `path`, or `None` if absent.
    fn get(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<Option<Value>, StoreError>> + Send;

    /// Creates or replaces the document at `path`.
    fn set(
        &self,
        path: &str,
        doc: Value,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Shallow-merges `patch` into the document at `path`.
    fn update(
        &self,
        path: &str,
        patch: Value,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Deletes the document at `path` (no-op if absent).
    fn delete(&self, path: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Lists the direct children of `prefix` as `(id, doc)` pairs,
    /// ordered by id (numeric-aware).
    fn list(
        &self,
        prefix: &str,
    ) -> impl Future<Output = Result<Vec<(String, Value)>, StoreError>> + Send;

    /// Applies every op atomically, or none of them.
    fn batch(
        &self,
        ops: Vec<WriteOp>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}
