//! Error types for the store layer.

/// Errors that can occur in the document store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An update targeted a document that does not exist.
    #[error("document not found: {0}")]
    NotFound(String),

    /// A document or patch was not a JSON object where one was required.
    #[error("document at {0} is not an object")]
    NotAnObject(String),

    /// The backend failed. The message carries the backend's diagnostic.
    #[error("store backend error: {0}")]
    Backend(String),
}
