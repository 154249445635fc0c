//! Error types for the session layer.

use triviarena_store::StoreError;

/// Errors that can occur during authentication and connection tracking.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The identity token was rejected by the verifier.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// An event arrived before the hello handshake completed.
    #[error("connection is not authenticated")]
    NotAuthenticated,

    /// Profile persistence failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
