//! The token-verifier collaborator.
//!
//! The server never mints identities — a bearer token arrives with the
//! hello frame, the [`Authenticator`] turns it into a stable
//! [`AuthIdentity`], and that identity is stapled to the connection.
//! Client-supplied uids in event payloads are ignored everywhere.

use triviarena_protocol::Uid;

use crate::SessionError;

/// A verified identity: the stable uid plus optional profile hints from
/// the provider.
#[derive(Debug, Clone)]
pub struct AuthIdentity {
    pub uid: Uid,
    pub name: Option<String>,
    pub picture: Option<String>,
}

/// Validates a bearer token and returns who it belongs to.
///
/// Production wires a real identity provider here; tests and the dev
/// server use trivially-verifiable tokens. The returned future is `Send`
/// because authentication runs inside spawned connection-handler tasks;
/// implementations can still write a plain `async fn`.
pub trait Authenticator: Send + Sync + 'static {
    fn authenticate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<AuthIdentity, SessionError>> + Send;
}
