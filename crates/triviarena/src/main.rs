//! Development server binary: in-memory store, bundled question set,
//! and token-as-identity auth. Production deployments embed the library
//! and inject real collaborators.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use triviarena::prelude::*;

/// Accepts any non-empty token and uses it verbatim as the uid.
/// Development only.
struct DevAuthenticator;

impl Authenticator for DevAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<AuthIdentity, SessionError> {
        if token.trim().is_empty() {
            return Err(SessionError::AuthFailed("empty token".into()));
        }
        Ok(AuthIdentity {
            uid: Uid::from(token.trim()),
            name: None,
            picture: None,
        })
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(1);
        }
    };

    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(FixtureSource::sample());

    let server = match TriviarenaServerBuilder::new()
        .config(config)
        .build(store, source, DevAuthenticator)
        .await
    {
        Ok(server) => server,
        Err(e) => {
            eprintln!("failed to start: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run().await {
        eprintln!("server error: {e}");
        std::process::exit(1);
    }
}
