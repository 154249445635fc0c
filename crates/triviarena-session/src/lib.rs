//! Connection identity for Triviarena.
//!
//! This crate handles who is on the other end of a connection:
//!
//! 1. **Authentication** — the [`Authenticator`] collaborator turns a
//!    bearer token into a stable [`AuthIdentity`].
//! 2. **Profiles** — [`upsert_profile`] refreshes `users/{uid}` on
//!    connect.
//! 3. **Connectivity** — [`ConnectivityTracker`] maps uids to live
//!    connections and remembers which rooms each connection entered, so
//!    a dropped socket can be reconciled room by room.
//!
//! There are no reconnection tokens here: the rooms themselves remember
//! offline players, and `game:rejoin` re-attaches a returning user.

mod auth;
mod error;
mod profile;
mod tracker;

pub use auth::{AuthIdentity, Authenticator};
pub use error::SessionError;
pub use profile::upsert_profile;
pub use tracker::{ConnectionEntry, ConnectionSender, ConnectivityTracker};
