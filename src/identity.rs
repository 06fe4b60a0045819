//! Identity provider seam and the player identity it owns.
//!
//! Provider construction and configuration are intentionally NOT part of the
//! trait; build a configured provider externally and hand it to
//! [`LobbyServices`](crate::LobbyServices).

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A signed-in player as reported by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignIn {
    /// Opaque stable identifier assigned at first sign-in.
    pub player_id: String,
    /// Display name, if the provider issued one.
    pub player_name: Option<String>,
}

/// Snapshot of the authenticated player.
///
/// `player_id` is immutable after first sign-in. `player_name` may change
/// any number of times via
/// [`LobbyClient::set_player_name`](crate::LobbyClient::set_player_name).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerIdentity {
    pub player_id: String,
    pub player_name: String,
    pub is_authenticated: bool,
}

/// Anonymous-authentication backend.
#[async_trait]
pub trait IdentityProvider: Send + 'static {
    /// Perform an anonymous sign-in, yielding the stable player id and the
    /// provider-issued display name (if any).
    async fn sign_in_anonymously(&mut self) -> Result<SignIn>;

    /// Push a new display name to the provider.
    async fn update_player_name(&mut self, name: &str) -> Result<()>;

    /// Whether a sign-in has completed and is still valid.
    fn is_signed_in(&self) -> bool;
}

/// Generate a fallback display name of the form `Player_0042`.
///
/// Assigned when the provider issues no name at first sign-in.
pub fn generated_player_name() -> String {
    let suffix: u16 = rand::rng().random_range(0..10_000);
    format!("Player_{suffix:04}")
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn generated_name_has_prefix_and_four_digits() {
        for _ in 0..100 {
            let name = generated_player_name();
            let suffix = name.strip_prefix("Player_").unwrap();
            assert_eq!(suffix.len(), 4);
            assert!(suffix.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
