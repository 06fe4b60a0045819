//! Session state and configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Role the local process holds in the active session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionRole {
    /// No session.
    #[default]
    None,
    /// Owns the relay allocation and drives scene transitions.
    Host,
    /// Connected to a host and follows its transitions.
    Client,
}

/// Connection state of the single process-wide session.
///
/// Owned and mutated exclusively by [`SessionBroker`](crate::SessionBroker).
/// Invariants: Host and Client are mutually exclusive; `is_connected`
/// implies a role is set; `join_code` is non-empty iff a session has been
/// created or joined; `connected_peer_count` never goes negative.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionState {
    pub role: SessionRole,
    pub is_connected: bool,
    pub join_code: String,
    pub connected_peer_count: u32,
}

/// Default bounded wait for relay allocation and join calls.
const DEFAULT_ALLOCATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for the [`SessionBroker`](crate::SessionBroker).
///
/// # Example
///
/// ```
/// use duel_lobby::SessionConfig;
/// use std::time::Duration;
///
/// let config = SessionConfig::new()
///     .with_region("eu-central")
///     .with_allocation_timeout(Duration::from_secs(5));
/// assert_eq!(config.max_players, 2);
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Total player slots including the host. Two for a duel.
    pub max_players: u8,
    /// Relay region hint; `None` lets the relay choose.
    pub region: Option<String>,
    /// Bounded wait applied to each relay call. An expired wait surfaces as
    /// a connection failure rather than hanging the lobby.
    pub allocation_timeout: Duration,
}

impl SessionConfig {
    /// Create a configuration with two player slots and default timeouts.
    pub fn new() -> Self {
        Self {
            max_players: 2,
            region: None,
            allocation_timeout: DEFAULT_ALLOCATION_TIMEOUT,
        }
    }

    /// Set the total player slot count. Values below 2 are clamped to 2.
    #[must_use]
    pub fn with_max_players(mut self, max_players: u8) -> Self {
        self.max_players = max_players.max(2);
        self
    }

    /// Pin relay allocations to a region.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Set the bounded wait applied to each relay call.
    #[must_use]
    pub fn with_allocation_timeout(mut self, timeout: Duration) -> Self {
        self.allocation_timeout = timeout;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Parameters for creating a room.
///
/// Name, privacy, and password are accepted here and handed to the session
/// layer as opaque metadata; the relay layer does not consume them yet.
///
/// # Example
///
/// ```
/// use duel_lobby::RoomParams;
///
/// let params = RoomParams::new("friday-duel").with_private(true);
/// assert_eq!(params.room_name.as_deref(), Some("friday-duel"));
/// assert!(params.is_private);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoomParams {
    /// Display name for the room.
    pub room_name: Option<String>,
    /// Whether the room should be hidden from listings.
    pub is_private: bool,
    /// Optional room password.
    pub password: Option<String>,
    /// Opaque extension payload for game-specific metadata.
    #[serde(default)]
    pub custom: serde_json::Value,
}

impl RoomParams {
    /// Create parameters with a room name.
    pub fn new(room_name: impl Into<String>) -> Self {
        Self {
            room_name: Some(room_name.into()),
            ..Default::default()
        }
    }

    /// Hide the room from listings.
    #[must_use]
    pub fn with_private(mut self, is_private: bool) -> Self {
        self.is_private = is_private;
        self
    }

    /// Protect the room with a password.
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Attach an opaque metadata payload.
    #[must_use]
    pub fn with_custom(mut self, custom: serde_json::Value) -> Self {
        self.custom = custom;
        self
    }
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
    fn session_state_defaults() {
        let state = SessionState::default();
        assert_eq!(state.role, SessionRole::None);
        assert!(!state.is_connected);
        assert!(state.join_code.is_empty());
        assert_eq!(state.connected_peer_count, 0);
    }

    #[test]
    fn session_config_defaults_to_a_duel() {
        let config = SessionConfig::new();
        assert_eq!(config.max_players, 2);
        assert!(config.region.is_none());
        assert_eq!(config.allocation_timeout, Duration::from_secs(10));
    }

    #[test]
    fn max_players_is_clamped_to_two() {
        let config = SessionConfig::new().with_max_players(1);
        assert_eq!(config.max_players, 2);
    }

    #[test]
    fn room_params_builder() {
        let params = RoomParams::new("friday-duel")
            .with_private(true)
            .with_password("hunter2")
            .with_custom(serde_json::json!({ "deck": "starter" }));
        assert_eq!(params.room_name.as_deref(), Some("friday-duel"));
        assert!(params.is_private);
        assert_eq!(params.password.as_deref(), Some("hunter2"));
        assert_eq!(params.custom["deck"], "starter");
    }

    #[test]
    fn room_params_default_is_empty_metadata() {
        let params = RoomParams::default();
        assert!(params.room_name.is_none());
        assert!(!params.is_private);
        assert!(params.password.is_none());
        assert!(params.custom.is_null());
    }
}
