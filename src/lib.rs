//! # Duel Lobby
//!
//! Session-lifecycle and lobby orchestration core for a two-player online
//! card game.
//!
//! The crate authenticates a player, brokers a relay-backed network session
//! in the host or client role, coordinates the lobby state machine, and
//! propagates connection and error events to presentation layers. Engine
//! integration (identity, relay, transport, scene loading) happens behind
//! trait seams, so the core runs the same against production services or
//! the in-process loopback backend.
//!
//! ## Architecture
//!
//! - [`ServiceBootstrapper`]: one-shot startup (platform core, anonymous
//!   sign-in, multiplayer capability, display-name fallback)
//! - [`SessionBroker`]: owns the single relay-backed session and its
//!   [`SessionState`]
//! - [`LobbyClient`]: thin handle over a background loop that gates
//!   commands on the lobby phase and emits [`LobbyEvent`]s
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use duel_lobby::providers::{LocalIdentityProvider, LocalPlatform, LoopbackNetwork};
//! use duel_lobby::{LobbyClient, LobbyConfig, LobbyEvent, LobbyServices};
//!
//! let network = LoopbackNetwork::new();
//! let services = LobbyServices::new(
//!     LocalPlatform,
//!     LocalIdentityProvider::new(),
//!     network.relay(),
//!     network.transport(),
//!     scene_director,
//! );
//! let (client, mut events) = LobbyClient::start(services, LobbyConfig::new());
//!
//! while let Ok(event) = events.recv().await {
//!     match event {
//!         LobbyEvent::InitializationComplete => client.start_quick_match()?,
//!         LobbyEvent::QuickMatchStarted { join_code } => {
//!             println!("share this code: {join_code}");
//!         }
//!         _ => {}
//!     }
//! }
//! ```

pub mod bootstrap;
pub mod broker;
pub mod error;
pub mod event;
pub mod identity;
pub mod lobby;
pub mod providers;
pub mod relay;
pub mod session;

// Re-export primary types for ergonomic imports.
pub use bootstrap::{BootstrapFailure, Bootstrapped, PlatformServices, ServiceBootstrapper};
pub use broker::SessionBroker;
pub use error::{LobbyError, Result};
pub use event::{EventBus, LobbyEvent};
pub use identity::{IdentityProvider, PlayerIdentity, SignIn};
pub use lobby::{
    LobbyClient, LobbyConfig, LobbyPhase, LobbyServices, LobbyStatus, SceneDirector,
};
pub use relay::{
    NetworkTransport, PeerEvent, PeerId, RelayAllocation, RelayConnectionInfo, RelayProtocol,
    RelayService,
};
pub use session::{RoomParams, SessionConfig, SessionRole, SessionState};

#[cfg(feature = "providers-local")]
pub use providers::{LocalIdentityProvider, LocalPlatform, LoopbackNetwork};
