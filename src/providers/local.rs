//! In-process loopback backend: identity, relay, and transport operating
//! against a shared in-memory hub.
//!
//! Intended for tests and local play. Two lobby clients handed a relay and
//! transport from the same [`LoopbackNetwork`] can complete a real
//! host/join round trip without touching a socket:
//!
//! ```rust,ignore
//! let network = LoopbackNetwork::new();
//! let host_services = LobbyServices::new(
//!     LocalPlatform, LocalIdentityProvider::new(),
//!     network.relay(), network.transport(), scene_a,
//! );
//! let guest_services = LobbyServices::new(
//!     LocalPlatform, LocalIdentityProvider::new(),
//!     network.relay(), network.transport(), scene_b,
//! );
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rand::distr::Alphanumeric;
use rand::Rng;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::bootstrap::PlatformServices;
use crate::error::{LobbyError, Result};
use crate::identity::{IdentityProvider, SignIn};
use crate::relay::{
    NetworkTransport, PeerEvent, PeerId, RelayAllocation, RelayConnectionInfo, RelayProtocol,
    RelayService,
};

/// Join codes are this many characters, uppercase alphanumeric.
const JOIN_CODE_LEN: usize = 6;

// ── Identity ────────────────────────────────────────────────────────

/// Identity provider backed by process-local state.
///
/// Issues a stable uuid-derived player id at first sign-in. By default no
/// display name is issued, which exercises the generated-name fallback; use
/// [`with_player_name`](Self::with_player_name) to preset one.
#[derive(Debug, Default)]
pub struct LocalIdentityProvider {
    preset_name: Option<String>,
    player_id: Option<String>,
    player_name: Option<String>,
}

impl LocalIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preset the display name issued at sign-in.
    #[must_use]
    pub fn with_player_name(mut self, name: impl Into<String>) -> Self {
        self.preset_name = Some(name.into());
        self
    }

    /// The current display name, if any.
    pub fn player_name(&self) -> Option<&str> {
        self.player_name.as_deref()
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn sign_in_anonymously(&mut self) -> Result<SignIn> {
        // The player id is stable across repeated sign-ins.
        let player_id = self
            .player_id
            .get_or_insert_with(|| Uuid::new_v4().simple().to_string())
            .clone();
        self.player_name = self.preset_name.clone();
        Ok(SignIn {
            player_id,
            player_name: self.player_name.clone(),
        })
    }

    async fn update_player_name(&mut self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(LobbyError::InvalidInput(
                "player name must not be empty".into(),
            ));
        }
        self.player_name = Some(name.to_string());
        Ok(())
    }

    fn is_signed_in(&self) -> bool {
        self.player_id.is_some()
    }
}

// ── Platform ────────────────────────────────────────────────────────

/// Platform services that are always available.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalPlatform;

#[async_trait]
impl PlatformServices for LocalPlatform {
    async fn initialize_core(&mut self) -> Result<()> {
        Ok(())
    }

    async fn initialize_multiplayer(&mut self) -> Result<()> {
        Ok(())
    }
}

// ── Loopback hub ────────────────────────────────────────────────────

#[derive(Clone)]
struct Endpoint {
    peer_id: PeerId,
    peer_tx: mpsc::UnboundedSender<PeerEvent>,
}

struct AllocationEntry {
    join_code: String,
    info: RelayConnectionInfo,
    host: Option<Endpoint>,
    client: Option<Endpoint>,
}

#[derive(Default)]
struct HubState {
    /// Allocation id to allocation entry.
    allocations: HashMap<String, AllocationEntry>,
    /// Join code to allocation id.
    codes: HashMap<String, String>,
}

fn lock_hub(state: &Arc<Mutex<HubState>>) -> Result<MutexGuard<'_, HubState>> {
    state
        .lock()
        .map_err(|_| LobbyError::Service("loopback hub lock poisoned".into()))
}

fn generate_join_code() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(JOIN_CODE_LEN)
        .map(|b| (b as char).to_ascii_uppercase())
        .collect()
}

/// Shared in-memory rendezvous hub.
///
/// Cloning shares the hub; [`relay`](Self::relay) and
/// [`transport`](Self::transport) hand out handles bound to it.
#[derive(Clone, Default)]
pub struct LoopbackNetwork {
    state: Arc<Mutex<HubState>>,
}

impl LoopbackNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Relay handle bound to this hub.
    pub fn relay(&self) -> LoopbackRelay {
        LoopbackRelay {
            state: Arc::clone(&self.state),
        }
    }

    /// Transport handle bound to this hub.
    pub fn transport(&self) -> LoopbackTransport {
        LoopbackTransport::new(Arc::clone(&self.state))
    }
}

/// [`RelayService`] backed by a [`LoopbackNetwork`].
pub struct LoopbackRelay {
    state: Arc<Mutex<HubState>>,
}

#[async_trait]
impl RelayService for LoopbackRelay {
    async fn create_allocation(
        &mut self,
        slots: u8,
        _region: Option<&str>,
    ) -> Result<RelayAllocation> {
        if slots == 0 {
            return Err(LobbyError::Service(
                "allocation requires at least one remote slot".into(),
            ));
        }
        let allocation_id = Uuid::new_v4().simple().to_string();
        let join_code = generate_join_code();
        let info = RelayConnectionInfo {
            host: "loopback".into(),
            port: 0,
            protocol: RelayProtocol::Auto,
            allocation_id: allocation_id.clone(),
            token: Uuid::new_v4().simple().to_string(),
        };

        let mut state = lock_hub(&self.state)?;
        state.codes.insert(join_code.clone(), allocation_id.clone());
        state.allocations.insert(
            allocation_id.clone(),
            AllocationEntry {
                join_code,
                info: info.clone(),
                host: None,
                client: None,
            },
        );
        Ok(RelayAllocation {
            allocation_id,
            connection_info: info,
        })
    }

    async fn get_join_code(&mut self, allocation_id: &str) -> Result<String> {
        let state = lock_hub(&self.state)?;
        state
            .allocations
            .get(allocation_id)
            .map(|entry| entry.join_code.clone())
            .ok_or_else(|| LobbyError::Service(format!("allocation not found: {allocation_id}")))
    }

    async fn join_allocation(&mut self, join_code: &str) -> Result<RelayConnectionInfo> {
        let state = lock_hub(&self.state)?;
        let allocation_id = state
            .codes
            .get(join_code)
            .ok_or_else(|| LobbyError::Service("allocation not found".into()))?;
        state
            .allocations
            .get(allocation_id)
            .map(|entry| entry.info.clone())
            .ok_or_else(|| LobbyError::Service("allocation not found".into()))
    }
}

/// [`NetworkTransport`] backed by a [`LoopbackNetwork`].
///
/// A host transport registers itself on its allocation; a client transport
/// connects to the registered host and both sides receive
/// [`PeerEvent::Connected`] with the counterpart's connection id.
pub struct LoopbackTransport {
    state: Arc<Mutex<HubState>>,
    local_id: PeerId,
    configured: Option<RelayConnectionInfo>,
    /// Allocation this transport is attached to while started.
    active: Option<String>,
    peer_tx: mpsc::UnboundedSender<PeerEvent>,
    peer_rx: Option<mpsc::UnboundedReceiver<PeerEvent>>,
}

impl LoopbackTransport {
    fn new(state: Arc<Mutex<HubState>>) -> Self {
        let (peer_tx, peer_rx) = mpsc::unbounded_channel();
        Self {
            state,
            local_id: Uuid::new_v4(),
            configured: None,
            active: None,
            peer_tx,
            peer_rx: Some(peer_rx),
        }
    }

    fn configured_info(&self) -> Result<&RelayConnectionInfo> {
        self.configured
            .as_ref()
            .ok_or_else(|| LobbyError::Service("transport is not configured".into()))
    }
}

#[async_trait]
impl NetworkTransport for LoopbackTransport {
    fn configure(&mut self, info: &RelayConnectionInfo) {
        self.configured = Some(info.clone());
    }

    async fn start_host(&mut self) -> Result<()> {
        let info = self.configured_info()?.clone();
        let mut state = lock_hub(&self.state)?;
        let entry = state
            .allocations
            .get_mut(&info.allocation_id)
            .ok_or_else(|| LobbyError::Service("allocation not found".into()))?;
        if entry.host.is_some() {
            return Err(LobbyError::Service("allocation already has a host".into()));
        }
        entry.host = Some(Endpoint {
            peer_id: self.local_id,
            peer_tx: self.peer_tx.clone(),
        });
        self.active = Some(info.allocation_id);
        Ok(())
    }

    async fn start_client(&mut self) -> Result<()> {
        let info = self.configured_info()?.clone();
        let mut state = lock_hub(&self.state)?;
        let entry = state
            .allocations
            .get_mut(&info.allocation_id)
            .ok_or_else(|| LobbyError::Service("allocation not found".into()))?;
        let host = entry
            .host
            .clone()
            .ok_or_else(|| LobbyError::Service("host is not accepting connections".into()))?;
        if entry.client.is_some() {
            return Err(LobbyError::Service("allocation is full".into()));
        }
        entry.client = Some(Endpoint {
            peer_id: self.local_id,
            peer_tx: self.peer_tx.clone(),
        });
        self.active = Some(info.allocation_id);

        // Both sides observe the connection: the host sees the client's
        // connection id, the client sees the host's.
        let _ = host.peer_tx.send(PeerEvent::Connected(self.local_id));
        let _ = self.peer_tx.send(PeerEvent::Connected(host.peer_id));
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        let Some(allocation_id) = self.active.take() else {
            return Ok(());
        };
        let mut state = lock_hub(&self.state)?;
        let mut removed_code = None;
        if let Some(entry) = state.allocations.get_mut(&allocation_id) {
            let was_host = entry
                .host
                .as_ref()
                .is_some_and(|endpoint| endpoint.peer_id == self.local_id);
            let counterpart = if was_host {
                entry.host = None;
                entry.client.clone()
            } else {
                entry.client = None;
                entry.host.clone()
            };
            if let Some(peer) = counterpart {
                let _ = peer.peer_tx.send(PeerEvent::Disconnected(self.local_id));
            }
            // The allocation dies with its host.
            if entry.host.is_none() {
                removed_code = Some(entry.join_code.clone());
            }
        }
        if let Some(code) = removed_code {
            state.codes.remove(&code);
            state.allocations.remove(&allocation_id);
        }
        Ok(())
    }

    fn peer_events(&mut self) -> mpsc::UnboundedReceiver<PeerEvent> {
        match self.peer_rx.take() {
            Some(rx) => rx,
            None => {
                // Second take: hand out a closed channel that yields nothing.
                let (tx, rx) = mpsc::unbounded_channel();
                drop(tx);
                rx
            }
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────

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

    #[tokio::test]
    async fn sign_in_issues_a_stable_player_id() {
        let mut identity = LocalIdentityProvider::new();
        assert!(!identity.is_signed_in());

        let first = identity.sign_in_anonymously().await.unwrap();
        let second = identity.sign_in_anonymously().await.unwrap();

        assert_eq!(first.player_id, second.player_id);
        assert!(identity.is_signed_in());
        assert!(first.player_name.is_none());
    }

    #[tokio::test]
    async fn preset_name_is_issued_at_sign_in() {
        let mut identity = LocalIdentityProvider::new().with_player_name("Alice");
        let sign_in = identity.sign_in_anonymously().await.unwrap();
        assert_eq!(sign_in.player_name.as_deref(), Some("Alice"));
    }

    #[tokio::test]
    async fn update_player_name_rejects_empty() {
        let mut identity = LocalIdentityProvider::new();
        let err = identity.update_player_name("").await.unwrap_err();
        assert!(matches!(err, LobbyError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn allocation_round_trip_resolves_join_code() {
        let network = LoopbackNetwork::new();
        let mut relay = network.relay();

        let allocation = relay.create_allocation(1, None).await.unwrap();
        let code = relay.get_join_code(&allocation.allocation_id).await.unwrap();
        assert_eq!(code.len(), JOIN_CODE_LEN);

        let info = relay.join_allocation(&code).await.unwrap();
        assert_eq!(info.allocation_id, allocation.allocation_id);
    }

    #[tokio::test]
    async fn unknown_join_code_is_rejected() {
        let network = LoopbackNetwork::new();
        let mut relay = network.relay();
        let err = relay.join_allocation("NOPE42").await.unwrap_err();
        assert!(matches!(err, LobbyError::Service(_)));
    }

    #[tokio::test]
    async fn zero_slots_is_rejected() {
        let network = LoopbackNetwork::new();
        let mut relay = network.relay();
        let err = relay.create_allocation(0, None).await.unwrap_err();
        assert!(matches!(err, LobbyError::Service(_)));
    }

    #[tokio::test]
    async fn connect_delivers_peer_events_to_both_sides() {
        let network = LoopbackNetwork::new();
        let mut relay = network.relay();
        let mut host = network.transport();
        let mut client = network.transport();
        let mut host_events = host.peer_events();
        let mut client_events = client.peer_events();

        let allocation = relay.create_allocation(1, None).await.unwrap();
        host.configure(&allocation.connection_info);
        host.start_host().await.unwrap();

        let code = relay.get_join_code(&allocation.allocation_id).await.unwrap();
        let info = relay.join_allocation(&code).await.unwrap();
        client.configure(&info);
        client.start_client().await.unwrap();

        assert!(matches!(
            host_events.recv().await.unwrap(),
            PeerEvent::Connected(_)
        ));
        assert!(matches!(
            client_events.recv().await.unwrap(),
            PeerEvent::Connected(_)
        ));
    }

    #[tokio::test]
    async fn client_shutdown_notifies_the_host() {
        let network = LoopbackNetwork::new();
        let mut relay = network.relay();
        let mut host = network.transport();
        let mut client = network.transport();
        let mut host_events = host.peer_events();

        let allocation = relay.create_allocation(1, None).await.unwrap();
        host.configure(&allocation.connection_info);
        host.start_host().await.unwrap();
        let code = relay.get_join_code(&allocation.allocation_id).await.unwrap();
        let info = relay.join_allocation(&code).await.unwrap();
        client.configure(&info);
        client.start_client().await.unwrap();

        client.shutdown().await.unwrap();

        let _ = host_events.recv().await; // Connected
        assert!(matches!(
            host_events.recv().await.unwrap(),
            PeerEvent::Disconnected(_)
        ));
    }

    #[tokio::test]
    async fn host_shutdown_removes_the_allocation() {
        let network = LoopbackNetwork::new();
        let mut relay = network.relay();
        let mut host = network.transport();

        let allocation = relay.create_allocation(1, None).await.unwrap();
        let code = relay.get_join_code(&allocation.allocation_id).await.unwrap();
        host.configure(&allocation.connection_info);
        host.start_host().await.unwrap();

        host.shutdown().await.unwrap();

        let err = relay.join_allocation(&code).await.unwrap_err();
        assert!(matches!(err, LobbyError::Service(_)));
    }

    #[tokio::test]
    async fn second_client_is_rejected_when_full() {
        let network = LoopbackNetwork::new();
        let mut relay = network.relay();
        let mut host = network.transport();
        let mut first = network.transport();
        let mut second = network.transport();

        let allocation = relay.create_allocation(1, None).await.unwrap();
        host.configure(&allocation.connection_info);
        host.start_host().await.unwrap();
        let code = relay.get_join_code(&allocation.allocation_id).await.unwrap();
        let info = relay.join_allocation(&code).await.unwrap();

        first.configure(&info);
        first.start_client().await.unwrap();

        second.configure(&info);
        let err = second.start_client().await.unwrap_err();
        assert!(matches!(err, LobbyError::Service(_)));
    }

    #[tokio::test]
    async fn second_peer_events_take_returns_a_closed_channel() {
        let network = LoopbackNetwork::new();
        let mut transport = network.transport();
        let _live = transport.peer_events();
        let mut dead = transport.peer_events();
        assert!(dead.recv().await.is_none());
    }

    #[test]
    fn join_codes_are_uppercase_alphanumeric() {
        for _ in 0..50 {
            let code = generate_join_code();
            assert_eq!(code.len(), JOIN_CODE_LEN);
            assert!(code
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }
}
