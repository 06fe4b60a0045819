#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Shared test utilities for lobby integration tests.
//!
//! Provides scripted mock implementations of every service seam plus a
//! timeout-guarded event helper. Scripted platform/identity failures are
//! consumed by the first call so explicit-retry flows can succeed.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use duel_lobby::{
    IdentityProvider, LobbyError, LobbyEvent, NetworkTransport, PeerEvent, PlatformServices,
    RelayAllocation, RelayConnectionInfo, RelayProtocol, RelayService, Result, SceneDirector,
    SignIn,
};
use tokio::sync::{broadcast, mpsc};

pub type Calls = Arc<StdMutex<Vec<&'static str>>>;

pub fn conn_info() -> RelayConnectionInfo {
    RelayConnectionInfo {
        host: "relay.test".into(),
        port: 7777,
        protocol: RelayProtocol::Auto,
        allocation_id: "alloc-1".into(),
        token: "tok".into(),
    }
}

// ── Platform ────────────────────────────────────────────────────────

/// Platform services with scriptable step failures, recording call order.
pub struct MockPlatform {
    /// Consumed by the first `initialize_core` call.
    pub fail_core: Option<String>,
    /// Consumed by the first `initialize_multiplayer` call.
    pub fail_multiplayer: Option<String>,
    /// Never resolve `initialize_core`; keeps the lobby Uninitialized.
    pub hang_core: bool,
    pub calls: Calls,
}

impl MockPlatform {
    pub fn ok() -> Self {
        Self {
            fail_core: None,
            fail_multiplayer: None,
            hang_core: false,
            calls: Arc::new(StdMutex::new(Vec::new())),
        }
    }

    pub fn hanging() -> Self {
        let mut platform = Self::ok();
        platform.hang_core = true;
        platform
    }
}

#[async_trait]
impl PlatformServices for MockPlatform {
    async fn initialize_core(&mut self) -> Result<()> {
        self.calls.lock().unwrap().push("core");
        if self.hang_core {
            return std::future::pending().await;
        }
        match self.fail_core.take() {
            Some(msg) => Err(LobbyError::Service(msg)),
            None => Ok(()),
        }
    }

    async fn initialize_multiplayer(&mut self) -> Result<()> {
        self.calls.lock().unwrap().push("multiplayer");
        match self.fail_multiplayer.take() {
            Some(msg) => Err(LobbyError::Service(msg)),
            None => Ok(()),
        }
    }
}

// ── Identity ────────────────────────────────────────────────────────

/// Identity provider with a scriptable sign-in result.
pub struct MockIdentity {
    pub issued_name: Option<String>,
    /// Consumed by the first `sign_in_anonymously` call.
    pub fail_sign_in: Option<String>,
    pub fail_update: Option<String>,
    pub signed_in: bool,
    pub name_updates: Arc<StdMutex<Vec<String>>>,
}

impl MockIdentity {
    pub fn ok(issued_name: Option<&str>) -> Self {
        Self {
            issued_name: issued_name.map(String::from),
            fail_sign_in: None,
            fail_update: None,
            signed_in: false,
            name_updates: Arc::new(StdMutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl IdentityProvider for MockIdentity {
    async fn sign_in_anonymously(&mut self) -> Result<SignIn> {
        if let Some(msg) = self.fail_sign_in.take() {
            return Err(LobbyError::Service(msg));
        }
        self.signed_in = true;
        Ok(SignIn {
            player_id: "player-1".into(),
            player_name: self.issued_name.clone(),
        })
    }

    async fn update_player_name(&mut self, name: &str) -> Result<()> {
        if let Some(msg) = &self.fail_update {
            return Err(LobbyError::Service(msg.clone()));
        }
        self.name_updates.lock().unwrap().push(name.to_string());
        Ok(())
    }

    fn is_signed_in(&self) -> bool {
        self.signed_in
    }
}

// ── Relay ───────────────────────────────────────────────────────────

/// Relay with scriptable outcomes, recording which calls were made.
pub struct MockRelay {
    pub join_code: String,
    pub fail_allocation: Option<String>,
    pub fail_join_code: Option<String>,
    pub fail_join: Option<String>,
    /// Never resolve `create_allocation`; exercises the bounded wait.
    pub hang_allocation: bool,
    pub calls: Calls,
}

impl MockRelay {
    pub fn ok(join_code: &str) -> Self {
        Self {
            join_code: join_code.into(),
            fail_allocation: None,
            fail_join_code: None,
            fail_join: None,
            hang_allocation: false,
            calls: Arc::new(StdMutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl RelayService for MockRelay {
    async fn create_allocation(
        &mut self,
        _slots: u8,
        _region: Option<&str>,
    ) -> Result<RelayAllocation> {
        self.calls.lock().unwrap().push("create_allocation");
        if self.hang_allocation {
            return std::future::pending().await;
        }
        if let Some(msg) = &self.fail_allocation {
            return Err(LobbyError::Service(msg.clone()));
        }
        Ok(RelayAllocation {
            allocation_id: "alloc-1".into(),
            connection_info: conn_info(),
        })
    }

    async fn get_join_code(&mut self, _allocation_id: &str) -> Result<String> {
        self.calls.lock().unwrap().push("get_join_code");
        if let Some(msg) = &self.fail_join_code {
            return Err(LobbyError::Service(msg.clone()));
        }
        Ok(self.join_code.clone())
    }

    async fn join_allocation(&mut self, _join_code: &str) -> Result<RelayConnectionInfo> {
        self.calls.lock().unwrap().push("join_allocation");
        if let Some(msg) = &self.fail_join {
            return Err(LobbyError::Service(msg.clone()));
        }
        Ok(conn_info())
    }
}

// ── Transport ───────────────────────────────────────────────────────

/// Transport recording configuration and starts; the returned sender
/// injects peer lifecycle events as the engine transport would.
pub struct MockTransport {
    pub fail_start_host: Option<String>,
    pub fail_start_client: Option<String>,
    pub configured: Arc<StdMutex<Option<RelayConnectionInfo>>>,
    pub shutdowns: Arc<StdMutex<u32>>,
    peer_rx: Option<mpsc::UnboundedReceiver<PeerEvent>>,
}

impl MockTransport {
    pub fn ok() -> (Self, mpsc::UnboundedSender<PeerEvent>) {
        let (peer_tx, peer_rx) = mpsc::unbounded_channel();
        let transport = Self {
            fail_start_host: None,
            fail_start_client: None,
            configured: Arc::new(StdMutex::new(None)),
            shutdowns: Arc::new(StdMutex::new(0)),
            peer_rx: Some(peer_rx),
        };
        (transport, peer_tx)
    }
}

#[async_trait]
impl NetworkTransport for MockTransport {
    fn configure(&mut self, info: &RelayConnectionInfo) {
        *self.configured.lock().unwrap() = Some(info.clone());
    }

    async fn start_host(&mut self) -> Result<()> {
        match &self.fail_start_host {
            Some(msg) => Err(LobbyError::Service(msg.clone())),
            None => Ok(()),
        }
    }

    async fn start_client(&mut self) -> Result<()> {
        match &self.fail_start_client {
            Some(msg) => Err(LobbyError::Service(msg.clone())),
            None => Ok(()),
        }
    }

    async fn shutdown(&mut self) -> Result<()> {
        *self.shutdowns.lock().unwrap() += 1;
        Ok(())
    }

    fn peer_events(&mut self) -> mpsc::UnboundedReceiver<PeerEvent> {
        match self.peer_rx.take() {
            Some(rx) => rx,
            None => {
                let (tx, rx) = mpsc::unbounded_channel();
                drop(tx);
                rx
            }
        }
    }
}

// ── Scene ───────────────────────────────────────────────────────────

/// Scene director recording requested scene loads.
#[derive(Clone, Default)]
pub struct MockScene {
    pub loads: Arc<StdMutex<Vec<String>>>,
}

impl SceneDirector for MockScene {
    fn request_scene_load(&mut self, scene_name: &str) {
        self.loads.lock().unwrap().push(scene_name.to_string());
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Receive the next lobby event, failing the test after two seconds.
pub async fn next_event(rx: &mut broadcast::Receiver<LobbyEvent>) -> LobbyEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for a lobby event")
        .expect("event channel closed")
}
