//! The session broker: owns the single relay-backed network session.
//!
//! [`SessionBroker`] performs host and client session starts against the
//! [`RelayService`] and [`NetworkTransport`] seams, tracks [`SessionState`],
//! and emits lifecycle events on the [`EventBus`]. It is driven by the lobby
//! loop, which serializes commands and transport callbacks, so every method
//! takes `&mut self` and the state has exactly one writer.
//!
//! A start either completes every step and commits the new state in one
//! place, or fails and leaves the state untouched. There is no partial
//! mutation to roll back.

use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::{LobbyError, Result};
use crate::event::{EventBus, LobbyEvent};
use crate::relay::{NetworkTransport, PeerEvent, RelayService};
use crate::session::{RoomParams, SessionConfig, SessionRole, SessionState};

/// Manages the single relay-backed session of the process.
pub struct SessionBroker<R: RelayService, T: NetworkTransport> {
    relay: R,
    transport: T,
    config: SessionConfig,
    state: SessionState,
    /// Single-flight guard: a start that is awaiting the relay or transport
    /// blocks further starts until it resolves.
    start_in_flight: bool,
    events: EventBus,
}

impl<R: RelayService, T: NetworkTransport> SessionBroker<R, T> {
    pub fn new(relay: R, transport: T, config: SessionConfig, events: EventBus) -> Self {
        Self {
            relay,
            transport,
            config,
            state: SessionState::default(),
            start_in_flight: false,
            events,
        }
    }

    /// Current session state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Take the transport's peer lifecycle receiver.
    pub fn peer_events(&mut self) -> mpsc::UnboundedReceiver<PeerEvent> {
        self.transport.peer_events()
    }

    /// Create a relay allocation and start accepting connections as host.
    ///
    /// Returns the join code for the allocation. Emits
    /// [`LobbyEvent::HostStarted`] on success and
    /// [`LobbyEvent::ConnectionFailed`] on failure.
    ///
    /// # Errors
    ///
    /// [`LobbyError::AlreadyConnected`] with an active session,
    /// [`LobbyError::StartInProgress`] while another start is in flight,
    /// [`LobbyError::Timeout`] when a relay call exceeds the configured
    /// bound, or the underlying service error. On error the session state is
    /// unchanged.
    pub async fn start_host(&mut self, params: &RoomParams) -> Result<String> {
        self.ensure_can_start()?;
        if let Some(name) = &params.room_name {
            // Room metadata is accepted but not consumed by the relay layer.
            debug!(
                room_name = %name,
                is_private = params.is_private,
                "room metadata accepted"
            );
        }

        self.start_in_flight = true;
        let result = self.run_host_start().await;
        self.start_in_flight = false;

        match result {
            Ok(join_code) => {
                self.state.role = SessionRole::Host;
                self.state.is_connected = true;
                self.state.connected_peer_count = 1;
                self.state.join_code = join_code.clone();
                debug!(join_code = %join_code, "host session started");
                self.events.publish(LobbyEvent::HostStarted {
                    join_code: join_code.clone(),
                });
                Ok(join_code)
            }
            Err(e) => {
                warn!("host start failed: {e}");
                self.events.publish(LobbyEvent::ConnectionFailed {
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn run_host_start(&mut self) -> Result<String> {
        let slots = self.config.max_players.saturating_sub(1);
        let wait = self.config.allocation_timeout;

        let allocation = timeout(
            wait,
            self.relay
                .create_allocation(slots, self.config.region.as_deref()),
        )
        .await
        .map_err(|_| LobbyError::Timeout)??;

        let join_code = timeout(wait, self.relay.get_join_code(&allocation.allocation_id))
            .await
            .map_err(|_| LobbyError::Timeout)??;

        self.transport.configure(&allocation.connection_info);
        self.transport.start_host().await?;
        Ok(join_code)
    }

    /// Join the allocation identified by `join_code` and start connecting as
    /// client.
    ///
    /// Connection confirmation arrives later as [`PeerEvent::Connected`];
    /// until then the session stores the role and join code but is not
    /// considered connected. Emits [`LobbyEvent::ConnectionFailed`] on
    /// failure.
    ///
    /// # Errors
    ///
    /// As [`start_host`](Self::start_host), plus
    /// [`LobbyError::InvalidInput`] for an empty join code.
    pub async fn start_client(&mut self, join_code: &str) -> Result<()> {
        if join_code.is_empty() {
            return Err(LobbyError::InvalidInput(
                "join code must not be empty".into(),
            ));
        }
        self.ensure_can_start()?;

        self.start_in_flight = true;
        let result = self.run_client_start(join_code).await;
        self.start_in_flight = false;

        match result {
            Ok(()) => {
                self.state.role = SessionRole::Client;
                self.state.join_code = join_code.to_string();
                debug!(join_code = %join_code, "client session started, awaiting connect confirmation");
                Ok(())
            }
            Err(e) => {
                warn!("client start failed: {e}");
                self.events.publish(LobbyEvent::ConnectionFailed {
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn run_client_start(&mut self, join_code: &str) -> Result<()> {
        let wait = self.config.allocation_timeout;
        let info = timeout(wait, self.relay.join_allocation(join_code))
            .await
            .map_err(|_| LobbyError::Timeout)??;
        self.transport.configure(&info);
        self.transport.start_client().await?;
        Ok(())
    }

    /// Apply a transport peer lifecycle notification.
    ///
    /// A connect with no active session and a disconnect without a matching
    /// connect are anomalies: logged and ignored, never a state change.
    pub fn handle_peer_event(&mut self, event: PeerEvent) {
        match event {
            PeerEvent::Connected(peer_id) => {
                if self.state.role == SessionRole::None {
                    warn!(%peer_id, "peer connected with no active session, ignoring");
                    return;
                }
                self.state.connected_peer_count += 1;
                self.state.is_connected = true;
                debug!(%peer_id, count = self.state.connected_peer_count, "peer connected");
                self.events.publish(LobbyEvent::ClientConnected { peer_id });
            }
            PeerEvent::Disconnected(peer_id) => {
                if self.state.connected_peer_count == 0 {
                    warn!(%peer_id, "peer disconnect without a matching connect, ignoring");
                    return;
                }
                self.state.connected_peer_count -= 1;
                debug!(%peer_id, count = self.state.connected_peer_count, "peer disconnected");
                self.events
                    .publish(LobbyEvent::ClientDisconnected { peer_id });
            }
        }
    }

    /// Tear down the transport and reset the session state to its defaults.
    ///
    /// Emits [`LobbyEvent::SessionShutdown`]. A transport error during
    /// teardown is logged; the state is reset regardless.
    ///
    /// # Errors
    ///
    /// [`LobbyError::NotConnected`] when no session exists; the state is
    /// unchanged in that case.
    pub async fn shutdown(&mut self) -> Result<()> {
        if self.state.role == SessionRole::None {
            warn!("session shutdown requested with no active session");
            return Err(LobbyError::NotConnected);
        }
        if let Err(e) = self.transport.shutdown().await {
            warn!("transport shutdown error: {e}");
        }
        self.state = SessionState::default();
        debug!("session shut down");
        self.events.publish(LobbyEvent::SessionShutdown);
        Ok(())
    }

    /// Quiet teardown used when the lobby loop exits.
    pub(crate) async fn teardown(&mut self) {
        if self.state.role != SessionRole::None {
            let _ = self.shutdown().await;
        }
    }

    fn ensure_can_start(&self) -> Result<()> {
        if self.start_in_flight {
            return Err(LobbyError::StartInProgress);
        }
        if self.state.role != SessionRole::None {
            return Err(LobbyError::AlreadyConnected);
        }
        Ok(())
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
    use crate::relay::{RelayAllocation, RelayConnectionInfo, RelayProtocol};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex as StdMutex};
    use std::time::Duration;
    use uuid::Uuid;

    fn conn_info() -> RelayConnectionInfo {
        RelayConnectionInfo {
            host: "relay.test".into(),
            port: 7777,
            protocol: RelayProtocol::Auto,
            allocation_id: "alloc-1".into(),
            token: "tok".into(),
        }
    }

    /// Relay with scriptable failures; records which calls were made.
    struct StubRelay {
        join_code: String,
        fail_allocation: Option<String>,
        fail_join_code: Option<String>,
        fail_join: Option<String>,
        hang_allocation: bool,
        calls: Arc<StdMutex<Vec<&'static str>>>,
    }

    impl StubRelay {
        fn ok(join_code: &str) -> Self {
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
    impl RelayService for StubRelay {
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

    /// Transport recording configuration and starts.
    struct StubTransport {
        fail_start_host: Option<String>,
        fail_start_client: Option<String>,
        configured: Arc<StdMutex<Option<RelayConnectionInfo>>>,
        shutdowns: Arc<StdMutex<u32>>,
        peer_rx: Option<mpsc::UnboundedReceiver<PeerEvent>>,
    }

    impl StubTransport {
        fn ok() -> Self {
            let (_tx, rx) = mpsc::unbounded_channel();
            Self {
                fail_start_host: None,
                fail_start_client: None,
                configured: Arc::new(StdMutex::new(None)),
                shutdowns: Arc::new(StdMutex::new(0)),
                peer_rx: Some(rx),
            }
        }
    }

    #[async_trait]
    impl NetworkTransport for StubTransport {
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

    fn broker(relay: StubRelay, transport: StubTransport) -> SessionBroker<StubRelay, StubTransport> {
        SessionBroker::new(relay, transport, SessionConfig::new(), EventBus::new(32))
    }

    #[tokio::test]
    async fn start_host_success_commits_state_and_returns_code() {
        let mut broker = broker(StubRelay::ok("ABC123"), StubTransport::ok());
        let mut events = broker.events.subscribe();

        let code = broker.start_host(&RoomParams::default()).await.unwrap();

        assert_eq!(code, "ABC123");
        let state = broker.state();
        assert_eq!(state.role, SessionRole::Host);
        assert!(state.is_connected);
        assert_eq!(state.connected_peer_count, 1);
        assert_eq!(state.join_code, "ABC123");
        assert!(matches!(
            events.recv().await.unwrap(),
            LobbyEvent::HostStarted { join_code } if join_code == "ABC123"
        ));
    }

    #[tokio::test]
    async fn start_host_allocation_failure_leaves_state_untouched() {
        let mut relay = StubRelay::ok("ABC123");
        relay.fail_allocation = Some("no capacity".into());
        let mut broker = broker(relay, StubTransport::ok());
        let mut events = broker.events.subscribe();

        let err = broker.start_host(&RoomParams::default()).await.unwrap_err();

        assert!(matches!(err, LobbyError::Service(_)));
        assert_eq!(*broker.state(), SessionState::default());
        assert!(matches!(
            events.recv().await.unwrap(),
            LobbyEvent::ConnectionFailed { reason } if reason.contains("no capacity")
        ));
    }

    #[tokio::test]
    async fn start_host_transport_failure_leaves_state_untouched() {
        let mut transport = StubTransport::ok();
        transport.fail_start_host = Some("bind failed".into());
        let configured = Arc::clone(&transport.configured);
        let mut broker = broker(StubRelay::ok("ABC123"), transport);

        let err = broker.start_host(&RoomParams::default()).await.unwrap_err();

        assert!(matches!(err, LobbyError::Service(_)));
        assert_eq!(*broker.state(), SessionState::default());
        // The transport was configured before the start step failed; that is
        // a collaborator call, not session state.
        assert!(configured.lock().unwrap().is_some());
    }

    #[tokio::test]
    async fn start_host_while_active_is_rejected() {
        let mut broker = broker(StubRelay::ok("ABC123"), StubTransport::ok());
        broker.start_host(&RoomParams::default()).await.unwrap();

        let err = broker.start_host(&RoomParams::default()).await.unwrap_err();
        assert!(matches!(err, LobbyError::AlreadyConnected));
        assert_eq!(broker.state().role, SessionRole::Host);
    }

    #[tokio::test]
    async fn start_host_times_out_on_hanging_relay() {
        let mut relay = StubRelay::ok("ABC123");
        relay.hang_allocation = true;
        let config = SessionConfig::new().with_allocation_timeout(Duration::from_millis(20));
        let mut broker = SessionBroker::new(relay, StubTransport::ok(), config, EventBus::new(32));
        let mut events = broker.events.subscribe();

        let err = broker.start_host(&RoomParams::default()).await.unwrap_err();

        assert!(matches!(err, LobbyError::Timeout));
        assert_eq!(*broker.state(), SessionState::default());
        assert!(matches!(
            events.recv().await.unwrap(),
            LobbyEvent::ConnectionFailed { reason } if reason.contains("timed out")
        ));
        // A later start must be possible: the in-flight guard was cleared.
        assert!(matches!(
            broker.ensure_can_start(),
            Ok(())
        ));
    }

    #[tokio::test]
    async fn start_client_success_waits_for_connect_confirmation() {
        let mut broker = broker(StubRelay::ok("ABC123"), StubTransport::ok());

        broker.start_client("XYZ999").await.unwrap();

        let state = broker.state();
        assert_eq!(state.role, SessionRole::Client);
        assert_eq!(state.join_code, "XYZ999");
        assert!(!state.is_connected);
        assert_eq!(state.connected_peer_count, 0);
    }

    #[tokio::test]
    async fn start_client_empty_code_never_reaches_the_relay() {
        let relay = StubRelay::ok("ABC123");
        let calls = Arc::clone(&relay.calls);
        let mut broker = broker(relay, StubTransport::ok());

        let err = broker.start_client("").await.unwrap_err();

        assert!(matches!(err, LobbyError::InvalidInput(_)));
        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(*broker.state(), SessionState::default());
    }

    #[tokio::test]
    async fn start_client_join_failure_leaves_state_untouched() {
        let mut relay = StubRelay::ok("ABC123");
        relay.fail_join = Some("allocation not found".into());
        let mut broker = broker(relay, StubTransport::ok());
        let mut events = broker.events.subscribe();

        let err = broker.start_client("XYZ999").await.unwrap_err();

        assert!(matches!(err, LobbyError::Service(_)));
        assert_eq!(*broker.state(), SessionState::default());
        assert!(matches!(
            events.recv().await.unwrap(),
            LobbyEvent::ConnectionFailed { reason } if reason.contains("allocation not found")
        ));
    }

    #[tokio::test]
    async fn peer_connect_and_disconnect_track_the_count() {
        let mut broker = broker(StubRelay::ok("ABC123"), StubTransport::ok());
        broker.start_host(&RoomParams::default()).await.unwrap();
        let peer = Uuid::from_u128(7);

        broker.handle_peer_event(PeerEvent::Connected(peer));
        assert_eq!(broker.state().connected_peer_count, 2);
        assert!(broker.state().is_connected);

        broker.handle_peer_event(PeerEvent::Disconnected(peer));
        assert_eq!(broker.state().connected_peer_count, 1);
    }

    #[tokio::test]
    async fn disconnect_without_matching_connect_is_a_no_op() {
        let mut broker = broker(StubRelay::ok("ABC123"), StubTransport::ok());
        let mut events = broker.events.subscribe();

        broker.handle_peer_event(PeerEvent::Disconnected(Uuid::from_u128(7)));

        assert_eq!(*broker.state(), SessionState::default());
        // No event was published for the anomaly.
        assert!(matches!(
            events.try_recv(),
            Err(tokio::sync::broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn peer_connect_with_no_session_is_ignored() {
        let mut broker = broker(StubRelay::ok("ABC123"), StubTransport::ok());

        broker.handle_peer_event(PeerEvent::Connected(Uuid::from_u128(7)));

        assert_eq!(*broker.state(), SessionState::default());
    }

    #[tokio::test]
    async fn shutdown_resets_state_to_defaults() {
        let transport = StubTransport::ok();
        let shutdowns = Arc::clone(&transport.shutdowns);
        let mut broker = broker(StubRelay::ok("ABC123"), transport);
        let mut events = broker.events.subscribe();
        broker.start_host(&RoomParams::default()).await.unwrap();

        broker.shutdown().await.unwrap();

        assert_eq!(*broker.state(), SessionState::default());
        assert_eq!(*shutdowns.lock().unwrap(), 1);
        let _ = events.recv().await; // HostStarted
        assert!(matches!(
            events.recv().await.unwrap(),
            LobbyEvent::SessionShutdown
        ));
    }

    #[tokio::test]
    async fn shutdown_without_session_is_a_warning_no_op() {
        let mut broker = broker(StubRelay::ok("ABC123"), StubTransport::ok());

        let err = broker.shutdown().await.unwrap_err();

        assert!(matches!(err, LobbyError::NotConnected));
        assert_eq!(*broker.state(), SessionState::default());
    }

    #[tokio::test]
    async fn pending_client_can_still_shut_down() {
        let mut broker = broker(StubRelay::ok("ABC123"), StubTransport::ok());
        broker.start_client("XYZ999").await.unwrap();
        // Connect confirmation never arrived, but the session exists.
        broker.shutdown().await.unwrap();
        assert_eq!(*broker.state(), SessionState::default());
    }

    #[tokio::test]
    async fn roles_are_mutually_exclusive_across_start_sequences() {
        let mut broker = broker(StubRelay::ok("ABC123"), StubTransport::ok());

        broker.start_client("XYZ999").await.unwrap();
        let err = broker.start_host(&RoomParams::default()).await.unwrap_err();
        assert!(matches!(err, LobbyError::AlreadyConnected));
        assert_eq!(broker.state().role, SessionRole::Client);

        broker.shutdown().await.unwrap();
        broker.start_host(&RoomParams::default()).await.unwrap();
        assert_eq!(broker.state().role, SessionRole::Host);
    }
}
