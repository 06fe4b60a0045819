//! Relay and transport seams.
//!
//! [`RelayService`] brokers rendezvous allocations so two peers can exchange
//! traffic without either exposing a public address; [`NetworkTransport`] is
//! the engine-side connection driven with those allocations. Connection
//! setup and wire framing live entirely behind these traits; the lobby core
//! only decides when to call them and how to react to their results.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::Result;

/// Opaque identifier for a transport-level peer connection.
pub type PeerId = Uuid;

/// Relay transport protocol selection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RelayProtocol {
    /// TCP (reliable, ordered delivery). Suited to turn-based play.
    Tcp,
    /// UDP (low-latency, unreliable).
    Udp,
    /// Let the relay pick based on room size and platform.
    #[default]
    Auto,
}

/// Connection parameters for one side of a relay allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConnectionInfo {
    /// Relay server host.
    pub host: String,
    /// Relay server port.
    pub port: u16,
    /// Transport protocol for this allocation.
    #[serde(default)]
    pub protocol: RelayProtocol,
    /// Allocation this connection belongs to.
    pub allocation_id: String,
    /// Opaque server-issued authentication token.
    pub token: String,
}

/// A freshly created relay allocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayAllocation {
    pub allocation_id: String,
    /// Host-side connection parameters for the allocation.
    pub connection_info: RelayConnectionInfo,
}

/// Peer lifecycle notification delivered by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeerEvent {
    /// A peer connection was established.
    Connected(PeerId),
    /// A peer connection was lost.
    Disconnected(PeerId),
}

/// Relay allocation broker.
#[async_trait]
pub trait RelayService: Send + 'static {
    /// Request an allocation with `slots` remote connection slots, optionally
    /// pinned to a region.
    async fn create_allocation(
        &mut self,
        slots: u8,
        region: Option<&str>,
    ) -> Result<RelayAllocation>;

    /// Obtain the short join code identifying an allocation.
    async fn get_join_code(&mut self, allocation_id: &str) -> Result<String>;

    /// Resolve a join code into client-side connection parameters.
    async fn join_allocation(&mut self, join_code: &str) -> Result<RelayConnectionInfo>;
}

/// Engine-side network transport driven with relay connection parameters.
///
/// # Peer events
///
/// [`peer_events`](NetworkTransport::peer_events) hands out the receiving
/// half of the peer lifecycle channel. It is taken exactly once, by the
/// lobby loop; implementations return a closed channel on later calls.
/// The receiver is polled inside `tokio::select!`, which
/// `mpsc::UnboundedReceiver` supports without losing notifications.
#[async_trait]
pub trait NetworkTransport: Send + 'static {
    /// Store connection parameters for the next start call.
    fn configure(&mut self, info: &RelayConnectionInfo);

    /// Begin accepting connections in the host role.
    async fn start_host(&mut self) -> Result<()>;

    /// Begin connecting to the host in the client role. Completion of the
    /// connection arrives later as [`PeerEvent::Connected`].
    async fn start_client(&mut self) -> Result<()>;

    /// Tear the connection down. Implementations should release resources
    /// even if the remote side is already gone.
    async fn shutdown(&mut self) -> Result<()>;

    /// Take the peer lifecycle receiver.
    fn peer_events(&mut self) -> mpsc::UnboundedReceiver<PeerEvent>;
}
