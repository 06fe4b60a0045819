//! Lobby events and the broadcast bus that fans them out.
//!
//! Presentation layers subscribe via [`EventBus::subscribe`] (or
//! [`LobbyClient::subscribe`](crate::LobbyClient::subscribe)) and receive
//! every [`LobbyEvent`] published after the subscription. Any number of
//! subscribers is supported and dropping a receiver is always a safe
//! unsubscribe. A slow subscriber may observe
//! [`Lagged`](tokio::sync::broadcast::error::RecvError::Lagged) and skip
//! ahead rather than stall the publishing side.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::relay::PeerId;

/// Default capacity of the per-subscriber event buffer.
pub(crate) const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Events emitted by the lobby core toward presentation layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum LobbyEvent {
    /// Platform services are initialized and the player is signed in.
    InitializationComplete,
    /// Startup failed and the remaining steps were skipped. Retry is an
    /// explicit caller action.
    InitializationFailed { reason: String },
    /// A lobby command was rejected or failed.
    LobbyError { reason: String },
    /// A room was created and is accepting a second player.
    RoomCreated { join_code: String },
    /// Joined an existing room. Connection confirmation follows separately.
    RoomJoined { join_code: String },
    /// A quick-match room was opened in the host role.
    QuickMatchStarted { join_code: String },
    /// The relay session is up and accepting connections.
    HostStarted { join_code: String },
    /// A peer connection was confirmed by the transport.
    ClientConnected { peer_id: PeerId },
    /// A peer connection was lost.
    ClientDisconnected { peer_id: PeerId },
    /// A host or client start failed.
    ConnectionFailed { reason: String },
    /// The display name was updated at the identity provider.
    PlayerNameChanged { name: String },
    /// The active session was torn down and its state reset.
    SessionShutdown,
}

/// Broadcast fan-out for [`LobbyEvent`]s.
///
/// Cloning the bus clones the sending side; all clones publish to the same
/// subscribers. Per-subscriber delivery order is publish order; no ordering
/// is promised across subscribers.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LobbyEvent>,
}

impl EventBus {
    /// Create a bus with the given per-subscriber buffer capacity.
    /// Values below 1 are clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to all events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<LobbyEvent> {
        self.tx.subscribe()
    }

    /// Publish an event to every live subscriber.
    ///
    /// Publishing with no subscribers is not an error; the event is dropped.
    pub fn publish(&self, event: LobbyEvent) {
        if let Err(dropped) = self.tx.send(event) {
            tracing::trace!(
                "no event subscribers, dropping event: {:?}",
                std::mem::discriminant(&dropped.0)
            );
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CHANNEL_CAPACITY)
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

    #[tokio::test]
    async fn subscribers_receive_events_in_publish_order() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(LobbyEvent::InitializationComplete);
        bus.publish(LobbyEvent::RoomCreated {
            join_code: "ABC123".into(),
        });

        assert!(matches!(
            rx.recv().await.unwrap(),
            LobbyEvent::InitializationComplete
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            LobbyEvent::RoomCreated { join_code } if join_code == "ABC123"
        ));
    }

    #[tokio::test]
    async fn multiple_subscribers_each_receive_everything() {
        let bus = EventBus::new(8);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.publish(LobbyEvent::SessionShutdown);

        assert!(matches!(a.recv().await.unwrap(), LobbyEvent::SessionShutdown));
        assert!(matches!(b.recv().await.unwrap(), LobbyEvent::SessionShutdown));
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_not_an_error() {
        let bus = EventBus::new(8);
        // No receiver exists; the publish must simply drop the event.
        bus.publish(LobbyEvent::InitializationComplete);
    }

    #[tokio::test]
    async fn dropping_a_receiver_is_a_safe_unsubscribe() {
        let bus = EventBus::new(8);
        let rx = bus.subscribe();
        drop(rx);
        bus.publish(LobbyEvent::SessionShutdown);

        // A later subscriber still works.
        let mut rx = bus.subscribe();
        bus.publish(LobbyEvent::InitializationComplete);
        assert!(matches!(
            rx.recv().await.unwrap(),
            LobbyEvent::InitializationComplete
        ));
    }

    #[test]
    fn zero_capacity_is_clamped_to_one() {
        // tokio panics on a zero-capacity broadcast channel; the bus clamps.
        let bus = EventBus::new(0);
        drop(bus.subscribe());
    }
}
