#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
#![cfg(feature = "providers-local")]
//! End-to-end tests: two lobby clients wired through the loopback backend
//! complete real host/join round trips in-process.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{next_event, MockScene};
use duel_lobby::{
    LobbyClient, LobbyConfig, LobbyEvent, LobbyPhase, LobbyServices, LocalIdentityProvider,
    LocalPlatform, LoopbackNetwork, RoomParams, SessionRole, SessionState,
};

fn start_client(
    network: &LoopbackNetwork,
    name: &str,
    scene: MockScene,
) -> (LobbyClient, tokio::sync::broadcast::Receiver<LobbyEvent>) {
    let services = LobbyServices::new(
        LocalPlatform,
        LocalIdentityProvider::new().with_player_name(name),
        network.relay(),
        network.transport(),
        scene,
    );
    LobbyClient::start(services, LobbyConfig::new())
}

#[tokio::test]
async fn two_clients_complete_a_host_join_round_trip() {
    let network = LoopbackNetwork::new();
    let host_scene = MockScene::default();
    let host_loads = Arc::clone(&host_scene.loads);
    let guest_scene = MockScene::default();
    let guest_loads = Arc::clone(&guest_scene.loads);

    let (mut host, mut host_events) = start_client(&network, "Host", host_scene);
    let (mut guest, mut guest_events) = start_client(&network, "Guest", guest_scene);

    assert!(matches!(
        next_event(&mut host_events).await,
        LobbyEvent::InitializationComplete
    ));
    assert!(matches!(
        next_event(&mut guest_events).await,
        LobbyEvent::InitializationComplete
    ));

    // Host opens the room and shares the code.
    host.create_room(RoomParams::new("friday-duel")).unwrap();
    assert!(matches!(
        next_event(&mut host_events).await,
        LobbyEvent::HostStarted { .. }
    ));
    let join_code = match next_event(&mut host_events).await {
        LobbyEvent::RoomCreated { join_code } => join_code,
        other => panic!("expected RoomCreated, got {other:?}"),
    };
    assert_eq!(join_code.len(), 6);

    // Guest joins with the reported code.
    guest.join_room(join_code.clone()).unwrap();
    assert!(matches!(
        next_event(&mut guest_events).await,
        LobbyEvent::RoomJoined { join_code: code } if code == join_code
    ));

    // Both sides observe the peer connection.
    assert!(matches!(
        next_event(&mut guest_events).await,
        LobbyEvent::ClientConnected { .. }
    ));
    assert!(matches!(
        next_event(&mut host_events).await,
        LobbyEvent::ClientConnected { .. }
    ));

    tokio::time::sleep(Duration::from_millis(50)).await;
    let host_status = host.status();
    assert_eq!(host_status.session.role, SessionRole::Host);
    assert_eq!(host_status.session.connected_peer_count, 2);
    assert_eq!(host_status.session.join_code, join_code);

    let guest_status = guest.status();
    assert_eq!(guest_status.session.role, SessionRole::Client);
    assert!(guest_status.session.is_connected);
    assert_eq!(guest_status.session.connected_peer_count, 1);
    assert_eq!(guest_status.session.join_code, join_code);

    // Only the host drives the scene transition.
    assert_eq!(*host_loads.lock().unwrap(), ["GameBoard"]);
    assert!(guest_loads.lock().unwrap().is_empty());

    host.shutdown().await;
    guest.shutdown().await;
}

#[tokio::test]
async fn guest_leaving_notifies_the_host() {
    let network = LoopbackNetwork::new();
    let (mut host, mut host_events) = start_client(&network, "Host", MockScene::default());
    let (mut guest, mut guest_events) = start_client(&network, "Guest", MockScene::default());

    let _ = next_event(&mut host_events).await; // InitializationComplete
    let _ = next_event(&mut guest_events).await; // InitializationComplete

    host.start_quick_match().unwrap();
    let _ = next_event(&mut host_events).await; // HostStarted
    let join_code = match next_event(&mut host_events).await {
        LobbyEvent::QuickMatchStarted { join_code } => join_code,
        other => panic!("expected QuickMatchStarted, got {other:?}"),
    };

    guest.join_room(join_code).unwrap();
    let _ = next_event(&mut guest_events).await; // RoomJoined
    let _ = next_event(&mut guest_events).await; // ClientConnected
    let _ = next_event(&mut host_events).await; // ClientConnected

    guest.shutdown_session().unwrap();
    assert!(matches!(
        next_event(&mut guest_events).await,
        LobbyEvent::SessionShutdown
    ));
    assert!(matches!(
        next_event(&mut host_events).await,
        LobbyEvent::ClientDisconnected { .. }
    ));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(guest.status().session, SessionState::default());
    assert_eq!(guest.status().phase, LobbyPhase::Ready);
    assert_eq!(host.status().session.connected_peer_count, 1);
    assert_eq!(host.status().session.role, SessionRole::Host);

    host.shutdown().await;
    guest.shutdown().await;
}

#[tokio::test]
async fn joining_an_unknown_code_fails_cleanly() {
    let network = LoopbackNetwork::new();
    let (mut guest, mut guest_events) = start_client(&network, "Guest", MockScene::default());

    let _ = next_event(&mut guest_events).await; // InitializationComplete

    guest.join_room("ZZZZZZ").unwrap();
    assert!(matches!(
        next_event(&mut guest_events).await,
        LobbyEvent::ConnectionFailed { reason } if reason.contains("allocation not found")
    ));
    assert!(matches!(
        next_event(&mut guest_events).await,
        LobbyEvent::LobbyError { reason } if reason.contains("failed to join room")
    ));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(guest.status().session, SessionState::default());
    assert_eq!(guest.status().phase, LobbyPhase::Ready);

    guest.shutdown().await;
}

#[tokio::test]
async fn a_second_session_start_is_rejected_while_hosting() {
    let network = LoopbackNetwork::new();
    let (mut host, mut host_events) = start_client(&network, "Host", MockScene::default());

    let _ = next_event(&mut host_events).await; // InitializationComplete
    host.start_quick_match().unwrap();
    let _ = next_event(&mut host_events).await; // HostStarted
    let _ = next_event(&mut host_events).await; // QuickMatchStarted

    // The lobby is InSession now; a second start is a state error.
    host.start_quick_match().unwrap();
    assert!(matches!(
        next_event(&mut host_events).await,
        LobbyEvent::LobbyError { reason } if reason.contains("lobby is not ready")
    ));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(host.status().session.role, SessionRole::Host);

    host.shutdown().await;
}

#[tokio::test]
async fn generated_names_are_assigned_without_a_preset() {
    let network = LoopbackNetwork::new();
    let services = LobbyServices::new(
        LocalPlatform,
        LocalIdentityProvider::new(),
        network.relay(),
        network.transport(),
        MockScene::default(),
    );
    let (mut client, mut events) = LobbyClient::start(services, LobbyConfig::new());

    assert!(matches!(
        next_event(&mut events).await,
        LobbyEvent::InitializationComplete
    ));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let player = client.status().player.unwrap();
    assert!(player.player_name.starts_with("Player_"));
    assert!(player.is_authenticated);

    client.shutdown().await;
}
