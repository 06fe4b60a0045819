//! The lobby orchestrator: a state machine gating session operations on
//! readiness, driven by a background loop.
//!
//! [`LobbyClient`] is a thin handle that communicates with the lobby loop
//! task over an unbounded command channel; command methods return as soon as
//! the command is queued, and outcomes arrive as [`LobbyEvent`]s on the
//! broadcast bus. The loop owns the [`SessionBroker`], the identity handle,
//! and the phase machine, so every state mutation happens on one task.
//!
//! # Example
//!
//! ```rust,ignore
//! let (client, mut events) = LobbyClient::start(services, LobbyConfig::new());
//!
//! while let Ok(event) = events.recv().await {
//!     match event {
//!         LobbyEvent::InitializationComplete => client.start_quick_match()?,
//!         LobbyEvent::QuickMatchStarted { join_code } => {
//!             println!("share this code: {join_code}");
//!         }
//!         LobbyEvent::LobbyError { reason } => eprintln!("{reason}"),
//!         _ => {}
//!     }
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, warn};

use crate::bootstrap::{BootstrapFailure, Bootstrapped, PlatformServices, ServiceBootstrapper};
use crate::broker::SessionBroker;
use crate::error::{LobbyError, Result};
use crate::event::{EventBus, LobbyEvent, DEFAULT_EVENT_CHANNEL_CAPACITY};
use crate::identity::{IdentityProvider, PlayerIdentity};
use crate::relay::{NetworkTransport, RelayService};
use crate::session::{RoomParams, SessionConfig, SessionRole, SessionState};

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Default scene requested after a successful host start.
const DEFAULT_GAME_SCENE: &str = "GameBoard";

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`LobbyClient`].
///
/// # Example
///
/// ```
/// use duel_lobby::{LobbyConfig, SessionConfig};
/// use std::time::Duration;
///
/// let config = LobbyConfig::new()
///     .with_session(SessionConfig::new().with_region("eu-central"))
///     .with_game_scene("DuelBoard")
///     .with_shutdown_timeout(Duration::from_secs(5));
/// assert_eq!(config.game_scene, "DuelBoard");
/// ```
#[derive(Debug, Clone)]
pub struct LobbyConfig {
    /// Session broker configuration (player slots, region, relay timeouts).
    pub session: SessionConfig,
    /// Scene requested from the scene director after hosting succeeds.
    pub game_scene: String,
    /// Capacity of the per-subscriber event buffer.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// Timeout for the graceful shutdown.
    ///
    /// When [`LobbyClient::shutdown`] is called, the lobby loop is given
    /// this much time to tear down the session and exit. If the timeout
    /// expires the task is aborted.
    ///
    /// Defaults to **1 second**.
    pub shutdown_timeout: Duration,
}

impl LobbyConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self {
            session: SessionConfig::new(),
            game_scene: DEFAULT_GAME_SCENE.to_string(),
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Set the session broker configuration.
    #[must_use]
    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Set the scene requested after a successful host start.
    #[must_use]
    pub fn with_game_scene(mut self, scene: impl Into<String>) -> Self {
        self.game_scene = scene.into();
        self
    }

    /// Set the capacity of the per-subscriber event buffer.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// Set the timeout for the graceful shutdown.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ── Seams and service bundle ────────────────────────────────────────

/// Engine scene loader seam.
///
/// Only the peer holding the host role drives scene transitions; when the
/// local role is not Host the lobby logs and skips the request, and the
/// joining peer follows the host's own scene synchronization.
pub trait SceneDirector: Send + 'static {
    fn request_scene_load(&mut self, scene_name: &str);
}

/// The external collaborators a [`LobbyClient`] is built from.
pub struct LobbyServices<P, I, R, T, S> {
    pub platform: P,
    pub identity: I,
    pub relay: R,
    pub transport: T,
    pub scene: S,
}

impl<P, I, R, T, S> LobbyServices<P, I, R, T, S>
where
    P: PlatformServices,
    I: IdentityProvider,
    R: RelayService,
    T: NetworkTransport,
    S: SceneDirector,
{
    pub fn new(platform: P, identity: I, relay: R, transport: T, scene: S) -> Self {
        Self {
            platform,
            identity,
            relay,
            transport,
            scene,
        }
    }
}

// ── Phase and status ────────────────────────────────────────────────

/// Lobby phase machine.
///
/// `Uninitialized → Ready → (Hosting | Joining) → InSession`, returning to
/// `Ready` on start failure or session shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LobbyPhase {
    /// Bootstrap has not completed; every session command is rejected.
    #[default]
    Uninitialized,
    /// Bootstrap and sign-in succeeded; session commands are accepted.
    Ready,
    /// A host start is in flight.
    Hosting,
    /// A client start is in flight.
    Joining,
    /// A session is active.
    InSession,
}

/// Snapshot of the lobby published on a watch channel after every change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LobbyStatus {
    pub phase: LobbyPhase,
    /// True once bootstrap and sign-in have succeeded. Set once per
    /// bootstrap cycle; not reset by session failures.
    pub is_ready: bool,
    /// Mirror of the session join code for presentation convenience.
    pub join_code: String,
    /// The authenticated player, once bootstrap completed.
    pub player: Option<PlayerIdentity>,
    /// Session state as tracked by the broker.
    pub session: SessionState,
}

// ── Commands ────────────────────────────────────────────────────────

/// Commands accepted by the lobby loop.
enum LobbyCommand {
    CreateRoom(RoomParams),
    JoinRoom { join_code: String },
    StartQuickMatch,
    ShutdownSession,
    SetPlayerName { name: String },
    RetryInitialization,
}

// ── Client handle ───────────────────────────────────────────────────

/// Handle for the lobby loop.
///
/// Created via [`LobbyClient::start`], which spawns the loop and returns
/// this handle together with an event receiver. All command methods queue a
/// command and return immediately; they only fail when the loop is gone.
pub struct LobbyClient {
    /// Sender half of the command channel to the lobby loop.
    cmd_tx: mpsc::UnboundedSender<LobbyCommand>,
    /// Event bus shared with the loop, for additional subscriptions.
    events: EventBus,
    /// Status snapshots published by the loop.
    status_rx: watch::Receiver<LobbyStatus>,
    /// Handle to the lobby loop task.
    task: Option<tokio::task::JoinHandle<()>>,
    /// Oneshot sender to stop the loop gracefully.
    shutdown_tx: Option<oneshot::Sender<()>>,
    /// Timeout for the graceful shutdown.
    shutdown_timeout: Duration,
}

impl LobbyClient {
    /// Spawn the lobby loop and return a handle plus event receiver.
    ///
    /// The loop immediately begins the one-shot service bootstrap; the first
    /// event is either [`LobbyEvent::InitializationComplete`] or
    /// [`LobbyEvent::InitializationFailed`]. Session commands issued before
    /// readiness are rejected with a lobby error rather than queued behind
    /// initialization.
    #[must_use = "the event receiver must be used to observe lobby events"]
    pub fn start<P, I, R, T, S>(
        services: LobbyServices<P, I, R, T, S>,
        config: LobbyConfig,
    ) -> (Self, broadcast::Receiver<LobbyEvent>)
    where
        P: PlatformServices,
        I: IdentityProvider,
        R: RelayService,
        T: NetworkTransport,
        S: SceneDirector,
    {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<LobbyCommand>();
        let events = EventBus::new(config.event_channel_capacity);
        let event_rx = events.subscribe();
        let (status_tx, status_rx) = watch::channel(LobbyStatus::default());
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let shutdown_timeout = config.shutdown_timeout;

        let broker = SessionBroker::new(
            services.relay,
            services.transport,
            config.session.clone(),
            events.clone(),
        );
        let bootstrapper =
            ServiceBootstrapper::new(services.platform, services.identity, events.clone());
        let orchestrator = Orchestrator {
            phase: LobbyPhase::Uninitialized,
            is_ready: false,
            broker,
            scene: services.scene,
            game_scene: config.game_scene,
            events: events.clone(),
            identity: None,
            platform: None,
            player: None,
            status_tx,
        };

        let task = tokio::spawn(lobby_loop(orchestrator, bootstrapper, cmd_rx, shutdown_rx));

        let client = Self {
            cmd_tx,
            events,
            status_rx,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout,
        };

        (client, event_rx)
    }

    // ── Command methods ─────────────────────────────────────────────

    /// Create a room with the given parameters and assume the host role.
    ///
    /// # Errors
    ///
    /// Returns [`LobbyError::NotRunning`] if the lobby loop has stopped.
    pub fn create_room(&self, params: RoomParams) -> Result<()> {
        self.send(LobbyCommand::CreateRoom(params))
    }

    /// Join the room identified by `join_code` as client.
    ///
    /// # Errors
    ///
    /// Returns [`LobbyError::NotRunning`] if the lobby loop has stopped.
    pub fn join_room(&self, join_code: impl Into<String>) -> Result<()> {
        self.send(LobbyCommand::JoinRoom {
            join_code: join_code.into(),
        })
    }

    /// Open a room without metadata, always assuming the host role.
    ///
    /// # Errors
    ///
    /// Returns [`LobbyError::NotRunning`] if the lobby loop has stopped.
    pub fn start_quick_match(&self) -> Result<()> {
        self.send(LobbyCommand::StartQuickMatch)
    }

    /// Tear down the active session.
    ///
    /// # Errors
    ///
    /// Returns [`LobbyError::NotRunning`] if the lobby loop has stopped.
    pub fn shutdown_session(&self) -> Result<()> {
        self.send(LobbyCommand::ShutdownSession)
    }

    /// Update the player display name at the identity provider.
    ///
    /// # Errors
    ///
    /// Returns [`LobbyError::NotRunning`] if the lobby loop has stopped.
    pub fn set_player_name(&self, name: impl Into<String>) -> Result<()> {
        self.send(LobbyCommand::SetPlayerName { name: name.into() })
    }

    /// Re-run a failed service bootstrap.
    ///
    /// # Errors
    ///
    /// Returns [`LobbyError::NotRunning`] if the lobby loop has stopped.
    pub fn retry_initialization(&self) -> Result<()> {
        self.send(LobbyCommand::RetryInitialization)
    }

    // ── Observers ───────────────────────────────────────────────────

    /// Subscribe to events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<LobbyEvent> {
        self.events.subscribe()
    }

    /// Current lobby snapshot.
    pub fn status(&self) -> LobbyStatus {
        self.status_rx.borrow().clone()
    }

    /// Returns `true` once bootstrap and sign-in have succeeded.
    pub fn is_ready(&self) -> bool {
        self.status_rx.borrow().is_ready
    }

    /// The current join code; empty when no session is active.
    pub fn current_join_code(&self) -> String {
        self.status_rx.borrow().join_code.clone()
    }

    /// Shut down the lobby loop, tearing down any active session.
    ///
    /// The loop is given [`LobbyConfig::shutdown_timeout`] to exit; past
    /// that the task is aborted so it cannot detach and run indefinitely.
    pub async fn shutdown(&mut self) {
        debug!("LobbyClient: shutdown requested");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("lobby loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("lobby loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("lobby loop aborted: {join_err}");
                    }
                }
            }
        }
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn send(&self, cmd: LobbyCommand) -> Result<()> {
        self.cmd_tx.send(cmd).map_err(|_| LobbyError::NotRunning)
    }
}

impl std::fmt::Debug for LobbyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.status_rx.borrow();
        f.debug_struct("LobbyClient")
            .field("phase", &status.phase)
            .field("is_ready", &status.is_ready)
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for LobbyClient {
    fn drop(&mut self) {
        // `Drop` is synchronous, so a graceful stop cannot be awaited here.
        // Aborting the task drops the lobby loop future immediately.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Lobby loop ──────────────────────────────────────────────────────

type BootstrapRun<P, I> = Pin<
    Box<dyn Future<Output = std::result::Result<Bootstrapped<P, I>, BootstrapFailure<P, I>>> + Send>,
>;

/// Await the bootstrap future when one is running. The `None` arm never
/// resolves, which disables the select branch without a precondition.
async fn poll_bootstrap<P, I>(
    run: &mut Option<BootstrapRun<P, I>>,
) -> std::result::Result<Bootstrapped<P, I>, BootstrapFailure<P, I>> {
    match run {
        Some(fut) => fut.as_mut().await,
        None => std::future::pending().await,
    }
}

/// Background loop that multiplexes the bootstrap, commands, transport peer
/// events, and the shutdown signal.
///
/// Exits when the command channel closes (every handle dropped) or the
/// shutdown signal fires; either way an active session is torn down first.
async fn lobby_loop<P, I, R, T, S>(
    mut orch: Orchestrator<P, I, R, T, S>,
    bootstrapper: ServiceBootstrapper<P, I>,
    mut cmd_rx: mpsc::UnboundedReceiver<LobbyCommand>,
    mut shutdown_rx: oneshot::Receiver<()>,
) where
    P: PlatformServices,
    I: IdentityProvider,
    R: RelayService,
    T: NetworkTransport,
    S: SceneDirector,
{
    debug!("lobby loop started");

    let mut peer_rx = orch.broker.peer_events();
    let mut peer_open = true;

    // A failed bootstrap parks here until an explicit retry.
    let mut idle_bootstrap: Option<ServiceBootstrapper<P, I>> = None;
    let mut bootstrap_run: Option<BootstrapRun<P, I>> = Some(Box::pin(bootstrapper.initialize()));

    loop {
        tokio::select! {
            // Branch 1: the one-shot bootstrap resolving. With no run in
            // progress poll_bootstrap pends forever, disabling the branch.
            outcome = poll_bootstrap(&mut bootstrap_run) => {
                bootstrap_run = None;
                idle_bootstrap = orch.on_bootstrap_outcome(outcome);
            }

            // Branch 2: a command from a handle
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(LobbyCommand::RetryInitialization) => {
                        if bootstrap_run.is_some() {
                            orch.report_error("initialization is already in progress");
                        } else if let Some(b) = idle_bootstrap.take() {
                            debug!("initialization retry requested");
                            bootstrap_run = Some(Box::pin(b.initialize()));
                        } else {
                            orch.report_error(LobbyError::AlreadyInitialized.to_string());
                        }
                    }
                    Some(cmd) => orch.handle_command(cmd).await,
                    // Command channel closed: every handle was dropped.
                    None => {
                        debug!("command channel closed, stopping lobby loop");
                        orch.broker.teardown().await;
                        break;
                    }
                }
            }

            // Branch 3: shutdown signal
            _ = &mut shutdown_rx => {
                debug!("shutdown signal received");
                orch.broker.teardown().await;
                break;
            }

            // Branch 4: transport peer lifecycle
            peer = peer_rx.recv(), if peer_open => {
                match peer {
                    Some(event) => {
                        orch.broker.handle_peer_event(event);
                        orch.publish_status();
                    }
                    None => {
                        debug!("transport peer channel closed");
                        peer_open = false;
                    }
                }
            }
        }
    }

    debug!("lobby loop exited");
}

// ── Orchestrator ────────────────────────────────────────────────────

/// State owned by the lobby loop.
struct Orchestrator<P, I, R: RelayService, T: NetworkTransport, S> {
    phase: LobbyPhase,
    is_ready: bool,
    broker: SessionBroker<R, T>,
    scene: S,
    game_scene: String,
    events: EventBus,
    identity: Option<I>,
    /// Held so engine services stay alive for the life of the loop.
    #[allow(dead_code)]
    platform: Option<P>,
    player: Option<PlayerIdentity>,
    status_tx: watch::Sender<LobbyStatus>,
}

impl<P, I, R, T, S> Orchestrator<P, I, R, T, S>
where
    P: PlatformServices,
    I: IdentityProvider,
    R: RelayService,
    T: NetworkTransport,
    S: SceneDirector,
{
    /// Digest the bootstrap outcome. Returns a bootstrapper to park for
    /// retry when the lobby could not become ready.
    fn on_bootstrap_outcome(
        &mut self,
        outcome: std::result::Result<Bootstrapped<P, I>, BootstrapFailure<P, I>>,
    ) -> Option<ServiceBootstrapper<P, I>> {
        match outcome {
            Ok(done) => {
                if !done.identity.is_signed_in() {
                    // Completion without a signed-in identity cannot enter
                    // Ready; park the services for an explicit retry.
                    self.report_error("initialization finished without a signed-in player");
                    return Some(ServiceBootstrapper::new(
                        done.platform,
                        done.identity,
                        self.events.clone(),
                    ));
                }
                debug!(player_id = %done.player.player_id, "lobby ready");
                self.platform = Some(done.platform);
                self.identity = Some(done.identity);
                self.player = Some(done.player);
                self.phase = LobbyPhase::Ready;
                self.is_ready = true;
                self.publish_status();
                None
            }
            Err(failure) => {
                // InitializationFailed was already emitted by the bootstrapper.
                self.publish_status();
                Some(failure.bootstrapper)
            }
        }
    }

    async fn handle_command(&mut self, cmd: LobbyCommand) {
        match cmd {
            LobbyCommand::CreateRoom(params) => self.create_room(params).await,
            LobbyCommand::JoinRoom { join_code } => self.join_room(join_code).await,
            LobbyCommand::StartQuickMatch => self.start_quick_match().await,
            LobbyCommand::ShutdownSession => self.shutdown_session().await,
            LobbyCommand::SetPlayerName { name } => self.set_player_name(name).await,
            // Owned by the loop, which holds the bootstrap future.
            LobbyCommand::RetryInitialization => {}
        }
    }

    async fn create_room(&mut self, params: RoomParams) {
        if self.phase != LobbyPhase::Ready {
            self.reject_not_ready("create room");
            return;
        }
        self.phase = LobbyPhase::Hosting;
        self.publish_status();

        match self.broker.start_host(&params).await {
            Ok(join_code) => {
                self.phase = LobbyPhase::InSession;
                self.publish_status();
                self.events.publish(LobbyEvent::RoomCreated { join_code });
                self.request_scene_transition();
            }
            Err(e) => {
                self.phase = LobbyPhase::Ready;
                self.publish_status();
                self.report_error(format!("failed to create room: {e}"));
            }
        }
    }

    async fn join_room(&mut self, join_code: String) {
        if self.phase != LobbyPhase::Ready {
            self.reject_not_ready("join room");
            return;
        }
        if join_code.trim().is_empty() {
            // Local validation; the broker is never consulted.
            self.report_error("failed to join room: join code must not be empty");
            return;
        }
        self.phase = LobbyPhase::Joining;
        self.publish_status();

        match self.broker.start_client(&join_code).await {
            Ok(()) => {
                self.phase = LobbyPhase::InSession;
                self.publish_status();
                self.events.publish(LobbyEvent::RoomJoined { join_code });
                // No scene request here: the host drives the transition and
                // the joining peer follows its scene synchronization.
            }
            Err(e) => {
                self.phase = LobbyPhase::Ready;
                self.publish_status();
                self.report_error(format!("failed to join room: {e}"));
            }
        }
    }

    async fn start_quick_match(&mut self) {
        if self.phase != LobbyPhase::Ready {
            self.reject_not_ready("start quick match");
            return;
        }
        self.phase = LobbyPhase::Hosting;
        self.publish_status();

        // Quick match skips room metadata and always takes the host role.
        match self.broker.start_host(&RoomParams::default()).await {
            Ok(join_code) => {
                self.phase = LobbyPhase::InSession;
                self.publish_status();
                self.events
                    .publish(LobbyEvent::QuickMatchStarted { join_code });
                self.request_scene_transition();
            }
            Err(e) => {
                self.phase = LobbyPhase::Ready;
                self.publish_status();
                self.report_error(format!("failed to start quick match: {e}"));
            }
        }
    }

    async fn shutdown_session(&mut self) {
        match self.broker.shutdown().await {
            Ok(()) => {
                if self.phase == LobbyPhase::InSession {
                    self.phase = LobbyPhase::Ready;
                }
            }
            Err(e) => {
                self.report_error(format!("failed to shut down session: {e}"));
            }
        }
        self.publish_status();
    }

    async fn set_player_name(&mut self, name: String) {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            self.report_error("failed to update player name: name must not be empty");
            return;
        }
        let Some(identity) = self.identity.as_mut() else {
            self.reject_not_ready("set player name");
            return;
        };
        match identity.update_player_name(trimmed).await {
            Ok(()) => {
                if let Some(player) = self.player.as_mut() {
                    player.player_name = trimmed.to_string();
                }
                debug!(player_name = %trimmed, "player name updated");
                self.publish_status();
                self.events.publish(LobbyEvent::PlayerNameChanged {
                    name: trimmed.to_string(),
                });
            }
            Err(e) => {
                self.report_error(format!("failed to update player name: {e}"));
            }
        }
    }

    fn request_scene_transition(&mut self) {
        // Only the host drives the engine scene change; a client peer waits
        // for the host's scene synchronization instead.
        if self.broker.state().role == SessionRole::Host {
            debug!(scene = %self.game_scene, "requesting scene transition");
            self.scene.request_scene_load(&self.game_scene);
        } else {
            warn!(scene = %self.game_scene, "scene transition requested without host role, skipping");
        }
    }

    fn reject_not_ready(&self, what: &str) {
        warn!(phase = ?self.phase, "{what} rejected: lobby is not ready");
        self.report_error(format!("cannot {what}: {}", LobbyError::NotReady));
    }

    fn report_error(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.events.publish(LobbyEvent::LobbyError { reason });
    }

    fn publish_status(&self) {
        let session = self.broker.state().clone();
        let status = LobbyStatus {
            phase: self.phase,
            is_ready: self.is_ready,
            join_code: session.join_code.clone(),
            player: self.player.clone(),
            session,
        };
        self.status_tx.send_replace(status);
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

    #[test]
    fn config_defaults() {
        let config = LobbyConfig::new();
        assert_eq!(config.game_scene, "GameBoard");
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
        assert_eq!(config.session.max_players, 2);
    }

    #[test]
    fn config_builder_methods() {
        let config = LobbyConfig::new()
            .with_game_scene("DuelBoard")
            .with_event_channel_capacity(512)
            .with_shutdown_timeout(Duration::from_secs(5));
        assert_eq!(config.game_scene, "DuelBoard");
        assert_eq!(config.event_channel_capacity, 512);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
    }

    #[test]
    fn event_channel_capacity_is_clamped_to_one() {
        let config = LobbyConfig::new().with_event_channel_capacity(0);
        assert_eq!(config.event_channel_capacity, 1);
    }

    #[test]
    fn status_defaults_to_uninitialized() {
        let status = LobbyStatus::default();
        assert_eq!(status.phase, LobbyPhase::Uninitialized);
        assert!(!status.is_ready);
        assert!(status.join_code.is_empty());
        assert!(status.player.is_none());
        assert_eq!(status.session, SessionState::default());
    }
}
