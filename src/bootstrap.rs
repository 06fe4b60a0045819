//! One-shot startup sequence for the backing platform services.
//!
//! Ordering is load-bearing: sign-in requires the platform core, the
//! multiplayer capability requires a signed-in identity, and the display
//! name fallback requires the sign-in result. [`ServiceBootstrapper`] runs
//! the steps in that order and stops at the first failure.

use async_trait::async_trait;
use tracing::{debug, error};

use crate::error::Result;
use crate::event::{EventBus, LobbyEvent};
use crate::identity::{generated_player_name, IdentityProvider, PlayerIdentity};

/// Platform service lifecycle seam.
#[async_trait]
pub trait PlatformServices: Send + 'static {
    /// Initialize the platform core service. Must precede sign-in.
    async fn initialize_core(&mut self) -> Result<()>;

    /// Initialize the multiplayer capability service. Requires a signed-in
    /// identity.
    async fn initialize_multiplayer(&mut self) -> Result<()>;
}

/// Result bundle of a successful bootstrap.
pub struct Bootstrapped<P, I> {
    pub platform: P,
    pub identity: I,
    pub player: PlayerIdentity,
}

/// A failed bootstrap, carrying the bootstrapper back for an explicit retry.
pub struct BootstrapFailure<P, I> {
    pub reason: String,
    pub bootstrapper: ServiceBootstrapper<P, I>,
}

/// One-shot startup sequence: platform core, anonymous sign-in, multiplayer
/// capability, display-name fallback.
///
/// [`initialize`](Self::initialize) consumes the bootstrapper, so a second
/// initialization after success is unrepresentable. A failed run hands the
/// bootstrapper back inside [`BootstrapFailure`] so the caller can retry
/// explicitly; there is no automatic retry, and a retry restarts from the
/// first step.
pub struct ServiceBootstrapper<P, I> {
    platform: P,
    identity: I,
    events: EventBus,
}

impl<P: PlatformServices, I: IdentityProvider> ServiceBootstrapper<P, I> {
    pub fn new(platform: P, identity: I, events: EventBus) -> Self {
        Self {
            platform,
            identity,
            events,
        }
    }

    /// Run the startup steps in order, stopping at the first failure.
    ///
    /// Emits [`LobbyEvent::InitializationComplete`] exactly once on success,
    /// or [`LobbyEvent::InitializationFailed`] with the originating cause.
    pub async fn initialize(mut self) -> std::result::Result<Bootstrapped<P, I>, BootstrapFailure<P, I>> {
        debug!("service bootstrap started");

        if let Err(e) = self.platform.initialize_core().await {
            return Err(self.fail(format!("platform core initialization failed: {e}")));
        }

        let sign_in = match self.identity.sign_in_anonymously().await {
            Ok(sign_in) => sign_in,
            Err(e) => return Err(self.fail(format!("anonymous sign-in failed: {e}"))),
        };
        debug!(player_id = %sign_in.player_id, "signed in");

        if let Err(e) = self.platform.initialize_multiplayer().await {
            return Err(self.fail(format!("multiplayer service initialization failed: {e}")));
        }

        // The provider may issue no display name on first sign-in; assign a
        // generated one so the player is always presentable.
        let player_name = match sign_in.player_name.filter(|n| !n.trim().is_empty()) {
            Some(name) => name,
            None => {
                let name = generated_player_name();
                if let Err(e) = self.identity.update_player_name(&name).await {
                    return Err(self.fail(format!("default player name assignment failed: {e}")));
                }
                debug!(player_name = %name, "assigned generated display name");
                name
            }
        };

        let player = PlayerIdentity {
            player_id: sign_in.player_id,
            player_name,
            is_authenticated: true,
        };
        self.events.publish(LobbyEvent::InitializationComplete);
        debug!("service bootstrap complete");
        Ok(Bootstrapped {
            platform: self.platform,
            identity: self.identity,
            player,
        })
    }

    fn fail(self, reason: String) -> BootstrapFailure<P, I> {
        error!("service bootstrap failed: {reason}");
        self.events.publish(LobbyEvent::InitializationFailed {
            reason: reason.clone(),
        });
        BootstrapFailure {
            reason,
            bootstrapper: self,
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
    use crate::error::LobbyError;
    use crate::identity::SignIn;
    use std::sync::{Arc, Mutex as StdMutex};

    type Calls = Arc<StdMutex<Vec<&'static str>>>;

    struct StubPlatform {
        fail_core: Option<String>,
        fail_multiplayer: Option<String>,
        calls: Calls,
    }

    impl StubPlatform {
        fn ok(calls: Calls) -> Self {
            Self {
                fail_core: None,
                fail_multiplayer: None,
                calls,
            }
        }
    }

    #[async_trait]
    impl PlatformServices for StubPlatform {
        async fn initialize_core(&mut self) -> Result<()> {
            self.calls.lock().unwrap().push("core");
            // A scripted failure is consumed so an explicit retry succeeds.
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

    struct StubIdentity {
        issued_name: Option<String>,
        fail_sign_in: Option<String>,
        signed_in: bool,
        name_updates: Arc<StdMutex<Vec<String>>>,
        calls: Calls,
    }

    impl StubIdentity {
        fn ok(issued_name: Option<&str>, calls: Calls) -> Self {
            Self {
                issued_name: issued_name.map(String::from),
                fail_sign_in: None,
                signed_in: false,
                name_updates: Arc::new(StdMutex::new(Vec::new())),
                calls,
            }
        }
    }

    #[async_trait]
    impl IdentityProvider for StubIdentity {
        async fn sign_in_anonymously(&mut self) -> Result<SignIn> {
            self.calls.lock().unwrap().push("sign_in");
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
            self.calls.lock().unwrap().push("update_name");
            self.name_updates.lock().unwrap().push(name.to_string());
            Ok(())
        }

        fn is_signed_in(&self) -> bool {
            self.signed_in
        }
    }

    #[tokio::test]
    async fn steps_run_in_order_and_emit_completion() {
        let calls: Calls = Arc::new(StdMutex::new(Vec::new()));
        let events = EventBus::new(8);
        let mut rx = events.subscribe();
        let bootstrapper = ServiceBootstrapper::new(
            StubPlatform::ok(Arc::clone(&calls)),
            StubIdentity::ok(Some("Alice"), Arc::clone(&calls)),
            events,
        );

        let done = bootstrapper.initialize().await.map_err(|f| f.reason).unwrap();

        assert_eq!(*calls.lock().unwrap(), ["core", "sign_in", "multiplayer"]);
        assert_eq!(done.player.player_id, "player-1");
        assert_eq!(done.player.player_name, "Alice");
        assert!(done.player.is_authenticated);
        assert!(matches!(
            rx.recv().await.unwrap(),
            LobbyEvent::InitializationComplete
        ));
    }

    #[tokio::test]
    async fn missing_name_gets_a_generated_fallback() {
        let calls: Calls = Arc::new(StdMutex::new(Vec::new()));
        let identity = StubIdentity::ok(None, Arc::clone(&calls));
        let updates = Arc::clone(&identity.name_updates);
        let bootstrapper =
            ServiceBootstrapper::new(StubPlatform::ok(Arc::clone(&calls)), identity, EventBus::new(8));

        let done = bootstrapper.initialize().await.map_err(|f| f.reason).unwrap();

        assert!(done.player.player_name.starts_with("Player_"));
        // The fallback was pushed back to the provider.
        assert_eq!(*updates.lock().unwrap(), [done.player.player_name.clone()]);
    }

    #[tokio::test]
    async fn issued_name_is_not_overwritten() {
        let calls: Calls = Arc::new(StdMutex::new(Vec::new()));
        let identity = StubIdentity::ok(Some("Alice"), Arc::clone(&calls));
        let updates = Arc::clone(&identity.name_updates);
        let bootstrapper =
            ServiceBootstrapper::new(StubPlatform::ok(Arc::clone(&calls)), identity, EventBus::new(8));

        bootstrapper.initialize().await.map_err(|f| f.reason).unwrap();

        assert!(updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn core_failure_aborts_remaining_steps() {
        let calls: Calls = Arc::new(StdMutex::new(Vec::new()));
        let mut platform = StubPlatform::ok(Arc::clone(&calls));
        platform.fail_core = Some("engine offline".into());
        let events = EventBus::new(8);
        let mut rx = events.subscribe();
        let bootstrapper =
            ServiceBootstrapper::new(platform, StubIdentity::ok(None, Arc::clone(&calls)), events);

        let failure = match bootstrapper.initialize().await {
            Ok(_) => panic!("expected bootstrap failure"),
            Err(failure) => failure,
        };

        assert!(failure.reason.contains("engine offline"));
        assert_eq!(*calls.lock().unwrap(), ["core"]);
        assert!(matches!(
            rx.recv().await.unwrap(),
            LobbyEvent::InitializationFailed { reason } if reason.contains("engine offline")
        ));
    }

    #[tokio::test]
    async fn sign_in_failure_skips_multiplayer_init() {
        let calls: Calls = Arc::new(StdMutex::new(Vec::new()));
        let mut identity = StubIdentity::ok(None, Arc::clone(&calls));
        identity.fail_sign_in = Some("auth service unavailable".into());
        let bootstrapper =
            ServiceBootstrapper::new(StubPlatform::ok(Arc::clone(&calls)), identity, EventBus::new(8));

        let failure = match bootstrapper.initialize().await {
            Ok(_) => panic!("expected bootstrap failure"),
            Err(failure) => failure,
        };

        assert!(failure.reason.contains("anonymous sign-in failed"));
        assert_eq!(*calls.lock().unwrap(), ["core", "sign_in"]);
    }

    #[tokio::test]
    async fn explicit_retry_after_failure_can_succeed() {
        let calls: Calls = Arc::new(StdMutex::new(Vec::new()));
        let mut platform = StubPlatform::ok(Arc::clone(&calls));
        platform.fail_core = Some("engine offline".into());
        let bootstrapper =
            ServiceBootstrapper::new(platform, StubIdentity::ok(None, Arc::clone(&calls)), EventBus::new(8));

        let failure = match bootstrapper.initialize().await {
            Ok(_) => panic!("expected bootstrap failure"),
            Err(failure) => failure,
        };

        // The scripted failure was consumed; the handed-back bootstrapper
        // restarts from the first step and succeeds.
        let done = failure
            .bootstrapper
            .initialize()
            .await
            .map_err(|f| f.reason)
            .unwrap();
        assert!(done.identity.is_signed_in());
        assert_eq!(
            *calls.lock().unwrap(),
            ["core", "core", "sign_in", "multiplayer"]
        );
    }
}
