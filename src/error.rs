//! Error types for the lobby core.

use thiserror::Error;

/// Errors that can occur when driving the lobby core.
///
/// Validation and state-gating failures never escape the command entry
/// points as errors; the lobby loop reports them through
/// [`LobbyEvent::LobbyError`](crate::LobbyEvent::LobbyError) instead.
#[derive(Debug, Error)]
pub enum LobbyError {
    /// Malformed or empty input detected locally, before any service call.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A lobby operation was attempted before initialization completed.
    #[error("lobby is not ready")]
    NotReady,

    /// A session start was attempted while a session is already active.
    #[error("a session is already active")]
    AlreadyConnected,

    /// A session operation was attempted with no active session.
    #[error("no active session")]
    NotConnected,

    /// A session start was attempted while another start is in flight.
    #[error("a session start is already in progress")]
    StartInProgress,

    /// Initialization was requested again after it already succeeded.
    #[error("services are already initialized")]
    AlreadyInitialized,

    /// A failure surfaced by the identity, relay, or transport service,
    /// wrapped with the originating message.
    #[error("service error: {0}")]
    Service(String),

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// The lobby task is no longer running.
    #[error("lobby task is not running")]
    NotRunning,
}

/// A specialized [`Result`] type for lobby core operations.
pub type Result<T> = std::result::Result<T, LobbyError>;
