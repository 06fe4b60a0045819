//! Built-in service backends.
//!
//! This module provides concrete implementations of the service seams
//! behind feature gates. Enable the corresponding Cargo feature to pull in
//! a backend:
//!
//! | Feature           | Backend                                        |
//! |-------------------|------------------------------------------------|
//! | `providers-local` | in-process loopback identity/relay/transport   |
//!
//! The loopback backend wires lobby clients together through a shared
//! in-memory hub, which is enough for tests and local play.

#[cfg(feature = "providers-local")]
pub mod local;

#[cfg(feature = "providers-local")]
pub use local::{
    LocalIdentityProvider, LocalPlatform, LoopbackNetwork, LoopbackRelay, LoopbackTransport,
};
