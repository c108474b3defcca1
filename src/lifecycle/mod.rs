//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     ForumConfig → store → authenticator, limiter, resolver, authz
//!     → RequestGate → background tasks → AppState for the server
//!
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → server drains, tasks exit → close returns
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then components, then the listener
//! - Shutdown has a grace period; stuck tasks are aborted

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{Components, StartupError};
