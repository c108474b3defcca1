//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Gate → store call:
//!     → timeouts.rs (enforce per-call deadline)
//!     → on expiry: StoreError::Timeout, surfaced as 500
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every store call from the gate has a deadline
//! - No retries here: retry policy belongs to the store collaborator
//! - Timeout errors are distinct from other errors

pub mod timeouts;

pub use timeouts::with_deadline;
