//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (fixed window per client key)
//!     → authentication (gate)
//!     → handler
//!         → authz.rs (ownership, then role precedence)
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - A denial and a failed check are different types; only a denial is 403
//! - Limiter state is process-local and bounded

pub mod authz;
pub mod rate_limit;

pub use authz::{AuthorizationGate, AuthzDecision, AuthzError, RoleCatalog};
pub use rate_limit::{RateDecision, RateLimiter};
