//! Gate middleware.
//!
//! Rate limiting wraps every route; authentication wraps only the protected
//! route group and leaves the `Principal` in request extensions.

pub mod auth;
pub mod rate_limit;

pub use auth::auth_middleware;
pub use rate_limit::rate_limit_middleware;
