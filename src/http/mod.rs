//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (request ID, trace span, concurrency, body limit, timeout)
//!     → middleware/rate_limit.rs (every route)
//!     → middleware/auth.rs (protected routes: Principal into extensions)
//!     → handlers/* (CurrentPrincipal extractor, gate.authorize for mutations)
//!     → error.rs (Rejection / StoreError → status + JSON body)
//!     → Send to client
//! ```

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod request;
pub mod server;

pub use error::ApiError;
pub use request::{client_key, MakeRequestUuid, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
