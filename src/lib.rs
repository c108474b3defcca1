//! Social forum API: admission and identity gate.

pub mod auth;
pub mod config;
pub mod gate;
pub mod http;
pub mod identity;
pub mod lifecycle;
pub mod mail;
pub mod observability;
pub mod resilience;
pub mod security;
pub mod store;

pub use config::ForumConfig;
pub use gate::{RequestGate, Rejection};
pub use http::HttpServer;
pub use lifecycle::{Components, Shutdown};
