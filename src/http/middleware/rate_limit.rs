//! Router-wide rate limiting.

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::error::ApiError;
use crate::http::request::client_key;
use crate::http::server::AppState;

/// Count the request against its client key; 429 once the window is spent.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_key(request.headers(), peer, state.trust_forwarded_for);

    match state.gate.check_rate(&key) {
        Ok(()) => next.run(request).await,
        Err(rejection) => ApiError::from(rejection).into_response(),
    }
}
