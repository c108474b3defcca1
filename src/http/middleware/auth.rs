//! Bearer-token authentication for protected routes.

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::AuthError;
use crate::gate::Rejection;
use crate::http::error::ApiError;
use crate::http::server::AppState;

/// Authenticate the request and attach its `Principal` as an extension.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let header = match request.headers().get(AUTHORIZATION).map(|v| v.to_str()) {
        None => None,
        Some(Ok(value)) => Some(value.to_string()),
        Some(Err(_)) => return reject(&request, Rejection::Unauthorized(AuthError::MalformedCredential)),
    };

    match state.gate.authenticate(header.as_deref()).await {
        Ok(principal) => {
            tracing::debug!(user_id = principal.id, role = %principal.role.name, "Request authenticated");
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(rejection) => reject(&request, rejection),
    }
}

fn reject(request: &Request<Body>, rejection: Rejection) -> Response {
    if let Rejection::Unauthorized(err) = &rejection {
        tracing::warn!(
            method = %request.method(),
            path = %request.uri().path(),
            kind = err.kind(),
            "Authentication failed"
        );
    }
    ApiError::from(rejection).into_response()
}
