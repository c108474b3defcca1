//! User routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::http::error::ApiError;
use crate::http::extractors::CurrentPrincipal;
use crate::http::handlers::auth::hash_activation_token;
use crate::http::server::AppState;
use crate::identity::{IdentityError, IdentityResolver, UserRecord};
use crate::resilience::with_deadline;
use crate::store::{Store, StoreError};

/// `PUT /v1/users/activate/{token}`
///
/// Unknown, expired and already redeemed tokens all answer 400.
pub async fn activate_user(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<StatusCode, ApiError> {
    let user_id = match with_deadline(state.store_timeout, state.store.activate(&hash_activation_token(&token))).await {
        Ok(id) => id,
        Err(StoreError::NotFound) => {
            return Err(ApiError::BadRequest("Invalid or expired activation token".to_string()))
        }
        Err(e) => return Err(e.into()),
    };
    state.gate.identities().invalidate(user_id).await;
    tracing::info!(user_id, "Activated user");
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /v1/users/{id}`, served through the identity resolver.
pub async fn get_user(
    State(state): State<AppState>,
    CurrentPrincipal(_): CurrentPrincipal,
    Path(id): Path<i64>,
) -> Result<Json<UserRecord>, ApiError> {
    match state.gate.identities().resolve(id).await {
        Ok(user) => Ok(Json(user)),
        Err(IdentityError::NotFound) => Err(ApiError::NotFound),
        Err(e) => Err(ApiError::Internal(e.to_string())),
    }
}

/// `PUT /v1/users/{id}/follow`
pub async fn follow_user(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(followed_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if principal.id == followed_id {
        return Err(ApiError::BadRequest("Cannot follow yourself".to_string()));
    }
    match with_deadline(state.store_timeout, state.store.follow(principal.id, followed_id)).await {
        Ok(()) => {}
        Err(StoreError::Conflict) => {
            return Err(ApiError::Conflict("Already following this user".to_string()))
        }
        Err(e) => return Err(e.into()),
    }
    invalidate_pair(&state, principal.id, followed_id).await;
    Ok(StatusCode::NO_CONTENT)
}

/// `PUT /v1/users/{id}/unfollow`
pub async fn unfollow_user(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(followed_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    with_deadline(state.store_timeout, state.store.unfollow(principal.id, followed_id)).await?;
    invalidate_pair(&state, principal.id, followed_id).await;
    Ok(StatusCode::NO_CONTENT)
}

/// Both follow counts changed; drop both cached identities.
async fn invalidate_pair(state: &AppState, follower_id: i64, followed_id: i64) {
    let identities = state.gate.identities();
    identities.invalidate(follower_id).await;
    identities.invalidate(followed_id).await;
}
