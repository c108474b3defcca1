//! Post routes. Only the fields needed for ownership checks are modelled.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::http::error::ApiError;
use crate::http::extractors::{CurrentPrincipal, JsonBody};
use crate::http::server::AppState;
use crate::identity::Principal;
use crate::resilience::with_deadline;
use crate::store::{NewPost, Post, PostUpdate, Store};

/// Role an editor other than the owner needs.
pub const EDIT_ROLE: &str = "moderator";
/// Role a deleter other than the owner needs.
pub const DELETE_ROLE: &str = "admin";

#[derive(Debug, Deserialize)]
pub struct CreatePostPayload {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn check_title(title: &str) -> Result<(), ApiError> {
    if title.trim().is_empty() || title.len() > 100 {
        return Err(ApiError::BadRequest("title must be 1 to 100 characters".to_string()));
    }
    Ok(())
}

fn check_content(content: &str) -> Result<(), ApiError> {
    if content.trim().is_empty() || content.len() > 1000 {
        return Err(ApiError::BadRequest("content must be 1 to 1000 characters".to_string()));
    }
    Ok(())
}

/// `POST /v1/posts`
pub async fn create_post(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    JsonBody(payload): JsonBody<CreatePostPayload>,
) -> Result<(StatusCode, Json<Post>), ApiError> {
    check_title(&payload.title)?;
    check_content(&payload.content)?;

    let post = NewPost {
        user_id: principal.id,
        title: payload.title,
        content: payload.content,
        tags: payload.tags,
    };
    let post = with_deadline(state.store_timeout, state.store.create_post(post)).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// `GET /v1/posts/{id}`
pub async fn get_post(
    State(state): State<AppState>,
    CurrentPrincipal(_): CurrentPrincipal,
    Path(id): Path<i64>,
) -> Result<Json<Post>, ApiError> {
    let post = with_deadline(state.store_timeout, state.store.get_post(id)).await?;
    Ok(Json(post))
}

/// `PATCH /v1/posts/{id}`: owner or `moderator`.
pub async fn update_post(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<i64>,
    body: Result<JsonBody<PostUpdate>, ApiError>,
) -> Result<Json<Post>, ApiError> {
    // Authorization runs before the body is decoded or validated.
    authorize_post(&state, &principal, id, EDIT_ROLE).await?;

    let JsonBody(update) = body?;
    if let Some(title) = &update.title {
        check_title(title)?;
    }
    if let Some(content) = &update.content {
        check_content(content)?;
    }

    let post = with_deadline(state.store_timeout, state.store.update_post(id, update)).await?;
    Ok(Json(post))
}

/// `DELETE /v1/posts/{id}`: owner or `admin`.
pub async fn delete_post(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    authorize_post(&state, &principal, id, DELETE_ROLE).await?;
    with_deadline(state.store_timeout, state.store.delete_post(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Load the post and check the principal may act on it.
async fn authorize_post(
    state: &AppState,
    principal: &Principal,
    post_id: i64,
    required_role: &str,
) -> Result<Post, ApiError> {
    let post = with_deadline(state.store_timeout, state.store.get_post(post_id)).await?;
    state
        .gate
        .authorize(principal, post.user_id, required_role)
        .await
        .inspect_err(|_| {
            tracing::debug!(user_id = principal.id, post_id, required_role, "Post access refused")
        })?;
    Ok(post)
}
