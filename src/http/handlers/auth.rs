//! Registration and login.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::http::error::ApiError;
use crate::http::extractors::JsonBody;
use crate::http::server::AppState;
use crate::mail::{activation_url, ActivationMail};
use crate::resilience::with_deadline;
use crate::store::{NewUser, Store, StoreError};

/// Role given to every self-registered user.
pub const DEFAULT_ROLE: &str = "user";

/// Stored form of an activation token: lowercase hex SHA-256.
pub fn hash_activation_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

fn check_email(email: &str) -> Result<(), ApiError> {
    if email.is_empty() || email.len() > 255 || !email.contains('@') {
        return Err(ApiError::BadRequest("email must be a valid address".to_string()));
    }
    Ok(())
}

fn check_password(password: &str) -> Result<(), ApiError> {
    if !(3..=72).contains(&password.len()) {
        return Err(ApiError::BadRequest(
            "password must be between 3 and 72 characters".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct RegisterUserPayload {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegisterUserPayload {
    fn validate(&self) -> Result<(), ApiError> {
        if self.username.trim().is_empty() || self.username.len() > 100 {
            return Err(ApiError::BadRequest("username must be 1 to 100 characters".to_string()));
        }
        check_email(&self.email)?;
        check_password(&self.password)
    }
}

/// A new user and the plain activation token mailed to them.
#[derive(Debug, Serialize)]
pub struct UserWithToken {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub token: String,
}

/// `POST /v1/authentication/user`
///
/// Creates a not-yet-activated user and mails the activation link. The user
/// is removed again if the mail cannot be sent.
pub async fn register_user(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterUserPayload>,
) -> Result<(StatusCode, Json<UserWithToken>), ApiError> {
    payload.validate()?;

    let passwords = state.passwords.clone();
    let password = payload.password;
    let password_hash = tokio::task::spawn_blocking(move || passwords.hash(&password))
        .await
        .map_err(|e| ApiError::Internal(format!("hashing task failed: {}", e)))?
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let token = Uuid::new_v4().to_string();
    let new_user = NewUser {
        username: payload.username,
        email: payload.email,
        password_hash,
        role: DEFAULT_ROLE.to_string(),
    };
    let user = with_deadline(
        state.store_timeout,
        state
            .store
            .create_and_invite(new_user, &hash_activation_token(&token), state.activation_ttl),
    )
    .await?;

    let mail = ActivationMail {
        username: user.username.clone(),
        email: user.email.clone(),
        activation_url: activation_url(&state.frontend_url, &token),
    };
    if let Err(e) = state.mailer.send_activation(&mail).await {
        tracing::error!(user_id = user.id, error = %e, "Activation mail failed, removing user");
        return match with_deadline(state.store_timeout, state.store.delete_user(user.id)).await {
            Ok(()) => Err(ApiError::Internal(format!("activation mail failed: {}", e))),
            Err(rollback) => Err(ApiError::Internal(format!(
                "activation mail failed: {}; rollback failed: {}",
                e, rollback
            ))),
        };
    }

    tracing::info!(user_id = user.id, "Registered user");
    Ok((
        StatusCode::CREATED,
        Json(UserWithToken {
            id: user.id,
            username: user.username,
            email: user.email,
            token,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct CreateTokenPayload {
    pub email: String,
    pub password: String,
}

impl CreateTokenPayload {
    fn validate(&self) -> Result<(), ApiError> {
        check_email(&self.email)?;
        check_password(&self.password)
    }
}

/// `POST /v1/authentication/token`
///
/// Responds 201 with the token as a JSON string. Users who have not
/// activated their account get the same 401 as a wrong password.
pub async fn create_token(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CreateTokenPayload>,
) -> Result<(StatusCode, Json<String>), ApiError> {
    payload.validate()?;

    let invalid = || ApiError::Unauthorized("invalid email or password".to_string());

    let user = match with_deadline(state.store_timeout, state.store.get_user_by_email(&payload.email)).await {
        Ok(user) => user,
        Err(StoreError::NotFound) => return Err(invalid()),
        Err(e) => return Err(e.into()),
    };
    let matches = with_deadline(
        state.store_timeout,
        state.store.verify_password(user.id, &payload.password),
    )
    .await?;
    if !matches {
        return Err(invalid());
    }
    if !user.activated {
        tracing::debug!(user_id = user.id, "Login refused, account not activated");
        return Err(invalid());
    }

    let token = state.gate.authenticator().issue(user.id);
    tracing::info!(user_id = user.id, "Issued token");
    Ok((StatusCode::CREATED, Json(token)))
}
