//! Persistence collaborator.
//!
//! # Responsibilities
//! - Define the contract the gate and handlers consume (`Store`)
//! - Provide an in-memory implementation for development and tests
//!
//! # Design Decisions
//! - Async trait objects (`Arc<dyn Store>`) so a relational backend can be
//!   swapped in at the composition root
//! - Cancellation is structural: dropping a store future abandons the call
//! - Business rules (self-follow, ownership) stay out of the store

pub mod memory;
pub mod model;

use std::time::Duration;

use async_trait::async_trait;

use crate::identity::{Role, UserRecord};
pub use memory::InMemoryStore;
pub use model::{NewPost, NewUser, Post, PostUpdate};

/// Failure of a store call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("record already exists")]
    Conflict,
    #[error("email already exists")]
    DuplicateEmail,
    #[error("username already exists")]
    DuplicateUsername,
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store call timed out")]
    Timeout,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn get_user_by_id(&self, id: i64) -> Result<UserRecord, StoreError>;

    async fn get_user_by_email(&self, email: &str) -> Result<UserRecord, StoreError>;

    /// `Ok(false)` on a wrong password; `NotFound` for an unknown user.
    async fn verify_password(&self, user_id: i64, password: &str) -> Result<bool, StoreError>;

    /// Create a not-yet-activated user together with its pending activation.
    async fn create_and_invite(
        &self,
        user: NewUser,
        token_hash: &str,
        expires_in: Duration,
    ) -> Result<UserRecord, StoreError>;

    /// Redeem an activation, returning the activated user's id.
    ///
    /// `NotFound` for unknown and expired tokens alike.
    async fn activate(&self, token_hash: &str) -> Result<i64, StoreError>;

    async fn delete_user(&self, id: i64) -> Result<(), StoreError>;

    async fn get_role_by_name(&self, name: &str) -> Result<Role, StoreError>;

    async fn create_post(&self, post: NewPost) -> Result<Post, StoreError>;

    async fn get_post(&self, id: i64) -> Result<Post, StoreError>;

    async fn update_post(&self, id: i64, update: PostUpdate) -> Result<Post, StoreError>;

    async fn delete_post(&self, id: i64) -> Result<(), StoreError>;

    /// `Conflict` if already following; `NotFound` if either user is missing.
    async fn follow(&self, follower_id: i64, followed_id: i64) -> Result<(), StoreError>;

    async fn unfollow(&self, follower_id: i64, followed_id: i64) -> Result<(), StoreError>;
}
