//! In-memory store.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};

use super::{NewPost, NewUser, Post, PostUpdate, Store, StoreError};
use crate::auth::{verify_password, PasswordHasher};
use crate::config::SeedUser;
use crate::identity::{Role, UserRecord};

struct StoredUser {
    id: i64,
    username: String,
    email: String,
    role: String,
    activated: bool,
    password_hash: String,
}

struct Invitation {
    user_id: i64,
    /// `None` when the lifetime overflows the clock.
    expires_at: Option<Instant>,
}

/// A thread-safe store backed by concurrent maps.
///
/// Roles `user` (1), `moderator` (2) and `admin` (3) are present from the
/// start. Lookup counters and a simulated outage switch make it usable as a
/// test double.
pub struct InMemoryStore {
    users: DashMap<i64, StoredUser>,
    emails: DashMap<String, i64>,
    usernames: DashMap<String, i64>,
    /// Pending activations keyed by the SHA-256 hex of the plain token.
    invitations: DashMap<String, Invitation>,
    roles: DashMap<String, Role>,
    posts: DashMap<i64, Post>,
    follows: DashSet<(i64, i64)>,
    next_user_id: AtomicI64,
    next_post_id: AtomicI64,
    user_lookups: AtomicUsize,
    role_lookups: AtomicUsize,
    available: AtomicBool,
    latency_ms: AtomicU64,
    hasher: PasswordHasher,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_hasher(PasswordHasher::default())
    }

    /// A store with the default roles whose seeded passwords use `hasher`.
    pub fn with_hasher(hasher: PasswordHasher) -> Self {
        let store = Self::empty_with_hasher(hasher);
        for (name, level) in [("user", 1), ("moderator", 2), ("admin", 3)] {
            store.insert_role(Role::new(name, level));
        }
        store
    }

    /// A store with no roles at all.
    pub fn empty() -> Self {
        Self::empty_with_hasher(PasswordHasher::default())
    }

    fn empty_with_hasher(hasher: PasswordHasher) -> Self {
        Self {
            users: DashMap::new(),
            emails: DashMap::new(),
            usernames: DashMap::new(),
            invitations: DashMap::new(),
            roles: DashMap::new(),
            posts: DashMap::new(),
            follows: DashSet::new(),
            next_user_id: AtomicI64::new(1),
            next_post_id: AtomicI64::new(1),
            user_lookups: AtomicUsize::new(0),
            role_lookups: AtomicUsize::new(0),
            available: AtomicBool::new(true),
            latency_ms: AtomicU64::new(0),
            hasher,
        }
    }

    pub fn from_seed(seed: &[SeedUser], hasher: PasswordHasher) -> Result<Self, StoreError> {
        let store = Self::with_hasher(hasher);
        for user in seed {
            store.insert_user(user.id, &user.username, &user.email, &user.password, &user.role)?;
            tracing::debug!(user_id = user.id, role = %user.role, "Seeded user");
        }
        Ok(store)
    }

    pub fn insert_role(&self, role: Role) {
        self.roles.insert(role.name.clone(), role);
    }

    pub fn remove_role(&self, name: &str) {
        self.roles.remove(name);
    }

    /// Insert an activated user. The role must already exist.
    pub fn insert_user(
        &self,
        id: i64,
        username: &str,
        email: &str,
        password: &str,
        role: &str,
    ) -> Result<UserRecord, StoreError> {
        let password_hash = self
            .hasher
            .hash(password)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        self.next_user_id.fetch_max(id.saturating_add(1), Ordering::SeqCst);
        self.put_user(
            id,
            NewUser {
                username: username.to_string(),
                email: email.to_string(),
                password_hash,
                role: role.to_string(),
            },
            true,
        )
    }

    /// Change a user's role directly, bypassing any cache.
    pub fn set_user_role(&self, id: i64, role: &str) -> Result<(), StoreError> {
        let mut user = self.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.role = role.to_string();
        Ok(())
    }

    /// Number of `get_user_by_id` calls served so far.
    pub fn user_lookups(&self) -> usize {
        self.user_lookups.load(Ordering::SeqCst)
    }

    /// Number of `get_role_by_name` calls served so far.
    pub fn role_lookups(&self) -> usize {
        self.role_lookups.load(Ordering::SeqCst)
    }

    /// Number of activations not yet redeemed, expired ones included.
    pub fn pending_invitations(&self) -> usize {
        self.invitations.len()
    }

    /// Simulate an outage: every call fails with `Unavailable` while false.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(u64::try_from(latency.as_millis()).unwrap_or(u64::MAX), Ordering::SeqCst);
    }

    async fn enter(&self) -> Result<(), StoreError> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("in-memory store switched off".into()))
        }
    }

    /// Claim the email and username for `id`, then insert the user.
    fn put_user(&self, id: i64, user: NewUser, activated: bool) -> Result<UserRecord, StoreError> {
        if !self.roles.contains_key(&user.role) {
            return Err(StoreError::NotFound);
        }
        match self.emails.entry(user.email.clone()) {
            Entry::Occupied(_) => return Err(StoreError::DuplicateEmail),
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }
        match self.usernames.entry(user.username.clone()) {
            Entry::Occupied(_) => {
                self.emails.remove(&user.email);
                return Err(StoreError::DuplicateUsername);
            }
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }
        self.users.insert(
            id,
            StoredUser {
                id,
                username: user.username,
                email: user.email,
                role: user.role,
                activated,
                password_hash: user.password_hash,
            },
        );
        self.record(id)
    }

    fn remove_user(&self, id: i64) -> Option<StoredUser> {
        let (_, user) = self.users.remove(&id)?;
        self.emails.remove(&user.email);
        self.usernames.remove(&user.username);
        self.invitations.retain(|_, inv| inv.user_id != id);
        self.follows.retain(|pair| pair.0 != id && pair.1 != id);
        Some(user)
    }

    fn record(&self, id: i64) -> Result<UserRecord, StoreError> {
        let user = self.users.get(&id).ok_or(StoreError::NotFound)?;
        let role = self
            .roles
            .get(&user.role)
            .map(|r| r.value().clone())
            .unwrap_or_else(|| Role::new(user.role.clone(), 0));
        let followers = self.follows.iter().filter(|e| e.1 == id).count() as u64;
        let following = self.follows.iter().filter(|e| e.0 == id).count() as u64;
        Ok(UserRecord {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role,
            activated: user.activated,
            followers,
            following,
        })
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get_user_by_id(&self, id: i64) -> Result<UserRecord, StoreError> {
        self.enter().await?;
        self.user_lookups.fetch_add(1, Ordering::SeqCst);
        self.record(id)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<UserRecord, StoreError> {
        self.enter().await?;
        let id = self.emails.get(email).map(|id| *id).ok_or(StoreError::NotFound)?;
        self.record(id)
    }

    async fn verify_password(&self, user_id: i64, password: &str) -> Result<bool, StoreError> {
        self.enter().await?;
        let password_hash = self
            .users
            .get(&user_id)
            .map(|u| u.password_hash.clone())
            .ok_or(StoreError::NotFound)?;
        Ok(verify_password(password, &password_hash))
    }

    async fn create_and_invite(
        &self,
        user: NewUser,
        token_hash: &str,
        expires_in: Duration,
    ) -> Result<UserRecord, StoreError> {
        self.enter().await?;
        let id = self.next_user_id.fetch_add(1, Ordering::SeqCst);
        let record = self.put_user(id, user, false)?;
        self.invitations.insert(
            token_hash.to_string(),
            Invitation {
                user_id: id,
                expires_at: Instant::now().checked_add(expires_in),
            },
        );
        Ok(record)
    }

    async fn activate(&self, token_hash: &str) -> Result<i64, StoreError> {
        self.enter().await?;
        let (_, invitation) = self.invitations.remove(token_hash).ok_or(StoreError::NotFound)?;
        if invitation.expires_at.is_some_and(|at| at <= Instant::now()) {
            return Err(StoreError::NotFound);
        }
        let id = invitation.user_id;
        self.users.get_mut(&id).ok_or(StoreError::NotFound)?.activated = true;
        self.invitations.retain(|_, inv| inv.user_id != id);
        Ok(id)
    }

    async fn delete_user(&self, id: i64) -> Result<(), StoreError> {
        self.enter().await?;
        self.remove_user(id).map(|_| ()).ok_or(StoreError::NotFound)
    }

    async fn get_role_by_name(&self, name: &str) -> Result<Role, StoreError> {
        self.enter().await?;
        self.role_lookups.fetch_add(1, Ordering::SeqCst);
        self.roles
            .get(name)
            .map(|r| r.value().clone())
            .ok_or(StoreError::NotFound)
    }

    async fn create_post(&self, post: NewPost) -> Result<Post, StoreError> {
        self.enter().await?;
        let id = self.next_post_id.fetch_add(1, Ordering::SeqCst);
        let post = Post {
            id,
            user_id: post.user_id,
            title: post.title,
            content: post.content,
            tags: post.tags,
            version: 0,
        };
        self.posts.insert(id, post.clone());
        Ok(post)
    }

    async fn get_post(&self, id: i64) -> Result<Post, StoreError> {
        self.enter().await?;
        self.posts
            .get(&id)
            .map(|p| p.value().clone())
            .ok_or(StoreError::NotFound)
    }

    async fn update_post(&self, id: i64, update: PostUpdate) -> Result<Post, StoreError> {
        self.enter().await?;
        let mut post = self.posts.get_mut(&id).ok_or(StoreError::NotFound)?;
        if let Some(title) = update.title {
            post.title = title;
        }
        if let Some(content) = update.content {
            post.content = content;
        }
        post.version += 1;
        Ok(post.clone())
    }

    async fn delete_post(&self, id: i64) -> Result<(), StoreError> {
        self.enter().await?;
        self.posts.remove(&id).map(|_| ()).ok_or(StoreError::NotFound)
    }

    async fn follow(&self, follower_id: i64, followed_id: i64) -> Result<(), StoreError> {
        self.enter().await?;
        if !self.users.contains_key(&follower_id) || !self.users.contains_key(&followed_id) {
            return Err(StoreError::NotFound);
        }
        if self.follows.insert((follower_id, followed_id)) {
            Ok(())
        } else {
            Err(StoreError::Conflict)
        }
    }

    async fn unfollow(&self, follower_id: i64, followed_id: i64) -> Result<(), StoreError> {
        self.enter().await?;
        self.follows.remove(&(follower_id, followed_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> InMemoryStore {
        InMemoryStore::with_hasher(PasswordHasher::new(64, 1, 1).unwrap())
    }

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.into(),
            email: email.into(),
            password_hash: PasswordHasher::new(64, 1, 1).unwrap().hash("secret").unwrap(),
            role: "user".into(),
        }
    }

    #[tokio::test]
    async fn test_default_roles() {
        let store = store();
        assert_eq!(store.get_role_by_name("admin").await.unwrap().level, 3);
        assert_eq!(store.get_role_by_name("moderator").await.unwrap().level, 2);
        assert_eq!(store.get_role_by_name("ghost").await, Err(StoreError::NotFound));
        assert_eq!(store.role_lookups(), 3);
    }

    #[tokio::test]
    async fn test_users_and_passwords() {
        let store = store();
        store.insert_user(1, "alice", "alice@example.com", "pw", "admin").unwrap();
        assert_eq!(
            store.insert_user(2, "alice", "other@example.com", "pw", "user"),
            Err(StoreError::DuplicateUsername)
        );
        assert_eq!(
            store.insert_user(2, "alicia", "alice@example.com", "pw", "user"),
            Err(StoreError::DuplicateEmail)
        );
        // The failed username claim released its email.
        store.insert_user(2, "carol", "other@example.com", "pw", "user").unwrap();
        assert_eq!(
            store.insert_user(3, "bob", "bob@example.com", "pw", "ghost"),
            Err(StoreError::NotFound)
        );

        let user = store.get_user_by_email("alice@example.com").await.unwrap();
        assert_eq!(user.role.name, "admin");
        assert!(store.verify_password(1, "pw").await.unwrap());
        assert!(!store.verify_password(1, "nope").await.unwrap());
        assert!(store.users.get(&1).unwrap().password_hash.starts_with("$argon2id$"));
        assert_eq!(store.get_user_by_id(99).await, Err(StoreError::NotFound));
        assert_eq!(store.user_lookups(), 1);
    }

    #[tokio::test]
    async fn test_follow_counts() {
        let store = store();
        store.insert_user(1, "a", "a@x", "pw", "user").unwrap();
        store.insert_user(2, "b", "b@x", "pw", "user").unwrap();

        store.follow(1, 2).await.unwrap();
        assert_eq!(store.follow(1, 2).await, Err(StoreError::Conflict));
        assert_eq!(store.follow(1, 9).await, Err(StoreError::NotFound));
        assert_eq!(store.get_user_by_id(2).await.unwrap().followers, 1);
        assert_eq!(store.get_user_by_id(1).await.unwrap().following, 1);

        store.unfollow(1, 2).await.unwrap();
        assert_eq!(store.get_user_by_id(2).await.unwrap().followers, 0);
    }

    #[tokio::test]
    async fn test_posts() {
        let store = store();
        let post = store
            .create_post(NewPost {
                user_id: 1,
                title: "t".into(),
                content: "c".into(),
                tags: vec![],
            })
            .await
            .unwrap();

        let updated = store
            .update_post(post.id, PostUpdate { title: Some("t2".into()), content: None })
            .await
            .unwrap();
        assert_eq!(updated.title, "t2");
        assert_eq!(updated.content, "c");
        assert_eq!(updated.version, 1);

        store.delete_post(post.id).await.unwrap();
        assert_eq!(store.get_post(post.id).await, Err(StoreError::NotFound));
    }

    #[tokio::test]
    async fn test_outage() {
        let store = store();
        store.set_available(false);
        assert!(matches!(
            store.get_role_by_name("user").await,
            Err(StoreError::Unavailable(_))
        ));
        store.set_available(true);
        assert!(store.get_role_by_name("user").await.is_ok());
    }

    #[tokio::test]
    async fn test_invite_then_activate() {
        let store = store();
        store.insert_user(7, "seeded", "seeded@x", "pw", "user").unwrap();

        let user = store
            .create_and_invite(new_user("dave", "dave@x"), "hash-1", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(user.id, 8);
        assert!(!user.activated);
        assert_eq!(user.role.name, "user");
        assert_eq!(store.pending_invitations(), 1);

        assert_eq!(store.activate("hash-2").await, Err(StoreError::NotFound));
        assert_eq!(store.activate("hash-1").await, Ok(8));
        assert!(store.get_user_by_id(8).await.unwrap().activated);
        assert_eq!(store.activate("hash-1").await, Err(StoreError::NotFound));
        assert_eq!(store.pending_invitations(), 0);
    }

    #[tokio::test]
    async fn test_expired_invitation_is_refused() {
        let store = store();
        let user = store
            .create_and_invite(new_user("erin", "erin@x"), "hash", Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(store.activate("hash").await, Err(StoreError::NotFound));
        assert!(!store.get_user_by_id(user.id).await.unwrap().activated);
    }

    #[tokio::test]
    async fn test_invite_rejects_duplicates() {
        let store = store();
        store.insert_user(1, "frank", "frank@x", "pw", "user").unwrap();
        assert_eq!(
            store
                .create_and_invite(new_user("other", "frank@x"), "h1", Duration::from_secs(60))
                .await,
            Err(StoreError::DuplicateEmail)
        );
        assert_eq!(
            store
                .create_and_invite(new_user("frank", "new@x"), "h2", Duration::from_secs(60))
                .await,
            Err(StoreError::DuplicateUsername)
        );
        assert_eq!(store.pending_invitations(), 0);
    }

    #[tokio::test]
    async fn test_delete_user_frees_identity() {
        let store = store();
        let user = store
            .create_and_invite(new_user("gina", "gina@x"), "h", Duration::from_secs(60))
            .await
            .unwrap();
        store.delete_user(user.id).await.unwrap();

        assert_eq!(store.get_user_by_id(user.id).await, Err(StoreError::NotFound));
        assert_eq!(store.pending_invitations(), 0);
        assert_eq!(store.delete_user(user.id).await, Err(StoreError::NotFound));
        store
            .create_and_invite(new_user("gina", "gina@x"), "h", Duration::from_secs(60))
            .await
            .unwrap();
    }
}
