//! Per-request admission pipeline.
//!
//! # Data Flow
//! ```text
//! request
//!     → check_rate(client key)          ── deny → RateLimited(retry_after)
//!     → authenticate(Authorization)
//!         → parse_bearer                ── Missing/MalformedCredential
//!         → TokenAuthenticator::validate ── AuthError kind
//!         → IdentityResolver::resolve   ── NotFound → PrincipalMissing
//!                                       ── cache/store failure → Internal
//!     → Principal attached to the request
//!     → handler
//!         → authorize(principal, owner, role)
//!                                       ── Denied → Forbidden
//!                                       ── UnknownRole → Misconfigured
//!                                       ── LookupFailed → Internal
//! ```
//!
//! # Design Decisions
//! - Each step returns `Result<_, Rejection>`; the first rejection is terminal
//! - The gate knows nothing about HTTP; `http::error` maps rejections to
//!   status codes
//! - All components are shared `Arc`s built by the composition root

use std::sync::Arc;

use crate::auth::{AuthError, Claims, TokenAuthenticator};
use crate::identity::{IdentityError, IdentityResolver, Principal};
use crate::observability::metrics;
use crate::security::{AuthorizationGate, AuthzDecision, AuthzError, RateLimiter};

/// Terminal rejection of a request by the gate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("rate limit exceeded")]
    RateLimited { retry_after_secs: u64 },
    #[error("{0}")]
    Unauthorized(AuthError),
    #[error("forbidden")]
    Forbidden,
    /// A server-side configuration defect, e.g. a route bound to an unknown role.
    #[error("server misconfigured: {0}")]
    Misconfigured(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<AuthError> for Rejection {
    fn from(err: AuthError) -> Self {
        Rejection::Unauthorized(err)
    }
}

/// Extract the token from an `Authorization` header value.
///
/// The value must be exactly `Bearer <token>`, split on a single space.
pub fn parse_bearer(header: Option<&str>) -> Result<&str, AuthError> {
    let value = header.ok_or(AuthError::MissingCredential)?;
    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Ok(token),
        _ => Err(AuthError::MalformedCredential),
    }
}

/// The composed admission gate.
#[derive(Clone)]
pub struct RequestGate {
    limiter: Arc<RateLimiter>,
    authenticator: Arc<TokenAuthenticator>,
    identities: Arc<dyn IdentityResolver>,
    authz: Arc<AuthorizationGate>,
}

impl RequestGate {
    pub fn new(
        limiter: Arc<RateLimiter>,
        authenticator: Arc<TokenAuthenticator>,
        identities: Arc<dyn IdentityResolver>,
        authz: Arc<AuthorizationGate>,
    ) -> Self {
        Self {
            limiter,
            authenticator,
            identities,
            authz,
        }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn authenticator(&self) -> &TokenAuthenticator {
        &self.authenticator
    }

    pub fn identities(&self) -> &Arc<dyn IdentityResolver> {
        &self.identities
    }

    /// Step 1: count the request against `client_key`.
    pub fn check_rate(&self, client_key: &str) -> Result<(), Rejection> {
        let decision = self.limiter.allow(client_key);
        if decision.allowed {
            return Ok(());
        }
        metrics::record_rate_limited();
        tracing::debug!(
            client = %client_key,
            retry_after_ms = decision.retry_after.as_millis() as u64,
            "Rate limit exceeded"
        );
        Err(Rejection::RateLimited {
            retry_after_secs: decision.retry_after_secs(),
        })
    }

    /// Steps 2 and 3: validate the bearer token and resolve its subject.
    pub async fn authenticate(&self, header: Option<&str>) -> Result<Principal, Rejection> {
        let claims = self.validate(header).inspect_err(|e| {
            if let Rejection::Unauthorized(err) = e {
                metrics::record_auth_failure(err.kind());
            }
        })?;
        self.resolve(&claims).await
    }

    /// Steps 1 through 4 in order.
    pub async fn admit(&self, client_key: &str, header: Option<&str>) -> Result<Principal, Rejection> {
        self.check_rate(client_key)?;
        self.authenticate(header).await
    }

    /// Step 5: ownership or role check for a gated operation.
    pub async fn authorize(
        &self,
        principal: &Principal,
        owner_id: i64,
        required_role: &str,
    ) -> Result<(), Rejection> {
        match self.authz.can_act(principal, owner_id, required_role).await {
            Ok(AuthzDecision::Allowed) => Ok(()),
            Ok(AuthzDecision::Denied) => Err(Rejection::Forbidden),
            Err(AuthzError::UnknownRole(role)) => Err(Rejection::Misconfigured(format!(
                "route requires unknown role {:?}",
                role
            ))),
            Err(e @ AuthzError::LookupFailed(_)) => Err(Rejection::Internal(e.to_string())),
        }
    }

    fn validate(&self, header: Option<&str>) -> Result<Claims, Rejection> {
        let token = parse_bearer(header)?;
        Ok(self.authenticator.validate(token)?)
    }

    async fn resolve(&self, claims: &Claims) -> Result<Principal, Rejection> {
        match self.identities.resolve(claims.subject).await {
            Ok(record) => Ok(Principal::from(record)),
            Err(IdentityError::NotFound) => {
                metrics::record_auth_failure(AuthError::PrincipalMissing.kind());
                Err(Rejection::Unauthorized(AuthError::PrincipalMissing))
            }
            Err(e) => {
                tracing::error!(user_id = claims.subject, error = %e, "Identity resolution failed");
                Err(Rejection::Internal(e.to_string()))
            }
        }
    }
}

impl std::fmt::Debug for RequestGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestGate")
            .field("rate_limit_enabled", &self.limiter.is_enabled())
            .field("authenticator", &self.authenticator)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::HmacSha256Signer;
    use crate::identity::{IdentityCache, InMemoryCacheBackend, Role, StoreResolver};
    use crate::store::{InMemoryStore, Store};
    use std::time::Duration;

    const HOST: &str = "api.test";
    const DEFAULT_STORE_DEADLINE: Duration = Duration::from_secs(2);

    struct Fixture {
        store: Arc<InMemoryStore>,
        gate: RequestGate,
        authenticator: Arc<TokenAuthenticator>,
    }

    fn fixture(limit: u32) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        store.insert_user(1, "alice", "alice@x", "pw", "user").unwrap();
        store.insert_user(2, "mod", "mod@x", "pw", "moderator").unwrap();

        let signer = Arc::new(HmacSha256Signer::new(b"test-secret").unwrap());
        let authenticator = Arc::new(TokenAuthenticator::new(signer, HOST, Duration::from_secs(60)));
        let identities: Arc<dyn IdentityResolver> = Arc::new(IdentityCache::new(
            Arc::new(InMemoryCacheBackend::new()),
            store.clone(),
            Duration::from_secs(60),
            DEFAULT_STORE_DEADLINE,
        ));
        let gate = RequestGate::new(
            Arc::new(RateLimiter::new(limit, Duration::from_secs(60), 100)),
            authenticator.clone(),
            identities,
            Arc::new(AuthorizationGate::new(store.clone(), DEFAULT_STORE_DEADLINE)),
        );
        Fixture {
            store,
            gate,
            authenticator,
        }
    }

    fn bearer(token: &str) -> String {
        format!("Bearer {}", token)
    }

    #[test]
    fn test_parse_bearer() {
        assert_eq!(parse_bearer(Some("Bearer abc")), Ok("abc"));
        assert_eq!(parse_bearer(None), Err(AuthError::MissingCredential));
        for bad in ["abc", "bearer abc", "Basic abc", "Bearer", "Bearer ", "Bearer a b", "Bearer  abc"] {
            assert_eq!(parse_bearer(Some(bad)), Err(AuthError::MalformedCredential), "{bad:?}");
        }
    }

    #[tokio::test]
    async fn test_admit_valid_token() {
        let f = fixture(10);
        let header = bearer(&f.authenticator.issue(1));
        let principal = f.gate.admit("ip:1.1.1.1", Some(&header)).await.unwrap();
        assert_eq!(principal.id, 1);
        assert_eq!(principal.role, Role::new("user", 1));
    }

    #[tokio::test]
    async fn test_credential_rejections() {
        let f = fixture(10);
        assert_eq!(
            f.gate.authenticate(None).await,
            Err(Rejection::Unauthorized(AuthError::MissingCredential))
        );
        assert_eq!(
            f.gate.authenticate(Some("Token x")).await,
            Err(Rejection::Unauthorized(AuthError::MalformedCredential))
        );
        assert_eq!(
            f.gate.authenticate(Some("Bearer not-a-token")).await,
            Err(Rejection::Unauthorized(AuthError::MalformedToken))
        );

        let expired = f.authenticator.issue_at(1, HOST, HOST, Duration::from_secs(10), 1_000);
        assert_eq!(
            f.gate.authenticate(Some(&bearer(&expired))).await,
            Err(Rejection::Unauthorized(AuthError::Expired))
        );
    }

    #[tokio::test]
    async fn test_missing_principal() {
        let f = fixture(10);
        let header = bearer(&f.authenticator.issue(404));
        assert_eq!(
            f.gate.authenticate(Some(&header)).await,
            Err(Rejection::Unauthorized(AuthError::PrincipalMissing))
        );
    }

    #[tokio::test]
    async fn test_store_outage_is_internal() {
        let f = fixture(10);
        f.store.set_available(false);
        let header = bearer(&f.authenticator.issue(1));
        assert!(matches!(
            f.gate.authenticate(Some(&header)).await,
            Err(Rejection::Internal(_))
        ));
    }

    #[tokio::test]
    async fn test_rate_check_runs_first() {
        let f = fixture(1);
        let header = bearer(&f.authenticator.issue(1));
        assert!(f.gate.admit("ip:9.9.9.9", Some(&header)).await.is_ok());

        match f.gate.admit("ip:9.9.9.9", Some(&header)).await {
            Err(Rejection::RateLimited { retry_after_secs }) => {
                assert!((1..=60).contains(&retry_after_secs))
            }
            other => panic!("expected rate limit, got {:?}", other),
        }
        // Rejected before authentication: no extra store read.
        assert_eq!(f.store.user_lookups(), 1);
    }

    #[tokio::test]
    async fn test_authorize_mapping() {
        let f = fixture(10);
        let user = Principal::from(f.store.get_user_by_id(1).await.unwrap());
        let moderator = Principal::from(f.store.get_user_by_id(2).await.unwrap());

        assert_eq!(f.gate.authorize(&user, 1, "admin").await, Ok(()));
        assert_eq!(f.gate.authorize(&user, 2, "moderator").await, Err(Rejection::Forbidden));
        assert_eq!(f.gate.authorize(&moderator, 1, "moderator").await, Ok(()));
        assert!(matches!(
            f.gate.authorize(&user, 2, "nonexistent").await,
            Err(Rejection::Misconfigured(_))
        ));

        f.store.set_available(false);
        assert!(matches!(
            f.gate.authorize(&user, 2, "moderator").await,
            Err(Rejection::Internal(_))
        ));
    }

    #[tokio::test]
    async fn test_direct_resolver_sees_role_changes_immediately() {
        let f = fixture(10);
        let gate = RequestGate::new(
            Arc::new(RateLimiter::disabled()),
            f.authenticator.clone(),
            Arc::new(StoreResolver::new(f.store.clone(), DEFAULT_STORE_DEADLINE)),
            Arc::new(AuthorizationGate::new(f.store.clone(), DEFAULT_STORE_DEADLINE)),
        );
        let header = bearer(&f.authenticator.issue(1));
        assert_eq!(gate.authenticate(Some(&header)).await.unwrap().role.name, "user");
        f.store.set_user_role(1, "admin").unwrap();
        assert_eq!(gate.authenticate(Some(&header)).await.unwrap().role.name, "admin");
    }
}
