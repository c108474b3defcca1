//! Identity token issuance and validation.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::{json, Map, Value};

use super::envelope::SignedEnvelope;
use super::error::AuthError;
use super::signer::{HmacSha256Signer, Signer, SignerError};
use crate::config::TokenConfig;

/// Seconds since the Unix epoch.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// The validated claim set of a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Claims {
    pub subject: i64,
    pub issuer: String,
    pub audience: String,
    pub issued_at: i64,
    pub not_before: i64,
    pub expires_at: i64,
}

/// Issues and validates signed identity tokens.
///
/// Stateless apart from the immutable signer; clone freely.
#[derive(Clone)]
pub struct TokenAuthenticator {
    signer: Arc<dyn Signer>,
    host: String,
    ttl: Duration,
}

impl TokenAuthenticator {
    pub fn new(signer: Arc<dyn Signer>, host: impl Into<String>, ttl: Duration) -> Self {
        Self {
            signer,
            host: host.into(),
            ttl,
        }
    }

    /// HMAC-SHA256 authenticator for the configured secret and host.
    pub fn from_config(config: &TokenConfig) -> Result<Self, SignerError> {
        let signer = HmacSha256Signer::new(config.secret.as_bytes())?;
        Ok(Self::new(
            Arc::new(signer),
            config.host.clone(),
            Duration::from_secs(config.ttl_secs),
        ))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `subject` with the configured host and lifetime.
    pub fn issue(&self, subject: i64) -> String {
        self.issue_at(subject, &self.host, &self.host, self.ttl, unix_now())
    }

    pub fn issue_with(&self, subject: i64, issuer: &str, audience: &str, ttl: Duration) -> String {
        self.issue_at(subject, issuer, audience, ttl, unix_now())
    }

    pub fn issue_at(
        &self,
        subject: i64,
        issuer: &str,
        audience: &str,
        ttl: Duration,
        now: i64,
    ) -> String {
        let exp = now.saturating_add(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX));
        let claims = json!({
            "sub": subject,
            "iat": now,
            "nbf": now,
            "exp": exp,
            "iss": issuer,
            "aud": audience,
        });
        let map = match claims {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        SignedEnvelope::seal(self.signer.as_ref(), map)
    }

    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        self.validate_at(token, unix_now())
    }

    /// Validate `token` as of `now`.
    ///
    /// Checks run in a fixed order: signature, not-before, expiry,
    /// issuer/audience, then subject.
    pub fn validate_at(&self, token: &str, now: i64) -> Result<Claims, AuthError> {
        let claims = SignedEnvelope::open(token)?.verify(self.signer.as_ref())?;

        let not_before = int_claim(&claims, "nbf")?;
        if now < not_before {
            return Err(AuthError::NotYetValid);
        }
        let expires_at = int_claim(&claims, "exp")?;
        if now >= expires_at {
            return Err(AuthError::Expired);
        }

        let issuer = str_claim(&claims, "iss")?;
        let audience = str_claim(&claims, "aud")?;
        if issuer != self.host || audience != self.host {
            return Err(AuthError::InvalidAudience);
        }

        Ok(Claims {
            subject: subject_claim(&claims)?,
            issuer,
            audience,
            issued_at: int_claim(&claims, "iat")?,
            not_before,
            expires_at,
        })
    }
}

impl std::fmt::Debug for TokenAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthenticator")
            .field("algorithm", &self.signer.algorithm())
            .field("host", &self.host)
            .field("ttl", &self.ttl)
            .finish()
    }
}

fn int_claim(claims: &Map<String, Value>, name: &str) -> Result<i64, AuthError> {
    claims
        .get(name)
        .and_then(Value::as_i64)
        .ok_or(AuthError::MalformedClaims)
}

fn str_claim(claims: &Map<String, Value>, name: &str) -> Result<String, AuthError> {
    claims
        .get(name)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or(AuthError::MalformedClaims)
}

// `sub` is an integer in tokens we issue; digit strings are accepted too.
fn subject_claim(claims: &Map<String, Value>) -> Result<i64, AuthError> {
    match claims.get("sub") {
        Some(Value::Number(n)) => n.as_i64().ok_or(AuthError::MalformedClaims),
        Some(Value::String(s)) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
            s.parse().map_err(|_| AuthError::MalformedClaims)
        }
        _ => Err(AuthError::MalformedClaims),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn authenticator() -> TokenAuthenticator {
        let signer = HmacSha256Signer::new(b"test-secret").unwrap();
        TokenAuthenticator::new(Arc::new(signer), "social.test", Duration::from_secs(3600))
    }

    fn token_with(claims: Value) -> String {
        let signer = HmacSha256Signer::new(b"test-secret").unwrap();
        match claims {
            Value::Object(map) => SignedEnvelope::seal(&signer, map),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_issue_and_validate() {
        let auth = authenticator();
        let token = auth.issue_at(42, "social.test", "social.test", auth.ttl(), NOW);
        let claims = auth.validate_at(&token, NOW + 10).unwrap();

        assert_eq!(claims.subject, 42);
        assert_eq!(claims.issued_at, NOW);
        assert_eq!(claims.not_before, NOW);
        assert_eq!(claims.expires_at, NOW + 3600);
    }

    #[test]
    fn test_expired_one_second_ago() {
        let auth = authenticator();
        let token = auth.issue_at(1, "social.test", "social.test", Duration::from_secs(10), NOW - 11);
        assert_eq!(auth.validate_at(&token, NOW), Err(AuthError::Expired));
    }

    #[test]
    fn test_expiry_boundary() {
        let auth = authenticator();
        let token = auth.issue_at(1, "social.test", "social.test", Duration::from_secs(10), NOW);
        assert!(auth.validate_at(&token, NOW + 9).is_ok());
        assert_eq!(auth.validate_at(&token, NOW + 10), Err(AuthError::Expired));
    }

    #[test]
    fn test_not_yet_valid() {
        let auth = authenticator();
        let token = auth.issue_at(1, "social.test", "social.test", auth.ttl(), NOW + 60);
        assert_eq!(auth.validate_at(&token, NOW), Err(AuthError::NotYetValid));
    }

    #[test]
    fn test_wrong_audience_or_issuer() {
        let auth = authenticator();
        let token = auth.issue_at(1, "social.test", "elsewhere", auth.ttl(), NOW);
        assert_eq!(auth.validate_at(&token, NOW), Err(AuthError::InvalidAudience));

        let token = auth.issue_at(1, "elsewhere", "social.test", auth.ttl(), NOW);
        assert_eq!(auth.validate_at(&token, NOW), Err(AuthError::InvalidAudience));
    }

    #[test]
    fn test_wrong_secret() {
        let other = TokenAuthenticator::new(
            Arc::new(HmacSha256Signer::new(b"other-secret").unwrap()),
            "social.test",
            Duration::from_secs(3600),
        );
        let token = other.issue(1);
        assert_eq!(authenticator().validate(&token), Err(AuthError::InvalidSignature));
    }

    #[test]
    fn test_signature_checked_before_expiry() {
        let other = TokenAuthenticator::new(
            Arc::new(HmacSha256Signer::new(b"other-secret").unwrap()),
            "social.test",
            Duration::from_secs(1),
        );
        let token = other.issue_at(1, "social.test", "social.test", Duration::from_secs(1), NOW - 100);
        assert_eq!(authenticator().validate_at(&token, NOW), Err(AuthError::InvalidSignature));
    }

    #[test]
    fn test_subject_forms() {
        let auth = authenticator();
        let base = |sub: Value| {
            json!({
                "sub": sub, "iat": NOW, "nbf": NOW, "exp": NOW + 60,
                "iss": "social.test", "aud": "social.test",
            })
        };

        let token = token_with(base(json!("17")));
        assert_eq!(auth.validate_at(&token, NOW).unwrap().subject, 17);

        for bad in [json!("abc"), json!(""), json!(1.5), json!(null), json!([1])] {
            let token = token_with(base(bad.clone()));
            assert_eq!(auth.validate_at(&token, NOW), Err(AuthError::MalformedClaims), "sub {}", bad);
        }

        let token = token_with(json!({
            "iat": NOW, "nbf": NOW, "exp": NOW + 60, "iss": "social.test", "aud": "social.test",
        }));
        assert_eq!(auth.validate_at(&token, NOW), Err(AuthError::MalformedClaims));
    }

    #[test]
    fn test_missing_time_claims() {
        let auth = authenticator();
        let token = token_with(json!({ "sub": 1, "iss": "social.test", "aud": "social.test" }));
        assert_eq!(auth.validate_at(&token, NOW), Err(AuthError::MalformedClaims));
    }

    #[test]
    fn test_from_config() {
        let config = TokenConfig::default();
        let auth = TokenAuthenticator::from_config(&config).unwrap();
        assert_eq!(auth.host(), "example");
        let claims = auth.validate(&auth.issue(9)).unwrap();
        assert_eq!(claims.subject, 9);
        assert_eq!(claims.issuer, "example");
    }

    #[test]
    fn test_from_config_rejects_empty_secret() {
        let config = TokenConfig { secret: String::new(), ..TokenConfig::default() };
        assert_eq!(TokenAuthenticator::from_config(&config).unwrap_err(), SignerError::EmptyKey);
    }

    #[test]
    fn test_huge_ttl_saturates_instead_of_wrapping() {
        let auth = authenticator();
        let token = auth.issue_at(3, "social.test", "social.test", Duration::from_secs(u64::MAX), NOW);
        let claims = auth.validate_at(&token, NOW + 10).unwrap();
        assert_eq!(claims.expires_at, i64::MAX);
    }
}
