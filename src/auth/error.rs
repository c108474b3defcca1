//! Authentication failures.

/// Why a request could not be authenticated.
///
/// Every variant maps to HTTP 401. The messages never include token
/// contents, so they are safe to log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("authorization header is missing")]
    MissingCredential,
    #[error("authorization header is malformed")]
    MalformedCredential,
    #[error("token is not a well-formed signed envelope")]
    MalformedToken,
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("token is not valid yet")]
    NotYetValid,
    #[error("token issuer or audience is invalid")]
    InvalidAudience,
    #[error("token claims are malformed")]
    MalformedClaims,
    #[error("principal no longer exists")]
    PrincipalMissing,
}

impl AuthError {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MissingCredential => "missing_credential",
            AuthError::MalformedCredential => "malformed_credential",
            AuthError::MalformedToken => "malformed_token",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::Expired => "expired",
            AuthError::NotYetValid => "not_yet_valid",
            AuthError::InvalidAudience => "invalid_audience",
            AuthError::MalformedClaims => "malformed_claims",
            AuthError::PrincipalMissing => "principal_missing",
        }
    }
}
