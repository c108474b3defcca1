//! Pluggable message-authentication strategies for token envelopes.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// A signing key the signer refuses to use.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignerError {
    #[error("signing key must not be empty")]
    EmptyKey,
    #[error("signing key rejected: {0}")]
    InvalidKey(String),
}

/// Signs and verifies the bytes of a token envelope.
///
/// Implementations only need `sign`; the provided `verify` recomputes the
/// tag and compares in constant time.
pub trait Signer: Send + Sync {
    /// Name written into the envelope header (`alg`).
    fn algorithm(&self) -> &'static str;

    fn sign(&self, message: &[u8]) -> Vec<u8>;

    fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let expected = self.sign(message);
        bool::from(expected.as_slice().ct_eq(signature))
    }
}

/// HMAC-SHA256 keyed with the server secret.
#[derive(Clone)]
pub struct HmacSha256Signer {
    mac: HmacSha256,
}

impl HmacSha256Signer {
    pub fn new(secret: &[u8]) -> Result<Self, SignerError> {
        if secret.is_empty() {
            return Err(SignerError::EmptyKey);
        }
        let mac = HmacSha256::new_from_slice(secret).map_err(|e| SignerError::InvalidKey(e.to_string()))?;
        Ok(Self { mac })
    }
}

impl Signer for HmacSha256Signer {
    fn algorithm(&self) -> &'static str {
        "HS256"
    }

    fn sign(&self, message: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(message);
        mac.finalize().into_bytes().to_vec()
    }

    fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let mut mac = self.mac.clone();
        mac.update(message);
        mac.verify_slice(signature).is_ok()
    }
}

impl std::fmt::Debug for HmacSha256Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacSha256Signer").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let signer = HmacSha256Signer::new(b"secret").unwrap();
        let tag = signer.sign(b"payload");
        assert_eq!(tag.len(), 32);
        assert!(signer.verify(b"payload", &tag));
        assert!(!signer.verify(b"payload2", &tag));
        assert!(!signer.verify(b"payload", &tag[..31]));
    }

    #[test]
    fn test_empty_key_is_rejected() {
        assert_eq!(HmacSha256Signer::new(b"").unwrap_err(), SignerError::EmptyKey);
    }

    #[test]
    fn test_different_keys_disagree() {
        let a = HmacSha256Signer::new(b"key-a").unwrap();
        let b = HmacSha256Signer::new(b"key-b").unwrap();
        assert!(!b.verify(b"payload", &a.sign(b"payload")));
    }

    struct XorSigner;

    impl Signer for XorSigner {
        fn algorithm(&self) -> &'static str {
            "XOR"
        }

        fn sign(&self, message: &[u8]) -> Vec<u8> {
            vec![message.iter().fold(0u8, |acc, b| acc ^ b)]
        }
    }

    #[test]
    fn test_default_verify_uses_sign() {
        let tag = XorSigner.sign(b"abc");
        assert!(XorSigner.verify(b"abc", &tag));
        assert!(!XorSigner.verify(b"abd", &tag));
        assert!(!XorSigner.verify(b"abc", &[]));
    }
}
