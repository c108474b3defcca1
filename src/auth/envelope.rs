//! Generic signed envelope: `base64url(header).base64url(claims).base64url(tag)`.
//!
//! The envelope knows nothing about which claims a token carries; it only
//! binds a JSON claim map to a MAC produced by a [`Signer`]. The layout is
//! the compact JWS serialization, so HS256 tokens from other issuers using
//! the same secret verify here too.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::error::AuthError;
use super::signer::Signer;

#[derive(Debug, Deserialize)]
struct Header {
    alg: String,
}

/// A decoded, not yet verified, token.
#[derive(Debug)]
pub struct SignedEnvelope {
    alg: String,
    claims: Map<String, Value>,
    signing_input: String,
    signature: Vec<u8>,
}

impl SignedEnvelope {
    /// Encode `claims` and sign them.
    pub fn seal(signer: &dyn Signer, claims: Map<String, Value>) -> String {
        let header = json!({ "alg": signer.algorithm(), "typ": "JWT" });
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(Value::Object(claims).to_string()),
        );
        let signature = signer.sign(signing_input.as_bytes());
        format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature))
    }

    /// Split and decode a token without checking its signature.
    pub fn open(token: &str) -> Result<Self, AuthError> {
        let mut parts = token.split('.');
        let (header_b64, claims_b64, sig_b64) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(h), Some(c), Some(s), None) => (h, c, s),
            _ => return Err(AuthError::MalformedToken),
        };

        let header: Header = decode_json(header_b64)?;
        let claims: Map<String, Value> = decode_json(claims_b64)?;
        let signature = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| AuthError::MalformedToken)?;

        Ok(Self {
            alg: header.alg,
            claims,
            signing_input: format!("{}.{}", header_b64, claims_b64),
            signature,
        })
    }

    /// Check the tag with `signer`, returning the claims on success.
    pub fn verify(self, signer: &dyn Signer) -> Result<Map<String, Value>, AuthError> {
        if self.alg != signer.algorithm() {
            return Err(AuthError::InvalidSignature);
        }
        if !signer.verify(self.signing_input.as_bytes(), &self.signature) {
            return Err(AuthError::InvalidSignature);
        }
        Ok(self.claims)
    }
}

fn decode_json<T: serde::de::DeserializeOwned>(segment: &str) -> Result<T, AuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| AuthError::MalformedToken)?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::MalformedToken)
}
