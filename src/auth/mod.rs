//! Token authentication subsystem.
//!
//! # Data Flow
//! ```text
//! Login:
//!     subject id → token.rs (build claims) → envelope.rs (seal) → signer.rs (MAC)
//!
//! Every authenticated request:
//!     "Bearer <token>" → envelope.rs (decode) → signer.rs (constant-time verify)
//!     → token.rs (nbf, exp, iss/aud, sub) → Claims
//! ```
//!
//! # Design Decisions
//! - The envelope is a generic `{claims map, signature}`; the MAC is a
//!   `Signer` trait object so the algorithm can change without touching callers
//! - Validation never logs or echoes token contents
//! - Clock is injectable (`issue_at` / `validate_at`) for tests
//! - Passwords are Argon2id PHC strings; the hasher's cost is configurable

pub mod envelope;
pub mod error;
pub mod password;
pub mod signer;
pub mod token;

pub use error::AuthError;
pub use password::{verify_password, PasswordError, PasswordHasher};
pub use signer::{HmacSha256Signer, Signer, SignerError};
pub use token::{unix_now, Claims, TokenAuthenticator};
