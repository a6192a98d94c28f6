//! Invitation token generation
//!
//! Tokens are bearer credentials, so they come straight from the operating
//! system's CSPRNG. Fingerprints (SHA-256 based) let logs and indexes refer
//! to a token without exposing it.

use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Random bytes per token (256 bits).
pub const TOKEN_BYTES: usize = 32;

/// Hex characters kept in a log fingerprint.
const FINGERPRINT_LEN: usize = 12;

/// Generate a new URL-safe invitation token.
///
/// # Examples
///
/// ```
/// use tenancy_service::token::generate_token;
///
/// let token = generate_token();
/// assert_eq!(token.len(), 43);
/// assert_ne!(token, generate_token());
/// ```
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Full SHA-256 digest of a token, hex encoded. Suitable as a storage key.
pub fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

/// Short, non-reversible token identifier for logs.
pub fn fingerprint(token: &str) -> String {
    let mut digest = token_digest(token);
    digest.truncate(FINGERPRINT_LEN);
    digest
}
