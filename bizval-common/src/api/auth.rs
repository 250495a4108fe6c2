//! Bearer token authentication
//!
//! Clients send `Authorization: Bearer <token>`. Tokens are 64 hex characters
//! of randomness; only their SHA-256 hash is stored in `users.token_hash`.

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Authentication failures, all mapped to 401 by the server
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingHeader,

    #[error("Authorization header must use the Bearer scheme")]
    WrongScheme,

    #[error("Invalid or expired token")]
    InvalidToken,
}

/// Generate a new random API token (64 hex chars)
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// SHA-256 of the token as 64 hex characters
///
/// # Examples
///
/// ```
/// use bizval_common::api::auth::hash_token;
///
/// let hash = hash_token("secret");
/// assert_eq!(hash.len(), 64);
/// assert_eq!(hash, hash_token("secret"));
/// ```
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Extract the token from an Authorization header value
///
/// The scheme is matched case-insensitively.
pub fn parse_bearer(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header.ok_or(AuthError::MissingHeader)?.trim();
    let (scheme, token) = header.split_once(' ').ok_or(AuthError::WrongScheme)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::WrongScheme);
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::InvalidToken);
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_tokens_are_unique_hex() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_is_not_token() {
        let token = generate_token();
        assert_ne!(hash_token(&token), token);
    }

    #[test]
    fn test_parse_bearer() {
        assert_eq!(parse_bearer(Some("Bearer abc")), Ok("abc"));
        assert_eq!(parse_bearer(Some("bearer   abc ")), Ok("abc"));
        assert_eq!(parse_bearer(None), Err(AuthError::MissingHeader));
        assert_eq!(parse_bearer(Some("Basic abc")), Err(AuthError::WrongScheme));
        assert_eq!(parse_bearer(Some("Bearer")), Err(AuthError::WrongScheme));
        assert_eq!(parse_bearer(Some("Bearer  ")), Err(AuthError::WrongScheme));
    }
}
