use rand::Rng;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

const TOKEN_PREFIX: &str = "tavern";
const LOOKUP_LENGTH: usize = 8;
const SECRET_LENGTH: usize = 24;
const SECRET_BYTES: usize = 12;

/// Generates a new session token with the format: tavern_<lookup>_<secret>
#[must_use]
pub fn generate_session_token() -> String {
    build_token(&generate_lookup(), &generate_secret())
}

/// SHA-256 hex digest of the raw token; the only form the registry stores.
#[must_use]
pub fn hash_session_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Generates the lookup portion of the token (first 8 chars of a UUID)
#[must_use]
fn generate_lookup() -> String {
    let uuid = uuid::Uuid::new_v4();
    uuid.to_string()[..LOOKUP_LENGTH].to_string()
}

/// Generates a cryptographically secure random hex string for the secret
#[must_use]
fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::thread_rng().fill(&mut bytes);
    hex::encode(bytes)[..SECRET_LENGTH].to_string()
}

#[must_use]
fn build_token(lookup: &str, secret: &str) -> String {
    format!("{TOKEN_PREFIX}_{lookup}_{secret}")
}

/// Parses a token string into its components (lookup, secret)
pub fn parse_token(token: &str) -> Result<(String, String)> {
    let invalid = || Error::Unauthorized("Invalid token".to_string());

    let rest = token
        .strip_prefix(TOKEN_PREFIX)
        .and_then(|rest| rest.strip_prefix('_'))
        .ok_or_else(invalid)?;

    let (lookup, secret) = rest.split_once('_').ok_or_else(invalid)?;

    if lookup.len() != LOOKUP_LENGTH || secret.len() != SECRET_LENGTH || secret.contains('_') {
        return Err(invalid());
    }

    Ok((lookup.to_string(), secret.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_generation_format() {
        let token = generate_session_token();

        assert!(token.starts_with("tavern_"));

        let parts: Vec<&str> = token.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "tavern");
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 24);
        assert!(parse_token(&token).is_ok());
    }

    #[test]
    fn test_tokens_are_unique() {
        assert_ne!(generate_session_token(), generate_session_token());
    }

    #[test]
    fn test_hash_is_stable_hex() {
        let token = "tavern_12345678_123456789012345678901234";
        let hash = hash_session_token(token);

        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_session_token(token));
        assert_ne!(hash, hash_session_token("tavern_12345678_123456789012345678901235"));
    }

    #[test]
    fn test_parse_token_valid() {
        let (lookup, secret) = parse_token("tavern_12345678_123456789012345678901234").unwrap();
        assert_eq!(lookup, "12345678");
        assert_eq!(secret, "123456789012345678901234");
    }

    #[test]
    fn test_parse_token_invalid_prefix() {
        let result = parse_token("invalid_12345678_123456789012345678901234");
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_token_wrong_parts() {
        assert!(parse_token("tavern_12345678").is_err());
        assert!(parse_token("tavern_12345678_1234_56789012345678901234").is_err());
    }
}
