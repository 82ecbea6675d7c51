//! Opaque token generation.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ring::rand::{SecureRandom, SystemRandom};
use subtle::ConstantTimeEq;

use crate::error::{HandshakeError, Result};

/// Entropy per token in bytes (192 bits).
pub const TOKEN_BYTES: usize = 24;

/// Generate a fresh opaque token: 24 random bytes, base64url encoded.
///
/// # Errors
///
/// Returns [`HandshakeError::Random`] if the system CSPRNG fails.
pub fn generate_token() -> Result<String> {
    let rng = SystemRandom::new();
    let mut bytes = [0u8; TOKEN_BYTES];
    rng.fill(&mut bytes).map_err(|_| HandshakeError::Random)?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Compare a presented token against a stored one in constant time.
///
/// Only the length can short-circuit, and every token has the same length.
pub fn tokens_match(stored: &str, presented: &str) -> bool {
    stored.as_bytes().ct_eq(presented.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_has_expected_length() {
        // 24 bytes base64url encoded = 32 characters, no padding.
        assert_eq!(generate_token().unwrap().len(), 32);
    }

    #[test]
    fn token_is_url_safe() {
        let token = generate_token().unwrap();
        for c in token.chars() {
            assert!(
                c.is_ascii_alphanumeric() || c == '-' || c == '_',
                "unexpected character in token: {c}"
            );
        }
    }

    #[test]
    fn tokens_are_unique() {
        let a = generate_token().unwrap();
        let b = generate_token().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn tokens_match_compares_whole_value() {
        let token = generate_token().unwrap();
        assert!(tokens_match(&token, &token.clone()));

        // Same length, only the last byte differs.
        let mut last_differs = token[..token.len() - 1].to_owned();
        last_differs.push(if token.ends_with('A') { 'B' } else { 'A' });
        assert_eq!(last_differs.len(), token.len());
        assert!(!tokens_match(&token, &last_differs));

        assert!(!tokens_match(&token, &token[..token.len() - 1]));
        assert!(!tokens_match(&token, ""));
    }
}
