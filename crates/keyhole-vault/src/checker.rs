//! Passphrase checking against the provider's sealed private key.

use std::fmt;

use crate::error::Result;
use crate::sealed::{self, SealedKey};

/// Answers "is this passphrase correct for the provider's private key?".
///
/// The checker only holds the sealed blob; the decrypted key never leaves
/// [`check`](Self::check). Every failure mode (malformed blob, wrong
/// passphrase, tampered ciphertext, plaintext that is not a key) yields the
/// same `false`, so callers cannot be used as an oracle.
#[derive(Clone)]
pub struct CredentialChecker {
    sealed: Vec<u8>,
}

impl CredentialChecker {
    /// Create a checker over raw sealed-key bytes.
    pub fn new(sealed: Vec<u8>) -> Self {
        Self { sealed }
    }

    /// Create a checker from a sealed key file on disk.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Ok(Self::new(sealed::load_sealed_key(path)?))
    }

    /// Check `passphrase` against the sealed key.
    ///
    /// CPU-bound (PBKDF2); async callers should run it on a blocking thread.
    pub fn check(&self, passphrase: &str) -> bool {
        match self.try_open(passphrase) {
            Ok(kind) => {
                tracing::debug!(?kind, "passphrase unlocked private key");
                true
            }
            Err(e) => {
                tracing::debug!(error = %e, "passphrase check failed");
                false
            }
        }
    }

    fn try_open(&self, passphrase: &str) -> Result<sealed::KeyKind> {
        let sealed = SealedKey::parse(&self.sealed)?;
        let plaintext = sealed.open(passphrase.as_bytes())?;
        sealed::parse_private_key(&plaintext)
    }
}

impl fmt::Debug for CredentialChecker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialChecker")
            .field("sealed_len", &self.sealed.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{self, NONCE_LEN_BYTES, SALT_LEN};
    use crate::sealed::seal_private_key_with_iterations;
    use ring::rand::SystemRandom;
    use ring::signature::Ed25519KeyPair;

    const TEST_ITERATIONS: u32 = 1_000;

    fn checker_for(passphrase: &str) -> CredentialChecker {
        let rng = SystemRandom::new();
        let der = Ed25519KeyPair::generate_pkcs8(&rng).unwrap();
        let blob =
            seal_private_key_with_iterations(der.as_ref(), passphrase.as_bytes(), TEST_ITERATIONS)
                .unwrap();
        CredentialChecker::new(blob)
    }

    #[test]
    fn correct_passphrase_passes() {
        let checker = checker_for("correct horse battery staple");
        assert!(checker.check("correct horse battery staple"));
    }

    #[test]
    fn wrong_passphrase_fails() {
        let checker = checker_for("correct horse battery staple");
        assert!(!checker.check("wrong"));
        assert!(!checker.check(""));
    }

    #[test]
    fn corrupt_blob_fails() {
        assert!(!CredentialChecker::new(Vec::new()).check("anything"));
        assert!(!CredentialChecker::new(b"garbage".to_vec()).check("anything"));
    }

    #[test]
    fn sealed_non_key_plaintext_fails() {
        // Hand-build a blob whose plaintext decrypts fine but is not a key.
        let salt = [1u8; SALT_LEN];
        let nonce = [2u8; NONCE_LEN_BYTES];
        let key = crypto::derive_key(b"pw", &salt, TEST_ITERATIONS).unwrap();
        let ciphertext = crypto::encrypt(b"just some text", key.as_slice(), nonce).unwrap();
        let blob = SealedKey {
            iterations: TEST_ITERATIONS,
            salt,
            nonce,
            ciphertext,
        }
        .to_bytes();

        assert!(!CredentialChecker::new(blob).check("pw"));
    }

    #[test]
    fn debug_does_not_leak_material() {
        let checker = checker_for("pw");
        let rendered = format!("{checker:?}");
        assert!(rendered.contains("sealed_len"));
    }

    #[test]
    fn checker_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CredentialChecker>();
    }
}
