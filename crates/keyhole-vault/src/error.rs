//! Vault error types.
//!
//! All vault operations surface errors through [`VaultError`]. The
//! [`CredentialChecker`](crate::checker::CredentialChecker) flattens every
//! one of them into `false`; the variants exist for the sealing path and
//! for internal logging.

/// Unified error type for the Keyhole key vault.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    // -- Crypto errors ------------------------------------------------------
    /// Encryption failed (e.g. invalid key length, ring internal error).
    #[error("encryption failed: {reason}")]
    EncryptionFailed { reason: String },

    /// Decryption failed (e.g. wrong key, corrupted ciphertext, bad nonce).
    #[error("decryption failed: {reason}")]
    DecryptionFailed { reason: String },

    /// Key derivation failed (e.g. zero iteration count).
    #[error("key derivation failed: {reason}")]
    KeyDerivationFailed { reason: String },

    // -- Key material errors ------------------------------------------------
    /// The sealed key blob does not follow the expected layout.
    #[error("malformed sealed key: {reason}")]
    MalformedKey { reason: String },

    /// The decrypted plaintext is not a PKCS#8 private key ring understands.
    #[error("unsupported private key: {reason}")]
    UnsupportedKey { reason: String },

    // -- Underlying errors --------------------------------------------------
    /// I/O error while reading or writing key files.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    // -- Generic ------------------------------------------------------------
    /// Catch-all for unexpected internal errors that don't fit a specific
    /// variant.
    #[error("internal vault error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the vault crate.
pub type Result<T> = std::result::Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_malformed_key() {
        let err = VaultError::MalformedKey {
            reason: "bad magic".to_string(),
        };
        assert_eq!(err.to_string(), "malformed sealed key: bad magic");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<VaultError>();
    }
}
