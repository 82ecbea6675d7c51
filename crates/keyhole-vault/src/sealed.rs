//! The sealed private-key file format.
//!
//! A sealed key is the provider's PKCS#8 private key encrypted under a key
//! derived from its passphrase:
//!
//! ```text
//! +-------+------------+-----------+------------+---------------------+
//! | "KHK1"| iterations | salt      | nonce      | ciphertext + tag    |
//! | 4 B   | u32 BE     | 32 B      | 12 B       | n + 16 B            |
//! +-------+------------+-----------+------------+---------------------+
//! ```
//!
//! The iteration count is stored so the cost can be raised later without
//! breaking existing files.

use std::path::Path;

use ring::signature::{Ed25519KeyPair, RsaKeyPair};
use zeroize::Zeroizing;

use crate::crypto::{self, DEFAULT_PBKDF2_ITERATIONS, NONCE_LEN_BYTES, SALT_LEN};
use crate::error::{Result, VaultError};

/// File magic identifying a sealed key, version 1.
pub const MAGIC: &[u8; 4] = b"KHK1";

const HEADER_LEN: usize = MAGIC.len() + 4 + SALT_LEN + NONCE_LEN_BYTES;

/// Length of the AES-GCM authentication tag appended to the ciphertext.
const TAG_LEN: usize = 16;

/// A parsed (but still encrypted) sealed key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedKey {
    pub iterations: u32,
    pub salt: [u8; SALT_LEN],
    pub nonce: [u8; NONCE_LEN_BYTES],
    pub ciphertext: Vec<u8>,
}

impl SealedKey {
    /// Parse the on-disk representation.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::MalformedKey`] if the magic, length or
    /// iteration count is wrong.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN + TAG_LEN {
            return Err(VaultError::MalformedKey {
                reason: format!("blob too short: {} bytes", bytes.len()),
            });
        }

        let (magic, rest) = bytes.split_at(MAGIC.len());
        if magic != MAGIC {
            return Err(VaultError::MalformedKey {
                reason: "bad magic".into(),
            });
        }

        let (iter_bytes, rest) = rest.split_at(4);
        let iterations = u32::from_be_bytes([iter_bytes[0], iter_bytes[1], iter_bytes[2], iter_bytes[3]]);
        if iterations == 0 {
            return Err(VaultError::MalformedKey {
                reason: "zero iteration count".into(),
            });
        }

        let (salt_bytes, rest) = rest.split_at(SALT_LEN);
        let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN_BYTES);

        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(salt_bytes);
        let mut nonce = [0u8; NONCE_LEN_BYTES];
        nonce.copy_from_slice(nonce_bytes);

        Ok(Self {
            iterations,
            salt,
            nonce,
            ciphertext: ciphertext.to_vec(),
        })
    }

    /// Serialize to the on-disk representation.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.ciphertext.len());
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&self.iterations.to_be_bytes());
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Decrypt the key with `passphrase` and return the PKCS#8 plaintext.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::DecryptionFailed`] on a wrong passphrase or
    /// tampered blob.
    pub fn open(&self, passphrase: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        let key = crypto::derive_key(passphrase, &self.salt, self.iterations)?;
        crypto::decrypt(&self.nonce, &self.ciphertext, key.as_slice())
    }
}

/// Seal a PKCS#8 private key with the default PBKDF2 cost.
pub fn seal_private_key(pkcs8_der: &[u8], passphrase: &[u8]) -> Result<Vec<u8>> {
    seal_private_key_with_iterations(pkcs8_der, passphrase, DEFAULT_PBKDF2_ITERATIONS)
}

/// Seal a PKCS#8 private key with an explicit PBKDF2 iteration count.
///
/// The plaintext must parse as an RSA or Ed25519 PKCS#8 key; sealing
/// anything else would produce a file no passphrase can ever unlock.
///
/// # Errors
///
/// Returns [`VaultError::UnsupportedKey`] for non-key input, or a crypto
/// error if derivation or encryption fails.
pub fn seal_private_key_with_iterations(
    pkcs8_der: &[u8],
    passphrase: &[u8],
    iterations: u32,
) -> Result<Vec<u8>> {
    parse_private_key(pkcs8_der)?;

    let salt = crypto::random_array::<SALT_LEN>()?;
    let nonce = crypto::random_array::<NONCE_LEN_BYTES>()?;
    let key = crypto::derive_key(passphrase, &salt, iterations)?;
    let ciphertext = crypto::encrypt(pkcs8_der, key.as_slice(), nonce)?;

    tracing::debug!(iterations, "sealed private key");

    Ok(SealedKey {
        iterations,
        salt,
        nonce,
        ciphertext,
    }
    .to_bytes())
}

/// Read a sealed key file from disk and return its raw bytes.
pub fn load_sealed_key(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let bytes = std::fs::read(path.as_ref())?;
    tracing::debug!(path = %path.as_ref().display(), len = bytes.len(), "loaded sealed key");
    Ok(bytes)
}

/// Which kind of private key a PKCS#8 document holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Rsa,
    Ed25519,
}

/// Structurally validate a PKCS#8 document.
///
/// # Errors
///
/// Returns [`VaultError::UnsupportedKey`] when neither an RSA nor an Ed25519
/// key can be parsed.
pub fn parse_private_key(pkcs8_der: &[u8]) -> Result<KeyKind> {
    if RsaKeyPair::from_pkcs8(pkcs8_der).is_ok() {
        return Ok(KeyKind::Rsa);
    }
    if Ed25519KeyPair::from_pkcs8_maybe_unchecked(pkcs8_der).is_ok() {
        return Ok(KeyKind::Ed25519);
    }
    Err(VaultError::UnsupportedKey {
        reason: "not an RSA or Ed25519 PKCS#8 document".into(),
    })
}
