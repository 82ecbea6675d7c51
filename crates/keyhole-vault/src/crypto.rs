//! AES-256-GCM encryption and PBKDF2 key derivation using the `ring` crate.
//!
//! These are the primitives the sealed-key format is built on:
//!
//! - **Encryption/decryption**: AES-256-GCM with a caller-supplied 96-bit
//!   nonce. The nonce is generated randomly once per sealing operation.
//! - **Key derivation**: PBKDF2-HMAC-SHA256 with an explicit iteration count
//!   so the count can travel inside the sealed blob.
//! - **Random generation**: cryptographically secure random bytes.

use std::num::NonZeroU32;

use ring::aead::{self, Aad, BoundKey, NONCE_LEN, Nonce, NonceSequence, SealingKey, UnboundKey};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

use crate::error::{Result, VaultError};

/// Length of the AES-256-GCM key in bytes.
pub const KEY_LEN: usize = 32;

/// Length of the AES-256-GCM nonce in bytes (96 bits).
pub const NONCE_LEN_BYTES: usize = NONCE_LEN;

/// Length of the PBKDF2 salt in bytes.
pub const SALT_LEN: usize = 32;

/// Default PBKDF2 iteration count, 600,000 per OWASP 2023 for HMAC-SHA256.
pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 600_000;

static PBKDF2_ALG: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;

static AEAD_ALG: &aead::Algorithm = &aead::AES_256_GCM;

// ---------------------------------------------------------------------------
// Nonce handling
// ---------------------------------------------------------------------------

/// A nonce sequence that yields exactly one nonce and then errors.
struct SingleNonce(Option<[u8; NONCE_LEN_BYTES]>);

impl SingleNonce {
    fn new(bytes: [u8; NONCE_LEN_BYTES]) -> Self {
        Self(Some(bytes))
    }
}

impl NonceSequence for SingleNonce {
    fn advance(&mut self) -> std::result::Result<Nonce, ring::error::Unspecified> {
        self.0
            .take()
            .map(Nonce::assume_unique_for_key)
            .ok_or(ring::error::Unspecified)
    }
}

// ---------------------------------------------------------------------------
// Encryption
// ---------------------------------------------------------------------------

/// Encrypt `plaintext` with AES-256-GCM under `key` and `nonce`.
///
/// The returned ciphertext has the 128-bit authentication tag appended.
///
/// # Errors
///
/// Returns [`VaultError::EncryptionFailed`] if the key length is wrong or
/// `ring` reports a failure.
pub fn encrypt(plaintext: &[u8], key: &[u8], nonce: [u8; NONCE_LEN_BYTES]) -> Result<Vec<u8>> {
    if key.len() != KEY_LEN {
        return Err(VaultError::EncryptionFailed {
            reason: format!("key must be {} bytes, got {}", KEY_LEN, key.len()),
        });
    }

    let unbound_key = UnboundKey::new(AEAD_ALG, key).map_err(|_| VaultError::EncryptionFailed {
        reason: "failed to create AES-256-GCM key".into(),
    })?;

    let mut sealing_key = SealingKey::new(unbound_key, SingleNonce::new(nonce));

    let mut in_out = plaintext.to_vec();
    sealing_key
        .seal_in_place_append_tag(Aad::empty(), &mut in_out)
        .map_err(|_| VaultError::EncryptionFailed {
            reason: "seal_in_place failed".into(),
        })?;

    tracing::trace!(
        plaintext_len = plaintext.len(),
        ciphertext_len = in_out.len(),
        "encrypted data"
    );

    Ok(in_out)
}

/// Decrypt `ciphertext` (which includes the GCM tag) using `nonce` and `key`.
///
/// The plaintext is wiped from memory when the returned buffer drops.
///
/// # Errors
///
/// Returns [`VaultError::DecryptionFailed`] if the key is wrong, the
/// ciphertext has been tampered with, or the nonce does not match.
pub fn decrypt(
    nonce: &[u8; NONCE_LEN_BYTES],
    ciphertext: &[u8],
    key: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    if key.len() != KEY_LEN {
        return Err(VaultError::DecryptionFailed {
            reason: format!("key must be {} bytes, got {}", KEY_LEN, key.len()),
        });
    }

    let unbound_key = UnboundKey::new(AEAD_ALG, key).map_err(|_| VaultError::DecryptionFailed {
        reason: "failed to create AES-256-GCM key".into(),
    })?;

    let mut opening_key = aead::OpeningKey::new(unbound_key, SingleNonce::new(*nonce));

    let mut in_out = Zeroizing::new(ciphertext.to_vec());
    let plaintext_len = opening_key
        .open_in_place(Aad::empty(), in_out.as_mut_slice())
        .map_err(|_| VaultError::DecryptionFailed {
            reason: "authentication failed".into(),
        })?
        .len();

    // The plaintext is the prefix of the buffer; drop the tag in place.
    in_out.truncate(plaintext_len);
    Ok(in_out)
}

// ---------------------------------------------------------------------------
// Key derivation
// ---------------------------------------------------------------------------

/// Derive a 256-bit key from `password` and `salt` with PBKDF2-HMAC-SHA256.
///
/// The key is wiped from memory when dropped.
///
/// # Errors
///
/// Returns [`VaultError::KeyDerivationFailed`] if `iterations` is zero.
pub fn derive_key(
    password: &[u8],
    salt: &[u8],
    iterations: u32,
) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let iterations = NonZeroU32::new(iterations).ok_or_else(|| VaultError::KeyDerivationFailed {
        reason: "iteration count must be non-zero".into(),
    })?;

    let mut out = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2::derive(PBKDF2_ALG, iterations, salt, password, out.as_mut_slice());
    Ok(out)
}

// ---------------------------------------------------------------------------
// Random bytes
// ---------------------------------------------------------------------------

/// Generate `len` cryptographically secure random bytes.
///
/// # Errors
///
/// Returns [`VaultError::Internal`] if the system CSPRNG fails.
pub fn random_bytes(len: usize) -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let mut buf = vec![0u8; len];
    rng.fill(&mut buf)
        .map_err(|_| VaultError::Internal("failed to generate random bytes".into()))?;
    Ok(buf)
}

/// Fill a fixed-size array with random bytes.
pub(crate) fn random_array<const N: usize>() -> Result<[u8; N]> {
    let rng = SystemRandom::new();
    let mut buf = [0u8; N];
    rng.fill(&mut buf)
        .map_err(|_| VaultError::Internal("failed to generate random bytes".into()))?;
    Ok(buf)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
