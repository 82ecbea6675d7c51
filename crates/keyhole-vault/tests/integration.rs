//! Integration tests for the keyhole-vault crate.
//!
//! These tests exercise the full sealed-key lifecycle: sealing a key to a
//! file, loading it back, and checking passphrases against it.

use keyhole_vault::sealed::{self, SealedKey};
use keyhole_vault::CredentialChecker;
use ring::rand::SystemRandom;
use ring::signature::Ed25519KeyPair;

const TEST_ITERATIONS: u32 = 2_000;

fn test_key() -> Vec<u8> {
    let rng = SystemRandom::new();
    Ed25519KeyPair::generate_pkcs8(&rng).unwrap().as_ref().to_vec()
}

#[test]
fn seal_write_load_check() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("private.key");

    let blob = sealed::seal_private_key_with_iterations(&test_key(), b"s3cret", TEST_ITERATIONS)
        .unwrap();
    std::fs::write(&path, blob).unwrap();

    let checker = CredentialChecker::from_file(&path).unwrap();
    assert!(checker.check("s3cret"));
    assert!(!checker.check("s3cre"));
    assert!(!checker.check("S3CRET"));
}

#[test]
fn missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = CredentialChecker::from_file(dir.path().join("nope.key"));
    assert!(result.is_err());
}

#[test]
fn tampered_file_never_checks() {
    let blob = sealed::seal_private_key_with_iterations(&test_key(), b"pw", TEST_ITERATIONS)
        .unwrap();

    let mut tampered = blob.clone();
    let last = tampered.len() - 1;
    tampered[last] ^= 0xFF;

    assert!(CredentialChecker::new(blob).check("pw"));
    assert!(!CredentialChecker::new(tampered).check("pw"));
}

#[test]
fn each_seal_uses_fresh_salt_and_nonce() {
    let key = test_key();
    let a = SealedKey::parse(
        &sealed::seal_private_key_with_iterations(&key, b"pw", TEST_ITERATIONS).unwrap(),
    )
    .unwrap();
    let b = SealedKey::parse(
        &sealed::seal_private_key_with_iterations(&key, b"pw", TEST_ITERATIONS).unwrap(),
    )
    .unwrap();

    assert_ne!(a.salt, b.salt);
    assert_ne!(a.nonce, b.nonce);
    assert_ne!(a.ciphertext, b.ciphertext);
}
