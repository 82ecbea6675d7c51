//! Sealed private-key storage for Keyhole.
//!
//! The provider's private key lives on disk encrypted under its passphrase.
//! This crate owns that format and the one question the rest of the system
//! asks of it: does a given passphrase unlock the key?
//!
//! # Modules
//!
//! - [`crypto`]: AES-256-GCM encryption/decryption, PBKDF2 key derivation.
//! - [`sealed`]: the `KHK1` sealed-key file format.
//! - [`checker`]: [`CredentialChecker`], the passphrase oracle.
//! - [`error`]: Unified error types.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use keyhole_vault::{CredentialChecker, sealed};
//!
//! # fn example(pkcs8_der: &[u8]) -> keyhole_vault::Result<()> {
//! let blob = sealed::seal_private_key(pkcs8_der, b"my-passphrase")?;
//! let checker = CredentialChecker::new(blob);
//! assert!(checker.check("my-passphrase"));
//! # Ok(())
//! # }
//! ```

pub mod checker;
pub mod crypto;
pub mod error;
pub mod sealed;

pub use checker::CredentialChecker;
pub use error::{Result, VaultError};
pub use sealed::SealedKey;
