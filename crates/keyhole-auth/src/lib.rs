//! Delegated-authentication handshake for Keyhole.
//!
//! A consumer site sends the user's browser to the provider. The provider
//! checks the user's passphrase against its sealed private key, then hands
//! the consumer a token it can confirm server-to-server. The consumer never
//! sees the passphrase.
//!
//! # Architecture
//!
//! ```text
//! HandshakeCoordinator
//! ├── ConsumerInfoFetcher  (GET http://{consumer}/about)
//! ├── CredentialChecker    (keyhole-vault, sealed key + passphrase)
//! └── TokenStore           (per-site request/auth token state)
//! ```
//!
//! # Protocol
//!
//! ```text
//! browser  ── GET  /auth?client_id=C ─────────────► provider  (start_handshake)
//! browser  ── POST /auth  client_id, password ────► provider  (submit_credential)
//! browser  ◄─ 303  http://C/login/callback?token=R&provider=N
//! consumer ── POST /auth/validate  client_id, R ──► provider  (validate_and_authorize)
//!          ◄─ {valid: true, token: A}
//! consumer ── POST /auth/session   client_id, A ──► provider  (check_session)
//!          ◄─ {name: N}
//! ```

pub mod consumer;
pub mod coordinator;
pub mod error;
pub mod store;
pub mod token;

pub use consumer::{ConsumerId, ConsumerInfoFetcher, ConsumerProfile};
pub use coordinator::{HandshakeCoordinator, SubmitOutcome};
pub use error::{HandshakeError, Result};
pub use store::{MemoryTokenStore, SiteRecord, TokenStore};
