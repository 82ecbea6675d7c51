//! The handshake protocol state machine.
//!
//! [`HandshakeCoordinator`] composes the consumer lookup, the passphrase
//! check and the [`TokenStore`] into the four protocol operations:
//!
//! 1. [`start_handshake`](HandshakeCoordinator::start_handshake): the
//!    browser arrives at `/auth`; look up the consumer, show the login page.
//! 2. [`submit_credential`](HandshakeCoordinator::submit_credential): the
//!    user submits the passphrase; on success mint a request token and send
//!    the browser back to the consumer.
//! 3. [`validate_and_authorize`](HandshakeCoordinator::validate_and_authorize):
//!    the consumer trades the request token for an auth token, once.
//! 4. [`check_session`](HandshakeCoordinator::check_session): the consumer
//!    confirms an auth token and learns the provider's name.
//!
//! Each step short-circuits on the first failure. Failures that could leak
//! information (wrong passphrase, unknown token) come back as plain
//! negative outcomes, never as errors.

use std::sync::Arc;

use keyhole_vault::CredentialChecker;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::consumer::{ConsumerId, ConsumerInfoFetcher, ConsumerProfile};
use crate::error::{HandshakeError, Result};
use crate::store::TokenStore;
use crate::token::generate_token;

/// Default path on the consumer that receives the post-login redirect.
pub const DEFAULT_CALLBACK_PATH: &str = "/login/callback";

/// Result of a passphrase submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The passphrase was correct; send the browser to `url`.
    Redirect {
        /// Absolute callback URL on the consumer, including the query.
        url: String,
        /// The freshly minted request token (also present in `url`).
        token: String,
    },
    /// The passphrase was rejected; show the login page again.
    Rejected {
        /// The consumer profile to render alongside the failure flag.
        profile: ConsumerProfile,
    },
}

/// Orchestrates the delegated-authentication handshake.
pub struct HandshakeCoordinator {
    provider_name: String,
    callback_path: String,
    store: Arc<dyn TokenStore>,
    fetcher: ConsumerInfoFetcher,
    checker: Arc<CredentialChecker>,
}

impl HandshakeCoordinator {
    /// Create a coordinator for the provider called `provider_name`.
    pub fn new(
        provider_name: impl Into<String>,
        store: Arc<dyn TokenStore>,
        fetcher: ConsumerInfoFetcher,
        checker: CredentialChecker,
    ) -> Self {
        Self {
            provider_name: provider_name.into(),
            callback_path: DEFAULT_CALLBACK_PATH.to_owned(),
            store,
            fetcher,
            checker: Arc::new(checker),
        }
    }

    /// Override the consumer callback path (default `/login/callback`).
    pub fn with_callback_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.callback_path = if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        };
        self
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    /// The token store this coordinator drives.
    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// Look up the consumer so the login page can be shown.
    ///
    /// Touches no handshake state.
    ///
    /// # Errors
    ///
    /// Returns [`HandshakeError::ConsumerUnavailable`] when the consumer's
    /// profile cannot be fetched.
    #[instrument(skip(self))]
    pub async fn start_handshake(&self, consumer_id: &str) -> Result<ConsumerProfile> {
        self.fetch_profile(consumer_id).await
    }

    /// Check the passphrase and, on success, mint a request token.
    ///
    /// The profile is fetched again rather than cached from
    /// [`start_handshake`](Self::start_handshake). The PBKDF2 check runs on
    /// the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns [`HandshakeError::ConsumerUnavailable`] if the consumer has
    /// gone away, or an internal error if token minting or URL building
    /// fails. A wrong passphrase is [`SubmitOutcome::Rejected`], not an
    /// error.
    #[instrument(skip(self, passphrase))]
    pub async fn submit_credential(
        &self,
        consumer_id: &str,
        passphrase: &str,
    ) -> Result<SubmitOutcome> {
        let profile = self.fetch_profile(consumer_id).await?;

        if !self.check_passphrase(passphrase).await? {
            info!(consumer = consumer_id, "passphrase rejected");
            return Ok(SubmitOutcome::Rejected { profile });
        }

        let token = self.store.create_token(consumer_id)?;
        let url = self.callback_url(consumer_id, &token)?;

        info!(consumer = consumer_id, "passphrase accepted, redirecting to consumer");
        Ok(SubmitOutcome::Redirect { url, token })
    }

    /// Trade a request token for an auth token.
    ///
    /// Returns `None` for an unknown, stale or already-used request token.
    /// The check and the promotion happen atomically in the store, so
    /// concurrent calls with the same token see at most one `Some`.
    #[instrument(skip(self, request_token))]
    pub fn validate_and_authorize(&self, consumer_id: &str, request_token: &str) -> Option<String> {
        let auth_token = match generate_token() {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "failed to mint auth token");
                return None;
            }
        };

        if self.store.promote(consumer_id, request_token, &auth_token) {
            info!(consumer = consumer_id, "request token promoted");
            Some(auth_token)
        } else {
            debug!(consumer = consumer_id, "request token validation failed");
            None
        }
    }

    /// Confirm an auth token, returning the provider's name on success.
    #[instrument(skip(self, auth_token))]
    pub fn check_session(&self, consumer_id: &str, auth_token: &str) -> Option<String> {
        if self.store.check_session(consumer_id, auth_token) {
            Some(self.provider_name.clone())
        } else {
            debug!(consumer = consumer_id, "session check failed");
            None
        }
    }

    // -- Internal helpers ---------------------------------------------------

    async fn fetch_profile(&self, consumer_id: &str) -> Result<ConsumerProfile> {
        let profile = self.fetcher.fetch(consumer_id).await;
        if profile.is_empty() {
            return Err(HandshakeError::ConsumerUnavailable {
                consumer: consumer_id.to_owned(),
            });
        }
        Ok(profile)
    }

    async fn check_passphrase(&self, passphrase: &str) -> Result<bool> {
        let checker = Arc::clone(&self.checker);
        let passphrase = passphrase.to_owned();
        let ok = tokio::task::spawn_blocking(move || checker.check(&passphrase)).await?;
        Ok(ok)
    }

    /// `http://{consumer}{callback_path}?token=…&provider=…`
    fn callback_url(&self, consumer_id: &str, token: &str) -> Result<String> {
        let consumer = ConsumerId::parse(consumer_id)?;
        let mut url = Url::parse(&format!("{}{}", consumer.origin(), self.callback_path))?;
        url.query_pairs_mut()
            .append_pair("token", token)
            .append_pair("provider", &self.provider_name);
        Ok(url.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
