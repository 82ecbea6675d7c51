//! Consumer profile lookup.
//!
//! A consumer identifies itself by `host` or `host:port`. Before showing the
//! login page the provider fetches `http://host:port/about` from the
//! consumer to learn its display name, description, key and avatar.
//!
//! The lookup never fails loudly: any problem yields an empty
//! [`ConsumerProfile`], and callers treat an empty `name` as "consumer
//! unavailable".

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{HandshakeError, Result};

/// Port assumed when the identifier carries none.
pub const DEFAULT_CONSUMER_PORT: u16 = 80;

/// Default upper bound on a single `/about` fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest `/about` body accepted, in bytes.
pub const MAX_PROFILE_BYTES: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// ConsumerId
// ---------------------------------------------------------------------------

/// A validated `host[:port]` consumer identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerId {
    raw: String,
    host: String,
    port: u16,
}

impl ConsumerId {
    /// Parse `host` or `host:port`.
    ///
    /// # Errors
    ///
    /// Returns [`HandshakeError::InvalidConsumerId`] for empty input, an
    /// empty host, a bad port, or characters that would alter the URL
    /// built from it.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = |reason: String| HandshakeError::InvalidConsumerId {
            input: input.to_owned(),
            reason,
        };

        if input.is_empty() {
            return Err(invalid("empty".into()));
        }

        if let Some(c) = input
            .chars()
            .find(|&c| matches!(c, '/' | '?' | '#' | '@' | '\\') || c.is_whitespace() || c.is_control())
        {
            return Err(invalid(format!("illegal character {c:?}")));
        }

        let (host, port) = match input.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| invalid(format!("bad port {port:?}")))?;
                (host, port)
            }
            None => (input, DEFAULT_CONSUMER_PORT),
        };

        if host.is_empty() {
            return Err(invalid("empty host".into()));
        }
        if host.contains(':') {
            return Err(invalid("unexpected ':' in host".into()));
        }

        Ok(Self {
            raw: input.to_owned(),
            host: host.to_owned(),
            port,
        })
    }

    /// The identifier exactly as supplied.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `http://{identifier}`, keeping an explicit port if one was given.
    pub fn origin(&self) -> String {
        format!("http://{}", self.raw)
    }

    /// The consumer's profile endpoint.
    pub fn about_url(&self) -> String {
        format!("http://{}:{}/about", self.host, self.port)
    }

    /// Turn a consumer-relative path into an absolute URL on this consumer.
    ///
    /// Values that are already absolute `http(s)` URLs pass through, and an
    /// empty path stays empty.
    pub fn absolutize(&self, path: &str) -> String {
        if path.is_empty() || path.starts_with("http://") || path.starts_with("https://") {
            return path.to_owned();
        }
        if path.starts_with('/') {
            format!("{}{}", self.origin(), path)
        } else {
            format!("{}/{}", self.origin(), path)
        }
    }
}

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

// ---------------------------------------------------------------------------
// ConsumerProfile
// ---------------------------------------------------------------------------

/// Public profile a consumer publishes at `/about`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerProfile {
    pub name: String,
    pub about: String,
    pub key: String,
    pub avatar: String,
}

impl ConsumerProfile {
    /// Whether this profile represents a failed lookup.
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }

    /// Rewrite `key` and `avatar` to absolute URLs on `consumer`.
    fn absolutized(mut self, consumer: &ConsumerId) -> Self {
        self.key = consumer.absolutize(&self.key);
        self.avatar = consumer.absolutize(&self.avatar);
        self
    }
}

// ---------------------------------------------------------------------------
// ConsumerInfoFetcher
// ---------------------------------------------------------------------------

/// Fetches consumer profiles over plain HTTP with a bounded timeout.
#[derive(Debug, Clone)]
pub struct ConsumerInfoFetcher {
    client: reqwest::Client,
}

impl ConsumerInfoFetcher {
    /// Create a fetcher with the default timeout.
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_FETCH_TIMEOUT)
    }

    /// Create a fetcher whose requests give up after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to build HTTP client with timeout, using defaults");
                reqwest::Client::new()
            });
        Self { client }
    }

    /// Resolve `consumer` into its profile.
    ///
    /// Returns [`ConsumerProfile::default()`] on an invalid identifier,
    /// network error, non-success status, or malformed body.
    pub async fn fetch(&self, consumer: &str) -> ConsumerProfile {
        let id = match ConsumerId::parse(consumer) {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "rejecting consumer id");
                return ConsumerProfile::default();
            }
        };

        match self.try_fetch(&id).await {
            Ok(profile) => {
                debug!(consumer = %id, name = %profile.name, "fetched consumer profile");
                profile.absolutized(&id)
            }
            Err(reason) => {
                warn!(consumer = %id, %reason, "consumer profile fetch failed");
                ConsumerProfile::default()
            }
        }
    }

    async fn try_fetch(&self, id: &ConsumerId) -> std::result::Result<ConsumerProfile, String> {
        let mut response = self
            .client
            .get(id.about_url())
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {status}"));
        }

        if let Some(len) = response.content_length() {
            if len > MAX_PROFILE_BYTES as u64 {
                return Err(format!("body too large: {len} bytes"));
            }
        }

        // Content-Length may be absent or wrong; enforce the cap while reading.
        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| format!("failed to read body: {e}"))?
        {
            if body.len() + chunk.len() > MAX_PROFILE_BYTES {
                return Err(format!("body exceeds {MAX_PROFILE_BYTES} bytes"));
            }
            body.extend_from_slice(&chunk);
        }

        serde_json::from_slice::<ConsumerProfile>(&body).map_err(|e| format!("malformed body: {e}"))
    }
}

impl Default for ConsumerInfoFetcher {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
