//! Per-site handshake state.
//!
//! The [`TokenStore`] trait is the only way handshake records are read or
//! mutated. [`MemoryTokenStore`] keeps them in a [`DashMap`] for the lifetime
//! of the process, optionally evicting records older than a TTL.
//!
//! A record moves through two states:
//!
//! ```text
//! create_token ──► PENDING (auth_token = None) ──promote──► COMPLETED
//! ```
//!
//! Re-issuing a token for a site overwrites whatever was there, so at most
//! one handshake is in flight per site.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::debug;

use crate::error::Result;
use crate::token::{generate_token, tokens_match};

/// State of a single in-flight (or completed) handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteRecord {
    /// Token minted at creation; never changes afterwards.
    pub request_token: String,
    /// Set exactly once, when the request token is promoted.
    pub auth_token: Option<String>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl SiteRecord {
    fn new(request_token: String) -> Self {
        Self {
            request_token,
            auth_token: None,
            created_at: Utc::now(),
        }
    }

    fn is_expired(&self, ttl: Option<Duration>, now: DateTime<Utc>) -> bool {
        ttl.is_some_and(|ttl| now - self.created_at >= ttl)
    }
}

/// Authoritative per-site handshake state.
///
/// Implementations must make [`promote`](Self::promote) atomic per site:
/// of any number of concurrent calls with the same pending request token,
/// at most one returns `true`.
pub trait TokenStore: Send + Sync {
    /// Mint a request token for `site`, replacing any previous record.
    fn create_token(&self, site: &str) -> Result<String>;

    /// `true` iff `site` has a pending record whose request token is `token`.
    fn validate_request(&self, site: &str, token: &str) -> bool;

    /// Set the auth token on an existing record without any validation.
    fn set_auth(&self, site: &str, auth_token: &str);

    /// `true` iff `site` has a record whose auth token is `token`.
    fn check_session(&self, site: &str, token: &str) -> bool;

    /// Validate `request_token` and set `auth_token` as one atomic step.
    fn promote(&self, site: &str, request_token: &str, auth_token: &str) -> bool;

    /// Remove expired records, returning how many were dropped.
    fn purge_expired(&self) -> usize;

    /// Number of records currently held (including not-yet-purged expired ones).
    fn len(&self) -> usize;

    /// Whether the store holds no records.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// MemoryTokenStore
// ---------------------------------------------------------------------------

/// In-process [`TokenStore`] backed by a sharded concurrent map.
///
/// Every operation on a key runs under that key's shard lock, which is what
/// makes [`TokenStore::promote`] a compare-and-set.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    records: DashMap<String, SiteRecord>,
    ttl: Option<Duration>,
}

impl MemoryTokenStore {
    /// Create a store whose records never expire.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose records are treated as absent after `ttl`.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            records: DashMap::new(),
            ttl: Some(ttl),
        }
    }

    /// The configured TTL, if any.
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Snapshot of the live record for `site`.
    pub fn record(&self, site: &str) -> Option<SiteRecord> {
        let now = Utc::now();
        self.records
            .get(site)
            .filter(|r| !r.is_expired(self.ttl, now))
            .map(|r| r.value().clone())
    }

    /// Replace the record for `site` with a fresh pending one.
    fn issue(&self, site: &str, request_token: String) {
        let previous = self
            .records
            .insert(site.to_owned(), SiteRecord::new(request_token));
        if previous.is_some() {
            debug!(site, "replaced in-flight handshake");
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn create_token(&self, site: &str) -> Result<String> {
        let token = generate_token()?;
        self.issue(site, token.clone());
        debug!(site, "issued request token");
        Ok(token)
    }

    fn validate_request(&self, site: &str, token: &str) -> bool {
        self.record(site)
            .is_some_and(|r| r.auth_token.is_none() && tokens_match(&r.request_token, token))
    }

    fn set_auth(&self, site: &str, auth_token: &str) {
        let now = Utc::now();
        match self.records.get_mut(site) {
            Some(mut record) if !record.is_expired(self.ttl, now) => {
                record.auth_token = Some(auth_token.to_owned());
            }
            _ => debug!(site, "set_auth on unknown site ignored"),
        }
    }

    fn check_session(&self, site: &str, token: &str) -> bool {
        self.record(site)
            .and_then(|r| r.auth_token)
            .is_some_and(|auth| tokens_match(&auth, token))
    }

    fn promote(&self, site: &str, request_token: &str, auth_token: &str) -> bool {
        let now = Utc::now();
        // `get_mut` holds the shard write lock until `record` drops.
        let Some(mut record) = self.records.get_mut(site) else {
            return false;
        };

        if record.is_expired(self.ttl, now)
            || record.auth_token.is_some()
            || !tokens_match(&record.request_token, request_token)
        {
            return false;
        }

        record.auth_token = Some(auth_token.to_owned());
        true
    }

    fn purge_expired(&self) -> usize {
        if self.ttl.is_none() {
            return 0;
        }
        let now = Utc::now();
        let before = self.records.len();
        self.records.retain(|_, r| !r.is_expired(self.ttl, now));
        let purged = before.saturating_sub(self.records.len());
        if purged > 0 {
            debug!(purged, "purged expired handshakes");
        }
        purged
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn create_then_validate() {
        let store = MemoryTokenStore::new();
        let token = store.create_token("siteA").unwrap();
        assert!(store.validate_request("siteA", &token));
    }

    #[test]
    fn create_discards_prior_record() {
        let store = MemoryTokenStore::new();
        let first = store.create_token("siteA").unwrap();
        let second = store.create_token("siteA").unwrap();

        assert!(!store.validate_request("siteA", &first));
        assert!(store.validate_request("siteA", &second));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn full_handshake_scenario() {
        let store = MemoryTokenStore::new();
        let tok1 = store.create_token("siteA").unwrap();

        assert!(store.validate_request("siteA", &tok1));
        store.set_auth("siteA", "auth1");

        let record = store.record("siteA").unwrap();
        assert_eq!(record.request_token, tok1);
        assert_eq!(record.auth_token.as_deref(), Some("auth1"));

        assert!(!store.validate_request("siteA", &tok1));
        assert!(store.check_session("siteA", "auth1"));
        assert!(!store.check_session("siteA", "wrong"));
    }

    #[test]
    fn set_auth_blocks_any_further_validation() {
        let store = MemoryTokenStore::new();
        let token = store.create_token("site").unwrap();
        store.set_auth("site", "auth");

        assert!(!store.validate_request("site", &token));
        assert!(!store.validate_request("site", "anything"));
        assert!(!store.validate_request("site", ""));
    }

    #[test]
    fn check_session_tracks_latest_auth_token() {
        let store = MemoryTokenStore::new();
        store.create_token("site").unwrap();
        store.set_auth("site", "auth-old");
        store.set_auth("site", "auth-new");

        assert!(store.check_session("site", "auth-new"));
        assert!(!store.check_session("site", "auth-old"));
    }

    #[test]
    fn check_session_is_idempotent() {
        let store = MemoryTokenStore::new();
        store.create_token("site").unwrap();
        store.set_auth("site", "auth");

        for _ in 0..5 {
            assert!(store.check_session("site", "auth"));
        }
    }

    #[test]
    fn pending_record_has_no_session() {
        let store = MemoryTokenStore::new();
        let token = store.create_token("site").unwrap();
        assert!(!store.check_session("site", &token));
        assert!(!store.check_session("site", ""));
    }

    #[test]
    fn unknown_site_is_always_false() {
        let store = MemoryTokenStore::new();
        assert!(!store.validate_request("nowhere", "tok"));
        assert!(!store.check_session("nowhere", "tok"));
        assert!(!store.promote("nowhere", "tok", "auth"));

        store.set_auth("nowhere", "auth");
        assert!(store.is_empty());
    }

    #[test]
    fn tokens_do_not_cross_sites() {
        let store = MemoryTokenStore::new();
        let a = store.create_token("siteA").unwrap();
        store.create_token("siteB").unwrap();

        assert!(!store.validate_request("siteB", &a));
        assert!(!store.promote("siteB", &a, "auth"));
    }

    #[test]
    fn promote_succeeds_once() {
        let store = MemoryTokenStore::new();
        let token = store.create_token("site").unwrap();

        assert!(store.promote("site", &token, "auth1"));
        assert!(!store.promote("site", &token, "auth2"));
        assert!(store.check_session("site", "auth1"));
        assert!(!store.check_session("site", "auth2"));
    }

    #[test]
    fn promote_rejects_wrong_token() {
        let store = MemoryTokenStore::new();
        store.create_token("site").unwrap();

        assert!(!store.promote("site", "guess", "auth"));
        assert!(store.record("site").unwrap().auth_token.is_none());
    }

    #[test]
    fn near_miss_tokens_are_rejected() {
        let store = MemoryTokenStore::new();
        let token = store.create_token("site").unwrap();
        let mut near = token[..token.len() - 1].to_owned();
        near.push(if token.ends_with('x') { 'y' } else { 'x' });

        assert!(!store.validate_request("site", &near));
        assert!(!store.promote("site", &near, "auth-token-0000"));

        assert!(store.promote("site", &token, "auth-token-0000"));
        assert!(!store.check_session("site", "auth-token-0001"));
        assert!(store.check_session("site", "auth-token-0000"));
    }

    #[test]
    fn concurrent_promote_has_single_winner() {
        let store = Arc::new(MemoryTokenStore::new());
        let token = store.create_token("site").unwrap();

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                let token = token.clone();
                std::thread::spawn(move || store.promote("site", &token, &format!("auth{i}")))
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(winners, 1);
    }

    #[test]
    fn expired_records_are_invisible() {
        let store = MemoryTokenStore::with_ttl(Duration::zero());
        let token = store.create_token("site").unwrap();

        assert!(!store.validate_request("site", &token));
        assert!(!store.promote("site", &token, "auth"));
        assert!(store.record("site").is_none());
    }

    #[test]
    fn purge_removes_only_expired_records() {
        let store = MemoryTokenStore::with_ttl(Duration::minutes(10));
        store.create_token("fresh").unwrap();
        store.records.insert(
            "stale".to_owned(),
            SiteRecord {
                request_token: "old".to_owned(),
                auth_token: None,
                created_at: Utc::now() - Duration::minutes(11),
            },
        );

        assert_eq!(store.len(), 2);
        assert_eq!(store.purge_expired(), 1);
        assert!(store.record("fresh").is_some());
        assert!(store.record("stale").is_none());
    }

    #[test]
    fn purge_without_ttl_is_noop() {
        let store = MemoryTokenStore::new();
        store.create_token("site").unwrap();
        assert_eq!(store.purge_expired(), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn store_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MemoryTokenStore>();
    }
}
