//! Main web server setup and startup.
//!
//! [`WebServer`] composes the Axum router, registers all routes, and starts
//! the HTTP listener. It also spawns a background task that sweeps expired
//! handshake records out of the token store.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use keyhole_auth::TokenStore;

use crate::WebConfig;
use crate::api;
use crate::state::AppState;

/// The Keyhole provider's HTTP server.
pub struct WebServer {
    config: WebConfig,
    state: Arc<AppState>,
}

impl WebServer {
    /// Create a new web server.
    ///
    /// # Arguments
    ///
    /// * `config` - Bind address, port and purge interval.
    /// * `state` - Coordinator, identity assets and renderer.
    pub fn new(config: WebConfig, state: AppState) -> Self {
        Self {
            config,
            state: Arc::new(state),
        }
    }

    /// Return the `host:port` string this server will bind to.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.config.bind_addr, self.config.port)
    }

    /// Build the Axum router with all routes registered.
    pub fn router(&self) -> Router {
        router(Arc::clone(&self.state))
    }

    /// Start the server and block until it is shut down.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP listener cannot be bound.
    pub async fn start(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = self.addr();
        let router = self.router();

        if let Some(interval) = self.config.purge_interval {
            let store = Arc::clone(self.state.coordinator.store());
            tokio::spawn(purge_loop(store, interval));
        }

        tracing::info!(addr = %addr, provider = %self.state.identity.name, "starting web server");

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}

/// Build the provider router over `state`.
///
/// Exposed separately from [`WebServer`] so tests can serve it on an
/// ephemeral listener.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Provider identity.
        .route("/about", get(api::about))
        .route("/avatar", get(api::avatar))
        .route("/key", get(api::key))
        // Browser-facing login.
        .route("/auth", get(api::login_page).post(api::login_submit))
        // Server-to-server token exchange.
        .route("/auth/validate", post(api::validate))
        .route("/auth/session", post(api::session))
        .route("/health", get(api::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── expiry sweep ────────────────────────────────────────────────────

async fn purge_loop(store: Arc<dyn TokenStore>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let removed = store.purge_expired();
        if removed > 0 {
            tracing::debug!(removed, remaining = store.len(), "purged expired handshakes");
        }
    }
}
