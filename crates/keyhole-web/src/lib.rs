//! HTTP surface for the Keyhole provider.
//!
//! This crate exposes the handshake over HTTP:
//!
//! - Identity endpoints (`/about`, `/key`, `/avatar`) read by consumers.
//! - The browser login flow at `/auth`, rendered through a pluggable
//!   [`TemplateRenderer`].
//! - Server-to-server token exchange at `/auth/validate` and `/auth/session`.
//! - A `/health` check.

pub mod api;
pub mod frontend;
pub mod server;
pub mod state;

use std::time::Duration;

pub use frontend::{EmbeddedTemplates, LoginContext, RenderError, TemplateRenderer};
pub use server::{WebServer, router};
pub use state::{AppState, ProviderIdentity};

/// Web server configuration.
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// The address to bind the HTTP server to.
    pub bind_addr: String,
    /// The port to listen on.
    pub port: u16,
    /// How often expired handshake records are swept; `None` disables it.
    pub purge_interval: Option<Duration>,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".into(),
            port: 3000,
            purge_interval: Some(Duration::from_secs(60)),
        }
    }
}
