//! Shared application state for the web server.
//!
//! [`AppState`] is wrapped in an `Arc` and shared across all request
//! handlers. It holds the handshake coordinator, the provider's public
//! identity assets, and the page renderer.

use std::sync::Arc;

use axum::body::Bytes;
use keyhole_auth::HandshakeCoordinator;

use crate::frontend::{LOGIN_TEMPLATE, TemplateRenderer};

/// The provider's public identity, served at `/about`, `/key` and `/avatar`.
#[derive(Debug, Clone)]
pub struct ProviderIdentity {
    /// Display name, also the identity asserted by `/auth/session`.
    pub name: String,
    /// Free-form description.
    pub about: String,
    /// Raw public-key bytes.
    pub public_key: Bytes,
    /// Raw avatar image bytes.
    pub avatar: Bytes,
    /// MIME type of `avatar`.
    pub avatar_content_type: String,
}

/// Shared state accessible from every Axum handler.
#[derive(Clone)]
pub struct AppState {
    /// Protocol state machine.
    pub coordinator: Arc<HandshakeCoordinator>,

    /// Public identity assets.
    pub identity: ProviderIdentity,

    /// Page renderer for the login flow.
    pub renderer: Arc<dyn TemplateRenderer>,

    /// Template identifier used for the login page.
    pub login_template: String,
}

impl AppState {
    /// Build state using the default login template identifier.
    pub fn new(
        coordinator: Arc<HandshakeCoordinator>,
        identity: ProviderIdentity,
        renderer: Arc<dyn TemplateRenderer>,
    ) -> Self {
        Self {
            coordinator,
            identity,
            renderer,
            login_template: LOGIN_TEMPLATE.to_owned(),
        }
    }

    /// Use `template` instead of the default login template.
    pub fn with_login_template(mut self, template: impl Into<String>) -> Self {
        self.login_template = template.into();
        self
    }
}
