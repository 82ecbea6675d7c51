//! HTTP route handlers.
//!
//! Every protocol failure is converted into its response shape here:
//! an unreachable consumer becomes an error page, a wrong passphrase a
//! login page with the failure flag, an unknown token `valid: false` or an
//! empty object. Nothing in the handshake surfaces as an unhandled error.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Form, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Redirect, Response};
use keyhole_auth::{ConsumerProfile, HandshakeError, SubmitOutcome};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{error, warn};

use crate::frontend::{LoginContext, UNAVAILABLE_TEMPLATE};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Provider identity: GET /about, /avatar, /key
// ---------------------------------------------------------------------------

/// Response payload for `/about`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AboutResponse {
    pub name: String,
    pub about: String,
}

pub async fn about(State(state): State<Arc<AppState>>) -> Json<AboutResponse> {
    Json(AboutResponse {
        name: state.identity.name.clone(),
        about: state.identity.about.clone(),
    })
}

pub async fn avatar(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, state.identity.avatar_content_type.clone())],
        state.identity.avatar.clone(),
    )
}

pub async fn key(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/octet-stream")],
        state.identity.public_key.clone(),
    )
}

// ---------------------------------------------------------------------------
// GET/POST /auth
// ---------------------------------------------------------------------------

/// Query for `GET /auth`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AuthQuery {
    pub client_id: String,
}

/// Form body for `POST /auth`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub client_id: String,
    pub password: String,
}

/// Show the login page for `client_id`.
pub async fn login_page(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AuthQuery>,
) -> Response {
    match state.coordinator.start_handshake(&query.client_id).await {
        Ok(profile) => render_login(&state, &query.client_id, profile, false),
        Err(e) => handshake_failure(&state, &query.client_id, e),
    }
}

/// Check the submitted passphrase; redirect to the consumer on success.
pub async fn login_submit(
    State(state): State<Arc<AppState>>,
    Form(form): Form<LoginForm>,
) -> Response {
    match state
        .coordinator
        .submit_credential(&form.client_id, &form.password)
        .await
    {
        Ok(SubmitOutcome::Redirect { url, .. }) => Redirect::to(&url).into_response(),
        Ok(SubmitOutcome::Rejected { profile }) => {
            render_login(&state, &form.client_id, profile, true)
        }
        Err(e) => handshake_failure(&state, &form.client_id, e),
    }
}

// ---------------------------------------------------------------------------
// POST /auth/validate, /auth/session
// ---------------------------------------------------------------------------

/// Form body for the server-to-server token endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TokenForm {
    pub client_id: String,
    pub token: String,
}

/// Response payload for `/auth/validate`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidateResponse {
    pub valid: bool,
    pub token: Option<String>,
}

/// Trade a request token for an auth token.
pub async fn validate(
    State(state): State<Arc<AppState>>,
    Form(form): Form<TokenForm>,
) -> Json<ValidateResponse> {
    let token = state
        .coordinator
        .validate_and_authorize(&form.client_id, &form.token);

    Json(ValidateResponse {
        valid: token.is_some(),
        token,
    })
}

/// Confirm an auth token; `{name}` on success, `{}` otherwise.
pub async fn session(
    State(state): State<Arc<AppState>>,
    Form(form): Form<TokenForm>,
) -> Json<Value> {
    match state.coordinator.check_session(&form.client_id, &form.token) {
        Some(name) => Json(json!({ "name": name })),
        None => Json(json!({})),
    }
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

/// Response payload for `/health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub active_handshakes: usize,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        active_handshakes: state.coordinator.store().len(),
    })
}

// ---------------------------------------------------------------------------
// Rendering helpers
// ---------------------------------------------------------------------------

fn render_login(state: &AppState, client_id: &str, consumer: ConsumerProfile, failed: bool) -> Response {
    let ctx = LoginContext {
        provider_name: state.identity.name.clone(),
        client_id: client_id.to_owned(),
        consumer,
        failed,
    };
    render_page(state, &state.login_template, &ctx, StatusCode::OK)
}

fn render_page(state: &AppState, template: &str, ctx: &LoginContext, status: StatusCode) -> Response {
    match state.renderer.render(template, ctx) {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            error!(error = %e, template, "failed to render page");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
        }
    }
}

fn handshake_failure(state: &AppState, client_id: &str, err: HandshakeError) -> Response {
    match err {
        HandshakeError::ConsumerUnavailable { .. } | HandshakeError::InvalidConsumerId { .. } => {
            warn!(client_id, error = %err, "handshake cannot proceed");
            let ctx = LoginContext {
                provider_name: state.identity.name.clone(),
                client_id: client_id.to_owned(),
                consumer: ConsumerProfile::default(),
                failed: false,
            };
            render_page(state, UNAVAILABLE_TEMPLATE, &ctx, StatusCode::BAD_GATEWAY)
        }
        other => {
            error!(client_id, error = %other, "handshake failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
        }
    }
}
