//! CLI entry point for Keyhole.
//!
//! This binary provides the `keyhole` command with subcommands for serving
//! the provider and sealing a private key under a passphrase.

mod cli;
mod config;
mod helpers;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use axum::body::Bytes;
use clap::Parser;
use tracing::info;

use keyhole_auth::{ConsumerInfoFetcher, ConsumerProfile, HandshakeCoordinator, MemoryTokenStore};
use keyhole_vault::CredentialChecker;
use keyhole_web::{
    AppState, EmbeddedTemplates, LoginContext, ProviderIdentity, TemplateRenderer, WebServer,
};

use crate::cli::{Cli, Commands};
use crate::config::ProviderConfig;
use crate::helpers::{init_tracing, read_file, write_file};

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing("info", cli.json_logs);

    match cli.command {
        Commands::Serve { config, bind, port } => cmd_serve(&config, bind, port).await,
        Commands::SealKey {
            input,
            output,
            passphrase,
            iterations,
        } => cmd_seal_key(&input, &output, &passphrase, iterations),
    }
}

// ---------------------------------------------------------------------------
// Subcommand: serve
// ---------------------------------------------------------------------------

async fn cmd_serve(config_path: &Path, bind: Option<String>, port: Option<u16>) -> Result<()> {
    // 1. Load config: file, then environment, then flags.
    let mut config = ProviderConfig::load(config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    if let Some(bind) = bind {
        config.web.bind_addr = bind;
    }
    if let Some(port) = port {
        config.web.port = port;
    }
    info!(path = %config_path.display(), name = %config.name, "configuration loaded");

    // 2. Identity assets.
    let checker = CredentialChecker::from_file(&config.private_key_path).with_context(|| {
        format!(
            "failed to load sealed key from {}",
            config.private_key_path.display()
        )
    })?;
    let identity = ProviderIdentity {
        name: config.name.clone(),
        about: config.about.clone(),
        public_key: Bytes::from(read_file(&config.public_key_path, "public key")?),
        avatar: Bytes::from(read_file(&config.avatar_path, "avatar")?),
        avatar_content_type: config.avatar_content_type.clone(),
    };
    info!(
        public_key_len = identity.public_key.len(),
        avatar_len = identity.avatar.len(),
        "identity assets loaded"
    );

    // 3. Renderer: fail at startup rather than on the first login.
    let renderer = Arc::new(EmbeddedTemplates);
    check_template(renderer.as_ref(), &config)?;

    // 4. Handshake machinery.
    let store = match config.token_ttl() {
        Some(ttl) => MemoryTokenStore::with_ttl(ttl),
        None => MemoryTokenStore::new(),
    };
    let coordinator = HandshakeCoordinator::new(
        config.name.clone(),
        Arc::new(store),
        ConsumerInfoFetcher::with_timeout(config.consumer_timeout()),
        checker,
    )
    .with_callback_path(config.callback_path.clone());
    info!(
        ttl_secs = config.token_ttl_secs,
        consumer_timeout_secs = config.consumer_timeout_secs,
        callback_path = %config.callback_path,
        "handshake coordinator ready"
    );

    // 5. Serve.
    let state = AppState::new(Arc::new(coordinator), identity, renderer)
        .with_login_template(config.template.clone());
    WebServer::new(config.web_config(), state)
        .start()
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    Ok(())
}

fn check_template(renderer: &dyn TemplateRenderer, config: &ProviderConfig) -> Result<()> {
    let ctx = LoginContext {
        provider_name: config.name.clone(),
        client_id: String::new(),
        consumer: ConsumerProfile::default(),
        failed: false,
    };
    if let Err(e) = renderer.render(&config.template, &ctx) {
        bail!("login template {:?} is not usable: {e}", config.template);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: seal-key
// ---------------------------------------------------------------------------

fn cmd_seal_key(input: &Path, output: &Path, passphrase: &str, iterations: u32) -> Result<()> {
    if passphrase.is_empty() {
        bail!("refusing to seal a key under an empty passphrase");
    }

    let der = read_file(input, "private key")?;
    let sealed = keyhole_vault::sealed::seal_private_key_with_iterations(
        &der,
        passphrase.as_bytes(),
        iterations,
    )
    .context("failed to seal private key")?;
    write_file(output, &sealed)?;

    info!(
        input = %input.display(),
        output = %output.display(),
        iterations,
        "sealed private key written"
    );
    Ok(())
}
