// ABOUTME: Heimdall authorization server binary serving the OAuth 2.0 HTTP endpoints
// ABOUTME: Loads configuration, signing key, store, and client registry, then runs cleanup and axum
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors

//! # Heimdall Server Binary
//!
//! Starts the token, introspection, revocation, userinfo, and discovery
//! endpoints backed by `SQLite` (or memory) and a YAML client registry.

use anyhow::{Context, Result};
use clap::Parser;
use heimdall_oauth_server::{
    config::{DatabaseUrl, ServerConfig},
    crypto::{keys::RSA_KEY_SIZE, JwksManager},
    directory::Registry,
    logging,
    oauth2_server::{OAuth2AuthorizationServer, OAuth2Routes, OAuth2ServerBuilder},
    storage::{BoundedStore, InMemoryStore},
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "heimdall-server")]
#[command(about = "Heimdall - OAuth 2.0 authorization server")]
pub struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,

    /// Override database URL (`sqlite:<path>` or `memory`)
    #[arg(long)]
    database_url: Option<String>,

    /// Override the YAML client and user registry
    #[arg(long)]
    registry: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }
    if let Some(url) = args.database_url {
        config.database = DatabaseUrl::parse_url(&url)?;
    }
    if let Some(registry) = args.registry {
        config.registry_file = Some(registry);
    }

    logging::init_from_env()?;
    info!("Starting Heimdall authorization server");
    info!("{}", config.summary());

    let jwks = load_signing_keys(&config)?;

    let registry = match &config.registry_file {
        Some(path) => Registry::load(path)?,
        None => {
            warn!("No client registry configured; every client will be rejected");
            Registry::default()
        }
    };
    info!(
        clients = registry.clients.len(),
        users = registry.users.len(),
        "Client registry loaded"
    );
    let (clients, profiles) = registry.into_directories();

    let builder = OAuth2AuthorizationServer::builder()
        .clients(Arc::new(clients))
        .profiles(Arc::new(profiles))
        .jwks(Arc::new(jwks))
        .config(config.oauth2_server.clone());
    let server = Arc::new(attach_store(builder, &config).await?.build()?);

    let cleanup = server
        .cleanup()
        .clone()
        .spawn_periodic(config.cleanup_interval);

    let listener = TcpListener::bind(("0.0.0.0", config.http_port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.http_port))?;
    display_available_endpoints(&config);

    axum::serve(listener, OAuth2Routes::router(server))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    cleanup.shutdown().await;
    info!("Heimdall stopped");
    Ok(())
}

fn load_signing_keys(config: &ServerConfig) -> Result<JwksManager> {
    let mut jwks = JwksManager::new();
    let kid = &config.signing_key.key_id;

    if let Some(path) = &config.signing_key.path {
        jwks.load_active_key_file(kid, path)?;
        info!(kid = %kid, path = %path.display(), "Signing key loaded");
    } else {
        warn!(
            kid = %kid,
            "No signing key configured; generating an ephemeral key. Tokens will not survive a restart"
        );
        jwks.generate_rsa_key_pair_with_size(kid, RSA_KEY_SIZE)?;
    }
    Ok(jwks)
}

async fn attach_store(
    builder: OAuth2ServerBuilder,
    config: &ServerConfig,
) -> Result<OAuth2ServerBuilder> {
    match &config.database {
        DatabaseUrl::Memory => {
            warn!("Using the in-memory store; all grants are lost on restart");
            Ok(builder.store(Arc::new(BoundedStore::new(
                InMemoryStore::new(),
                config.store_timeout,
            ))))
        }
        #[cfg(feature = "sqlite")]
        DatabaseUrl::SQLite { url } => {
            let store = heimdall_oauth_server::storage::SqliteStore::connect(url).await?;
            Ok(builder.store(Arc::new(BoundedStore::new(store, config.store_timeout))))
        }
        #[cfg(not(feature = "sqlite"))]
        DatabaseUrl::SQLite { .. } => {
            anyhow::bail!("SQLite support is not compiled in; use DATABASE_URL=memory")
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[allow(clippy::cognitive_complexity)]
fn display_available_endpoints(config: &ServerConfig) {
    let base = config.oauth2_server.issuer_url.trim_end_matches('/');

    info!("=== Available API Endpoints ===");
    info!("   Token:         POST {base}/oauth2/token");
    info!("   Introspection: POST {base}/oauth2/introspect");
    info!("   Revocation:    POST {base}/oauth2/revoke");
    info!("   Userinfo:      GET  {base}/oauth2/userinfo");
    info!("   JWKS:          GET  {base}/.well-known/jwks.json");
    info!("   Metadata:      GET  {base}/.well-known/oauth-authorization-server");
    info!("=== End of Endpoint List ===");
}
