// ABOUTME: Main library entry point for the Heimdall OAuth 2.0 authorization server
// ABOUTME: Exposes the protocol services, stores, configuration, and HTTP routes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors

#![deny(unsafe_code)]

//! # Heimdall
//!
//! The protocol core of an OAuth 2.0 authorization server: authorization code
//! grant with PKCE (RFC 7636), RS256 JWT access tokens, rotating opaque
//! refresh tokens, introspection (RFC 7662), revocation (RFC 7009), and a
//! consent ledger.
//!
//! ## Architecture
//!
//! - **`oauth2_server`**: stateless services (validator, issuer, redeemer,
//!   minter, rotator, introspector, revoker, consent ledger, cleanup) behind
//!   the [`oauth2_server::OAuth2AuthorizationServer`] facade and axum routes
//! - **storage**: store traits with in-memory and `SQLite` implementations
//! - **directory**: the client directory and user profile provider consumed
//!   by the engine
//! - **crypto**: secrets, PKCE, and RS256 key management
//! - **config** / **logging** / **clock**: ambient wiring
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use heimdall_oauth_server::config::OAuth2ServerConfig;
//! use heimdall_oauth_server::crypto::JwksManager;
//! use heimdall_oauth_server::directory::{StaticClientDirectory, StaticProfileProvider};
//! use heimdall_oauth_server::oauth2_server::OAuth2AuthorizationServer;
//! use heimdall_oauth_server::storage::InMemoryStore;
//! use std::sync::Arc;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut jwks = JwksManager::new();
//! jwks.generate_rsa_key_pair_with_size("key-1", 2048)?;
//!
//! let server = OAuth2AuthorizationServer::builder()
//!     .store(Arc::new(InMemoryStore::new()))
//!     .clients(Arc::new(StaticClientDirectory::new()))
//!     .profiles(Arc::new(StaticProfileProvider::new()))
//!     .jwks(Arc::new(jwks))
//!     .config(OAuth2ServerConfig::with_issuer("https://auth.example.com"))
//!     .build()?;
//!
//! println!("issuer: {}", server.metadata().issuer);
//! # Ok(())
//! # }
//! ```

/// Injectable time source
pub mod clock;

/// Environment and protocol configuration
pub mod config;

/// Secrets, PKCE, and signing keys
pub mod crypto;

/// Client directory and user profile provider interfaces
pub mod directory;

/// Structured logging setup
pub mod logging;

/// OAuth 2.0 authorization server services and routes
pub mod oauth2_server;

/// Code, token, and consent persistence
pub mod storage;

pub use heimdall_core::errors;
pub use heimdall_core::{constants, models, scope};
