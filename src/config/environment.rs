// ABOUTME: Environment-based server configuration for the Heimdall binary
// ABOUTME: Parses ports, store location, signing key, lifetimes, and job intervals with validation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors

use super::oauth::OAuth2ServerConfig;
use anyhow::{bail, Context, Result};
use chrono::Duration;
use heimdall_core::constants::lifetimes;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

/// Default HTTP listen port
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Default signing key identifier
pub const DEFAULT_SIGNING_KEY_ID: &str = "heimdall-key-1";

/// Where codes, tokens, and consents are persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseUrl {
    /// Process-local maps; state is lost on restart
    Memory,
    /// SQLite connection URL (`sqlite:path` or `sqlite::memory:`)
    SQLite {
        /// Full connection URL
        url: String,
    },
}

impl DatabaseUrl {
    /// Parse a `DATABASE_URL` value
    ///
    /// # Errors
    /// Returns an error for unsupported schemes
    pub fn parse_url(s: &str) -> Result<Self> {
        if s == "memory" {
            Ok(Self::Memory)
        } else if s.starts_with("sqlite:") {
            Ok(Self::SQLite { url: s.to_owned() })
        } else {
            bail!("Unsupported DATABASE_URL '{s}': expected 'memory' or 'sqlite:<path>'")
        }
    }
}

impl Default for DatabaseUrl {
    fn default() -> Self {
        Self::SQLite {
            url: "sqlite:heimdall.db".to_owned(),
        }
    }
}

impl fmt::Display for DatabaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str("memory"),
            Self::SQLite { url } => f.write_str(url),
        }
    }
}

/// Signing key source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningKeyConfig {
    /// PKCS#8 PEM file; a key is generated at startup when absent
    pub path: Option<PathBuf>,
    /// `kid` published in the JWKS and JOSE header
    pub key_id: String,
}

/// Complete server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen port
    pub http_port: u16,
    /// Persistence backend
    pub database: DatabaseUrl,
    /// Signing key source
    pub signing_key: SigningKeyConfig,
    /// Protocol settings
    pub oauth2_server: OAuth2ServerConfig,
    /// Interval between cleanup runs
    pub cleanup_interval: std::time::Duration,
    /// Upper bound on each store call
    pub store_timeout: std::time::Duration,
    /// YAML client and user registry
    pub registry_file: Option<PathBuf>,
}

impl ServerConfig {
    /// Load configuration from process environment variables
    ///
    /// # Errors
    /// Returns an error if any variable is present but invalid
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// # Errors
    /// Returns an error if any variable is present but invalid
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let http_port: u16 = parse_var(&lookup, "HTTP_PORT", DEFAULT_HTTP_PORT)?;

        let database = match lookup("DATABASE_URL") {
            Some(url) => DatabaseUrl::parse_url(&url)?,
            None => DatabaseUrl::default(),
        };

        let auth_code_ttl_secs: i64 = parse_positive(
            &lookup,
            "HEIMDALL_AUTH_CODE_TTL_SECS",
            lifetimes::AUTH_CODE_TTL_SECS,
        )?;
        let access_token_ttl_secs: i64 = parse_positive(
            &lookup,
            "HEIMDALL_ACCESS_TOKEN_TTL_SECS",
            lifetimes::ACCESS_TOKEN_TTL_SECS,
        )?;
        let refresh_token_ttl_days: i64 = parse_positive(
            &lookup,
            "HEIMDALL_REFRESH_TOKEN_TTL_DAYS",
            lifetimes::REFRESH_TOKEN_TTL_DAYS,
        )?;
        let audit_retention_days: i64 = parse_positive(
            &lookup,
            "HEIMDALL_AUDIT_RETENTION_DAYS",
            lifetimes::AUDIT_RETENTION_DAYS,
        )?;
        let cleanup_interval_secs: u64 = parse_positive(
            &lookup,
            "HEIMDALL_CLEANUP_INTERVAL_SECS",
            lifetimes::CLEANUP_INTERVAL_SECS,
        )?;
        let store_timeout_ms: u64 = parse_positive(
            &lookup,
            "HEIMDALL_STORE_TIMEOUT_MS",
            lifetimes::STORE_TIMEOUT_MS,
        )?;

        let issuer_url = lookup("HEIMDALL_ISSUER_URL")
            .unwrap_or_else(|| format!("http://localhost:{http_port}"));

        Ok(Self {
            http_port,
            database,
            signing_key: SigningKeyConfig {
                path: lookup("HEIMDALL_SIGNING_KEY_PATH").map(PathBuf::from),
                key_id: lookup("HEIMDALL_SIGNING_KEY_ID")
                    .unwrap_or_else(|| DEFAULT_SIGNING_KEY_ID.to_owned()),
            },
            oauth2_server: OAuth2ServerConfig {
                issuer_url,
                auth_code_ttl: Duration::seconds(auth_code_ttl_secs),
                access_token_ttl: Duration::seconds(access_token_ttl_secs),
                refresh_token_ttl: Duration::days(refresh_token_ttl_days),
                audit_retention: Duration::days(audit_retention_days),
            },
            cleanup_interval: std::time::Duration::from_secs(cleanup_interval_secs),
            store_timeout: std::time::Duration::from_millis(store_timeout_ms),
            registry_file: lookup("HEIMDALL_REGISTRY_FILE").map(PathBuf::from),
        })
    }

    /// One-line summary safe to log at startup
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "port={} database={} issuer={} key_id={} code_ttl={}s access_ttl={}s refresh_ttl={}d",
            self.http_port,
            self.database,
            self.oauth2_server.issuer_url,
            self.signing_key.key_id,
            self.oauth2_server.auth_code_ttl.num_seconds(),
            self.oauth2_server.access_token_ttl.num_seconds(),
            self.oauth2_server.refresh_token_ttl.num_days(),
        )
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse()
            .with_context(|| format!("Invalid value for {key}: '{raw}'"))
    })
}

fn parse_positive<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr + PartialOrd + Default,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = parse_var(lookup, key, default)?;
    if value <= T::default() {
        bail!("{key} must be greater than zero");
    }
    Ok(value)
}
