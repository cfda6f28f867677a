// ABOUTME: Authorization server protocol settings: issuer identity and credential lifetimes
// ABOUTME: Shared by the code issuer, token minter, refresh rotator, and cleanup jobs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors

use chrono::Duration;
use heimdall_core::constants::lifetimes;

/// Protocol settings for the authorization server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuth2ServerConfig {
    /// Issuer identifier, used as the `iss` claim and in discovery metadata
    pub issuer_url: String,
    /// Authorization code lifetime
    pub auth_code_ttl: Duration,
    /// Access token lifetime
    pub access_token_ttl: Duration,
    /// Refresh token lifetime
    pub refresh_token_ttl: Duration,
    /// How long revoked tokens and consumed codes are kept for audit
    pub audit_retention: Duration,
}

impl Default for OAuth2ServerConfig {
    fn default() -> Self {
        Self {
            issuer_url: "http://localhost:8080".to_owned(),
            auth_code_ttl: Duration::seconds(lifetimes::AUTH_CODE_TTL_SECS),
            access_token_ttl: Duration::seconds(lifetimes::ACCESS_TOKEN_TTL_SECS),
            refresh_token_ttl: Duration::days(lifetimes::REFRESH_TOKEN_TTL_DAYS),
            audit_retention: Duration::days(lifetimes::AUDIT_RETENTION_DAYS),
        }
    }
}

impl OAuth2ServerConfig {
    /// Settings with a specific issuer and default lifetimes
    #[must_use]
    pub fn with_issuer(issuer_url: impl Into<String>) -> Self {
        Self {
            issuer_url: issuer_url.into(),
            ..Self::default()
        }
    }

    /// `expires_in` value for token responses
    #[must_use]
    pub fn access_token_expires_in(&self) -> i64 {
        self.access_token_ttl.num_seconds()
    }
}
