// ABOUTME: Authorization code persistence model with PKCE binding and single-use state
// ABOUTME: Stores only the hash of the code; consumed_at is written at most once
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors

use crate::constants::protocol::{PKCE_METHOD_PLAIN, PKCE_METHOD_S256};
use crate::scope::ScopeSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// PKCE code challenge method (RFC 7636 Section 4.2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PkceMethod {
    /// `BASE64URL(SHA256(code_verifier))`
    #[serde(rename = "S256")]
    S256,
    /// Challenge equals the verifier
    #[serde(rename = "plain")]
    Plain,
}

impl PkceMethod {
    /// Wire name of the method
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::S256 => PKCE_METHOD_S256,
            Self::Plain => PKCE_METHOD_PLAIN,
        }
    }
}

impl fmt::Display for PkceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PkceMethod {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            PKCE_METHOD_S256 => Ok(Self::S256),
            PKCE_METHOD_PLAIN => Ok(Self::Plain),
            other => Err(format!("unsupported code_challenge_method '{other}'")),
        }
    }
}

/// Challenge bound to an authorization code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceChallenge {
    /// Challenge value as sent by the client
    pub challenge: String,
    /// How the verifier is transformed before comparison
    pub method: PkceMethod,
}

/// A single grant in progress
#[derive(Debug, Clone)]
pub struct AuthorizationCode {
    /// SHA-256 hash of the code value (the plaintext is never stored)
    pub code_hash: String,
    /// Client the code was issued to
    pub client_id: String,
    /// User who authorized the client
    pub user_id: String,
    /// Redirect URI that must be repeated verbatim at redemption
    pub redirect_uri: String,
    /// Scopes granted by the user
    pub scope: ScopeSet,
    /// Optional PKCE binding
    pub pkce: Option<PkceChallenge>,
    /// When the code was issued
    pub created_at: DateTime<Utc>,
    /// When the code stops being redeemable
    pub expires_at: DateTime<Utc>,
    /// When the code was redeemed, if ever
    pub consumed_at: Option<DateTime<Utc>>,
}

impl AuthorizationCode {
    /// Whether the code is past its expiry at `now`
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether the code has already been redeemed
    #[must_use]
    pub const fn is_consumed(&self) -> bool {
        self.consumed_at.is_some()
    }
}
