// ABOUTME: Token record persisted for every issued access/refresh pair
// ABOUTME: Holds only hashes of the access-token JTI and refresh value, never plaintext
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors

use crate::scope::ScopeSet;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Metadata for one issued token pair
#[derive(Debug, Clone)]
pub struct TokenRecord {
    /// Row identifier
    pub id: Uuid,
    /// SHA-256 hash of the access token's `jti`
    pub access_token_hash: String,
    /// SHA-256 hash of the refresh token value
    pub refresh_token_hash: String,
    /// Client the pair was issued to
    pub client_id: String,
    /// User the pair acts for
    pub user_id: String,
    /// Granted scopes
    pub scope: ScopeSet,
    /// Access token expiry
    pub access_expires_at: DateTime<Utc>,
    /// Refresh token expiry
    pub refresh_expires_at: DateTime<Utc>,
    /// When the pair was revoked, if ever
    pub revoked_at: Option<DateTime<Utc>>,
    /// When the pair was minted
    pub created_at: DateTime<Utc>,
}

impl TokenRecord {
    /// Whether the pair has been revoked
    #[must_use]
    pub const fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Whether the access token is usable at `now`
    #[must_use]
    pub fn access_active(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked() && now < self.access_expires_at
    }

    /// Whether the refresh token is usable at `now`
    #[must_use]
    pub fn refresh_active(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked() && now < self.refresh_expires_at
    }
}
