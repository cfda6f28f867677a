// ABOUTME: Client registration record as resolved from the external client directory
// ABOUTME: Carries redirect URIs, allowed scopes, PKCE requirement, tenant, and status
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors

use crate::scope::ScopeSet;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a registered client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    /// Client may request authorization
    Active,
    /// Client has been suspended by an operator
    Suspended,
    /// Client registration was withdrawn
    Revoked,
}

/// Registered OAuth client
#[derive(Debug, Clone)]
pub struct ClientRecord {
    /// OAuth `client_id`
    pub client_id: String,
    /// Tenant owning the client
    pub tenant_id: String,
    /// Exact redirect URIs registered for the client
    pub redirect_uris: Vec<String>,
    /// Scopes the client may request
    pub allowed_scopes: ScopeSet,
    /// Whether authorization requests must carry a PKCE challenge
    pub require_pkce: bool,
    /// Registration status
    pub status: ClientStatus,
}

impl ClientRecord {
    /// Whether the client may currently take part in authorization
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == ClientStatus::Active
    }

    /// Exact, case-sensitive redirect URI match
    #[must_use]
    pub fn has_redirect_uri(&self, redirect_uri: &str) -> bool {
        self.redirect_uris.iter().any(|uri| uri == redirect_uri)
    }
}
