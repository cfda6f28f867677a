// ABOUTME: Consent record tracking the scopes a user granted to a client
// ABOUTME: One row per (user, client) pair, upserted on grant and deleted on revocation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors

use crate::scope::ScopeSet;
use chrono::{DateTime, Utc};

/// Scopes a user has granted to a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Consent {
    /// User who granted the consent
    pub user_id: String,
    /// Client the consent applies to
    pub client_id: String,
    /// Granted scopes
    pub scope: ScopeSet,
    /// When the consent was last granted
    pub granted_at: DateTime<Utc>,
}

impl Consent {
    /// Whether this consent covers every requested scope
    #[must_use]
    pub fn covers(&self, requested: &ScopeSet) -> bool {
        requested.is_subset(&self.scope)
    }
}
