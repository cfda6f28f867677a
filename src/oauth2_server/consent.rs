// ABOUTME: Per-user, per-client consent records deciding whether a prompt can be skipped
// ABOUTME: A consent covers a request only when the requested scopes are a subset of the grant
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors

use crate::clock::Clock;
use crate::storage::ConsentStore;
use heimdall_core::errors::OAuthResult;
use heimdall_core::models::Consent;
use heimdall_core::scope::ScopeSet;
use std::sync::Arc;

/// Records and checks user consent
#[derive(Clone)]
pub struct ConsentLedger {
    consents: Arc<dyn ConsentStore>,
    clock: Arc<dyn Clock>,
}

impl ConsentLedger {
    /// Ledger over `consents`
    #[must_use]
    pub fn new(consents: Arc<dyn ConsentStore>, clock: Arc<dyn Clock>) -> Self {
        Self { consents, clock }
    }

    /// Stored consent, only if it covers every requested scope
    ///
    /// # Errors
    /// Storage failures
    pub async fn check_consent(
        &self,
        user_id: &str,
        client_id: &str,
        requested: &ScopeSet,
    ) -> OAuthResult<Option<Consent>> {
        Ok(self
            .consents
            .get_consent(user_id, client_id)
            .await?
            .filter(|consent| consent.covers(requested)))
    }

    /// Record a grant, replacing any earlier consent for the pair
    ///
    /// # Errors
    /// Storage failures
    pub async fn record_consent(
        &self,
        user_id: &str,
        client_id: &str,
        scope: ScopeSet,
    ) -> OAuthResult<Consent> {
        let consent = Consent {
            user_id: user_id.to_owned(),
            client_id: client_id.to_owned(),
            scope,
            granted_at: self.clock.now(),
        };
        self.consents.upsert_consent(&consent).await?;

        tracing::info!(user_id, client_id, scope = %consent.scope, "Consent recorded");
        Ok(consent)
    }

    /// Withdraw consent; `true` when one existed
    ///
    /// # Errors
    /// Storage failures
    pub async fn revoke_consent(&self, user_id: &str, client_id: &str) -> OAuthResult<bool> {
        let removed = self.consents.delete_consent(user_id, client_id).await?;
        if removed {
            tracing::info!(user_id, client_id, "Consent revoked");
        }
        Ok(removed)
    }

    /// Every consent the user has granted, ordered by client
    ///
    /// # Errors
    /// Storage failures
    pub async fn list_consents(&self, user_id: &str) -> OAuthResult<Vec<Consent>> {
        Ok(self.consents.list_consents(user_id).await?)
    }
}
