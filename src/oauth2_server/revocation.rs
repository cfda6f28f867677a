// ABOUTME: RFC 7009 token revocation covering the whole access/refresh pair
// ABOUTME: Unknown tokens succeed silently; token.revoked fires only on the actual transition
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors

use super::events::{emit, EventSink, OAuthEvent};
use super::introspection::TokenResolver;
use super::models::TokenTypeHint;
use crate::clock::Clock;
use crate::storage::TokenStore;
use heimdall_core::errors::OAuthResult;
use heimdall_core::models::TokenRecord;
use std::sync::Arc;

/// Revokes token pairs
#[derive(Clone)]
pub struct Revoker {
    resolver: TokenResolver,
    tokens: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
}

impl Revoker {
    /// Revoker over `resolver`
    #[must_use]
    pub fn new(
        resolver: TokenResolver,
        tokens: Arc<dyn TokenStore>,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            resolver,
            tokens,
            clock,
            events,
        }
    }

    /// Revoke the pair `token` belongs to
    ///
    /// # Errors
    /// Only storage failures
    pub async fn revoke(&self, token: &str, hint: Option<TokenTypeHint>) -> OAuthResult<()> {
        let Some(resolved) = self.resolver.resolve(token, hint).await? else {
            tracing::debug!("Revocation requested for an unknown token");
            return Ok(());
        };
        self.revoke_record(resolved.record()).await
    }

    /// Revoke on behalf of an authenticated client
    ///
    /// Tokens issued to another client are left untouched, yet the call still
    /// reports success (RFC 7009 Section 2.1).
    ///
    /// # Errors
    /// Only storage failures
    pub async fn revoke_for_client(
        &self,
        token: &str,
        hint: Option<TokenTypeHint>,
        client_id: &str,
    ) -> OAuthResult<()> {
        let Some(resolved) = self.resolver.resolve(token, hint).await? else {
            tracing::debug!(client_id, "Revocation requested for an unknown token");
            return Ok(());
        };

        let record = resolved.record();
        if record.client_id != client_id {
            tracing::warn!(
                client_id,
                owner = %record.client_id,
                token_id = %record.id,
                "Client attempted to revoke another client's token"
            );
            return Ok(());
        }
        self.revoke_record(record).await
    }

    async fn revoke_record(&self, record: &TokenRecord) -> OAuthResult<()> {
        if !self
            .tokens
            .revoke_if_active(record.id, self.clock.now())
            .await?
        {
            tracing::debug!(token_id = %record.id, "Token pair already revoked");
            return Ok(());
        }

        tracing::info!(token_id = %record.id, client_id = %record.client_id, "Token pair revoked");
        emit(
            self.events.as_ref(),
            &OAuthEvent::TokenRevoked {
                token_id: record.id,
                client_id: record.client_id.clone(),
                user_id: record.user_id.clone(),
            },
        );
        Ok(())
    }
}
