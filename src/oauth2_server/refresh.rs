// ABOUTME: Refresh token rotation with narrowing-only scope changes
// ABOUTME: The predecessor is revoked by conditional update before its successor is minted
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors

use super::events::{emit, EventSink, OAuthEvent};
use super::minter::TokenMinter;
use super::models::TokenResponse;
use crate::clock::Clock;
use crate::crypto::{has_secret_format, hash_secret};
use crate::directory::UserProfileProvider;
use crate::storage::TokenStore;
use heimdall_core::constants::tokens::REFRESH_TOKEN_PREFIX;
use heimdall_core::errors::{OAuthError, OAuthResult};
use heimdall_core::scope::ScopeSet;
use std::sync::Arc;

const INVALID_REFRESH: &str = "Invalid or expired refresh token";

/// Exchanges a refresh token for a new pair, exactly once
#[derive(Clone)]
pub struct RefreshRotator {
    tokens: Arc<dyn TokenStore>,
    profiles: Arc<dyn UserProfileProvider>,
    minter: TokenMinter,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
}

impl RefreshRotator {
    /// Rotator minting successors with `minter`
    #[must_use]
    pub fn new(
        tokens: Arc<dyn TokenStore>,
        profiles: Arc<dyn UserProfileProvider>,
        minter: TokenMinter,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            tokens,
            profiles,
            minter,
            clock,
            events,
        }
    }

    /// Rotate `refresh_token`, optionally narrowing the granted scope
    ///
    /// Once the predecessor is revoked it stays revoked even if minting the
    /// successor fails.
    ///
    /// # Errors
    /// `invalid_grant` for an unusable token or a lost rotation race,
    /// `invalid_scope` for a malformed or broadened scope, storage and
    /// signing failures otherwise
    pub async fn rotate(
        &self,
        refresh_token: &str,
        client_id: &str,
        requested_scope: Option<&str>,
    ) -> OAuthResult<TokenResponse> {
        if !has_secret_format(refresh_token, REFRESH_TOKEN_PREFIX) {
            tracing::warn!(client_id, "Refresh token has an unexpected format");
            return Err(OAuthError::invalid_grant(INVALID_REFRESH));
        }

        let Some(record) = self
            .tokens
            .find_by_refresh_hash(&hash_secret(refresh_token))
            .await?
        else {
            tracing::warn!(client_id, "Refresh token not found");
            return Err(OAuthError::invalid_grant(INVALID_REFRESH));
        };

        let now = self.clock.now();
        if !record.refresh_active(now) {
            tracing::warn!(
                client_id,
                token_id = %record.id,
                revoked = record.is_revoked(),
                "Refresh token is revoked or expired"
            );
            return Err(OAuthError::invalid_grant(INVALID_REFRESH));
        }
        if record.client_id != client_id {
            tracing::warn!(client_id, token_id = %record.id, "Refresh token presented by another client");
            return Err(OAuthError::invalid_grant(INVALID_REFRESH));
        }

        let scope = match requested_scope.filter(|raw| !raw.trim().is_empty()) {
            Some(raw) => {
                let narrowed =
                    ScopeSet::parse(raw).map_err(|e| OAuthError::invalid_scope(e.to_string()))?;
                if !narrowed.is_subset(&record.scope) {
                    return Err(OAuthError::invalid_scope(
                        "Requested scope exceeds the original grant",
                    ));
                }
                narrowed
            }
            None => record.scope.clone(),
        };

        let Some(profile) = self.profiles.get(&record.user_id).await? else {
            tracing::warn!(client_id, user_id = %record.user_id, "Refresh for a user without a profile");
            return Err(OAuthError::invalid_grant(INVALID_REFRESH));
        };

        if !self.tokens.revoke_if_active(record.id, now).await? {
            tracing::warn!(client_id, token_id = %record.id, "Refresh token rotated by a concurrent request");
            return Err(OAuthError::invalid_grant(INVALID_REFRESH));
        }

        tracing::info!(client_id, token_id = %record.id, "Refresh token rotated out");
        emit(
            self.events.as_ref(),
            &OAuthEvent::TokenRevoked {
                token_id: record.id,
                client_id: record.client_id.clone(),
                user_id: record.user_id.clone(),
            },
        );

        self.minter
            .mint(&record.client_id, &record.user_id, &scope, Some(&profile))
            .await
    }
}
