// ABOUTME: RFC 7662 token introspection and the token lookup shared with revocation
// ABOUTME: Any unusable token reports {"active": false}; no input token causes an error
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors

use super::minter::{AccessTokenClaims, TokenMinter};
use super::models::{IntrospectionResponse, TokenTypeHint};
use crate::clock::Clock;
use crate::crypto::{has_secret_format, hash_secret};
use crate::storage::TokenStore;
use heimdall_core::constants::tokens::{REFRESH_TOKEN_PREFIX, TOKEN_TYPE_BEARER};
use heimdall_core::errors::OAuthResult;
use heimdall_core::models::TokenRecord;
use std::sync::Arc;

/// A presented token matched to its stored record
#[derive(Debug, Clone)]
pub enum ResolvedToken {
    /// Signed access token and the record keyed by its `jti`
    Access {
        /// Record of the pair
        record: TokenRecord,
        /// Verified claims (expiry not yet checked)
        claims: Box<AccessTokenClaims>,
    },
    /// Opaque refresh token and its record
    Refresh {
        /// Record of the pair
        record: TokenRecord,
    },
}

impl ResolvedToken {
    /// Record of the pair the token belongs to
    #[must_use]
    pub const fn record(&self) -> &TokenRecord {
        match self {
            Self::Access { record, .. } | Self::Refresh { record } => record,
        }
    }
}

/// Finds the record behind an access or refresh token
#[derive(Clone)]
pub struct TokenResolver {
    minter: TokenMinter,
    tokens: Arc<dyn TokenStore>,
}

impl TokenResolver {
    /// Resolver verifying access tokens with `minter`
    #[must_use]
    pub fn new(minter: TokenMinter, tokens: Arc<dyn TokenStore>) -> Self {
        Self { minter, tokens }
    }

    /// Resolve `token`, trying the hinted or prefix-implied type first and
    /// falling back to the other type
    ///
    /// # Errors
    /// Only storage failures; unknown or malformed tokens resolve to `None`
    pub async fn resolve(
        &self,
        token: &str,
        hint: Option<TokenTypeHint>,
    ) -> OAuthResult<Option<ResolvedToken>> {
        let refresh_first = match hint {
            Some(TokenTypeHint::RefreshToken) => true,
            Some(TokenTypeHint::AccessToken) => false,
            None => token.starts_with(REFRESH_TOKEN_PREFIX),
        };

        if refresh_first {
            if let Some(found) = self.resolve_refresh(token).await? {
                return Ok(Some(found));
            }
            self.resolve_access(token).await
        } else {
            if let Some(found) = self.resolve_access(token).await? {
                return Ok(Some(found));
            }
            self.resolve_refresh(token).await
        }
    }

    async fn resolve_access(&self, token: &str) -> OAuthResult<Option<ResolvedToken>> {
        let claims = match self.minter.decode_access_token(token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!("Presented token is not a valid access token: {e}");
                return Ok(None);
            }
        };

        Ok(self
            .tokens
            .find_by_access_hash(&hash_secret(&claims.jti))
            .await?
            .map(|record| ResolvedToken::Access {
                record,
                claims: Box::new(claims),
            }))
    }

    async fn resolve_refresh(&self, token: &str) -> OAuthResult<Option<ResolvedToken>> {
        if !has_secret_format(token, REFRESH_TOKEN_PREFIX) {
            return Ok(None);
        }

        Ok(self
            .tokens
            .find_by_refresh_hash(&hash_secret(token))
            .await?
            .map(|record| ResolvedToken::Refresh { record }))
    }
}

/// Answers whether a token is currently active (RFC 7662)
#[derive(Clone)]
pub struct Introspector {
    resolver: TokenResolver,
    clock: Arc<dyn Clock>,
}

impl Introspector {
    /// Introspector over `resolver`
    #[must_use]
    pub fn new(resolver: TokenResolver, clock: Arc<dyn Clock>) -> Self {
        Self { resolver, clock }
    }

    /// Describe `token`
    ///
    /// # Errors
    /// Only storage failures
    pub async fn introspect(
        &self,
        token: &str,
        hint: Option<TokenTypeHint>,
    ) -> OAuthResult<IntrospectionResponse> {
        let Some(resolved) = self.resolver.resolve(token, hint).await? else {
            return Ok(IntrospectionResponse::inactive());
        };

        let now = self.clock.now();
        let (record, exp, iat) = match &resolved {
            ResolvedToken::Access { record, claims } => {
                if claims.exp <= now.timestamp() || !record.access_active(now) {
                    return Ok(IntrospectionResponse::inactive());
                }
                (record, claims.exp, claims.iat)
            }
            ResolvedToken::Refresh { record } => {
                if !record.refresh_active(now) {
                    return Ok(IntrospectionResponse::inactive());
                }
                (
                    record,
                    record.refresh_expires_at.timestamp(),
                    record.created_at.timestamp(),
                )
            }
        };

        tracing::debug!(token_id = %record.id, client_id = %record.client_id, "Token introspected as active");

        Ok(IntrospectionResponse {
            active: true,
            scope: Some(record.scope.to_string()),
            client_id: Some(record.client_id.clone()),
            username: Some(record.user_id.clone()),
            token_type: Some(TOKEN_TYPE_BEARER.to_owned()),
            exp: Some(exp),
            iat: Some(iat),
            sub: Some(record.user_id.clone()),
        })
    }
}
