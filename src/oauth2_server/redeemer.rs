// ABOUTME: Single-use redemption of authorization codes with client, redirect, and PKCE binding
// ABOUTME: Every failure cause collapses into invalid_grant; the specific reason is only logged
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors

use crate::clock::Clock;
use crate::crypto::{hash_secret, pkce};
use crate::storage::AuthorizationCodeStore;
use heimdall_core::errors::{OAuthError, OAuthResult};
use heimdall_core::models::AuthorizationCode;
use heimdall_core::scope::ScopeSet;
use std::sync::Arc;

pub(crate) const INVALID_CODE: &str = "Invalid or expired authorization code";

/// What a redeemed code grants
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemedGrant {
    /// Client the code was issued to
    pub client_id: String,
    /// Resource owner
    pub user_id: String,
    /// Granted scopes
    pub scope: ScopeSet,
}

/// Exchanges authorization codes exactly once
#[derive(Clone)]
pub struct AuthorizationCodeRedeemer {
    codes: Arc<dyn AuthorizationCodeStore>,
    clock: Arc<dyn Clock>,
}

impl AuthorizationCodeRedeemer {
    /// Redeemer over `codes`
    #[must_use]
    pub fn new(codes: Arc<dyn AuthorizationCodeStore>, clock: Arc<dyn Clock>) -> Self {
        Self { codes, clock }
    }

    /// Redeem `code` for the client and redirect URI it was issued to
    ///
    /// Nothing is marked consumed unless every check passes. Among concurrent
    /// redeemers of the same code only the one whose conditional update lands
    /// succeeds.
    ///
    /// # Errors
    /// `invalid_grant` for any unusable code, storage errors otherwise
    pub async fn redeem(
        &self,
        code: &str,
        client_id: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
    ) -> OAuthResult<RedeemedGrant> {
        let code_hash = hash_secret(code);
        let Some(record) = self.codes.find_code(&code_hash).await? else {
            tracing::warn!(client_id, "Authorization code not found");
            return Err(OAuthError::invalid_grant(INVALID_CODE));
        };

        let now = self.clock.now();
        Self::check_binding(&record, client_id, redirect_uri, code_verifier, now)?;

        if !self.codes.mark_code_consumed(&code_hash, now).await? {
            tracing::warn!(client_id, user_id = %record.user_id, "Authorization code consumed by a concurrent redemption");
            return Err(OAuthError::invalid_grant(INVALID_CODE));
        }

        tracing::info!(client_id, user_id = %record.user_id, scope = %record.scope, "Authorization code redeemed");

        Ok(RedeemedGrant {
            client_id: record.client_id,
            user_id: record.user_id,
            scope: record.scope,
        })
    }

    fn check_binding(
        record: &AuthorizationCode,
        client_id: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
        now: chrono::DateTime<chrono::Utc>,
    ) -> OAuthResult<()> {
        let reject = |reason: &str| {
            tracing::warn!(client_id, user_id = %record.user_id, reason, "Authorization code rejected");
            OAuthError::invalid_grant(INVALID_CODE)
        };

        if record.is_consumed() {
            return Err(reject("already used"));
        }
        if record.is_expired(now) {
            return Err(reject("expired"));
        }
        if record.client_id != client_id {
            return Err(reject("client mismatch"));
        }
        if record.redirect_uri != redirect_uri {
            return Err(reject("redirect_uri mismatch"));
        }

        match (&record.pkce, code_verifier) {
            (Some(challenge), Some(verifier)) => {
                if !pkce::verify(challenge, verifier) {
                    tracing::warn!(client_id, user_id = %record.user_id, "PKCE verification failed");
                    return Err(OAuthError::security("PKCE verification failed"));
                }
            }
            (Some(_), None) => return Err(reject("code_verifier missing")),
            (None, Some(_)) => return Err(reject("code_verifier supplied without a stored challenge")),
            (None, None) => {}
        }

        Ok(())
    }
}
