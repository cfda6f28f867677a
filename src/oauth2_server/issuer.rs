// ABOUTME: Authorization code issuance with independent re-validation and tenant isolation
// ABOUTME: Persists only the SHA-256 hash of each code and publishes code.issued
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors

use super::events::{emit, EventSink, OAuthEvent};
use super::validator::check_scope_allowed;
use crate::clock::Clock;
use crate::crypto::{generate_prefixed_secret, hash_secret};
use crate::directory::{ClientDirectory, UserProfileProvider};
use crate::storage::AuthorizationCodeStore;
use chrono::{DateTime, Duration, Utc};
use heimdall_core::constants::tokens::AUTH_CODE_PREFIX;
use heimdall_core::errors::{OAuthError, OAuthResult};
use heimdall_core::models::{AuthorizationCode, ClientRecord, PkceChallenge};
use heimdall_core::scope::ScopeSet;
use serde::Serialize;
use std::sync::Arc;

/// Parameters for issuing a code to an authenticated user
#[derive(Debug, Clone)]
pub struct IssueCodeRequest {
    /// Client the code is issued to
    pub client_id: String,
    /// Authenticated resource owner
    pub user_id: String,
    /// Redirect URI the code is bound to
    pub redirect_uri: String,
    /// Scopes the user granted
    pub scope: ScopeSet,
    /// Optional PKCE binding
    pub pkce: Option<PkceChallenge>,
}

/// Freshly issued code; the plaintext exists only here
#[derive(Debug, Clone, Serialize)]
pub struct IssuedCode {
    /// Authorization code value
    pub code: String,
    /// Code expiry
    pub expires_at: DateTime<Utc>,
}

/// Issues single-use authorization codes
#[derive(Clone)]
pub struct AuthorizationCodeIssuer {
    clients: Arc<dyn ClientDirectory>,
    profiles: Arc<dyn UserProfileProvider>,
    codes: Arc<dyn AuthorizationCodeStore>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
    ttl: Duration,
}

impl AuthorizationCodeIssuer {
    /// Issuer with a code lifetime of `ttl`
    #[must_use]
    pub fn new(
        clients: Arc<dyn ClientDirectory>,
        profiles: Arc<dyn UserProfileProvider>,
        codes: Arc<dyn AuthorizationCodeStore>,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventSink>,
        ttl: Duration,
    ) -> Self {
        Self {
            clients,
            profiles,
            codes,
            clock,
            events,
            ttl,
        }
    }

    /// Issue a code after re-checking the client, redirect URI, scopes, PKCE
    /// requirement, and tenant of the user
    ///
    /// # Errors
    /// `invalid_client` for an unknown or inactive client, `invalid_request`
    /// for a redirect, PKCE, or tenant problem, `invalid_scope` for scopes the
    /// client may not request, and storage or RNG failures
    pub async fn issue(&self, request: IssueCodeRequest) -> OAuthResult<IssuedCode> {
        let client = self.resolve_client(&request).await?;
        self.check_tenant(&client, &request.user_id).await?;

        let code = generate_prefixed_secret(AUTH_CODE_PREFIX)?;
        let now = self.clock.now();
        let expires_at = now + self.ttl;

        let record = AuthorizationCode {
            code_hash: hash_secret(&code),
            client_id: request.client_id,
            user_id: request.user_id,
            redirect_uri: request.redirect_uri,
            scope: request.scope,
            pkce: request.pkce,
            created_at: now,
            expires_at,
            consumed_at: None,
        };
        self.codes.insert_code(&record).await?;

        tracing::info!(
            client_id = %record.client_id,
            user_id = %record.user_id,
            scope = %record.scope,
            %expires_at,
            "Authorization code issued"
        );
        emit(
            self.events.as_ref(),
            &OAuthEvent::CodeIssued {
                client_id: record.client_id,
                user_id: record.user_id,
                expires_at,
            },
        );

        Ok(IssuedCode { code, expires_at })
    }

    async fn resolve_client(&self, request: &IssueCodeRequest) -> OAuthResult<ClientRecord> {
        let client = self
            .clients
            .get_by_id(&request.client_id)
            .await?
            .filter(ClientRecord::is_active)
            .ok_or_else(|| OAuthError::invalid_client("Unknown or inactive client"))?;

        if !self
            .clients
            .is_redirect_uri_allowed(&client.client_id, &request.redirect_uri)
            .await?
        {
            return Err(OAuthError::invalid_request("Invalid redirect_uri"));
        }

        if request.scope.is_empty() {
            return Err(OAuthError::invalid_scope("scope must contain at least one value"));
        }
        check_scope_allowed(&client, &request.scope)?;

        if request
            .pkce
            .as_ref()
            .is_some_and(|pkce| pkce.challenge.is_empty())
        {
            return Err(OAuthError::invalid_request("code_challenge must not be empty"));
        }
        if client.require_pkce && request.pkce.is_none() {
            return Err(OAuthError::invalid_request(
                "code_challenge is required for this client (PKCE)",
            ));
        }

        Ok(client)
    }

    async fn check_tenant(&self, client: &ClientRecord, user_id: &str) -> OAuthResult<()> {
        let Some(profile) = self.profiles.get(user_id).await? else {
            tracing::warn!(client_id = %client.client_id, user_id, "Code requested for unknown user");
            return Err(OAuthError::invalid_request("Unknown user"));
        };

        if profile.tenant_id != client.tenant_id {
            tracing::warn!(
                client_id = %client.client_id,
                user_id,
                client_tenant = %client.tenant_id,
                user_tenant = %profile.tenant_id,
                "Tenant mismatch between user and client"
            );
            return Err(OAuthError::invalid_request(
                "User does not belong to the client's tenant",
            ));
        }
        Ok(())
    }
}
