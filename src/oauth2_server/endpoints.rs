// ABOUTME: Authorization server facade wiring the protocol services behind endpoint-shaped calls
// ABOUTME: Handles client authentication, grant dispatch, userinfo, JWKS, and discovery metadata
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors

use super::cleanup::TokenCleanup;
use super::consent::ConsentLedger;
use super::events::{EventSink, TracingEventSink};
use super::introspection::{Introspector, TokenResolver};
use super::issuer::{AuthorizationCodeIssuer, IssueCodeRequest};
use super::minter::{IdentityClaims, TokenMinter};
use super::models::{
    AuthorizationServerMetadata, AuthorizeRequest, AuthorizeResponse, IntrospectionRequest,
    IntrospectionResponse, RevocationRequest, TokenRequest, TokenResponse, TokenTypeHint,
    UserInfoResponse,
};
use super::redeemer::{AuthorizationCodeRedeemer, INVALID_CODE};
use super::refresh::RefreshRotator;
use super::revocation::Revoker;
use super::validator::AuthorizationRequestValidator;
use crate::clock::{Clock, SystemClock};
use crate::config::OAuth2ServerConfig;
use crate::crypto::{hash_secret, JsonWebKeySet, JwksManager};
use crate::directory::{ClientDirectory, UserProfileProvider};
use crate::storage::{AuthorizationCodeStore, ConsentStore, OAuthStore, TokenStore};
use anyhow::{anyhow, Result};
use heimdall_core::constants::protocol;
use heimdall_core::errors::{OAuthError, OAuthResult};
use heimdall_core::models::ClientRecord;
use std::sync::Arc;

/// OAuth 2.0 authorization server
///
/// Stateless apart from the injected collaborators; clones share them.
#[derive(Clone)]
pub struct OAuth2AuthorizationServer {
    clients: Arc<dyn ClientDirectory>,
    profiles: Arc<dyn UserProfileProvider>,
    tokens: Arc<dyn TokenStore>,
    jwks: Arc<JwksManager>,
    config: Arc<OAuth2ServerConfig>,
    validator: AuthorizationRequestValidator,
    issuer: AuthorizationCodeIssuer,
    redeemer: AuthorizationCodeRedeemer,
    minter: TokenMinter,
    rotator: RefreshRotator,
    introspector: Introspector,
    revoker: Revoker,
    consent: ConsentLedger,
    cleanup: TokenCleanup,
}

/// Collects the collaborators of an [`OAuth2AuthorizationServer`]
pub struct OAuth2ServerBuilder {
    codes: Option<Arc<dyn AuthorizationCodeStore>>,
    tokens: Option<Arc<dyn TokenStore>>,
    consents: Option<Arc<dyn ConsentStore>>,
    clients: Option<Arc<dyn ClientDirectory>>,
    profiles: Option<Arc<dyn UserProfileProvider>>,
    jwks: Option<Arc<JwksManager>>,
    config: OAuth2ServerConfig,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
}

impl Default for OAuth2ServerBuilder {
    fn default() -> Self {
        Self {
            codes: None,
            tokens: None,
            consents: None,
            clients: None,
            profiles: None,
            jwks: None,
            config: OAuth2ServerConfig::default(),
            clock: Arc::new(SystemClock),
            events: Arc::new(TracingEventSink),
        }
    }
}

impl OAuth2ServerBuilder {
    /// Use one store for codes, tokens, and consents
    #[must_use]
    pub fn store<S: OAuthStore + 'static>(mut self, store: Arc<S>) -> Self {
        self.codes = Some(store.clone());
        self.tokens = Some(store.clone());
        self.consents = Some(store);
        self
    }

    /// Client directory
    #[must_use]
    pub fn clients(mut self, clients: Arc<dyn ClientDirectory>) -> Self {
        self.clients = Some(clients);
        self
    }

    /// User profile provider
    #[must_use]
    pub fn profiles(mut self, profiles: Arc<dyn UserProfileProvider>) -> Self {
        self.profiles = Some(profiles);
        self
    }

    /// Signing keys; one must be active
    #[must_use]
    pub fn jwks(mut self, jwks: Arc<JwksManager>) -> Self {
        self.jwks = Some(jwks);
        self
    }

    /// Issuer and lifetimes
    #[must_use]
    pub fn config(mut self, config: OAuth2ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Time source (defaults to the system clock)
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Event observer (defaults to logging events)
    #[must_use]
    pub fn events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Wire the services
    ///
    /// # Errors
    /// Returns error if a collaborator is missing or no signing key is active
    pub fn build(self) -> Result<OAuth2AuthorizationServer> {
        let codes = self.codes.ok_or_else(|| anyhow!("store is required"))?;
        let tokens = self.tokens.ok_or_else(|| anyhow!("store is required"))?;
        let consents = self.consents.ok_or_else(|| anyhow!("store is required"))?;
        let clients = self
            .clients
            .ok_or_else(|| anyhow!("client directory is required"))?;
        let profiles = self
            .profiles
            .ok_or_else(|| anyhow!("user profile provider is required"))?;
        let jwks = self.jwks.ok_or_else(|| anyhow!("signing keys are required"))?;
        let active_kid = jwks.get_active_key()?.kid.clone();

        let config = Arc::new(self.config);
        let clock = self.clock;
        let events = self.events;

        let minter = TokenMinter::new(
            jwks.clone(),
            tokens.clone(),
            clock.clone(),
            events.clone(),
            config.clone(),
        );
        let resolver = TokenResolver::new(minter.clone(), tokens.clone());

        tracing::info!(
            issuer = %config.issuer_url,
            kid = %active_kid,
            "OAuth 2.0 authorization server initialized"
        );

        Ok(OAuth2AuthorizationServer {
            validator: AuthorizationRequestValidator::new(clients.clone()),
            issuer: AuthorizationCodeIssuer::new(
                clients.clone(),
                profiles.clone(),
                codes.clone(),
                clock.clone(),
                events.clone(),
                config.auth_code_ttl,
            ),
            redeemer: AuthorizationCodeRedeemer::new(codes.clone(), clock.clone()),
            rotator: RefreshRotator::new(
                tokens.clone(),
                profiles.clone(),
                minter.clone(),
                clock.clone(),
                events.clone(),
            ),
            introspector: Introspector::new(resolver.clone(), clock.clone()),
            revoker: Revoker::new(resolver, tokens.clone(), clock.clone(), events),
            consent: ConsentLedger::new(consents, clock.clone()),
            cleanup: TokenCleanup::new(codes, tokens.clone(), clock, config.audit_retention),
            minter,
            clients,
            profiles,
            tokens,
            jwks,
            config,
        })
    }
}

impl OAuth2AuthorizationServer {
    /// Start wiring a server
    #[must_use]
    pub fn builder() -> OAuth2ServerBuilder {
        OAuth2ServerBuilder::default()
    }

    /// Authorization step for an already authenticated user
    ///
    /// Validates the request, issues a code, and reports whether stored
    /// consent already covers the requested scopes.
    ///
    /// # Errors
    /// Any validation or issuance failure
    pub async fn authorize(
        &self,
        request: &AuthorizeRequest,
        user_id: &str,
    ) -> OAuthResult<AuthorizeResponse> {
        let validated = self.validator.validate(request).await?;

        let issued = self
            .issuer
            .issue(IssueCodeRequest {
                client_id: validated.client.client_id.clone(),
                user_id: user_id.to_owned(),
                redirect_uri: validated.redirect_uri.clone(),
                scope: validated.scope.clone(),
                pkce: validated.pkce,
            })
            .await?;

        let consent_granted = self
            .consent
            .check_consent(user_id, &validated.client.client_id, &validated.scope)
            .await?
            .is_some();

        Ok(AuthorizeResponse {
            code: issued.code,
            expires_at: issued.expires_at,
            state: validated.state,
            redirect_uri: validated.redirect_uri,
            scope: validated.scope.to_string(),
            consent_granted,
        })
    }

    /// Verify client credentials presented to the token, introspection, or
    /// revocation endpoint
    ///
    /// # Errors
    /// `invalid_client` when the client is missing, unknown, inactive, or
    /// presents the wrong secret
    pub async fn authenticate_client(
        &self,
        client_id: Option<&str>,
        client_secret: Option<&str>,
    ) -> OAuthResult<ClientRecord> {
        let client_id = client_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| OAuthError::invalid_client("Client authentication required"))?;

        let client = self
            .clients
            .authenticate(client_id, client_secret)
            .await?
            .filter(ClientRecord::is_active)
            .ok_or_else(|| {
                tracing::warn!(client_id, "Client authentication failed");
                OAuthError::invalid_client("Client authentication failed")
            })?;
        Ok(client)
    }

    /// Token endpoint (RFC 6749 Sections 4.1.3 and 6)
    ///
    /// # Errors
    /// `invalid_client`, `invalid_request`, `unsupported_grant_type`,
    /// `invalid_grant`, `invalid_scope`, or server errors
    pub async fn token(&self, request: TokenRequest) -> OAuthResult<TokenResponse> {
        let client = self
            .authenticate_client(request.client_id.as_deref(), request.client_secret.as_deref())
            .await?;

        match request.grant_type.as_str() {
            protocol::GRANT_TYPE_AUTHORIZATION_CODE => {
                self.handle_authorization_code_grant(&client, &request).await
            }
            protocol::GRANT_TYPE_REFRESH_TOKEN => {
                let refresh_token = required(request.refresh_token.as_deref(), "refresh_token")?;
                self.rotator
                    .rotate(refresh_token, &client.client_id, request.scope.as_deref())
                    .await
            }
            "" => Err(OAuthError::invalid_request("Missing grant_type")),
            other => {
                tracing::warn!(client_id = %client.client_id, grant_type = other, "Unsupported grant type");
                Err(OAuthError::unsupported_grant_type(format!(
                    "grant_type '{other}' is not supported"
                )))
            }
        }
    }

    async fn handle_authorization_code_grant(
        &self,
        client: &ClientRecord,
        request: &TokenRequest,
    ) -> OAuthResult<TokenResponse> {
        let code = required(request.code.as_deref(), "code")?;
        let redirect_uri = required(request.redirect_uri.as_deref(), "redirect_uri")?;

        let grant = self
            .redeemer
            .redeem(
                code,
                &client.client_id,
                redirect_uri,
                request.code_verifier.as_deref(),
            )
            .await?;

        let Some(profile) = self.profiles.get(&grant.user_id).await? else {
            tracing::warn!(client_id = %client.client_id, user_id = %grant.user_id, "Redeemed code for a user without a profile");
            return Err(OAuthError::invalid_grant(INVALID_CODE));
        };

        self.minter
            .mint(&grant.client_id, &grant.user_id, &grant.scope, Some(&profile))
            .await
    }

    /// Introspection endpoint for an authenticated caller (RFC 7662)
    ///
    /// Confidential callers may introspect any token. A public caller gets
    /// `{"active": false}` for tokens issued to another client.
    ///
    /// # Errors
    /// `invalid_client` for bad caller credentials, server errors otherwise
    pub async fn introspect(
        &self,
        request: &IntrospectionRequest,
    ) -> OAuthResult<IntrospectionResponse> {
        let caller = self
            .authenticate_client(request.client_id.as_deref(), request.client_secret.as_deref())
            .await?;

        tracing::debug!(client_id = %caller.client_id, "Introspection request");
        let response = self
            .introspector
            .introspect(
                &request.token,
                TokenTypeHint::parse(request.token_type_hint.as_deref()),
            )
            .await?;

        // Public callers only see tokens issued to themselves
        if response.active
            && response.client_id.as_deref() != Some(caller.client_id.as_str())
            && !self.clients.is_confidential(&caller.client_id).await?
        {
            tracing::warn!(client_id = %caller.client_id, "Public client introspected a token issued to another client");
            return Ok(IntrospectionResponse::inactive());
        }
        Ok(response)
    }

    /// Revocation endpoint for an authenticated caller (RFC 7009)
    ///
    /// # Errors
    /// `invalid_client` for bad caller credentials, server errors otherwise
    pub async fn revoke(&self, request: &RevocationRequest) -> OAuthResult<()> {
        let caller = self
            .authenticate_client(request.client_id.as_deref(), request.client_secret.as_deref())
            .await?;

        self.revoker
            .revoke_for_client(
                &request.token,
                TokenTypeHint::parse(request.token_type_hint.as_deref()),
                &caller.client_id,
            )
            .await
    }

    /// Claims about the user behind a bearer access token
    ///
    /// # Errors
    /// `invalid_token` when the token is invalid, expired, or revoked, or the
    /// user no longer exists
    pub async fn userinfo(&self, access_token: &str) -> OAuthResult<UserInfoResponse> {
        let claims = self.minter.verify_access_token(access_token).map_err(|e| {
            tracing::debug!("Userinfo rejected token: {e}");
            OAuthError::invalid_token("The access token is invalid or expired")
        })?;

        let record = self
            .tokens
            .find_by_access_hash(&hash_secret(&claims.jti))
            .await?
            .filter(|record| !record.is_revoked())
            .ok_or_else(|| OAuthError::invalid_token("The access token has been revoked"))?;

        let profile = self
            .profiles
            .get(&record.user_id)
            .await?
            .ok_or_else(|| OAuthError::invalid_token("The user no longer exists"))?;

        let identity = IdentityClaims::from_profile(&profile, &record.scope);
        Ok(UserInfoResponse {
            sub: record.user_id,
            email: identity.email,
            email_verified: identity.email_verified,
            name: identity.name,
            given_name: identity.given_name,
            family_name: identity.family_name,
            picture: identity.picture,
            updated_at: identity.updated_at,
        })
    }

    /// Public signing keys
    #[must_use]
    pub fn jwks(&self) -> JsonWebKeySet {
        self.jwks.get_jwks()
    }

    /// RFC 8414 discovery document
    #[must_use]
    pub fn metadata(&self) -> AuthorizationServerMetadata {
        AuthorizationServerMetadata::for_issuer(&self.config.issuer_url)
    }

    /// Protocol settings
    #[must_use]
    pub fn config(&self) -> &OAuth2ServerConfig {
        &self.config
    }

    /// Request validator
    #[must_use]
    pub const fn validator(&self) -> &AuthorizationRequestValidator {
        &self.validator
    }

    /// Code issuer
    #[must_use]
    pub const fn issuer(&self) -> &AuthorizationCodeIssuer {
        &self.issuer
    }

    /// Code redeemer
    #[must_use]
    pub const fn redeemer(&self) -> &AuthorizationCodeRedeemer {
        &self.redeemer
    }

    /// Token minter
    #[must_use]
    pub const fn minter(&self) -> &TokenMinter {
        &self.minter
    }

    /// Refresh rotator
    #[must_use]
    pub const fn rotator(&self) -> &RefreshRotator {
        &self.rotator
    }

    /// Introspector without caller authentication
    #[must_use]
    pub const fn introspector(&self) -> &Introspector {
        &self.introspector
    }

    /// Revoker without caller authentication
    #[must_use]
    pub const fn revoker(&self) -> &Revoker {
        &self.revoker
    }

    /// Consent ledger
    #[must_use]
    pub const fn consent(&self) -> &ConsentLedger {
        &self.consent
    }

    /// Cleanup routines
    #[must_use]
    pub const fn cleanup(&self) -> &TokenCleanup {
        &self.cleanup
    }
}

fn required<'a>(value: Option<&'a str>, name: &str) -> OAuthResult<&'a str> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| OAuthError::invalid_request(format!("Missing {name}")))
}
