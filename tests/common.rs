// ABOUTME: Shared test utilities and fixtures for the authorization server integration tests
// ABOUTME: Provides quiet logging, a shared signing key, registered clients and users, and a manual clock
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::unwrap_used,
    clippy::expect_used
)]
//! Shared test utilities for `heimdall_oauth_server`

use chrono::{DateTime, Utc};
use heimdall_oauth_server::clock::ManualClock;
use heimdall_oauth_server::crypto::keys::RSA_TEST_KEY_SIZE;
use heimdall_oauth_server::crypto::JwksManager;
use heimdall_oauth_server::directory::{StaticClientDirectory, StaticProfileProvider};
use heimdall_oauth_server::errors::OAuthResult;
use heimdall_oauth_server::models::{ClientRecord, ClientStatus, UserProfile};
use heimdall_oauth_server::oauth2_server::{
    AuthorizeRequest, AuthorizeResponse, BroadcastEventSink, OAuth2AuthorizationServer,
    TokenRequest, TokenResponse,
};
use heimdall_oauth_server::scope::ScopeSet;
use heimdall_oauth_server::storage::{InMemoryStore, OAuthStore};
use std::sync::{Arc, Once, OnceLock};

/// Confidential client in tenant A
pub const CLIENT_ID: &str = "web-app";
/// Secret of `CLIENT_ID`
pub const CLIENT_SECRET: &str = "web-app-secret";
/// Public PKCE-only client in tenant A
pub const PUBLIC_CLIENT_ID: &str = "spa";
/// Confidential client in tenant B
pub const OTHER_CLIENT_ID: &str = "partner-app";
/// Secret of `OTHER_CLIENT_ID`
pub const OTHER_CLIENT_SECRET: &str = "partner-secret";
/// Redirect URI registered for every test client
pub const REDIRECT_URI: &str = "https://app.example.com/callback";
/// User in tenant A
pub const USER_ID: &str = "user-ada";
/// User in tenant B
pub const OTHER_TENANT_USER_ID: &str = "user-grace";
/// Issuer used by test servers
pub const ISSUER: &str = "https://auth.test.example";
/// `kid` of the shared test key
pub const TEST_KEY_ID: &str = "test-key-1";

static INIT_LOGGER: Once = Once::new();
static JWKS: OnceLock<Arc<JwksManager>> = OnceLock::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// RSA keys are slow to generate, so every test in a binary shares one
pub fn test_jwks() -> Arc<JwksManager> {
    JWKS.get_or_init(|| {
        let mut jwks = JwksManager::new();
        jwks.generate_rsa_key_pair_with_size(TEST_KEY_ID, RSA_TEST_KEY_SIZE)
            .expect("test key generation");
        Arc::new(jwks)
    })
    .clone()
}

/// Whole-second start instant so stored timestamps compare exactly
pub fn start_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_767_225_600, 0).unwrap()
}

pub fn scopes(raw: &str) -> ScopeSet {
    ScopeSet::parse(raw).unwrap()
}

pub fn client(client_id: &str, tenant_id: &str, allowed: &str, require_pkce: bool) -> ClientRecord {
    ClientRecord {
        client_id: client_id.to_owned(),
        tenant_id: tenant_id.to_owned(),
        redirect_uris: vec![REDIRECT_URI.to_owned()],
        allowed_scopes: scopes(allowed),
        require_pkce,
        status: ClientStatus::Active,
    }
}

pub fn user(user_id: &str, tenant_id: &str) -> UserProfile {
    UserProfile {
        user_id: user_id.to_owned(),
        tenant_id: tenant_id.to_owned(),
        email: Some(format!("{user_id}@example.com")),
        email_verified: true,
        name: Some("Ada Lovelace".to_owned()),
        given_name: Some("Ada".to_owned()),
        family_name: Some("Lovelace".to_owned()),
        picture: Some("https://example.com/ada.png".to_owned()),
        updated_at: Some(start_time()),
    }
}

/// Fully wired server over an in-memory store
pub struct TestContext<S = InMemoryStore> {
    pub server: OAuth2AuthorizationServer,
    pub store: Arc<S>,
    pub clients: Arc<StaticClientDirectory>,
    pub profiles: Arc<StaticProfileProvider>,
    pub clock: ManualClock,
    pub events: Arc<BroadcastEventSink>,
}

impl TestContext<InMemoryStore> {
    pub fn new() -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()))
    }
}

impl<S: OAuthStore + 'static> TestContext<S> {
    pub fn with_store(store: Arc<S>) -> Self {
        init_test_logging();

        let clients = Arc::new(StaticClientDirectory::new());
        clients.register_confidential(
            client(CLIENT_ID, "tenant-a", "openid email profile read write", false),
            CLIENT_SECRET,
        );
        clients.register_public(client(PUBLIC_CLIENT_ID, "tenant-a", "openid email profile", true));
        clients.register_confidential(
            client(OTHER_CLIENT_ID, "tenant-b", "openid read", false),
            OTHER_CLIENT_SECRET,
        );

        let profiles = Arc::new(StaticProfileProvider::new());
        profiles.upsert(user(USER_ID, "tenant-a"));
        profiles.upsert(user(OTHER_TENANT_USER_ID, "tenant-b"));

        let clock = ManualClock::new(start_time());
        let events = Arc::new(BroadcastEventSink::new(64));

        let server = OAuth2AuthorizationServer::builder()
            .store(store.clone())
            .clients(clients.clone())
            .profiles(profiles.clone())
            .jwks(test_jwks())
            .config(heimdall_oauth_server::config::OAuth2ServerConfig::with_issuer(ISSUER))
            .clock(Arc::new(clock.clone()))
            .events(events.clone())
            .build()
            .unwrap();

        Self {
            server,
            store,
            clients,
            profiles,
            clock,
            events,
        }
    }

    /// Authorization request for the confidential client
    pub fn authorize_request(&self, scope: &str) -> AuthorizeRequest {
        AuthorizeRequest {
            response_type: "code".to_owned(),
            client_id: CLIENT_ID.to_owned(),
            redirect_uri: REDIRECT_URI.to_owned(),
            scope: Some(scope.to_owned()),
            state: Some("xyz".to_owned()),
            code_challenge: None,
            code_challenge_method: None,
        }
    }

    /// Run the authorization step for `USER_ID`
    pub async fn authorize(&self, request: &AuthorizeRequest) -> AuthorizeResponse {
        self.server.authorize(request, USER_ID).await.unwrap()
    }

    /// Exchange a code as the confidential client
    pub async fn exchange(&self, code: &str, verifier: Option<&str>) -> OAuthResult<TokenResponse> {
        self.server
            .token(TokenRequest {
                grant_type: "authorization_code".to_owned(),
                code: Some(code.to_owned()),
                redirect_uri: Some(REDIRECT_URI.to_owned()),
                code_verifier: verifier.map(str::to_owned),
                client_id: Some(CLIENT_ID.to_owned()),
                client_secret: Some(CLIENT_SECRET.to_owned()),
                ..TokenRequest::default()
            })
            .await
    }

    /// Refresh as the confidential client
    pub async fn refresh(&self, refresh_token: &str, scope: Option<&str>) -> OAuthResult<TokenResponse> {
        self.server
            .token(TokenRequest {
                grant_type: "refresh_token".to_owned(),
                refresh_token: Some(refresh_token.to_owned()),
                scope: scope.map(str::to_owned),
                client_id: Some(CLIENT_ID.to_owned()),
                client_secret: Some(CLIENT_SECRET.to_owned()),
                ..TokenRequest::default()
            })
            .await
    }

    /// Authorize and exchange in one go
    pub async fn issue_tokens(&self, scope: &str) -> TokenResponse {
        let authorized = self.authorize(&self.authorize_request(scope)).await;
        self.exchange(&authorized.code, None).await.unwrap()
    }
}
