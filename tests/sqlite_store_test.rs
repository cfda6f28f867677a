// ABOUTME: Integration tests running the protocol flows against the SQLite store
// ABOUTME: Covers persistence across reconnects, conditional updates, consent rows, and cleanup deletes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors
#![cfg(feature = "sqlite")]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use chrono::Duration;
use common::{scopes, TestContext, CLIENT_ID, PUBLIC_CLIENT_ID, REDIRECT_URI, USER_ID};
use heimdall_oauth_server::crypto::hash_secret;
use heimdall_oauth_server::crypto::pkce::s256_challenge;
use heimdall_oauth_server::models::{AuthorizationCode, PkceChallenge, PkceMethod};
use heimdall_oauth_server::oauth2_server::{AuthorizeRequest, TokenRequest};
use heimdall_oauth_server::storage::{AuthorizationCodeStore, ConsentStore, SqliteStore, TokenStore};
use std::sync::Arc;
use tempfile::TempDir;

async fn file_store(dir: &TempDir) -> SqliteStore {
    let url = format!("sqlite:{}", dir.path().join("heimdall.db").display());
    SqliteStore::connect(&url).await.unwrap()
}

#[tokio::test]
async fn test_full_flow_on_memory_database() {
    let store = Arc::new(SqliteStore::connect("sqlite::memory:").await.unwrap());
    let ctx = TestContext::with_store(store);

    let tokens = ctx.issue_tokens("openid email read").await;
    let rotated = ctx.refresh(&tokens.refresh_token, Some("read")).await.unwrap();
    assert_eq!(rotated.scope, "read");

    let introspector = ctx.server.introspector();
    assert!(!introspector.introspect(&tokens.refresh_token, None).await.unwrap().active);

    let current = introspector.introspect(&rotated.access_token, None).await.unwrap();
    assert!(current.active);
    assert_eq!(current.scope.as_deref(), Some("read"));
    assert_eq!(current.iat, Some(common::start_time().timestamp()));
}

#[tokio::test]
async fn test_grants_survive_reconnect() {
    let dir = TempDir::new().unwrap();

    let tokens = {
        let ctx = TestContext::with_store(Arc::new(file_store(&dir).await));
        ctx.issue_tokens("read write").await
    };

    let ctx = TestContext::with_store(Arc::new(file_store(&dir).await));
    let response = ctx
        .server
        .introspector()
        .introspect(&tokens.access_token, None)
        .await
        .unwrap();
    assert!(response.active);
    assert_eq!(response.scope.as_deref(), Some("read write"));
    assert_eq!(response.exp, Some(common::start_time().timestamp() + 3600));

    ctx.refresh(&tokens.refresh_token, None).await.unwrap();
}

#[tokio::test]
async fn test_pkce_binding_round_trips_through_storage() {
    let dir = TempDir::new().unwrap();
    let ctx = TestContext::with_store(Arc::new(file_store(&dir).await));
    let challenge = s256_challenge("persisted-verifier");

    let authorized = ctx
        .server
        .authorize(
            &AuthorizeRequest {
                response_type: "code".to_owned(),
                client_id: PUBLIC_CLIENT_ID.to_owned(),
                redirect_uri: REDIRECT_URI.to_owned(),
                scope: Some("openid".to_owned()),
                state: Some("s".to_owned()),
                code_challenge: Some(challenge.clone()),
                code_challenge_method: Some("S256".to_owned()),
            },
            USER_ID,
        )
        .await
        .unwrap();

    let stored = ctx
        .store
        .find_code(&hash_secret(&authorized.code))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        stored.pkce,
        Some(PkceChallenge {
            challenge,
            method: PkceMethod::S256,
        })
    );
    assert_eq!(stored.expires_at, common::start_time() + Duration::seconds(600));
    assert!(stored.consumed_at.is_none());

    ctx.server
        .token(TokenRequest {
            grant_type: "authorization_code".to_owned(),
            code: Some(authorized.code),
            redirect_uri: Some(REDIRECT_URI.to_owned()),
            code_verifier: Some("persisted-verifier".to_owned()),
            client_id: Some(PUBLIC_CLIENT_ID.to_owned()),
            ..TokenRequest::default()
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_conditional_updates_report_the_winner() {
    let dir = TempDir::new().unwrap();
    let store = file_store(&dir).await;
    let now = common::start_time();

    let code = AuthorizationCode {
        code_hash: hash_secret("hac_example"),
        client_id: CLIENT_ID.to_owned(),
        user_id: USER_ID.to_owned(),
        redirect_uri: REDIRECT_URI.to_owned(),
        scope: scopes("read"),
        pkce: None,
        created_at: now,
        expires_at: now + Duration::seconds(600),
        consumed_at: None,
    };
    store.insert_code(&code).await.unwrap();
    assert!(store.insert_code(&code).await.is_err());

    assert!(store.mark_code_consumed(&code.code_hash, now).await.unwrap());
    assert!(!store.mark_code_consumed(&code.code_hash, now).await.unwrap());
    assert!(!store.mark_code_consumed("missing", now).await.unwrap());

    let ctx = TestContext::with_store(Arc::new(store));
    let tokens = ctx.issue_tokens("read").await;
    let record = ctx
        .store
        .find_by_refresh_hash(&hash_secret(&tokens.refresh_token))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.scope, scopes("read"));
    assert_eq!(record.created_at, now);

    assert!(ctx.store.revoke_if_active(record.id, now).await.unwrap());
    assert!(!ctx.store.revoke_if_active(record.id, now).await.unwrap());
}

#[tokio::test]
async fn test_consent_rows_upsert_and_delete() {
    let store = Arc::new(SqliteStore::connect("sqlite::memory:").await.unwrap());
    let ctx = TestContext::with_store(store);
    let ledger = ctx.server.consent();

    ledger
        .record_consent(USER_ID, CLIENT_ID, scopes("read write"))
        .await
        .unwrap();
    ledger
        .record_consent(USER_ID, CLIENT_ID, scopes("read"))
        .await
        .unwrap();
    ledger
        .record_consent(USER_ID, PUBLIC_CLIENT_ID, scopes("openid"))
        .await
        .unwrap();

    let stored = ctx.store.get_consent(USER_ID, CLIENT_ID).await.unwrap().unwrap();
    assert_eq!(stored.scope, scopes("read"));
    assert_eq!(stored.granted_at, common::start_time());

    let listed: Vec<_> = ledger
        .list_consents(USER_ID)
        .await
        .unwrap()
        .into_iter()
        .map(|consent| consent.client_id)
        .collect();
    assert_eq!(listed, vec![PUBLIC_CLIENT_ID, CLIENT_ID]);

    assert!(ledger.revoke_consent(USER_ID, CLIENT_ID).await.unwrap());
    assert!(!ledger.revoke_consent(USER_ID, CLIENT_ID).await.unwrap());
}

#[tokio::test]
async fn test_cleanup_deletes_rows() {
    let dir = TempDir::new().unwrap();
    let ctx = TestContext::with_store(Arc::new(file_store(&dir).await));

    ctx.authorize(&ctx.authorize_request("read")).await;
    let tokens = ctx.issue_tokens("read").await;
    ctx.server.revoker().revoke(&tokens.access_token, None).await.unwrap();

    ctx.clock.advance(Duration::days(31));
    let report = ctx.server.cleanup().run_once().await.unwrap();
    assert_eq!(report.expired_codes, 1);
    assert_eq!(report.expired_tokens, 1);
    assert_eq!(report.consumed_codes, 1);
    assert_eq!(report.revoked_tokens, 0);

    assert_eq!(ctx.server.cleanup().run_once().await.unwrap().total(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_redemption_on_shared_file() {
    let dir = TempDir::new().unwrap();
    let ctx = Arc::new(TestContext::with_store(Arc::new(file_store(&dir).await)));
    let authorized = ctx.authorize(&ctx.authorize_request("read")).await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ctx = Arc::clone(&ctx);
            let code = authorized.code.clone();
            tokio::spawn(async move { ctx.exchange(&code, None).await })
        })
        .collect();

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            successes += 1;
        }
    }
    assert_eq!(successes, 1);
}
