// ABOUTME: Integration tests for refresh token rotation
// ABOUTME: Covers scope narrowing, single-use rotation, expiry, client binding, and concurrent rotation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use chrono::Duration;
use common::{TestContext, OTHER_CLIENT_ID, OTHER_CLIENT_SECRET, USER_ID};
use heimdall_oauth_server::oauth2_server::{OAuthEvent, TokenRequest, TokenTypeHint};
use std::sync::Arc;

#[tokio::test]
async fn test_rotation_issues_new_pair_and_retires_old() {
    let ctx = TestContext::new();
    let original = ctx.issue_tokens("read write").await;

    let rotated = ctx.refresh(&original.refresh_token, None).await.unwrap();
    assert_ne!(rotated.refresh_token, original.refresh_token);
    assert_ne!(rotated.access_token, original.access_token);
    assert_eq!(rotated.scope, "read write");

    let introspector = ctx.server.introspector();
    let old = introspector
        .introspect(&original.refresh_token, Some(TokenTypeHint::RefreshToken))
        .await
        .unwrap();
    assert!(!old.active);

    // The predecessor's access token goes down with its refresh token
    let old_access = introspector
        .introspect(&original.access_token, None)
        .await
        .unwrap();
    assert!(!old_access.active);

    let fresh = introspector
        .introspect(&rotated.refresh_token, None)
        .await
        .unwrap();
    assert!(fresh.active);
    assert_eq!(fresh.sub.as_deref(), Some(USER_ID));

    let err = ctx
        .refresh(&original.refresh_token, None)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "invalid_grant");
}

#[tokio::test]
async fn test_scope_may_narrow_but_not_broaden() {
    let ctx = TestContext::new();
    let original = ctx.issue_tokens("read write").await;

    let err = ctx
        .refresh(&original.refresh_token, Some("read email"))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "invalid_scope");

    let err = ctx
        .refresh(&original.refresh_token, Some("READ"))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "invalid_scope");

    // Rejected attempts leave the token usable
    let narrowed = ctx
        .refresh(&original.refresh_token, Some("read"))
        .await
        .unwrap();
    assert_eq!(narrowed.scope, "read");

    // Narrowed grants cannot widen back to the original scope
    let err = ctx
        .refresh(&narrowed.refresh_token, Some("read write"))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "invalid_scope");
}

#[tokio::test]
async fn test_blank_scope_keeps_original_grant() {
    let ctx = TestContext::new();
    let original = ctx.issue_tokens("read write").await;

    let rotated = ctx
        .refresh(&original.refresh_token, Some("  "))
        .await
        .unwrap();
    assert_eq!(rotated.scope, "read write");
}

#[tokio::test]
async fn test_expired_refresh_token_is_rejected() {
    let ctx = TestContext::new();
    let original = ctx.issue_tokens("read").await;

    ctx.clock.advance(Duration::days(30));

    let err = ctx
        .refresh(&original.refresh_token, None)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "invalid_grant");
}

#[tokio::test]
async fn test_refresh_token_bound_to_client() {
    let ctx = TestContext::new();
    let original = ctx.issue_tokens("read").await;

    let err = ctx
        .server
        .token(TokenRequest {
            grant_type: "refresh_token".to_owned(),
            refresh_token: Some(original.refresh_token.clone()),
            client_id: Some(OTHER_CLIENT_ID.to_owned()),
            client_secret: Some(OTHER_CLIENT_SECRET.to_owned()),
            ..TokenRequest::default()
        })
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "invalid_grant");

    ctx.refresh(&original.refresh_token, None).await.unwrap();
}

#[tokio::test]
async fn test_garbage_refresh_tokens_are_invalid_grant() {
    let ctx = TestContext::new();

    for token in ["hrt_", "hrt_not-a-real-token", "eyJhbGciOi.x.y"] {
        let err = ctx.refresh(token, None).await.unwrap_err();
        assert_eq!(err.error_code(), "invalid_grant", "token {token:?}");
    }

    let err = ctx.refresh("", None).await.unwrap_err();
    assert_eq!(err.error_code(), "invalid_request");
}

#[tokio::test]
async fn test_refresh_for_removed_user_is_rejected() {
    let ctx = TestContext::new();
    let original = ctx.issue_tokens("read").await;
    ctx.profiles.remove(USER_ID);

    let err = ctx
        .refresh(&original.refresh_token, None)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "invalid_grant");

    // Failing before rotation leaves the grant intact for when the user returns
    ctx.profiles.upsert(common::user(USER_ID, "tenant-a"));
    ctx.refresh(&original.refresh_token, None).await.unwrap();
}

#[tokio::test]
async fn test_rotation_emits_revoked_then_issued() {
    let ctx = TestContext::new();
    let original = ctx.issue_tokens("read").await;
    let mut events = ctx.events.subscribe();

    ctx.refresh(&original.refresh_token, None).await.unwrap();

    assert!(matches!(
        events.recv().await.unwrap(),
        OAuthEvent::TokenRevoked { .. }
    ));
    assert!(matches!(
        events.recv().await.unwrap(),
        OAuthEvent::TokenIssued { .. }
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_rotation_has_one_winner() {
    let ctx = Arc::new(TestContext::new());
    let original = ctx.issue_tokens("read").await;

    let handles: Vec<_> = (0..12)
        .map(|_| {
            let ctx = Arc::clone(&ctx);
            let token = original.refresh_token.clone();
            tokio::spawn(async move { ctx.refresh(&token, None).await })
        })
        .collect();

    let mut winners = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(tokens) => winners.push(tokens),
            Err(e) => assert_eq!(e.error_code(), "invalid_grant"),
        }
    }
    assert_eq!(winners.len(), 1);
    assert_eq!(ctx.store.token_count(), 2);
}
