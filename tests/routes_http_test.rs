// ABOUTME: HTTP-level tests driving the axum router with in-process requests
// ABOUTME: Covers form parsing, client_secret_basic, error bodies, cache headers, and discovery documents
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::{TestContext, CLIENT_ID, CLIENT_SECRET, ISSUER, REDIRECT_URI, TEST_KEY_ID};
use heimdall_oauth_server::oauth2_server::{OAuth2Routes, TokenResponse};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

const MAX_TEST_BODY: usize = 64 * 1024;

fn router(ctx: &TestContext) -> Router {
    OAuth2Routes::router(Arc::new(ctx.server.clone()))
}

fn basic_auth(client_id: &str, secret: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{client_id}:{secret}")))
}

fn form_post(uri: &str, fields: &[(&str, &str)], authorization: Option<&str>) -> Request<Body> {
    let body = serde_urlencoded::to_string(fields).unwrap();
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(authorization) = authorization {
        builder = builder.header(header::AUTHORIZATION, authorization);
    }
    builder.body(Body::from(body)).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), MAX_TEST_BODY).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_token_endpoint_with_basic_auth() {
    let ctx = TestContext::new();
    let authorized = ctx.authorize(&ctx.authorize_request("openid read")).await;

    let response = router(&ctx)
        .oneshot(form_post(
            "/oauth2/token",
            &[
                ("grant_type", "authorization_code"),
                ("code", &authorized.code),
                ("redirect_uri", REDIRECT_URI),
            ],
            Some(&basic_auth(CLIENT_ID, CLIENT_SECRET)),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
    assert_eq!(response.headers()[header::PRAGMA], "no-cache");
    assert!(response.headers().contains_key("x-request-id"));

    let bytes = to_bytes(response.into_body(), MAX_TEST_BODY).await.unwrap();
    let tokens: TokenResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(tokens.token_type, "Bearer");
    assert_eq!(tokens.scope, "openid read");
}

#[tokio::test]
async fn test_token_endpoint_with_post_credentials_and_refresh() {
    let ctx = TestContext::new();
    let tokens = ctx.issue_tokens("read write").await;

    let response = router(&ctx)
        .oneshot(form_post(
            "/oauth2/token",
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", &tokens.refresh_token),
                ("scope", "read"),
                ("client_id", CLIENT_ID),
                ("client_secret", CLIENT_SECRET),
            ],
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["scope"], "read");
    assert_eq!(body["expires_in"], 3600);
}

#[tokio::test]
async fn test_token_endpoint_error_bodies() {
    let ctx = TestContext::new();

    let response = router(&ctx)
        .oneshot(form_post(
            "/oauth2/token",
            &[("grant_type", "password")],
            Some(&basic_auth(CLIENT_ID, CLIENT_SECRET)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
    assert_eq!(json_body(response).await["error"], "unsupported_grant_type");

    let response = router(&ctx)
        .oneshot(form_post(
            "/oauth2/token",
            &[("grant_type", "authorization_code"), ("code", "hac_x")],
            Some(&basic_auth(CLIENT_ID, "wrong")),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
    assert_eq!(json_body(response).await["error"], "invalid_client");

    let response = router(&ctx)
        .oneshot(form_post(
            "/oauth2/token",
            &[
                ("grant_type", "authorization_code"),
                ("code", "hac_unknown"),
                ("redirect_uri", REDIRECT_URI),
            ],
            Some(&basic_auth(CLIENT_ID, CLIENT_SECRET)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "invalid_grant");
    assert!(body["error_description"].is_string());
}

#[tokio::test]
async fn test_malformed_requests_are_invalid_request() {
    let ctx = TestContext::new();

    let response = router(&ctx)
        .oneshot(form_post(
            "/oauth2/token",
            &[("code", "hac_x")],
            Some(&basic_auth(CLIENT_ID, CLIENT_SECRET)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "invalid_request");

    let response = router(&ctx)
        .oneshot(form_post(
            "/oauth2/token",
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", "hrt_x"),
                ("client_secret", CLIENT_SECRET),
            ],
            Some(&basic_auth(CLIENT_ID, CLIENT_SECRET)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "invalid_request");
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let ctx = TestContext::new();
    let padding = "a".repeat(20 * 1024);
    let body = format!("grant_type=refresh_token&refresh_token={padding}");

    let request = Request::builder()
        .method("POST")
        .uri("/oauth2/token")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap();

    let response = router(&ctx).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_introspect_and_revoke_endpoints() {
    let ctx = TestContext::new();
    let tokens = ctx.issue_tokens("read").await;
    let auth = basic_auth(CLIENT_ID, CLIENT_SECRET);

    let response = router(&ctx)
        .oneshot(form_post(
            "/oauth2/introspect",
            &[
                ("token", &tokens.access_token),
                ("token_type_hint", "access_token"),
            ],
            Some(&auth),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["active"], true);
    assert_eq!(body["client_id"], CLIENT_ID);

    let response = router(&ctx)
        .oneshot(form_post(
            "/oauth2/revoke",
            &[("token", &tokens.refresh_token)],
            Some(&auth),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), MAX_TEST_BODY).await.unwrap();
    assert!(bytes.is_empty());

    let response = router(&ctx)
        .oneshot(form_post(
            "/oauth2/introspect",
            &[("token", &tokens.access_token)],
            Some(&auth),
        ))
        .await
        .unwrap();
    assert_eq!(json_body(response).await, serde_json::json!({ "active": false }));
}

#[tokio::test]
async fn test_userinfo_endpoint() {
    let ctx = TestContext::new();
    let tokens = ctx.issue_tokens("openid email").await;

    let response = router(&ctx)
        .oneshot(
            Request::builder()
                .uri("/oauth2/userinfo")
                .header(header::AUTHORIZATION, format!("Bearer {}", tokens.access_token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["sub"], common::USER_ID);
    assert_eq!(body["email_verified"], true);
    assert!(body.get("name").is_none());

    let response = router(&ctx)
        .oneshot(
            Request::builder()
                .uri("/oauth2/userinfo")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers()[header::WWW_AUTHENTICATE]
        .to_str()
        .unwrap()
        .starts_with("Bearer"));
}

#[tokio::test]
async fn test_discovery_documents() {
    let ctx = TestContext::new();

    let response = router(&ctx)
        .oneshot(
            Request::builder()
                .uri("/.well-known/jwks.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CACHE_CONTROL],
        "public, max-age=3600"
    );
    let jwks = json_body(response).await;
    assert_eq!(jwks["keys"][0]["kid"], TEST_KEY_ID);
    assert_eq!(jwks["keys"][0]["alg"], "RS256");
    assert_eq!(jwks["keys"][0]["use"], "sig");

    let response = router(&ctx)
        .oneshot(
            Request::builder()
                .uri("/.well-known/oauth-authorization-server")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let metadata = json_body(response).await;
    assert_eq!(metadata["issuer"], ISSUER);
    assert_eq!(metadata["token_endpoint"], format!("{ISSUER}/oauth2/token"));
    assert_eq!(
        metadata["code_challenge_methods_supported"],
        serde_json::json!(["S256", "plain"])
    );
}
