// ABOUTME: Criterion benchmarks for the hot paths of the authorization server
// ABOUTME: Measures PKCE verification, secret hashing, token minting and verification, and the code flow
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors

//! Criterion benchmarks for the authorization server.
//!
//! Measures the per-request primitives (PKCE, hashing, scope parsing) and
//! the end-to-end grant paths over the in-memory store.

#![allow(
    clippy::missing_docs_in_private_items,
    clippy::unwrap_used,
    missing_docs
)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use heimdall_oauth_server::config::OAuth2ServerConfig;
use heimdall_oauth_server::crypto::keys::RSA_TEST_KEY_SIZE;
use heimdall_oauth_server::crypto::{generate_prefixed_secret, hash_secret, pkce, JwksManager};
use heimdall_oauth_server::directory::{StaticClientDirectory, StaticProfileProvider};
use heimdall_oauth_server::models::{ClientRecord, ClientStatus, PkceChallenge, PkceMethod, UserProfile};
use heimdall_oauth_server::oauth2_server::{
    AuthorizeRequest, NoopEventSink, OAuth2AuthorizationServer, TokenRequest,
};
use heimdall_oauth_server::scope::ScopeSet;
use heimdall_oauth_server::storage::InMemoryStore;
use std::sync::Arc;
use tokio::runtime::Runtime;

const CLIENT_ID: &str = "bench-client";
const CLIENT_SECRET: &str = "bench-secret";
const REDIRECT_URI: &str = "https://bench.example.com/callback";
const USER_ID: &str = "bench-user";

fn bench_server() -> OAuth2AuthorizationServer {
    let clients = StaticClientDirectory::new();
    clients.register_confidential(
        ClientRecord {
            client_id: CLIENT_ID.to_owned(),
            tenant_id: "bench".to_owned(),
            redirect_uris: vec![REDIRECT_URI.to_owned()],
            allowed_scopes: ScopeSet::parse("openid email profile read").unwrap(),
            require_pkce: false,
            status: ClientStatus::Active,
        },
        CLIENT_SECRET,
    );

    let profiles = StaticProfileProvider::new();
    profiles.upsert(UserProfile {
        user_id: USER_ID.to_owned(),
        tenant_id: "bench".to_owned(),
        email: Some("bench@example.com".to_owned()),
        email_verified: true,
        name: Some("Bench User".to_owned()),
        ..UserProfile::default()
    });

    let mut jwks = JwksManager::new();
    jwks.generate_rsa_key_pair_with_size("bench-key", RSA_TEST_KEY_SIZE)
        .unwrap();

    OAuth2AuthorizationServer::builder()
        .store(Arc::new(InMemoryStore::new()))
        .clients(Arc::new(clients))
        .profiles(Arc::new(profiles))
        .jwks(Arc::new(jwks))
        .config(OAuth2ServerConfig::with_issuer("https://bench.example.com"))
        .events(Arc::new(NoopEventSink))
        .build()
        .unwrap()
}

fn authorize_request() -> AuthorizeRequest {
    AuthorizeRequest {
        response_type: "code".to_owned(),
        client_id: CLIENT_ID.to_owned(),
        redirect_uri: REDIRECT_URI.to_owned(),
        scope: Some("openid email read".to_owned()),
        state: Some("bench".to_owned()),
        code_challenge: None,
        code_challenge_method: None,
    }
}

/// Benchmark PKCE verification for both methods
fn bench_pkce(c: &mut Criterion) {
    let mut group = c.benchmark_group("pkce_verify");
    let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";

    for method in [PkceMethod::S256, PkceMethod::Plain] {
        let challenge = PkceChallenge {
            challenge: match method {
                PkceMethod::S256 => pkce::s256_challenge(verifier),
                PkceMethod::Plain => verifier.to_owned(),
            },
            method,
        };
        group.bench_with_input(
            BenchmarkId::from_parameter(method.as_str()),
            &challenge,
            |b, challenge| b.iter(|| pkce::verify(black_box(challenge), black_box(verifier))),
        );
    }

    group.finish();
}

/// Benchmark secret generation, hashing, and scope parsing
fn bench_primitives(c: &mut Criterion) {
    let mut group = c.benchmark_group("primitives");
    let secret = generate_prefixed_secret("hrt_").unwrap();

    group.bench_function("generate_secret", |b| {
        b.iter(|| generate_prefixed_secret(black_box("hac_")).unwrap());
    });
    group.bench_function("hash_secret", |b| b.iter(|| hash_secret(black_box(&secret))));
    group.bench_function("parse_scope", |b| {
        b.iter(|| ScopeSet::parse(black_box("openid email profile read write")).unwrap());
    });

    group.finish();
}

/// Benchmark RS256 signing and verification
fn bench_tokens(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let server = bench_server();
    let scope = ScopeSet::parse("openid email read").unwrap();
    let mut group = c.benchmark_group("tokens");

    group.bench_function("mint", |b| {
        b.iter(|| {
            rt.block_on(async {
                server
                    .minter()
                    .mint(CLIENT_ID, USER_ID, black_box(&scope), None)
                    .await
                    .unwrap()
            })
        });
    });

    let issued = rt
        .block_on(server.minter().mint(CLIENT_ID, USER_ID, &scope, None))
        .unwrap();
    group.bench_function("verify", |b| {
        b.iter(|| {
            server
                .minter()
                .verify_access_token(black_box(&issued.access_token))
                .unwrap()
        });
    });
    group.bench_function("introspect", |b| {
        b.iter(|| {
            rt.block_on(async {
                server
                    .introspector()
                    .introspect(black_box(&issued.access_token), None)
                    .await
                    .unwrap()
            })
        });
    });

    group.finish();
}

/// Benchmark the authorize, exchange, and refresh round trip
fn bench_code_flow(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let server = bench_server();
    let request = authorize_request();

    c.bench_function("code_flow_with_refresh", |b| {
        b.iter(|| {
            rt.block_on(async {
                let authorized = server.authorize(&request, USER_ID).await.unwrap();
                let tokens = server
                    .token(TokenRequest {
                        grant_type: "authorization_code".to_owned(),
                        code: Some(authorized.code),
                        redirect_uri: Some(REDIRECT_URI.to_owned()),
                        client_id: Some(CLIENT_ID.to_owned()),
                        client_secret: Some(CLIENT_SECRET.to_owned()),
                        ..TokenRequest::default()
                    })
                    .await
                    .unwrap();
                server
                    .token(TokenRequest {
                        grant_type: "refresh_token".to_owned(),
                        refresh_token: Some(tokens.refresh_token),
                        client_id: Some(CLIENT_ID.to_owned()),
                        client_secret: Some(CLIENT_SECRET.to_owned()),
                        ..TokenRequest::default()
                    })
                    .await
                    .unwrap()
            })
        });
    });
}

criterion_group!(
    benches,
    bench_pkce,
    bench_primitives,
    bench_tokens,
    bench_code_flow,
);
criterion_main!(benches);
