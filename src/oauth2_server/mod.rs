// ABOUTME: OAuth 2.0 authorization server: validation, codes, tokens, introspection, revocation, consent
// ABOUTME: Services share injected stores, a clock, and an event sink; the facade wires them together
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors

/// Expired and retained row cleanup
pub mod cleanup;
/// Per-user, per-client consent
pub mod consent;
/// Server facade and builder
pub mod endpoints;
/// Domain events and observers
pub mod events;
/// RFC 7662 introspection and token resolution
pub mod introspection;
/// Authorization code issuance
pub mod issuer;
/// Access and refresh token minting
pub mod minter;
/// Wire-level request and response types
pub mod models;
/// Authorization code redemption
pub mod redeemer;
/// Refresh token rotation
pub mod refresh;
/// RFC 7009 revocation
pub mod revocation;
/// Axum routes
pub mod routes;
/// Authorization request validation
pub mod validator;

pub use cleanup::{CleanupReport, CleanupTask, TokenCleanup};
pub use consent::ConsentLedger;
pub use endpoints::{OAuth2AuthorizationServer, OAuth2ServerBuilder};
pub use events::{
    BroadcastEventSink, EventSink, NoopEventSink, OAuthEvent, TracingEventSink,
};
pub use introspection::{Introspector, ResolvedToken, TokenResolver};
pub use issuer::{AuthorizationCodeIssuer, IssueCodeRequest, IssuedCode};
pub use minter::{AccessTokenClaims, IdentityClaims, JwtValidationError, TokenMinter};
pub use models::{
    AuthorizationServerMetadata, AuthorizeRequest, AuthorizeResponse, IntrospectionRequest,
    IntrospectionResponse, RevocationRequest, TokenRequest, TokenResponse, TokenTypeHint,
    UserInfoResponse,
};
pub use redeemer::{AuthorizationCodeRedeemer, RedeemedGrant};
pub use refresh::RefreshRotator;
pub use revocation::Revoker;
pub use routes::OAuth2Routes;
pub use validator::{AuthorizationRequestValidator, ValidatedAuthorization};
