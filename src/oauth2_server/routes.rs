// ABOUTME: Axum routes exposing the token, introspection, revocation, userinfo, and discovery endpoints
// ABOUTME: Parses form bodies and client_secret_basic credentials before calling the server facade
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors

//! HTTP surface of the authorization server
//!
//! ## Endpoints
//!
//! - `POST /oauth2/token` - authorization code and refresh token grants
//! - `POST /oauth2/introspect` - RFC 7662 introspection
//! - `POST /oauth2/revoke` - RFC 7009 revocation
//! - `GET /oauth2/userinfo` - claims for a bearer access token
//! - `GET /.well-known/jwks.json` - public signing keys
//! - `GET /.well-known/oauth-authorization-server` - RFC 8414 metadata
//!
//! The authorization step is not routed here: it needs an authenticated end
//! user, which is the embedding application's job.

use super::endpoints::OAuth2AuthorizationServer;
use super::models::{IntrospectionRequest, RevocationRequest, TokenRequest};
use axum::extract::rejection::FormRejection;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use heimdall_core::errors::{OAuthError, OAuthResult};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Largest accepted request body
const MAX_BODY_BYTES: usize = 16 * 1024;

/// Requests still running after this answer 408
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Client credentials taken from an `Authorization: Basic` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    /// Client identifier
    pub client_id: String,
    /// Client secret
    pub client_secret: String,
}

/// Parse `client_secret_basic` credentials (RFC 6749 Section 2.3.1)
///
/// Returns `Ok(None)` when no Basic authorization header is present.
///
/// # Errors
/// `invalid_client` when the header is present but malformed
pub fn parse_basic_credentials(headers: &HeaderMap) -> OAuthResult<Option<BasicCredentials>> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let Some(encoded) = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Basic "))
    else {
        return Ok(None);
    };

    let malformed = || OAuthError::invalid_client("Malformed Basic authorization header");
    let decoded = STANDARD.decode(encoded.trim()).map_err(|_| malformed())?;
    let decoded = String::from_utf8(decoded).map_err(|_| malformed())?;
    let (client_id, client_secret) = decoded.split_once(':').ok_or_else(malformed)?;

    Ok(Some(BasicCredentials {
        client_id: client_id.to_owned(),
        client_secret: client_secret.to_owned(),
    }))
}

/// Merge header and body credentials; a client may use only one method
fn resolve_credentials(
    headers: &HeaderMap,
    client_id: &mut Option<String>,
    client_secret: &mut Option<String>,
) -> OAuthResult<()> {
    if let Some(basic) = parse_basic_credentials(headers)? {
        if client_secret.is_some() {
            return Err(OAuthError::invalid_request(
                "Client credentials supplied by more than one method",
            ));
        }
        if client_id.as_deref().is_some_and(|id| id != basic.client_id) {
            return Err(OAuthError::invalid_request(
                "client_id does not match the Basic authorization header",
            ));
        }
        *client_id = Some(basic.client_id);
        *client_secret = Some(basic.client_secret);
    }
    Ok(())
}

fn bearer_token(headers: &HeaderMap) -> OAuthResult<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| OAuthError::invalid_token("Missing bearer access token"))
}

fn form_body<T>(form: Result<Form<T>, FormRejection>) -> OAuthResult<T> {
    form.map(|Form(body)| body).map_err(|rejection| {
        tracing::debug!("Rejected form body: {rejection}");
        OAuthError::invalid_request("Malformed or incomplete form body")
    })
}

/// OAuth 2.0 route set
pub struct OAuth2Routes;

impl OAuth2Routes {
    /// Endpoint routes without middleware
    pub fn routes(server: Arc<OAuth2AuthorizationServer>) -> Router {
        let protocol_routes = Router::new()
            .route("/oauth2/token", post(Self::handle_token))
            .route("/oauth2/introspect", post(Self::handle_introspect))
            .route("/oauth2/revoke", post(Self::handle_revoke))
            .route("/oauth2/userinfo", get(Self::handle_userinfo))
            .layer(SetResponseHeaderLayer::overriding(
                header::CACHE_CONTROL,
                HeaderValue::from_static("no-store"),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::PRAGMA,
                HeaderValue::from_static("no-cache"),
            ));

        Router::new()
            .route("/.well-known/jwks.json", get(Self::handle_jwks))
            .route(
                "/.well-known/oauth-authorization-server",
                get(Self::handle_metadata),
            )
            .merge(protocol_routes)
            .with_state(server)
    }

    /// Routes wrapped in request IDs, tracing, a body size limit, and a timeout
    pub fn router(server: Arc<OAuth2AuthorizationServer>) -> Router {
        let request_id = header::HeaderName::from_static(REQUEST_ID_HEADER);

        Self::routes(server).layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(request_id))
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    REQUEST_TIMEOUT,
                )),
        )
    }

    async fn handle_token(
        State(server): State<Arc<OAuth2AuthorizationServer>>,
        headers: HeaderMap,
        form: Result<Form<TokenRequest>, FormRejection>,
    ) -> Result<Response, OAuthError> {
        let mut request = form_body(form)?;
        resolve_credentials(&headers, &mut request.client_id, &mut request.client_secret)?;

        let response = server.token(request).await.inspect_err(|e| {
            if !e.is_client_error() {
                tracing::error!("Token request failed: {e}");
            }
        })?;
        Ok(Json(response).into_response())
    }

    async fn handle_introspect(
        State(server): State<Arc<OAuth2AuthorizationServer>>,
        headers: HeaderMap,
        form: Result<Form<IntrospectionRequest>, FormRejection>,
    ) -> Result<Response, OAuthError> {
        let mut request = form_body(form)?;
        resolve_credentials(&headers, &mut request.client_id, &mut request.client_secret)?;

        let response = server.introspect(&request).await?;
        Ok(Json(response).into_response())
    }

    async fn handle_revoke(
        State(server): State<Arc<OAuth2AuthorizationServer>>,
        headers: HeaderMap,
        form: Result<Form<RevocationRequest>, FormRejection>,
    ) -> Result<Response, OAuthError> {
        let mut request = form_body(form)?;
        resolve_credentials(&headers, &mut request.client_id, &mut request.client_secret)?;

        server.revoke(&request).await?;
        Ok(StatusCode::OK.into_response())
    }

    async fn handle_userinfo(
        State(server): State<Arc<OAuth2AuthorizationServer>>,
        headers: HeaderMap,
    ) -> Result<Response, OAuthError> {
        let token = bearer_token(&headers)?;
        let response = server.userinfo(token).await?;
        Ok(Json(response).into_response())
    }

    async fn handle_jwks(State(server): State<Arc<OAuth2AuthorizationServer>>) -> Response {
        (
            [(header::CACHE_CONTROL, "public, max-age=3600")],
            Json(server.jwks()),
        )
            .into_response()
    }

    async fn handle_metadata(State(server): State<Arc<OAuth2AuthorizationServer>>) -> Response {
        Json(server.metadata()).into_response()
    }
}
