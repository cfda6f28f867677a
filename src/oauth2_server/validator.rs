// ABOUTME: Authorization request validation ahead of code issuance
// ABOUTME: Checks client, redirect URI, response type, scopes, PKCE, and state in a fixed order
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors

use super::models::AuthorizeRequest;
use crate::directory::ClientDirectory;
use heimdall_core::constants::protocol;
use heimdall_core::errors::{OAuthError, OAuthResult};
use heimdall_core::models::{ClientRecord, PkceChallenge, PkceMethod};
use heimdall_core::scope::ScopeSet;
use std::str::FromStr;
use std::sync::Arc;

/// Authorization request that passed every check
#[derive(Debug, Clone)]
pub struct ValidatedAuthorization {
    /// Resolved client registration
    pub client: ClientRecord,
    /// Redirect URI, exactly as registered
    pub redirect_uri: String,
    /// Parsed requested scopes
    pub scope: ScopeSet,
    /// Client state to echo back
    pub state: String,
    /// PKCE binding, when a challenge was supplied
    pub pkce: Option<PkceChallenge>,
}

/// Resolve the PKCE binding of a request
///
/// A client that requires PKCE must send both a challenge and a method. For
/// other clients a challenge without a method is `plain` (RFC 7636 Section
/// 4.3). A method without a challenge, or an unknown method, is malformed.
///
/// # Errors
/// Returns `invalid_request` for malformed PKCE parameters or when the client
/// requires PKCE and none was supplied
pub fn resolve_pkce(
    challenge: Option<&str>,
    method: Option<&str>,
    require_pkce: bool,
) -> OAuthResult<Option<PkceChallenge>> {
    let challenge = challenge.filter(|c| !c.is_empty());
    let method = method.filter(|m| !m.is_empty());

    match (challenge, method) {
        (Some(_), None) if require_pkce => Err(OAuthError::invalid_request(
            "code_challenge_method is required for this client (PKCE)",
        )),
        (Some(challenge), method) => {
            let method = method.map_or(Ok(PkceMethod::Plain), |m| {
                PkceMethod::from_str(m).map_err(|_| {
                    OAuthError::invalid_request(format!(
                        "code_challenge_method must be '{}' or '{}'",
                        protocol::PKCE_METHOD_S256,
                        protocol::PKCE_METHOD_PLAIN
                    ))
                })
            })?;
            Ok(Some(PkceChallenge {
                challenge: challenge.to_owned(),
                method,
            }))
        }
        (None, Some(_)) => Err(OAuthError::invalid_request(
            "code_challenge_method supplied without code_challenge",
        )),
        (None, None) if require_pkce => Err(OAuthError::invalid_request(
            "code_challenge is required for this client (PKCE)",
        )),
        (None, None) => Ok(None),
    }
}

/// Parse a scope string and check it against the client's allowance
///
/// # Errors
/// Returns `invalid_scope` when the string is empty, malformed, or names a
/// scope the client may not request
pub fn check_requested_scope(client: &ClientRecord, raw: Option<&str>) -> OAuthResult<ScopeSet> {
    let scope = ScopeSet::parse(raw.unwrap_or_default())
        .map_err(|e| OAuthError::invalid_scope(e.to_string()))?;
    check_scope_allowed(client, &scope)?;
    Ok(scope)
}

/// Check a parsed scope set against the client's allowance
///
/// # Errors
/// Returns `invalid_scope` naming the first disallowed scope
pub fn check_scope_allowed(client: &ClientRecord, scope: &ScopeSet) -> OAuthResult<()> {
    if let Some(disallowed) = scope.difference(&client.allowed_scopes).first() {
        return Err(OAuthError::invalid_scope(format!(
            "scope '{disallowed}' is not allowed for this client"
        )));
    }
    Ok(())
}

/// Stateless validator for authorization requests
#[derive(Clone)]
pub struct AuthorizationRequestValidator {
    clients: Arc<dyn ClientDirectory>,
}

impl AuthorizationRequestValidator {
    /// Validator resolving clients through `clients`
    #[must_use]
    pub fn new(clients: Arc<dyn ClientDirectory>) -> Self {
        Self { clients }
    }

    /// Validate a request; the first failing check decides the error
    ///
    /// # Errors
    /// `invalid_client`, `invalid_request`, `unsupported_response_type`, or
    /// `invalid_scope`, plus storage errors from the client directory
    pub async fn validate(&self, request: &AuthorizeRequest) -> OAuthResult<ValidatedAuthorization> {
        let client = self
            .clients
            .get_by_id(&request.client_id)
            .await?
            .filter(ClientRecord::is_active)
            .ok_or_else(|| {
                tracing::warn!(client_id = %request.client_id, "Authorization request for unknown or inactive client");
                OAuthError::invalid_client("Unknown or inactive client")
            })?;

        if !self
            .clients
            .is_redirect_uri_allowed(&client.client_id, &request.redirect_uri)
            .await?
        {
            tracing::warn!(client_id = %client.client_id, "redirect_uri does not match any registered URI");
            return Err(OAuthError::invalid_request("Invalid redirect_uri"));
        }

        if request.response_type != protocol::RESPONSE_TYPE_CODE {
            return Err(OAuthError::unsupported_response_type(
                "Only 'code' response_type is supported",
            ));
        }

        let scope = check_requested_scope(&client, request.scope.as_deref())?;

        let pkce = resolve_pkce(
            request.code_challenge.as_deref(),
            request.code_challenge_method.as_deref(),
            client.require_pkce,
        )?;

        let state = request
            .state
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| OAuthError::invalid_request("state is required"))?
            .to_owned();

        tracing::debug!(client_id = %client.client_id, scope = %scope, pkce = pkce.is_some(), "Authorization request validated");

        Ok(ValidatedAuthorization {
            redirect_uri: request.redirect_uri.clone(),
            client,
            scope,
            state,
            pkce,
        })
    }
}
