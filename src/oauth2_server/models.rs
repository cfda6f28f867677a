// ABOUTME: Wire-level request and response types for the OAuth 2.0 endpoints
// ABOUTME: Authorization, token, introspection, revocation, userinfo, and discovery payloads
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors

use chrono::{DateTime, Utc};
use heimdall_core::constants::protocol;
use serde::{Deserialize, Serialize};

/// OAuth 2.0 Authorization Request (RFC 6749 Section 4.1.1, RFC 7636 Section 4.3)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizeRequest {
    /// Response type, must be `code`
    pub response_type: String,
    /// Client identifier
    pub client_id: String,
    /// Redirect URI, matched exactly against the registration
    pub redirect_uri: String,
    /// Space-delimited requested scopes
    pub scope: Option<String>,
    /// Opaque client state, echoed back
    pub state: Option<String>,
    /// PKCE code challenge
    pub code_challenge: Option<String>,
    /// PKCE code challenge method (`S256` or `plain`)
    pub code_challenge_method: Option<String>,
}

/// Result of a successful authorization step
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizeResponse {
    /// Authorization code
    pub code: String,
    /// Code expiry, ISO-8601 on the wire
    pub expires_at: DateTime<Utc>,
    /// Echoed client state
    pub state: String,
    /// Redirect URI the code is bound to
    pub redirect_uri: String,
    /// Granted scopes
    pub scope: String,
    /// Whether a stored consent already covers the granted scopes
    pub consent_granted: bool,
}

/// OAuth 2.0 Token Request (RFC 6749 Sections 4.1.3 and 6)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRequest {
    /// `authorization_code` or `refresh_token`
    pub grant_type: String,
    /// Authorization code (`authorization_code` grant)
    pub code: Option<String>,
    /// Redirect URI the code was issued for (`authorization_code` grant)
    pub redirect_uri: Option<String>,
    /// PKCE code verifier (`authorization_code` grant)
    pub code_verifier: Option<String>,
    /// Refresh token (`refresh_token` grant)
    pub refresh_token: Option<String>,
    /// Narrower scope (`refresh_token` grant)
    pub scope: Option<String>,
    /// Client ID (`client_secret_post` or public clients)
    pub client_id: Option<String>,
    /// Client secret (`client_secret_post`)
    pub client_secret: Option<String>,
}

/// OAuth 2.0 Token Response (RFC 6749 Section 5.1)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    /// RS256-signed JWT access token
    pub access_token: String,
    /// Always `Bearer`
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    /// Opaque rotating refresh token
    pub refresh_token: String,
    /// Granted scopes
    pub scope: String,
}

/// Token type hint accepted by introspection and revocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenTypeHint {
    /// `access_token`
    AccessToken,
    /// `refresh_token`
    RefreshToken,
}

impl TokenTypeHint {
    /// Parse a hint; unknown values are ignored (RFC 7009 Section 2.1)
    #[must_use]
    pub fn parse(hint: Option<&str>) -> Option<Self> {
        match hint? {
            protocol::HINT_ACCESS_TOKEN => Some(Self::AccessToken),
            protocol::HINT_REFRESH_TOKEN => Some(Self::RefreshToken),
            _ => None,
        }
    }
}

/// Introspection request (RFC 7662 Section 2.1)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IntrospectionRequest {
    /// Token to inspect
    pub token: String,
    /// Optional hint about the token type
    pub token_type_hint: Option<String>,
    /// Caller client ID (`client_secret_post`)
    pub client_id: Option<String>,
    /// Caller client secret (`client_secret_post`)
    pub client_secret: Option<String>,
}

/// Introspection response (RFC 7662 Section 2.2); absent fields are omitted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntrospectionResponse {
    /// Whether the token is currently active
    pub active: bool,
    /// Granted scopes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Client the token was issued to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Resource owner
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Always `Bearer` for active tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Expiry as Unix seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    /// Issue time as Unix seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Subject
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
}

impl IntrospectionResponse {
    /// `{"active": false}`
    #[must_use]
    pub fn inactive() -> Self {
        Self::default()
    }
}

/// Revocation request (RFC 7009 Section 2.1)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RevocationRequest {
    /// Token to revoke
    pub token: String,
    /// Optional hint about the token type
    pub token_type_hint: Option<String>,
    /// Caller client ID (`client_secret_post`)
    pub client_id: Option<String>,
    /// Caller client secret (`client_secret_post`)
    pub client_secret: Option<String>,
}

/// Userinfo response; identity claims appear only when their scope was granted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfoResponse {
    /// Subject
    pub sub: String,
    /// Email (`email` scope)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Email verification flag (`email` scope)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    /// Full name (`profile` scope)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Given name (`profile` scope)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    /// Family name (`profile` scope)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    /// Picture URL (`profile` scope)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    /// Last profile update as Unix seconds (`profile` scope)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

/// RFC 8414 authorization server metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationServerMetadata {
    /// Issuer identifier
    pub issuer: String,
    /// Token endpoint
    pub token_endpoint: String,
    /// JWKS document
    pub jwks_uri: String,
    /// Introspection endpoint (RFC 7662)
    pub introspection_endpoint: String,
    /// Revocation endpoint (RFC 7009)
    pub revocation_endpoint: String,
    /// Userinfo endpoint
    pub userinfo_endpoint: String,
    /// Supported `response_type` values
    pub response_types_supported: Vec<String>,
    /// Supported `grant_type` values
    pub grant_types_supported: Vec<String>,
    /// Supported PKCE methods
    pub code_challenge_methods_supported: Vec<String>,
    /// Supported client authentication methods
    pub token_endpoint_auth_methods_supported: Vec<String>,
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_owned()).collect()
}

impl AuthorizationServerMetadata {
    /// Metadata for an issuer using the bundled route layout
    #[must_use]
    pub fn for_issuer(issuer: &str) -> Self {
        let base = issuer.trim_end_matches('/');

        Self {
            issuer: issuer.to_owned(),
            token_endpoint: format!("{base}/oauth2/token"),
            jwks_uri: format!("{base}/.well-known/jwks.json"),
            introspection_endpoint: format!("{base}/oauth2/introspect"),
            revocation_endpoint: format!("{base}/oauth2/revoke"),
            userinfo_endpoint: format!("{base}/oauth2/userinfo"),
            response_types_supported: owned(&[protocol::RESPONSE_TYPE_CODE]),
            grant_types_supported: owned(&[
                protocol::GRANT_TYPE_AUTHORIZATION_CODE,
                protocol::GRANT_TYPE_REFRESH_TOKEN,
            ]),
            code_challenge_methods_supported: owned(&[
                protocol::PKCE_METHOD_S256,
                protocol::PKCE_METHOD_PLAIN,
            ]),
            token_endpoint_auth_methods_supported: owned(&[
                "client_secret_basic",
                "client_secret_post",
                "none",
            ]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inactive_introspection_serializes_only_active() {
        let json = serde_json::to_value(IntrospectionResponse::inactive()).unwrap();
        assert_eq!(json, serde_json::json!({ "active": false }));
    }

    #[test]
    fn test_hint_parsing() {
        assert_eq!(
            TokenTypeHint::parse(Some("refresh_token")),
            Some(TokenTypeHint::RefreshToken)
        );
        assert_eq!(
            TokenTypeHint::parse(Some("access_token")),
            Some(TokenTypeHint::AccessToken)
        );
        assert_eq!(TokenTypeHint::parse(Some("id_token")), None);
        assert_eq!(TokenTypeHint::parse(None), None);
    }

    #[test]
    fn test_metadata_endpoints() {
        let metadata = AuthorizationServerMetadata::for_issuer("https://auth.example.com/");
        assert_eq!(metadata.token_endpoint, "https://auth.example.com/oauth2/token");
        assert_eq!(metadata.code_challenge_methods_supported, vec!["S256", "plain"]);
    }
}
