// ABOUTME: RS256 access token and opaque refresh token minting with scope-gated identity claims
// ABOUTME: Also verifies access tokens against the published keys and the injected clock
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors

use super::events::{emit, EventSink, OAuthEvent};
use super::models::TokenResponse;
use crate::clock::Clock;
use crate::config::OAuth2ServerConfig;
use crate::crypto::{generate_prefixed_secret, hash_secret, JwksManager};
use crate::storage::TokenStore;
use chrono::{DateTime, Utc};
use heimdall_core::constants::{scopes, tokens};
use heimdall_core::errors::{OAuthError, OAuthResult};
use heimdall_core::models::{TokenRecord, UserProfile};
use heimdall_core::scope::ScopeSet;
use jsonwebtoken::{decode, decode_header, encode, Algorithm, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Profile claims a token may carry, each gated by a granted scope
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Email address (`email` scope)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Email verification flag (`email` scope)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    /// Full name (`profile` scope)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Given name (`profile` scope)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    /// Family name (`profile` scope)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    /// Picture URL (`profile` scope)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    /// Last profile update as Unix seconds (`profile` scope)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl IdentityClaims {
    /// Claims of `profile` released under `scope`
    #[must_use]
    pub fn from_profile(profile: &UserProfile, scope: &ScopeSet) -> Self {
        let mut claims = Self::default();

        if scope.contains(scopes::EMAIL) {
            claims.email.clone_from(&profile.email);
            claims.email_verified = Some(profile.email_verified);
        }

        if scope.contains(scopes::PROFILE) {
            claims.name.clone_from(&profile.name);
            claims.given_name.clone_from(&profile.given_name);
            claims.family_name.clone_from(&profile.family_name);
            claims.picture.clone_from(&profile.picture);
            claims.updated_at = profile.updated_at.map(|at| at.timestamp());
        }

        claims
    }
}

/// Claims of an issued access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Issuer
    pub iss: String,
    /// Subject (user ID)
    pub sub: String,
    /// Audience (client ID)
    pub aud: String,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expiry (Unix seconds)
    pub exp: i64,
    /// Token identifier; its hash keys the token record
    pub jti: String,
    /// Space-delimited granted scopes
    pub scope: String,
    /// Client the token was issued to
    pub client_id: String,
    /// Scope-gated identity claims
    #[serde(flatten)]
    pub identity: IdentityClaims,
}

/// Why an access token failed verification
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JwtValidationError {
    /// Token is past its `exp`
    #[error("access token expired at {expired_at}")]
    TokenExpired {
        /// When the token expired
        expired_at: DateTime<Utc>,
        /// Time of the check
        current_time: DateTime<Utc>,
    },
    /// Signature, key, or issuer check failed
    #[error("access token invalid: {reason}")]
    TokenInvalid {
        /// Reason for invalidity
        reason: String,
    },
    /// Not a well-formed JWT
    #[error("access token malformed: {details}")]
    TokenMalformed {
        /// Details about the malformation
        details: String,
    },
}

fn convert_jwt_error(e: &jsonwebtoken::errors::Error) -> JwtValidationError {
    use jsonwebtoken::errors::ErrorKind;

    match e.kind() {
        ErrorKind::InvalidSignature => JwtValidationError::TokenInvalid {
            reason: "Token signature verification failed".to_owned(),
        },
        ErrorKind::InvalidIssuer => JwtValidationError::TokenInvalid {
            reason: "Token issuer mismatch".to_owned(),
        },
        ErrorKind::InvalidAlgorithm => JwtValidationError::TokenInvalid {
            reason: "Token algorithm is not RS256".to_owned(),
        },
        ErrorKind::InvalidToken => JwtValidationError::TokenMalformed {
            details: "Token format is invalid".to_owned(),
        },
        ErrorKind::Base64(base64_err) => JwtValidationError::TokenMalformed {
            details: format!("Token contains invalid base64: {base64_err}"),
        },
        ErrorKind::Json(json_err) => JwtValidationError::TokenMalformed {
            details: format!("Token contains invalid JSON: {json_err}"),
        },
        ErrorKind::Utf8(utf8_err) => JwtValidationError::TokenMalformed {
            details: format!("Token contains invalid UTF-8: {utf8_err}"),
        },
        _ => JwtValidationError::TokenInvalid {
            reason: format!("Token validation failed: {e}"),
        },
    }
}

/// Mints token pairs and verifies access tokens
#[derive(Clone)]
pub struct TokenMinter {
    jwks: Arc<JwksManager>,
    tokens: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
    config: Arc<OAuth2ServerConfig>,
}

impl TokenMinter {
    /// Minter signing with the active key of `jwks`
    #[must_use]
    pub fn new(
        jwks: Arc<JwksManager>,
        tokens: Arc<dyn TokenStore>,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventSink>,
        config: Arc<OAuth2ServerConfig>,
    ) -> Self {
        Self {
            jwks,
            tokens,
            clock,
            events,
            config,
        }
    }

    /// Mint an access/refresh pair and persist its record
    ///
    /// Identity claims come from `profile` and are released only under the
    /// `email` and `profile` scopes.
    ///
    /// # Errors
    /// Internal errors for signing or RNG failures, storage errors otherwise
    pub async fn mint(
        &self,
        client_id: &str,
        user_id: &str,
        scope: &ScopeSet,
        profile: Option<&UserProfile>,
    ) -> OAuthResult<TokenResponse> {
        let now = self.clock.now();
        let access_expires_at = now + self.config.access_token_ttl;
        let jti = Uuid::new_v4().to_string();

        let claims = AccessTokenClaims {
            iss: self.config.issuer_url.clone(),
            sub: user_id.to_owned(),
            aud: client_id.to_owned(),
            iat: now.timestamp(),
            exp: access_expires_at.timestamp(),
            jti,
            scope: scope.to_string(),
            client_id: client_id.to_owned(),
            identity: profile
                .map(|p| IdentityClaims::from_profile(p, scope))
                .unwrap_or_default(),
        };
        let access_token = self.sign(&claims)?;
        let refresh_token = generate_prefixed_secret(tokens::REFRESH_TOKEN_PREFIX)?;

        let record = TokenRecord {
            id: Uuid::new_v4(),
            access_token_hash: hash_secret(&claims.jti),
            refresh_token_hash: hash_secret(&refresh_token),
            client_id: client_id.to_owned(),
            user_id: user_id.to_owned(),
            scope: scope.clone(),
            access_expires_at,
            refresh_expires_at: now + self.config.refresh_token_ttl,
            revoked_at: None,
            created_at: now,
        };
        self.tokens.insert_token(&record).await?;

        tracing::info!(
            token_id = %record.id,
            client_id,
            user_id,
            scope = %claims.scope,
            "Token pair issued"
        );
        emit(
            self.events.as_ref(),
            &OAuthEvent::TokenIssued {
                token_id: record.id,
                client_id: record.client_id,
                user_id: record.user_id,
                scope: claims.scope.clone(),
            },
        );

        Ok(TokenResponse {
            access_token,
            token_type: tokens::TOKEN_TYPE_BEARER.to_owned(),
            expires_in: self.config.access_token_expires_in(),
            refresh_token,
            scope: claims.scope,
        })
    }

    fn sign(&self, claims: &AccessTokenClaims) -> OAuthResult<String> {
        let key = self.jwks.get_active_key().map_err(|e| {
            tracing::error!("No signing key available: {e:#}");
            OAuthError::internal("Signing key unavailable")
        })?;

        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(key.kid.clone());

        encode(&header, claims, key.encoding_key()).map_err(|e| {
            tracing::error!(kid = %key.kid, "Failed to sign access token: {e}");
            OAuthError::internal("Failed to sign access token")
        })
    }

    /// Check signature, key ID, and issuer, ignoring expiry
    ///
    /// # Errors
    /// `TokenMalformed` or `TokenInvalid` describing the failure
    pub fn decode_access_token(&self, token: &str) -> Result<AccessTokenClaims, JwtValidationError> {
        let header = decode_header(token).map_err(|e| convert_jwt_error(&e))?;
        let kid = header.kid.ok_or_else(|| JwtValidationError::TokenMalformed {
            details: "Token header missing kid".to_owned(),
        })?;
        let key = self
            .jwks
            .get_key(&kid)
            .ok_or_else(|| JwtValidationError::TokenInvalid {
                reason: format!("Unknown signing key {kid}"),
            })?;

        let mut validation = Validation::new(Algorithm::RS256);
        // Expiry is checked against the injected clock instead
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_issuer(&[self.config.issuer_url.as_str()]);

        decode::<AccessTokenClaims>(token, key.decoding_key(), &validation)
            .map(|data| data.claims)
            .map_err(|e| convert_jwt_error(&e))
    }

    /// Full verification including expiry at the clock's current time
    ///
    /// # Errors
    /// `TokenExpired` once `exp` is reached, otherwise as `decode_access_token`
    pub fn verify_access_token(&self, token: &str) -> Result<AccessTokenClaims, JwtValidationError> {
        let claims = self.decode_access_token(token)?;
        let now = self.clock.now();

        if claims.exp <= now.timestamp() {
            return Err(JwtValidationError::TokenExpired {
                expired_at: DateTime::from_timestamp(claims.exp, 0).unwrap_or_default(),
                current_time: now,
            });
        }
        Ok(claims)
    }
}
