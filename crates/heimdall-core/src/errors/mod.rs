// ABOUTME: OAuth 2.0 error taxonomy with RFC 6749 error codes and HTTP status mapping
// ABOUTME: Collapses grant and security failures into invalid_grant to avoid validity oracles
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors

//! # Error Handling
//!
//! Every protocol operation returns [`OAuthError`]. The variant decides the
//! RFC error code a client sees; the `detail` strings are for logs only and
//! are never placed in a response body for grant, security, or storage
//! failures.

/// Storage error type shared by all stores
pub mod storage;

pub use storage::StorageError;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result alias for protocol operations
pub type OAuthResult<T> = Result<T, OAuthError>;

/// Request validation failures that are reported to the client verbatim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationKind {
    /// Missing, malformed, or mismatched request parameter
    InvalidRequest,
    /// Unknown, inactive, or unauthenticated client
    InvalidClient,
    /// Malformed scope or scope outside the client's allowance
    InvalidScope,
    /// `response_type` other than `code`
    UnsupportedResponseType,
    /// `grant_type` the token endpoint does not implement
    UnsupportedGrantType,
    /// Bearer token presented to a protected resource is not active (RFC 6750)
    InvalidToken,
}

impl ValidationKind {
    /// RFC 6749 error code
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::InvalidScope => "invalid_scope",
            Self::UnsupportedResponseType => "unsupported_response_type",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::InvalidToken => "invalid_token",
        }
    }
}

impl fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed error type for the authorization server
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// Request rejected before any state changed
    #[error("{kind}: {detail}")]
    Validation {
        /// RFC error code
        kind: ValidationKind,
        /// Human-readable explanation, safe to return
        detail: String,
    },

    /// Code or refresh token could not be redeemed (not found, expired, used, mismatched)
    #[error("invalid_grant: {detail}")]
    Grant {
        /// Internal reason, logged but never returned
        detail: String,
    },

    /// PKCE or signature mismatch
    #[error("invalid_grant (security): {detail}")]
    Security {
        /// Internal reason, logged but never returned
        detail: String,
    },

    /// Persistence failure
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),

    /// Signing, randomness, or serialization failure inside the server
    #[error("internal error: {detail}")]
    Internal {
        /// Internal reason, logged but never returned
        detail: String,
    },
}

/// Generic description for redemption failures
const GRANT_DESCRIPTION: &str =
    "The provided authorization grant or refresh token is invalid, expired, revoked, or was issued to another client";

/// Generic description for server-side failures
const SERVER_ERROR_DESCRIPTION: &str =
    "The authorization server encountered an unexpected condition";

impl OAuthError {
    /// Create an `invalid_request` error
    #[must_use]
    pub fn invalid_request(detail: impl Into<String>) -> Self {
        Self::validation(ValidationKind::InvalidRequest, detail)
    }

    /// Create an `invalid_client` error
    #[must_use]
    pub fn invalid_client(detail: impl Into<String>) -> Self {
        Self::validation(ValidationKind::InvalidClient, detail)
    }

    /// Create an `invalid_scope` error
    #[must_use]
    pub fn invalid_scope(detail: impl Into<String>) -> Self {
        Self::validation(ValidationKind::InvalidScope, detail)
    }

    /// Create an `unsupported_response_type` error
    #[must_use]
    pub fn unsupported_response_type(detail: impl Into<String>) -> Self {
        Self::validation(ValidationKind::UnsupportedResponseType, detail)
    }

    /// Create an `unsupported_grant_type` error
    #[must_use]
    pub fn unsupported_grant_type(detail: impl Into<String>) -> Self {
        Self::validation(ValidationKind::UnsupportedGrantType, detail)
    }

    /// Create an `invalid_token` error for bearer-protected resources
    #[must_use]
    pub fn invalid_token(detail: impl Into<String>) -> Self {
        Self::validation(ValidationKind::InvalidToken, detail)
    }

    /// Create a validation error of the given kind
    #[must_use]
    pub fn validation(kind: ValidationKind, detail: impl Into<String>) -> Self {
        Self::Validation {
            kind,
            detail: detail.into(),
        }
    }

    /// Create an `invalid_grant` error
    #[must_use]
    pub fn invalid_grant(detail: impl Into<String>) -> Self {
        Self::Grant {
            detail: detail.into(),
        }
    }

    /// Create a security error (reported as `invalid_grant`)
    #[must_use]
    pub fn security(detail: impl Into<String>) -> Self {
        Self::Security {
            detail: detail.into(),
        }
    }

    /// Create an internal error (reported as `server_error`)
    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal {
            detail: detail.into(),
        }
    }

    /// RFC 6749 error code seen by the client
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { kind, .. } => kind.as_str(),
            Self::Grant { .. } | Self::Security { .. } => "invalid_grant",
            Self::Storage(_) | Self::Internal { .. } => "server_error",
        }
    }

    /// Description safe to return to the client
    #[must_use]
    pub fn public_description(&self) -> String {
        match self {
            Self::Validation { detail, .. } => detail.clone(),
            Self::Grant { .. } | Self::Security { .. } => GRANT_DESCRIPTION.to_owned(),
            Self::Storage(_) | Self::Internal { .. } => SERVER_ERROR_DESCRIPTION.to_owned(),
        }
    }

    /// HTTP status for the token endpoint (RFC 6749 Section 5.2)
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::Validation {
                kind: ValidationKind::InvalidClient | ValidationKind::InvalidToken,
                ..
            } => 401,
            Self::Validation { .. } | Self::Grant { .. } | Self::Security { .. } => 400,
            Self::Storage(_) | Self::Internal { .. } => 500,
        }
    }

    /// Whether this failure is the client's fault
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        self.http_status() < 500
    }

    /// Build the RFC 6749 JSON error body
    #[must_use]
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.error_code().to_owned(),
            error_description: Some(self.public_description()),
        }
    }
}

/// RFC 6749 Section 5.2 error body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code
    pub error: String,
    /// Human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

#[cfg(feature = "http-response")]
impl axum::response::IntoResponse for OAuthError {
    fn into_response(self) -> axum::response::Response {
        let status = http::StatusCode::from_u16(self.http_status())
            .unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR);

        if self.is_client_error() {
            tracing::debug!(error = %self, "OAuth request rejected");
        } else {
            tracing::error!(error = %self, "OAuth request failed");
        }

        let mut response = (status, axum::Json(self.to_response())).into_response();
        // RFC 6749 Section 5.1: token responses must not be cached
        response.headers_mut().insert(
            http::header::CACHE_CONTROL,
            http::HeaderValue::from_static("no-store"),
        );
        let challenge = match &self {
            Self::Validation {
                kind: ValidationKind::InvalidToken,
                ..
            } => Some("Bearer realm=\"heimdall\", error=\"invalid_token\""),
            Self::Validation {
                kind: ValidationKind::InvalidClient,
                ..
            } => Some("Basic realm=\"heimdall\""),
            _ => None,
        };
        if let Some(challenge) = challenge {
            response.headers_mut().insert(
                http::header::WWW_AUTHENTICATE,
                http::HeaderValue::from_static(challenge),
            );
        }
        response
    }
}
