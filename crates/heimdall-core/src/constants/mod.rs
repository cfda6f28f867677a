// ABOUTME: Protocol constants for authorization codes, tokens, and retention windows
// ABOUTME: Centralizes prefixes, default lifetimes, and RFC literal values
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors

/// Token and code formats
pub mod tokens {
    /// Prefix carried by every authorization code
    pub const AUTH_CODE_PREFIX: &str = "hac_";

    /// Prefix carried by every refresh token
    pub const REFRESH_TOKEN_PREFIX: &str = "hrt_";

    /// Bytes of CSPRNG output behind each code or refresh token (256 bits)
    pub const SECRET_RANDOM_BYTES: usize = 32;

    /// Length of the URL-safe base64 encoding of `SECRET_RANDOM_BYTES`
    pub const SECRET_ENCODED_LEN: usize = 43;

    /// Token type returned in token and introspection responses
    pub const TOKEN_TYPE_BEARER: &str = "Bearer";

    /// JWS algorithm used for access tokens
    pub const ACCESS_TOKEN_ALGORITHM: &str = "RS256";
}

/// Default lifetimes
pub mod lifetimes {
    /// Authorization code lifetime in seconds
    pub const AUTH_CODE_TTL_SECS: i64 = 600;

    /// Access token lifetime in seconds
    pub const ACCESS_TOKEN_TTL_SECS: i64 = 3600;

    /// Refresh token lifetime in days
    pub const REFRESH_TOKEN_TTL_DAYS: i64 = 30;

    /// How long revoked tokens and consumed codes are kept for audit
    pub const AUDIT_RETENTION_DAYS: i64 = 30;

    /// Interval between cleanup passes in seconds
    pub const CLEANUP_INTERVAL_SECS: u64 = 3600;

    /// Upper bound on any single store call in milliseconds
    pub const STORE_TIMEOUT_MS: u64 = 5000;
}

/// RFC 6749 / 7636 / 7662 / 7009 literal values
pub mod protocol {
    /// The only supported `response_type`
    pub const RESPONSE_TYPE_CODE: &str = "code";

    /// `grant_type` for the authorization code exchange
    pub const GRANT_TYPE_AUTHORIZATION_CODE: &str = "authorization_code";

    /// `grant_type` for refresh token rotation
    pub const GRANT_TYPE_REFRESH_TOKEN: &str = "refresh_token";

    /// `token_type_hint` for access tokens
    pub const HINT_ACCESS_TOKEN: &str = "access_token";

    /// `token_type_hint` for refresh tokens
    pub const HINT_REFRESH_TOKEN: &str = "refresh_token";

    /// PKCE method name for SHA-256 challenges
    pub const PKCE_METHOD_S256: &str = "S256";

    /// PKCE method name for plain challenges
    pub const PKCE_METHOD_PLAIN: &str = "plain";
}

/// Scopes that gate identity claims in access tokens
pub mod scopes {
    /// `OpenID` Connect marker scope
    pub const OPENID: &str = "openid";

    /// Grants `email` and `email_verified`
    pub const EMAIL: &str = "email";

    /// Grants `name`, `given_name`, `family_name`, `picture`, `updated_at`
    pub const PROFILE: &str = "profile";
}

/// Domain event names published to observers
pub mod events {
    /// An authorization code was issued
    pub const CODE_ISSUED: &str = "code.issued";

    /// A token pair was minted
    pub const TOKEN_ISSUED: &str = "token.issued";

    /// A token pair was revoked
    pub const TOKEN_REVOKED: &str = "token.revoked";
}

/// Service identity
pub mod service_names {
    /// Name used in logs and discovery metadata
    pub const HEIMDALL: &str = "heimdall";
}
