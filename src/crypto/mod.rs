// ABOUTME: Cryptographic building blocks for codes, tokens, and PKCE
// ABOUTME: Secret generation and hashing, PKCE verification, and RS256 key management
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors

/// RS256 signing keys and JWKS
pub mod keys;
/// PKCE verifier checks
pub mod pkce;
/// Opaque secret generation, hashing, and comparison
pub mod secrets;

pub use keys::{JsonWebKey, JsonWebKeySet, JwksManager, RsaKeyPair};
pub use secrets::{constant_time_eq, generate_prefixed_secret, has_secret_format, hash_secret};
