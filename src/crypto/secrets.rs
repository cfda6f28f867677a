// ABOUTME: Generation, hashing, and constant-time comparison of opaque OAuth secrets
// ABOUTME: Authorization codes and refresh tokens are prefixed 256-bit URL-safe values
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use heimdall_core::constants::tokens::{SECRET_ENCODED_LEN, SECRET_RANDOM_BYTES};
use heimdall_core::errors::{OAuthError, OAuthResult};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// Generate `prefix` followed by 256 bits of CSPRNG output, URL-safe base64 encoded
///
/// # Errors
/// Returns an internal error if the system RNG fails - this is a critical
/// security failure and no secret may be issued without working RNG
pub fn generate_prefixed_secret(prefix: &str) -> OAuthResult<String> {
    let rng = SystemRandom::new();
    let mut bytes = Zeroizing::new([0u8; SECRET_RANDOM_BYTES]);

    rng.fill(bytes.as_mut()).map_err(|e| {
        tracing::error!(
            "CRITICAL: SystemRandom failed - cannot generate secure random bytes: {}",
            e
        );
        OAuthError::internal("System RNG failure - server cannot operate securely")
    })?;

    let mut secret = String::with_capacity(prefix.len() + SECRET_ENCODED_LEN);
    secret.push_str(prefix);
    URL_SAFE_NO_PAD.encode_string(bytes.as_ref(), &mut secret);
    Ok(secret)
}

/// Whether `value` has the shape of a secret produced with `prefix`
#[must_use]
pub fn has_secret_format(value: &str, prefix: &str) -> bool {
    value.strip_prefix(prefix).is_some_and(|body| {
        body.len() == SECRET_ENCODED_LEN
            && body
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    })
}

/// One-way hash used as the storage key for codes, JTIs, and refresh tokens
#[must_use]
pub fn hash_secret(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

/// Constant-time equality for secret material
///
/// On a length mismatch an equal-cost comparison of `expected` against itself
/// still runs, so the rejection takes as long as a same-length mismatch.
#[must_use]
pub fn constant_time_eq(provided: &[u8], expected: &[u8]) -> bool {
    if provided.len() == expected.len() {
        return provided.ct_eq(expected).into();
    }
    let burn: bool = expected.ct_eq(expected).into();
    // `burn` is always true; the branch keeps the comparison from being optimized out
    !burn
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_shape() {
        let Ok(secret) = generate_prefixed_secret("hac_") else {
            return;
        };

        assert!(secret.starts_with("hac_"));
        assert_eq!(secret.len(), 4 + SECRET_ENCODED_LEN);
        assert!(has_secret_format(&secret, "hac_"));
        assert!(!has_secret_format(&secret, "hrt_"));
        assert!(!has_secret_format("hac_short", "hac_"));
    }

    #[test]
    fn test_secrets_are_unique() {
        let first = generate_prefixed_secret("x_").unwrap_or_default();
        let second = generate_prefixed_secret("x_").unwrap_or_default();

        assert_ne!(first, second);
    }

    #[test]
    fn test_hash_is_stable_hex_and_hides_input() {
        let hash = hash_secret("hrt_value");

        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_secret("hrt_value"));
        assert!(!hash.contains("hrt_value"));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"challenge", b"challenge"));
        assert!(!constant_time_eq(b"challenge", b"challengf"));
        assert!(!constant_time_eq(b"short", b"much longer value"));
        assert!(!constant_time_eq(b"", b"x"));
        assert!(constant_time_eq(b"", b""));
    }
}
