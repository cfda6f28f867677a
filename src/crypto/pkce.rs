// ABOUTME: PKCE code_verifier verification for S256 and plain challenges (RFC 7636)
// ABOUTME: Every comparison runs in constant time regardless of where the values differ
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors

use super::secrets::constant_time_eq;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use heimdall_core::models::{PkceChallenge, PkceMethod};
use sha2::{Digest, Sha256};

/// Compute the S256 challenge for a verifier: `BASE64URL(SHA256(verifier))`
#[must_use]
pub fn s256_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Whether `verifier` satisfies the stored challenge
#[must_use]
pub fn verify(challenge: &PkceChallenge, verifier: &str) -> bool {
    match challenge.method {
        PkceMethod::Plain => {
            constant_time_eq(verifier.as_bytes(), challenge.challenge.as_bytes())
        }
        PkceMethod::S256 => {
            let computed = s256_challenge(verifier);
            constant_time_eq(computed.as_bytes(), challenge.challenge.as_bytes())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn challenge(value: &str, method: PkceMethod) -> PkceChallenge {
        PkceChallenge {
            challenge: value.to_owned(),
            method,
        }
    }

    #[test]
    fn test_s256_rfc7636_appendix_b() {
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        let expected = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

        assert_eq!(s256_challenge(verifier), expected);
        assert!(verify(&challenge(expected, PkceMethod::S256), verifier));
        assert!(!verify(&challenge(expected, PkceMethod::S256), "wrong-verifier"));
    }

    #[test]
    fn test_plain_requires_exact_match() {
        let stored = challenge("abc123", PkceMethod::Plain);

        assert!(verify(&stored, "abc123"));
        assert!(!verify(&stored, "abc124"));
        assert!(!verify(&stored, "abc1234"));
    }

    #[test]
    fn test_s256_challenge_is_not_accepted_as_plain_verifier() {
        let stored = challenge(&s256_challenge("abc123"), PkceMethod::S256);

        assert!(!verify(&stored, &stored.challenge.clone()));
    }
}
