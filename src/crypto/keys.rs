// ABOUTME: RS256 signing key pairs and the JSON Web Key Set published to resource servers
// ABOUTME: Keys are loaded from PKCS#8 PEM or generated; every key stays available for verification
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors

//! Signing key management
//!
//! Access tokens are signed with the active RSA key and carry its `kid` in
//! the JOSE header. Retired keys stay registered so tokens minted before a
//! rotation still verify until they expire.

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey};
use rsa::{
    pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding},
    traits::PublicKeyParts,
    RsaPrivateKey, RsaPublicKey,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// RSA modulus size used for generated production keys
pub const RSA_KEY_SIZE: usize = 4096;

/// Smaller modulus for tests and benchmarks
pub const RSA_TEST_KEY_SIZE: usize = 2048;

/// JWK (JSON Web Key) representation of an RSA public key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonWebKey {
    /// Key type, always "RSA"
    pub kty: String,
    /// Public key use, always "sig"
    #[serde(rename = "use")]
    pub key_use: String,
    /// Key ID matching the `kid` JOSE header
    pub kid: String,
    /// Algorithm, always "RS256"
    pub alg: String,
    /// Modulus (base64url)
    pub n: String,
    /// Public exponent (base64url)
    pub e: String,
}

/// JWKS document served at `/.well-known/jwks.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonWebKeySet {
    /// Published verification keys
    pub keys: Vec<JsonWebKey>,
}

/// RSA key pair with its precomputed JWT keys
#[derive(Clone)]
pub struct RsaKeyPair {
    /// Key identifier
    pub kid: String,
    /// Public half, published in the JWKS
    pub public_key: RsaPublicKey,
    /// When the key was created or loaded
    pub created_at: DateTime<Utc>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl fmt::Debug for RsaKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaKeyPair")
            .field("kid", &self.kid)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

impl RsaKeyPair {
    /// Generate a fresh key pair
    ///
    /// # Errors
    /// Returns error if key generation or PEM conversion fails
    pub fn generate_with_key_size(kid: &str, key_size_bits: usize) -> Result<Self> {
        use rand::rngs::OsRng;

        let mut rng = OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, key_size_bits)
            .map_err(|e| anyhow!("Failed to generate RSA private key: {e}"))?;

        Self::from_private_key(kid, &private_key)
    }

    /// Import a PKCS#8 PEM private key
    ///
    /// # Errors
    /// Returns error if the PEM cannot be parsed
    pub fn from_pkcs8_pem(kid: &str, pem: &str) -> Result<Self> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(pem)
            .map_err(|e| anyhow!("Failed to parse private key PEM: {e}"))?;

        Self::from_private_key(kid, &private_key)
    }

    fn from_private_key(kid: &str, private_key: &RsaPrivateKey) -> Result<Self> {
        let public_key = RsaPublicKey::from(private_key);

        let private_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| anyhow!("Failed to export private key as PEM: {e}"))?;
        let public_pem = public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| anyhow!("Failed to export public key as PEM: {e}"))?;

        let encoding_key = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .map_err(|e| anyhow!("Failed to create encoding key: {e}"))?;
        let decoding_key = DecodingKey::from_rsa_pem(public_pem.as_bytes())
            .map_err(|e| anyhow!("Failed to create decoding key: {e}"))?;

        Ok(Self {
            kid: kid.to_owned(),
            public_key,
            created_at: Utc::now(),
            encoding_key,
            decoding_key,
        })
    }

    /// Key used to sign access tokens
    #[must_use]
    pub const fn encoding_key(&self) -> &EncodingKey {
        &self.encoding_key
    }

    /// Key used to verify access tokens
    #[must_use]
    pub const fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    /// Public key in JWK form
    #[must_use]
    pub fn to_jwk(&self) -> JsonWebKey {
        JsonWebKey {
            kty: "RSA".to_owned(),
            key_use: "sig".to_owned(),
            kid: self.kid.clone(),
            alg: "RS256".to_owned(),
            n: URL_SAFE_NO_PAD.encode(self.public_key.n().to_bytes_be()),
            e: URL_SAFE_NO_PAD.encode(self.public_key.e().to_bytes_be()),
        }
    }
}

/// Registry of signing keys with one active signer
#[derive(Debug, Default)]
pub struct JwksManager {
    keys: HashMap<String, RsaKeyPair>,
    active_key_id: Option<String>,
}

impl JwksManager {
    /// Empty manager
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a key, register it, and make it the active signer
    ///
    /// # Errors
    /// Returns error if key generation fails
    pub fn generate_rsa_key_pair_with_size(
        &mut self,
        kid: &str,
        key_size_bits: usize,
    ) -> Result<()> {
        let key_pair = RsaKeyPair::generate_with_key_size(kid, key_size_bits)?;
        self.register(key_pair, true);
        Ok(())
    }

    /// Register a PEM private key, optionally as the active signer
    ///
    /// # Errors
    /// Returns error if the PEM cannot be parsed
    pub fn register_keypair_from_pem(
        &mut self,
        kid: &str,
        private_key_pem: &str,
        is_active: bool,
    ) -> Result<()> {
        let key_pair = RsaKeyPair::from_pkcs8_pem(kid, private_key_pem)?;
        self.register(key_pair, is_active);
        Ok(())
    }

    /// Read a PEM file and register it as the active signer
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn load_active_key_file(&mut self, kid: &str, path: &Path) -> Result<()> {
        let pem = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read signing key {}", path.display()))?;
        self.register_keypair_from_pem(kid, &pem, true)
    }

    fn register(&mut self, key_pair: RsaKeyPair, is_active: bool) {
        if is_active {
            self.active_key_id = Some(key_pair.kid.clone());
        }
        self.keys.insert(key_pair.kid.clone(), key_pair);
    }

    /// Current signing key
    ///
    /// # Errors
    /// Returns error if no key has been activated
    pub fn get_active_key(&self) -> Result<&RsaKeyPair> {
        let kid = self
            .active_key_id
            .as_ref()
            .ok_or_else(|| anyhow!("No active signing key"))?;

        self.keys
            .get(kid)
            .ok_or_else(|| anyhow!("Active key not found: {kid}"))
    }

    /// Key by ID, active or retired
    #[must_use]
    pub fn get_key(&self, kid: &str) -> Option<&RsaKeyPair> {
        self.keys.get(kid)
    }

    /// Public JWKS, ordered by `kid` so the document is stable
    #[must_use]
    pub fn get_jwks(&self) -> JsonWebKeySet {
        let mut keys: Vec<JsonWebKey> = self.keys.values().map(RsaKeyPair::to_jwk).collect();
        keys.sort_by(|a, b| a.kid.cmp(&b.kid));
        JsonWebKeySet { keys }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_key_and_jwks() {
        let mut manager = JwksManager::new();
        assert!(manager.get_active_key().is_err());

        manager
            .generate_rsa_key_pair_with_size("k1", RSA_TEST_KEY_SIZE)
            .unwrap();
        manager
            .generate_rsa_key_pair_with_size("k2", RSA_TEST_KEY_SIZE)
            .unwrap();

        assert_eq!(manager.get_active_key().unwrap().kid, "k2");
        assert!(manager.get_key("k1").is_some());

        let jwks = manager.get_jwks();
        let kids: Vec<&str> = jwks.keys.iter().map(|k| k.kid.as_str()).collect();
        assert_eq!(kids, vec!["k1", "k2"]);
        assert!(jwks.keys.iter().all(|k| k.alg == "RS256" && k.key_use == "sig"));
        assert_eq!(jwks.keys[0].e, "AQAB");
    }

    #[test]
    fn test_pem_import_keeps_modulus() {
        let original = RsaKeyPair::generate_with_key_size("orig", RSA_TEST_KEY_SIZE).unwrap();
        let pem = {
            use rsa::pkcs8::EncodePrivateKey as _;
            let private = RsaPrivateKey::new(&mut rand::rngs::OsRng, RSA_TEST_KEY_SIZE).unwrap();
            private.to_pkcs8_pem(LineEnding::LF).unwrap().to_string()
        };

        let mut manager = JwksManager::new();
        manager.register_keypair_from_pem("imported", &pem, false).unwrap();

        assert!(manager.get_active_key().is_err());
        assert_eq!(manager.get_key("imported").unwrap().to_jwk().kty, "RSA");
        assert_ne!(
            manager.get_key("imported").unwrap().to_jwk().n,
            original.to_jwk().n
        );
    }

    #[test]
    fn test_invalid_pem_rejected() {
        let mut manager = JwksManager::new();
        assert!(manager
            .register_keypair_from_pem("bad", "not a pem", true)
            .is_err());
    }
}
