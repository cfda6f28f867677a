// ABOUTME: Narrow interfaces to the external client directory and user profile provider
// ABOUTME: Includes a static registry implementation loadable from YAML for the bundled binary
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors

//! Collaborators the protocol engine consumes but does not own
//!
//! Client registration and end-user authentication live outside this crate.
//! The engine only needs to resolve a client by id, check its credentials on
//! the HTTP surface, and fetch a user's profile claims.

use crate::crypto::{constant_time_eq, hash_secret};
use anyhow::{Context, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use heimdall_core::errors::OAuthResult;
use heimdall_core::models::{ClientRecord, ClientStatus, UserProfile};
use heimdall_core::scope::ScopeSet;
use serde::Deserialize;
use std::path::Path;

/// Read access to registered OAuth clients
#[async_trait]
pub trait ClientDirectory: Send + Sync {
    /// Resolve a client registration
    async fn get_by_id(&self, client_id: &str) -> OAuthResult<Option<ClientRecord>>;

    /// Exact-match redirect URI check against the client's registration
    async fn is_redirect_uri_allowed(
        &self,
        client_id: &str,
        redirect_uri: &str,
    ) -> OAuthResult<bool> {
        Ok(self
            .get_by_id(client_id)
            .await?
            .is_some_and(|client| client.has_redirect_uri(redirect_uri)))
    }

    /// Verify client credentials
    ///
    /// Public clients have no secret and authenticate by id alone; a
    /// confidential client must present its secret.
    async fn authenticate(
        &self,
        client_id: &str,
        client_secret: Option<&str>,
    ) -> OAuthResult<Option<ClientRecord>>;

    /// Whether the client holds a secret; unknown clients are not confidential
    async fn is_confidential(&self, client_id: &str) -> OAuthResult<bool>;
}

/// Read access to end-user profile claims
#[async_trait]
pub trait UserProfileProvider: Send + Sync {
    /// Resolve a user's profile
    async fn get(&self, user_id: &str) -> OAuthResult<Option<UserProfile>>;
}

#[derive(Debug, Clone)]
struct RegisteredClient {
    record: ClientRecord,
    /// SHA-256 hex of the client secret; `None` for public clients
    secret_hash: Option<String>,
}

/// In-process client directory
#[derive(Debug, Default)]
pub struct StaticClientDirectory {
    clients: DashMap<String, RegisteredClient>,
}

impl StaticClientDirectory {
    /// Empty directory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a public client (PKCE, no secret)
    pub fn register_public(&self, record: ClientRecord) {
        self.clients.insert(
            record.client_id.clone(),
            RegisteredClient {
                record,
                secret_hash: None,
            },
        );
    }

    /// Register a confidential client with its plaintext secret
    pub fn register_confidential(&self, record: ClientRecord, client_secret: &str) {
        self.register_with_secret_hash(record, hash_secret(client_secret));
    }

    fn register_with_secret_hash(&self, record: ClientRecord, secret_hash: String) {
        self.clients.insert(
            record.client_id.clone(),
            RegisteredClient {
                record,
                secret_hash: Some(secret_hash),
            },
        );
    }

    /// Change a client's status
    pub fn set_status(&self, client_id: &str, status: ClientStatus) {
        if let Some(mut entry) = self.clients.get_mut(client_id) {
            entry.record.status = status;
        }
    }

    /// Number of registered clients
    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether no client is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[async_trait]
impl ClientDirectory for StaticClientDirectory {
    async fn get_by_id(&self, client_id: &str) -> OAuthResult<Option<ClientRecord>> {
        Ok(self
            .clients
            .get(client_id)
            .map(|entry| entry.record.clone()))
    }

    async fn is_confidential(&self, client_id: &str) -> OAuthResult<bool> {
        Ok(self
            .clients
            .get(client_id)
            .is_some_and(|entry| entry.secret_hash.is_some()))
    }

    async fn authenticate(
        &self,
        client_id: &str,
        client_secret: Option<&str>,
    ) -> OAuthResult<Option<ClientRecord>> {
        let Some(entry) = self.clients.get(client_id).map(|e| e.value().clone()) else {
            return Ok(None);
        };

        let authenticated = match (&entry.secret_hash, client_secret) {
            (None, _) => true,
            (Some(expected), Some(provided)) => {
                constant_time_eq(hash_secret(provided).as_bytes(), expected.as_bytes())
            }
            (Some(_), None) => false,
        };

        Ok(authenticated.then_some(entry.record))
    }
}

/// In-process user profile provider
#[derive(Debug, Default)]
pub struct StaticProfileProvider {
    profiles: DashMap<String, UserProfile>,
}

impl StaticProfileProvider {
    /// Empty provider
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a profile
    pub fn upsert(&self, profile: UserProfile) {
        self.profiles.insert(profile.user_id.clone(), profile);
    }

    /// Remove a profile
    pub fn remove(&self, user_id: &str) {
        self.profiles.remove(user_id);
    }
}

#[async_trait]
impl UserProfileProvider for StaticProfileProvider {
    async fn get(&self, user_id: &str) -> OAuthResult<Option<UserProfile>> {
        Ok(self.profiles.get(user_id).map(|entry| entry.clone()))
    }
}

fn default_status() -> ClientStatus {
    ClientStatus::Active
}

/// Client entry in a registry file
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryClient {
    /// OAuth `client_id`
    pub client_id: String,
    /// SHA-256 hex of the client secret; omitted for public clients
    #[serde(default)]
    pub client_secret_sha256: Option<String>,
    /// Owning tenant
    pub tenant_id: String,
    /// Exact redirect URIs
    pub redirect_uris: Vec<String>,
    /// Space-delimited allowed scopes
    pub allowed_scopes: ScopeSet,
    /// Whether PKCE is mandatory
    #[serde(default)]
    pub require_pkce: bool,
    /// Registration status
    #[serde(default = "default_status")]
    pub status: ClientStatus,
}

/// Contents of a YAML registry file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Registry {
    /// Registered clients
    #[serde(default)]
    pub clients: Vec<RegistryClient>,
    /// Known users
    #[serde(default)]
    pub users: Vec<UserProfile>,
}

impl Registry {
    /// Parse registry YAML
    ///
    /// # Errors
    /// Returns error if the YAML does not match the registry layout
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Invalid registry YAML")
    }

    /// Read and parse a registry file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read registry {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Build the in-process collaborators
    #[must_use]
    pub fn into_directories(self) -> (StaticClientDirectory, StaticProfileProvider) {
        let directory = StaticClientDirectory::new();
        for client in self.clients {
            let record = ClientRecord {
                client_id: client.client_id,
                tenant_id: client.tenant_id,
                redirect_uris: client.redirect_uris,
                allowed_scopes: client.allowed_scopes,
                require_pkce: client.require_pkce,
                status: client.status,
            };
            match client.client_secret_sha256 {
                Some(hash) => {
                    directory.register_with_secret_hash(record, hash.to_ascii_lowercase());
                }
                None => directory.register_public(record),
            }
        }

        let profiles = StaticProfileProvider::new();
        for user in self.users {
            profiles.upsert(user);
        }

        (directory, profiles)
    }
}
