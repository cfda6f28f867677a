// ABOUTME: Persistence interfaces for authorization codes, token records, and consents
// ABOUTME: Conditional updates return whether this caller won; every call can be time-bounded
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors

//! Store abstraction
//!
//! The protocol services never lock anything themselves. Single-use codes and
//! single-use refresh tokens rely on the conditional writes below:
//! `mark_code_consumed` and `revoke_if_active` succeed for exactly one caller
//! and report `false` to every other racer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use heimdall_core::errors::StorageError;
use heimdall_core::models::{AuthorizationCode, Consent, TokenRecord};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use uuid::Uuid;

/// Process-local store backed by `DashMap`
pub mod memory;
/// `SQLite` store backed by sqlx
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::InMemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

/// Result alias for store calls
pub type StorageResult<T> = Result<T, StorageError>;

/// Authorization code persistence, keyed by the SHA-256 hash of the code
#[async_trait]
pub trait AuthorizationCodeStore: Send + Sync {
    /// Insert a freshly issued code
    async fn insert_code(&self, code: &AuthorizationCode) -> StorageResult<()>;

    /// Look up a code by hash
    async fn find_code(&self, code_hash: &str) -> StorageResult<Option<AuthorizationCode>>;

    /// Set `consumed_at` only if it is still unset; `true` when this call set it
    async fn mark_code_consumed(
        &self,
        code_hash: &str,
        consumed_at: DateTime<Utc>,
    ) -> StorageResult<bool>;

    /// Delete codes that expired without ever being redeemed
    async fn delete_expired_unused_codes(&self, now: DateTime<Utc>) -> StorageResult<u64>;

    /// Delete redeemed codes consumed before `cutoff`
    async fn delete_consumed_codes_before(&self, cutoff: DateTime<Utc>) -> StorageResult<u64>;
}

/// Token record persistence
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Insert a freshly minted token pair
    async fn insert_token(&self, record: &TokenRecord) -> StorageResult<()>;

    /// Look up by the hash of the access token's JTI
    async fn find_by_access_hash(&self, access_hash: &str) -> StorageResult<Option<TokenRecord>>;

    /// Look up by the hash of the refresh token
    async fn find_by_refresh_hash(&self, refresh_hash: &str)
        -> StorageResult<Option<TokenRecord>>;

    /// Set `revoked_at` only if it is still unset; `true` when this call set it
    async fn revoke_if_active(&self, id: Uuid, revoked_at: DateTime<Utc>) -> StorageResult<bool>;

    /// Delete records whose access and refresh expiries have both passed
    async fn delete_expired_tokens(&self, now: DateTime<Utc>) -> StorageResult<u64>;

    /// Delete records revoked before `cutoff`
    async fn delete_revoked_before(&self, cutoff: DateTime<Utc>) -> StorageResult<u64>;
}

/// Consent persistence, one row per (user, client)
#[async_trait]
pub trait ConsentStore: Send + Sync {
    /// Consent for a user and client
    async fn get_consent(&self, user_id: &str, client_id: &str) -> StorageResult<Option<Consent>>;

    /// Insert or replace the consent for the record's (user, client)
    async fn upsert_consent(&self, consent: &Consent) -> StorageResult<()>;

    /// Delete a consent; `true` when a row existed
    async fn delete_consent(&self, user_id: &str, client_id: &str) -> StorageResult<bool>;

    /// Every consent a user has granted, ordered by client id
    async fn list_consents(&self, user_id: &str) -> StorageResult<Vec<Consent>>;
}

/// Everything the authorization server persists
pub trait OAuthStore: AuthorizationCodeStore + TokenStore + ConsentStore {}

impl<T> OAuthStore for T where T: AuthorizationCodeStore + TokenStore + ConsentStore {}

/// Run a store operation under a time bound
///
/// # Errors
/// Returns `StorageError::Timeout` when `limit` elapses first, otherwise the
/// operation's own result
pub async fn with_store_timeout<F, T>(
    operation: &'static str,
    limit: Duration,
    future: F,
) -> StorageResult<T>
where
    F: Future<Output = StorageResult<T>> + Send,
{
    timeout(limit, future).await.map_or_else(
        |_| {
            tracing::error!(operation, ?limit, "Store operation timed out");
            Err(StorageError::Timeout {
                operation,
                elapsed: limit,
            })
        },
        |result| result,
    )
}

/// Store decorator that bounds every call with `with_store_timeout`
#[derive(Debug, Clone)]
pub struct BoundedStore<S> {
    inner: S,
    limit: Duration,
}

impl<S> BoundedStore<S> {
    /// Wrap `inner` with a per-call bound
    #[must_use]
    pub const fn new(inner: S, limit: Duration) -> Self {
        Self { inner, limit }
    }

    /// Wrapped store
    #[must_use]
    pub const fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: AuthorizationCodeStore> AuthorizationCodeStore for BoundedStore<S> {
    async fn insert_code(&self, code: &AuthorizationCode) -> StorageResult<()> {
        with_store_timeout("insert_code", self.limit, self.inner.insert_code(code)).await
    }

    async fn find_code(&self, code_hash: &str) -> StorageResult<Option<AuthorizationCode>> {
        with_store_timeout("find_code", self.limit, self.inner.find_code(code_hash)).await
    }

    async fn mark_code_consumed(
        &self,
        code_hash: &str,
        consumed_at: DateTime<Utc>,
    ) -> StorageResult<bool> {
        with_store_timeout(
            "mark_code_consumed",
            self.limit,
            self.inner.mark_code_consumed(code_hash, consumed_at),
        )
        .await
    }

    async fn delete_expired_unused_codes(&self, now: DateTime<Utc>) -> StorageResult<u64> {
        with_store_timeout(
            "delete_expired_unused_codes",
            self.limit,
            self.inner.delete_expired_unused_codes(now),
        )
        .await
    }

    async fn delete_consumed_codes_before(&self, cutoff: DateTime<Utc>) -> StorageResult<u64> {
        with_store_timeout(
            "delete_consumed_codes_before",
            self.limit,
            self.inner.delete_consumed_codes_before(cutoff),
        )
        .await
    }
}

#[async_trait]
impl<S: TokenStore> TokenStore for BoundedStore<S> {
    async fn insert_token(&self, record: &TokenRecord) -> StorageResult<()> {
        with_store_timeout("insert_token", self.limit, self.inner.insert_token(record)).await
    }

    async fn find_by_access_hash(&self, access_hash: &str) -> StorageResult<Option<TokenRecord>> {
        with_store_timeout(
            "find_by_access_hash",
            self.limit,
            self.inner.find_by_access_hash(access_hash),
        )
        .await
    }

    async fn find_by_refresh_hash(
        &self,
        refresh_hash: &str,
    ) -> StorageResult<Option<TokenRecord>> {
        with_store_timeout(
            "find_by_refresh_hash",
            self.limit,
            self.inner.find_by_refresh_hash(refresh_hash),
        )
        .await
    }

    async fn revoke_if_active(&self, id: Uuid, revoked_at: DateTime<Utc>) -> StorageResult<bool> {
        with_store_timeout(
            "revoke_if_active",
            self.limit,
            self.inner.revoke_if_active(id, revoked_at),
        )
        .await
    }

    async fn delete_expired_tokens(&self, now: DateTime<Utc>) -> StorageResult<u64> {
        with_store_timeout(
            "delete_expired_tokens",
            self.limit,
            self.inner.delete_expired_tokens(now),
        )
        .await
    }

    async fn delete_revoked_before(&self, cutoff: DateTime<Utc>) -> StorageResult<u64> {
        with_store_timeout(
            "delete_revoked_before",
            self.limit,
            self.inner.delete_revoked_before(cutoff),
        )
        .await
    }
}

#[async_trait]
impl<S: ConsentStore> ConsentStore for BoundedStore<S> {
    async fn get_consent(&self, user_id: &str, client_id: &str) -> StorageResult<Option<Consent>> {
        with_store_timeout(
            "get_consent",
            self.limit,
            self.inner.get_consent(user_id, client_id),
        )
        .await
    }

    async fn upsert_consent(&self, consent: &Consent) -> StorageResult<()> {
        with_store_timeout("upsert_consent", self.limit, self.inner.upsert_consent(consent)).await
    }

    async fn delete_consent(&self, user_id: &str, client_id: &str) -> StorageResult<bool> {
        with_store_timeout(
            "delete_consent",
            self.limit,
            self.inner.delete_consent(user_id, client_id),
        )
        .await
    }

    async fn list_consents(&self, user_id: &str) -> StorageResult<Vec<Consent>> {
        with_store_timeout("list_consents", self.limit, self.inner.list_consents(user_id)).await
    }
}
