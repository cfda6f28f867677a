// ABOUTME: Process-local store for codes, tokens, and consents using sharded DashMaps
// ABOUTME: Conditional updates run under the entry's shard write lock, so one racer wins
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors

use super::{AuthorizationCodeStore, ConsentStore, StorageResult, TokenStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use heimdall_core::errors::StorageError;
use heimdall_core::models::{AuthorizationCode, Consent, TokenRecord};
use std::sync::Arc;
use uuid::Uuid;

/// In-memory store; clones share the same maps
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    codes: Arc<DashMap<String, AuthorizationCode>>,
    tokens: Arc<DashMap<Uuid, TokenRecord>>,
    access_index: Arc<DashMap<String, Uuid>>,
    refresh_index: Arc<DashMap<String, Uuid>>,
    consents: Arc<DashMap<(String, String), Consent>>,
}

impl InMemoryStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored authorization codes
    #[must_use]
    pub fn code_count(&self) -> usize {
        self.codes.len()
    }

    /// Number of stored token records
    #[must_use]
    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    fn remove_tokens_where(&self, predicate: impl Fn(&TokenRecord) -> bool) -> u64 {
        let candidates: Vec<Uuid> = self
            .tokens
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| *entry.key())
            .collect();

        let mut removed = 0;
        for id in candidates {
            if let Some((_, record)) = self.tokens.remove_if(&id, |_, record| predicate(record)) {
                self.access_index.remove(&record.access_token_hash);
                self.refresh_index.remove(&record.refresh_token_hash);
                removed += 1;
            }
        }
        removed
    }

    fn remove_codes_where(&self, predicate: impl Fn(&AuthorizationCode) -> bool) -> u64 {
        let candidates: Vec<String> = self
            .codes
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for hash in candidates {
            if self.codes.remove_if(&hash, |_, code| predicate(code)).is_some() {
                removed += 1;
            }
        }
        removed
    }
}

#[async_trait]
impl AuthorizationCodeStore for InMemoryStore {
    async fn insert_code(&self, code: &AuthorizationCode) -> StorageResult<()> {
        match self.codes.entry(code.code_hash.clone()) {
            Entry::Occupied(_) => Err(StorageError::Duplicate {
                table: "authorization_codes",
            }),
            Entry::Vacant(slot) => {
                slot.insert(code.clone());
                Ok(())
            }
        }
    }

    async fn find_code(&self, code_hash: &str) -> StorageResult<Option<AuthorizationCode>> {
        Ok(self.codes.get(code_hash).map(|entry| entry.clone()))
    }

    async fn mark_code_consumed(
        &self,
        code_hash: &str,
        consumed_at: DateTime<Utc>,
    ) -> StorageResult<bool> {
        let Some(mut code) = self.codes.get_mut(code_hash) else {
            return Ok(false);
        };
        if code.consumed_at.is_some() {
            return Ok(false);
        }
        code.consumed_at = Some(consumed_at);
        Ok(true)
    }

    async fn delete_expired_unused_codes(&self, now: DateTime<Utc>) -> StorageResult<u64> {
        Ok(self.remove_codes_where(|code| !code.is_consumed() && code.is_expired(now)))
    }

    async fn delete_consumed_codes_before(&self, cutoff: DateTime<Utc>) -> StorageResult<u64> {
        Ok(self.remove_codes_where(|code| code.consumed_at.is_some_and(|at| at < cutoff)))
    }
}

#[async_trait]
impl TokenStore for InMemoryStore {
    async fn insert_token(&self, record: &TokenRecord) -> StorageResult<()> {
        if self.access_index.contains_key(&record.access_token_hash)
            || self.refresh_index.contains_key(&record.refresh_token_hash)
        {
            return Err(StorageError::Duplicate { table: "tokens" });
        }

        match self.tokens.entry(record.id) {
            Entry::Occupied(_) => Err(StorageError::Duplicate { table: "tokens" }),
            Entry::Vacant(slot) => {
                self.access_index
                    .insert(record.access_token_hash.clone(), record.id);
                self.refresh_index
                    .insert(record.refresh_token_hash.clone(), record.id);
                slot.insert(record.clone());
                Ok(())
            }
        }
    }

    async fn find_by_access_hash(&self, access_hash: &str) -> StorageResult<Option<TokenRecord>> {
        let Some(id) = self.access_index.get(access_hash).map(|entry| *entry) else {
            return Ok(None);
        };
        Ok(self.tokens.get(&id).map(|entry| entry.clone()))
    }

    async fn find_by_refresh_hash(
        &self,
        refresh_hash: &str,
    ) -> StorageResult<Option<TokenRecord>> {
        let Some(id) = self.refresh_index.get(refresh_hash).map(|entry| *entry) else {
            return Ok(None);
        };
        Ok(self.tokens.get(&id).map(|entry| entry.clone()))
    }

    async fn revoke_if_active(&self, id: Uuid, revoked_at: DateTime<Utc>) -> StorageResult<bool> {
        let Some(mut record) = self.tokens.get_mut(&id) else {
            return Ok(false);
        };
        if record.revoked_at.is_some() {
            return Ok(false);
        }
        record.revoked_at = Some(revoked_at);
        Ok(true)
    }

    async fn delete_expired_tokens(&self, now: DateTime<Utc>) -> StorageResult<u64> {
        Ok(self.remove_tokens_where(|record| {
            record.access_expires_at <= now && record.refresh_expires_at <= now
        }))
    }

    async fn delete_revoked_before(&self, cutoff: DateTime<Utc>) -> StorageResult<u64> {
        Ok(self.remove_tokens_where(|record| record.revoked_at.is_some_and(|at| at < cutoff)))
    }
}

#[async_trait]
impl ConsentStore for InMemoryStore {
    async fn get_consent(&self, user_id: &str, client_id: &str) -> StorageResult<Option<Consent>> {
        Ok(self
            .consents
            .get(&(user_id.to_owned(), client_id.to_owned()))
            .map(|entry| entry.clone()))
    }

    async fn upsert_consent(&self, consent: &Consent) -> StorageResult<()> {
        self.consents.insert(
            (consent.user_id.clone(), consent.client_id.clone()),
            consent.clone(),
        );
        Ok(())
    }

    async fn delete_consent(&self, user_id: &str, client_id: &str) -> StorageResult<bool> {
        Ok(self
            .consents
            .remove(&(user_id.to_owned(), client_id.to_owned()))
            .is_some())
    }

    async fn list_consents(&self, user_id: &str) -> StorageResult<Vec<Consent>> {
        let mut consents: Vec<Consent> = self
            .consents
            .iter()
            .filter(|entry| entry.key().0 == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        consents.sort_by(|a, b| a.client_id.cmp(&b.client_id));
        Ok(consents)
    }
}
