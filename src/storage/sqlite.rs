// ABOUTME: SQLite store for codes, tokens, and consents using sqlx
// ABOUTME: Single-use guarantees come from UPDATE ... WHERE <column> IS NULL and rows_affected
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors

use super::{AuthorizationCodeStore, ConsentStore, StorageResult, TokenStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use heimdall_core::errors::StorageError;
use heimdall_core::models::{AuthorizationCode, Consent, PkceChallenge, PkceMethod, TokenRecord};
use heimdall_core::scope::ScopeSet;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// Connections kept for file-backed databases
const FILE_POOL_SIZE: u32 = 5;

/// sqlx-backed store; timestamps are stored as Unix milliseconds
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect, creating the database file if needed, and run migrations
    ///
    /// # Errors
    /// Returns an error if the URL is invalid, the database cannot be opened,
    /// or the schema cannot be created
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        let in_memory = database_url.contains(":memory:");
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // Every connection to `:memory:` is a separate database, so pin one
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(FILE_POOL_SIZE)
        };

        let pool = pool_options.connect_with(options).await?;
        let store = Self { pool };
        store.migrate().await?;

        info!(in_memory, "SQLite store ready");
        Ok(store)
    }

    /// Wrap an existing pool without migrating
    #[must_use]
    pub const fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Underlying pool
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create tables and indexes if they do not exist
    ///
    /// # Errors
    /// Returns an error if any DDL statement fails
    pub async fn migrate(&self) -> StorageResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS authorization_codes (
                code_hash TEXT PRIMARY KEY,
                client_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                redirect_uri TEXT NOT NULL,
                scope TEXT NOT NULL,
                pkce_challenge TEXT,
                pkce_method TEXT,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                consumed_at INTEGER
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_authorization_codes_expires_at ON authorization_codes(expires_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS tokens (
                id TEXT PRIMARY KEY,
                access_token_hash TEXT NOT NULL UNIQUE,
                refresh_token_hash TEXT NOT NULL UNIQUE,
                client_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                scope TEXT NOT NULL,
                access_expires_at INTEGER NOT NULL,
                refresh_expires_at INTEGER NOT NULL,
                revoked_at INTEGER,
                created_at INTEGER NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_tokens_refresh_expires_at ON tokens(refresh_expires_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS consents (
                user_id TEXT NOT NULL,
                client_id TEXT NOT NULL,
                scope TEXT NOT NULL,
                granted_at INTEGER NOT NULL,
                PRIMARY KEY (user_id, client_id)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        debug!("SQLite schema migrated");
        Ok(())
    }
}

fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_millis(table: &'static str, millis: i64) -> StorageResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| StorageError::corrupt(table, format!("timestamp out of range: {millis}")))
}

fn optional_from_millis(
    table: &'static str,
    millis: Option<i64>,
) -> StorageResult<Option<DateTime<Utc>>> {
    millis.map(|m| from_millis(table, m)).transpose()
}

fn parse_scope(table: &'static str, raw: &str) -> StorageResult<ScopeSet> {
    ScopeSet::parse(raw).map_err(|e| StorageError::corrupt(table, format!("scope: {e}")))
}

fn row_to_code(row: &SqliteRow) -> StorageResult<AuthorizationCode> {
    const TABLE: &str = "authorization_codes";

    let challenge: Option<String> = row.try_get("pkce_challenge")?;
    let method: Option<String> = row.try_get("pkce_method")?;
    let pkce = match (challenge, method) {
        (Some(challenge), Some(method)) => Some(PkceChallenge {
            challenge,
            method: PkceMethod::from_str(&method)
                .map_err(|e| StorageError::corrupt(TABLE, e))?,
        }),
        (None, None) => None,
        _ => return Err(StorageError::corrupt(TABLE, "partial PKCE binding")),
    };

    let scope: String = row.try_get("scope")?;

    Ok(AuthorizationCode {
        code_hash: row.try_get("code_hash")?,
        client_id: row.try_get("client_id")?,
        user_id: row.try_get("user_id")?,
        redirect_uri: row.try_get("redirect_uri")?,
        scope: parse_scope(TABLE, &scope)?,
        pkce,
        created_at: from_millis(TABLE, row.try_get("created_at")?)?,
        expires_at: from_millis(TABLE, row.try_get("expires_at")?)?,
        consumed_at: optional_from_millis(TABLE, row.try_get("consumed_at")?)?,
    })
}

fn row_to_token(row: &SqliteRow) -> StorageResult<TokenRecord> {
    const TABLE: &str = "tokens";

    let id: String = row.try_get("id")?;
    let scope: String = row.try_get("scope")?;

    Ok(TokenRecord {
        id: Uuid::parse_str(&id).map_err(|e| StorageError::corrupt(TABLE, format!("id: {e}")))?,
        access_token_hash: row.try_get("access_token_hash")?,
        refresh_token_hash: row.try_get("refresh_token_hash")?,
        client_id: row.try_get("client_id")?,
        user_id: row.try_get("user_id")?,
        scope: parse_scope(TABLE, &scope)?,
        access_expires_at: from_millis(TABLE, row.try_get("access_expires_at")?)?,
        refresh_expires_at: from_millis(TABLE, row.try_get("refresh_expires_at")?)?,
        revoked_at: optional_from_millis(TABLE, row.try_get("revoked_at")?)?,
        created_at: from_millis(TABLE, row.try_get("created_at")?)?,
    })
}

fn row_to_consent(row: &SqliteRow) -> StorageResult<Consent> {
    const TABLE: &str = "consents";

    let scope: String = row.try_get("scope")?;

    Ok(Consent {
        user_id: row.try_get("user_id")?,
        client_id: row.try_get("client_id")?,
        scope: parse_scope(TABLE, &scope)?,
        granted_at: from_millis(TABLE, row.try_get("granted_at")?)?,
    })
}

const TOKEN_COLUMNS: &str = "id, access_token_hash, refresh_token_hash, client_id, user_id, scope, \
     access_expires_at, refresh_expires_at, revoked_at, created_at";

#[async_trait]
impl AuthorizationCodeStore for SqliteStore {
    async fn insert_code(&self, code: &AuthorizationCode) -> StorageResult<()> {
        let query = r"
            INSERT INTO authorization_codes (
                code_hash, client_id, user_id, redirect_uri, scope,
                pkce_challenge, pkce_method, created_at, expires_at, consumed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ";

        sqlx::query(query)
            .bind(&code.code_hash)
            .bind(&code.client_id)
            .bind(&code.user_id)
            .bind(&code.redirect_uri)
            .bind(code.scope.to_string())
            .bind(code.pkce.as_ref().map(|p| p.challenge.clone()))
            .bind(code.pkce.as_ref().map(|p| p.method.as_str()))
            .bind(to_millis(code.created_at))
            .bind(to_millis(code.expires_at))
            .bind(code.consumed_at.map(to_millis))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn find_code(&self, code_hash: &str) -> StorageResult<Option<AuthorizationCode>> {
        let row = sqlx::query(
            r"
            SELECT code_hash, client_id, user_id, redirect_uri, scope,
                   pkce_challenge, pkce_method, created_at, expires_at, consumed_at
            FROM authorization_codes
            WHERE code_hash = ?
            ",
        )
        .bind(code_hash)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_code).transpose()
    }

    async fn mark_code_consumed(
        &self,
        code_hash: &str,
        consumed_at: DateTime<Utc>,
    ) -> StorageResult<bool> {
        let result = sqlx::query(
            "UPDATE authorization_codes SET consumed_at = ? WHERE code_hash = ? AND consumed_at IS NULL",
        )
        .bind(to_millis(consumed_at))
        .bind(code_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_expired_unused_codes(&self, now: DateTime<Utc>) -> StorageResult<u64> {
        let result = sqlx::query(
            "DELETE FROM authorization_codes WHERE consumed_at IS NULL AND expires_at <= ?",
        )
        .bind(to_millis(now))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete_consumed_codes_before(&self, cutoff: DateTime<Utc>) -> StorageResult<u64> {
        let result = sqlx::query(
            "DELETE FROM authorization_codes WHERE consumed_at IS NOT NULL AND consumed_at < ?",
        )
        .bind(to_millis(cutoff))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl TokenStore for SqliteStore {
    async fn insert_token(&self, record: &TokenRecord) -> StorageResult<()> {
        let query = r"
            INSERT INTO tokens (
                id, access_token_hash, refresh_token_hash, client_id, user_id, scope,
                access_expires_at, refresh_expires_at, revoked_at, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ";

        sqlx::query(query)
            .bind(record.id.to_string())
            .bind(&record.access_token_hash)
            .bind(&record.refresh_token_hash)
            .bind(&record.client_id)
            .bind(&record.user_id)
            .bind(record.scope.to_string())
            .bind(to_millis(record.access_expires_at))
            .bind(to_millis(record.refresh_expires_at))
            .bind(record.revoked_at.map(to_millis))
            .bind(to_millis(record.created_at))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn find_by_access_hash(&self, access_hash: &str) -> StorageResult<Option<TokenRecord>> {
        let query = format!("SELECT {TOKEN_COLUMNS} FROM tokens WHERE access_token_hash = ?");
        let row = sqlx::query(&query)
            .bind(access_hash)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_token).transpose()
    }

    async fn find_by_refresh_hash(
        &self,
        refresh_hash: &str,
    ) -> StorageResult<Option<TokenRecord>> {
        let query = format!("SELECT {TOKEN_COLUMNS} FROM tokens WHERE refresh_token_hash = ?");
        let row = sqlx::query(&query)
            .bind(refresh_hash)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_token).transpose()
    }

    async fn revoke_if_active(&self, id: Uuid, revoked_at: DateTime<Utc>) -> StorageResult<bool> {
        let result =
            sqlx::query("UPDATE tokens SET revoked_at = ? WHERE id = ? AND revoked_at IS NULL")
                .bind(to_millis(revoked_at))
                .bind(id.to_string())
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_expired_tokens(&self, now: DateTime<Utc>) -> StorageResult<u64> {
        let now = to_millis(now);
        let result = sqlx::query(
            "DELETE FROM tokens WHERE access_expires_at <= ? AND refresh_expires_at <= ?",
        )
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete_revoked_before(&self, cutoff: DateTime<Utc>) -> StorageResult<u64> {
        let result =
            sqlx::query("DELETE FROM tokens WHERE revoked_at IS NOT NULL AND revoked_at < ?")
                .bind(to_millis(cutoff))
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ConsentStore for SqliteStore {
    async fn get_consent(&self, user_id: &str, client_id: &str) -> StorageResult<Option<Consent>> {
        let row = sqlx::query(
            "SELECT user_id, client_id, scope, granted_at FROM consents WHERE user_id = ? AND client_id = ?",
        )
        .bind(user_id)
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_consent).transpose()
    }

    async fn upsert_consent(&self, consent: &Consent) -> StorageResult<()> {
        sqlx::query(
            r"
            INSERT INTO consents (user_id, client_id, scope, granted_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (user_id, client_id)
            DO UPDATE SET scope = excluded.scope, granted_at = excluded.granted_at
            ",
        )
        .bind(&consent.user_id)
        .bind(&consent.client_id)
        .bind(consent.scope.to_string())
        .bind(to_millis(consent.granted_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_consent(&self, user_id: &str, client_id: &str) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM consents WHERE user_id = ? AND client_id = ?")
            .bind(user_id)
            .bind(client_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_consents(&self, user_id: &str) -> StorageResult<Vec<Consent>> {
        let rows = sqlx::query(
            "SELECT user_id, client_id, scope, granted_at FROM consents WHERE user_id = ? ORDER BY client_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_consent).collect()
    }
}
