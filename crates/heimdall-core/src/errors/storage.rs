// ABOUTME: Storage error type shared by every code, token, and consent store
// ABOUTME: Keeps persistence details internal; callers surface them as a generic server error
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors

use std::time::Duration;

/// Failure of a persistence collaborator
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The store did not answer within the configured bound
    #[error("Store operation '{operation}' timed out after {elapsed:?}")]
    Timeout {
        /// Name of the store call that timed out
        operation: &'static str,
        /// Configured bound that was exceeded
        elapsed: Duration,
    },

    /// Insert collided with an existing key
    #[error("Duplicate key in {table}")]
    Duplicate {
        /// Table or collection that rejected the insert
        table: &'static str,
    },

    /// Query execution failed
    #[error("Query failed: {context}")]
    Query {
        /// Context describing the failed query
        context: String,
    },

    /// A stored row could not be mapped back into a model
    #[error("Corrupt record in {table}: {reason}")]
    Corrupt {
        /// Table the row came from
        table: &'static str,
        /// What could not be decoded
        reason: String,
    },
}

impl StorageError {
    /// Create a query error from any displayable cause
    #[must_use]
    pub fn query(context: impl Into<String>) -> Self {
        Self::Query {
            context: context.into(),
        }
    }

    /// Create a corrupt-record error
    #[must_use]
    pub fn corrupt(table: &'static str, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            table,
            reason: reason.into(),
        }
    }
}

#[cfg(feature = "database-errors")]
impl From<sqlx::Error> for StorageError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::Database(db_error) if db_error.is_unique_violation() => Self::Duplicate {
                table: "unknown",
            },
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => Self::Corrupt {
                table: "unknown",
                reason: error.to_string(),
            },
            _ => Self::Query {
                context: error.to_string(),
            },
        }
    }
}
