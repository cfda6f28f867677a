// ABOUTME: Purges expired codes and tokens, and audit records past the retention window
// ABOUTME: Can run once on demand or as a periodic background task with a shutdown signal
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors

use crate::clock::Clock;
use crate::storage::{AuthorizationCodeStore, TokenStore};
use chrono::Duration;
use heimdall_core::errors::OAuthResult;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Rows removed by a cleanup pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Codes that expired without being redeemed
    pub expired_codes: u64,
    /// Token records whose access and refresh expiries have both passed
    pub expired_tokens: u64,
    /// Redeemed codes older than the retention window
    pub consumed_codes: u64,
    /// Revoked token records older than the retention window
    pub revoked_tokens: u64,
}

impl CleanupReport {
    /// Total rows removed
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.expired_codes + self.expired_tokens + self.consumed_codes + self.revoked_tokens
    }
}

/// Handle to a running periodic cleanup task
#[derive(Debug)]
pub struct CleanupTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl CleanupTask {
    /// Stop the task and wait for the current pass to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            tracing::warn!("Cleanup task ended abnormally: {e}");
        }
    }
}

/// Storage hygiene for codes and tokens
#[derive(Clone)]
pub struct TokenCleanup {
    codes: Arc<dyn AuthorizationCodeStore>,
    tokens: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
    retention: Duration,
}

impl TokenCleanup {
    /// Cleanup keeping revoked and consumed rows for `retention`
    #[must_use]
    pub fn new(
        codes: Arc<dyn AuthorizationCodeStore>,
        tokens: Arc<dyn TokenStore>,
        clock: Arc<dyn Clock>,
        retention: Duration,
    ) -> Self {
        Self {
            codes,
            tokens,
            clock,
            retention,
        }
    }

    /// Delete unredeemed expired codes and fully expired token records
    ///
    /// # Errors
    /// Storage failures
    pub async fn purge_expired(&self) -> OAuthResult<CleanupReport> {
        let now = self.clock.now();
        let expired_codes = self.codes.delete_expired_unused_codes(now).await?;
        let expired_tokens = self.tokens.delete_expired_tokens(now).await?;

        Ok(CleanupReport {
            expired_codes,
            expired_tokens,
            ..CleanupReport::default()
        })
    }

    /// Delete revoked token records and redeemed codes older than the retention window
    ///
    /// # Errors
    /// Storage failures
    pub async fn purge_retained(&self) -> OAuthResult<CleanupReport> {
        let cutoff = self.clock.now() - self.retention;
        let revoked_tokens = self.tokens.delete_revoked_before(cutoff).await?;
        let consumed_codes = self.codes.delete_consumed_codes_before(cutoff).await?;

        Ok(CleanupReport {
            consumed_codes,
            revoked_tokens,
            ..CleanupReport::default()
        })
    }

    /// Run both routines
    ///
    /// # Errors
    /// Storage failures
    pub async fn run_once(&self) -> OAuthResult<CleanupReport> {
        let expired = self.purge_expired().await?;
        let retained = self.purge_retained().await?;

        let report = CleanupReport {
            consumed_codes: retained.consumed_codes,
            revoked_tokens: retained.revoked_tokens,
            ..expired
        };
        if report.total() > 0 {
            tracing::info!(
                expired_codes = report.expired_codes,
                expired_tokens = report.expired_tokens,
                consumed_codes = report.consumed_codes,
                revoked_tokens = report.revoked_tokens,
                "Cleanup pass removed stale rows"
            );
        }
        Ok(report)
    }

    /// Run a pass every `interval` until the returned task is shut down
    #[must_use]
    pub fn spawn_periodic(self, interval: std::time::Duration) -> CleanupTask {
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.run_once().await {
                            tracing::error!("Cleanup pass failed: {e}");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        tracing::debug!("Cleanup task received shutdown signal");
                        break;
                    }
                }
            }
        });

        CleanupTask { shutdown, handle }
    }
}
