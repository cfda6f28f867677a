// ABOUTME: Domain events published by the authorization server and the observer interface
// ABOUTME: Observer failures are logged and never change the outcome of a protocol operation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors

use chrono::{DateTime, Utc};
use heimdall_core::constants::events;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Something observable happened to a code or token
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event")]
pub enum OAuthEvent {
    /// An authorization code was issued
    #[serde(rename = "code.issued")]
    CodeIssued {
        /// Client the code was issued to
        client_id: String,
        /// Resource owner
        user_id: String,
        /// Code expiry
        expires_at: DateTime<Utc>,
    },
    /// A token pair was minted
    #[serde(rename = "token.issued")]
    TokenIssued {
        /// Token record id
        token_id: Uuid,
        /// Client the pair was issued to
        client_id: String,
        /// Resource owner
        user_id: String,
        /// Granted scopes
        scope: String,
    },
    /// A token pair was revoked
    #[serde(rename = "token.revoked")]
    TokenRevoked {
        /// Token record id
        token_id: Uuid,
        /// Client the pair was issued to
        client_id: String,
        /// Resource owner
        user_id: String,
    },
}

impl OAuthEvent {
    /// Event name (`code.issued`, `token.issued`, `token.revoked`)
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CodeIssued { .. } => events::CODE_ISSUED,
            Self::TokenIssued { .. } => events::TOKEN_ISSUED,
            Self::TokenRevoked { .. } => events::TOKEN_REVOKED,
        }
    }
}

/// Observer of domain events
pub trait EventSink: Send + Sync {
    /// Deliver an event
    ///
    /// # Errors
    /// Returns an error if the observer could not accept the event
    fn publish(&self, event: &OAuthEvent) -> anyhow::Result<()>;
}

/// Publish to `sink`, logging and swallowing observer failures
pub fn emit(sink: &dyn EventSink, event: &OAuthEvent) {
    if let Err(e) = sink.publish(event) {
        tracing::warn!(event = event.name(), "Event observer failed: {e:#}");
    }
}

/// Drops every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn publish(&self, _event: &OAuthEvent) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Writes every event to the `tracing` log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn publish(&self, event: &OAuthEvent) -> anyhow::Result<()> {
        match event {
            OAuthEvent::CodeIssued {
                client_id, user_id, ..
            } => tracing::info!(event = event.name(), client_id = %client_id, user_id = %user_id, "OAuth event"),
            OAuthEvent::TokenIssued {
                token_id,
                client_id,
                user_id,
                ..
            }
            | OAuthEvent::TokenRevoked {
                token_id,
                client_id,
                user_id,
            } => tracing::info!(
                event = event.name(),
                token_id = %token_id,
                client_id = %client_id,
                user_id = %user_id,
                "OAuth event"
            ),
        }
        Ok(())
    }
}

/// Fans events out to any number of async subscribers
#[derive(Debug, Clone)]
pub struct BroadcastEventSink {
    sender: broadcast::Sender<OAuthEvent>,
}

impl BroadcastEventSink {
    /// Sink buffering up to `capacity` events per lagging subscriber
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// New subscription receiving events published from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<OAuthEvent> {
        self.sender.subscribe()
    }
}

impl EventSink for BroadcastEventSink {
    fn publish(&self, event: &OAuthEvent) -> anyhow::Result<()> {
        // No subscribers is not a failure
        let _ = self.sender.send(event.clone());
        Ok(())
    }
}
