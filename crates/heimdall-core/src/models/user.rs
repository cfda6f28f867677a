// ABOUTME: End-user profile claims supplied by the external user profile provider
// ABOUTME: Used for tenant isolation checks and scope-gated identity claims
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Profile of an authenticated end user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Stable user identifier (the token `sub`)
    pub user_id: String,
    /// Tenant the user belongs to
    pub tenant_id: String,
    /// Primary email address
    pub email: Option<String>,
    /// Whether the email address has been verified
    #[serde(default)]
    pub email_verified: bool,
    /// Full display name
    pub name: Option<String>,
    /// Given name
    pub given_name: Option<String>,
    /// Family name
    pub family_name: Option<String>,
    /// Profile picture URL
    pub picture: Option<String>,
    /// Last profile update
    pub updated_at: Option<DateTime<Utc>>,
}
