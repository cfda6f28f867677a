// ABOUTME: Persistence and collaborator models for the authorization server
// ABOUTME: Authorization codes, token records, consents, client registrations, and user profiles
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors

/// Authorization codes and PKCE methods
pub mod authorization_code;

/// Client registrations resolved through the client directory
pub mod client;

/// Per-user, per-client consent records
pub mod consent;

/// Issued access/refresh token pairs
pub mod token;

/// End-user profile claims
pub mod user;

pub use authorization_code::{AuthorizationCode, PkceChallenge, PkceMethod};
pub use client::{ClientRecord, ClientStatus};
pub use consent::Consent;
pub use token::TokenRecord;
pub use user::UserProfile;
