// ABOUTME: Core types and constants for the Heimdall OAuth 2.0 authorization server
// ABOUTME: Foundation crate with the error taxonomy, persistence models, scopes, and constants
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors

#![deny(unsafe_code)]

//! # Heimdall Core
//!
//! Foundation crate providing the shared types of the Heimdall authorization
//! server. It changes rarely, so the protocol engine in the main crate can be
//! rebuilt without touching it.
//!
//! ## Modules
//!
//! - **errors**: `OAuthError` with RFC 6749 error codes, plus `StorageError`
//! - **constants**: token prefixes, lifetimes, and protocol literals
//! - **models**: authorization codes, token records, consents, client and user records
//! - **scope**: parsed scope sets with subset checks

/// OAuth error taxonomy with RFC 6749 error codes and HTTP mapping
pub mod errors;

/// Protocol constants (prefixes, lifetimes, literals)
pub mod constants;

/// Persistence and collaborator models
pub mod models;

/// Scope parsing and set operations
pub mod scope;
