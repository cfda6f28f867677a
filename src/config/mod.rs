// ABOUTME: Configuration management for the authorization server
// ABOUTME: Environment loading for the binary and protocol settings for the services
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Heimdall Authors

/// Environment and server configuration
pub mod environment;
/// Issuer and lifetime settings
pub mod oauth;

pub use environment::{DatabaseUrl, ServerConfig, SigningKeyConfig};
pub use oauth::OAuth2ServerConfig;
