// ABOUTME: Environment-based configuration for the synchronization engine
// ABOUTME: Provider credentials, endpoint overrides, dry-run mode, HTTP timeouts
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Environment-only configuration.
//!
//! All knobs come from environment variables; endpoint overrides exist so
//! tests and staging deployments can point the client at a different host.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::warn;

/// Default provider API host
pub const DEFAULT_API_BASE_URL: &str = "https://api.fitbit.com";
/// Default OAuth2 token endpoint
pub const DEFAULT_TOKEN_URL: &str = "https://api.fitbit.com/oauth2/token";
/// Default per-attempt request timeout in seconds
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Runtime configuration for the synchronization engine
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// OAuth2 client id registered with the provider
    pub client_id: String,
    /// OAuth2 client secret registered with the provider
    pub client_secret: String,
    /// Base URL for food/log API calls
    pub api_base_url: String,
    /// URL of the OAuth2 token endpoint
    pub token_url: String,
    /// Per-attempt request timeout
    pub http_timeout: Duration,
    /// When set, no remote call is ever made; local records carry no
    /// remote ids. Used in environments without real provider credentials.
    pub dry_run: bool,
}

impl SyncConfig {
    /// Load configuration from the environment.
    ///
    /// `FITBIT_CLIENT_ID` / `FITBIT_CLIENT_SECRET` are required unless
    /// `NUTRISYNC_DRY_RUN` is set, in which case placeholders are used.
    pub fn from_env() -> Result<Self> {
        let dry_run = env_flag("NUTRISYNC_DRY_RUN");

        let (client_id, client_secret) = if dry_run {
            (
                env::var("FITBIT_CLIENT_ID").unwrap_or_else(|_| "dry-run".into()),
                env::var("FITBIT_CLIENT_SECRET").unwrap_or_else(|_| "dry-run".into()),
            )
        } else {
            (
                env::var("FITBIT_CLIENT_ID").context("FITBIT_CLIENT_ID not set")?,
                env::var("FITBIT_CLIENT_SECRET").context("FITBIT_CLIENT_SECRET not set")?,
            )
        };

        Ok(Self {
            client_id,
            client_secret,
            api_base_url: env::var("NUTRISYNC_API_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_API_BASE_URL.into()),
            token_url: env::var("NUTRISYNC_TOKEN_URL").unwrap_or_else(|_| DEFAULT_TOKEN_URL.into()),
            http_timeout: Duration::from_secs(env_u64(
                "NUTRISYNC_HTTP_TIMEOUT_SECS",
                DEFAULT_HTTP_TIMEOUT_SECS,
            )),
            dry_run,
        })
    }

    /// Configuration for tests and tools that never touch the network
    #[must_use]
    pub fn for_dry_run() -> Self {
        Self {
            client_id: "dry-run".into(),
            client_secret: "dry-run".into(),
            api_base_url: DEFAULT_API_BASE_URL.into(),
            token_url: DEFAULT_TOKEN_URL.into(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            dry_run: true,
        }
    }
}

/// Parse a boolean flag: "1", "true", "yes" (case-insensitive) enable it
fn env_flag(name: &str) -> bool {
    env::var(name).is_ok_and(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
}

/// Parse a u64 env var, falling back to `default` with a warning on garbage
fn env_u64(name: &str, default: u64) -> u64 {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("Invalid value for {name}: '{raw}', using default {default}");
            default
        }),
        Err(_) => default,
    }
}
