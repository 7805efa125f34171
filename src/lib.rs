// ABOUTME: Library entry point for the nutrisync food-log synchronization engine
// ABOUTME: Wires the provider client, token manager, matcher, saga, and storage modules
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Nutrisync
//!
//! Cross-system food-log synchronization: log a food to a local database
//! and a third-party nutrition-tracking account while avoiding duplicate
//! remote records for foods eaten repeatedly.
//!
//! The crate is organized leaf-first:
//!
//! - [`providers`] — remote nutrition API client with retry/backoff and
//!   error classification
//! - [`oauth`] — token lifecycle management (proactive refresh)
//! - [`matching`] — fuzzy food identity resolution for reuse decisions
//! - [`saga`] — the write saga keeping local and remote state consistent
//!   with compensating actions
//! - [`storage`] — the local persistence boundary and its SQLite
//!   implementation
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use nutrisync::config::SyncConfig;
//! use nutrisync::providers::FitbitNutritionClient;
//! use nutrisync::saga::FoodLogService;
//! use nutrisync::storage::SqliteFoodStore;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = SyncConfig::from_env()?;
//! let store = Arc::new(SqliteFoodStore::new("sqlite:nutrisync.db").await?);
//! store.migrate().await?;
//! let api = Arc::new(FitbitNutritionClient::new(&config));
//! let service = FoodLogService::new(store, api, &config);
//! # let _ = service;
//! # Ok(())
//! # }
//! ```

/// Environment-based runtime configuration
pub mod config;
/// Error taxonomy shared by every module
pub mod errors;
/// Tracing bootstrap
pub mod logging;
/// Food identity resolver (fuzzy reuse matching)
pub mod matching;
/// Domain models: records, entries, credentials, requests
pub mod models;
/// Token lifecycle management
pub mod oauth;
/// Remote nutrition provider client
pub mod providers;
/// Write saga flows and the service facade
pub mod saga;
/// Local persistence boundary
pub mod storage;
/// HTTP pooling and bounded-retry utilities
pub mod utils;

pub use config::SyncConfig;
pub use errors::{ErrorKind, SyncError, SyncResult};
pub use saga::FoodLogService;
