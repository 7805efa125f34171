// ABOUTME: Structured logging bootstrap for the synchronization engine
// ABOUTME: Configures tracing-subscriber with env-filter based level control
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Tracing initialization.
//!
//! Compensation failures are logged at `error` level with a
//! `manual_cleanup_required` field; operators should alert on it.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// Level control comes from `RUST_LOG` (default `info`). Calling this twice
/// is a no-op; the second call's error is ignored so tests can initialize
/// freely.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init();
}
