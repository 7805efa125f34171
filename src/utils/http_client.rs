// ABOUTME: Shared HTTP client with connection pooling and bounded timeouts
// ABOUTME: One pooled client per process instead of per-call client creation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use std::sync::OnceLock;
use std::time::Duration;

use reqwest::{Client, ClientBuilder};

/// Global shared HTTP client
static SHARED_CLIENT: OnceLock<Client> = OnceLock::new();

/// Connect timeout applied to every client built here
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Get or create the shared HTTP client.
///
/// Per-request timeouts are applied at the call site (the synchronization
/// engine bounds each attempt, not the connection pool).
pub fn shared_client() -> &'static Client {
    SHARED_CLIENT.get_or_init(|| {
        ClientBuilder::new()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new())
    })
}

/// Create a client with a custom total request timeout.
///
/// Used when a caller wants the timeout baked into the client instead of
/// set per request.
#[must_use]
pub fn client_with_timeout(timeout: Duration) -> Client {
    ClientBuilder::new()
        .timeout(timeout)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .unwrap_or_else(|_| Client::new())
}
