// ABOUTME: Shared utility modules for HTTP pooling and bounded retries
// ABOUTME: Infrastructure pieces with no food-domain knowledge of their own
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

/// Shared pooled HTTP client
pub mod http_client;
/// Bounded retry with an explicit backoff schedule
pub mod retry;
