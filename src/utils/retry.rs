// ABOUTME: Bounded retry helper with a fixed backoff schedule and injectable sleep
// ABOUTME: Policy (attempts, delays, retryable predicate) is data, not control flow
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Bounded retry with backoff.
//!
//! The schedule is explicit: one entry per retry, so a config of
//! `[1s, 2s, 4s]` means four attempts and at most seven seconds of sleep.
//! The sleep function is injected so the policy is unit-testable without
//! real timers.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::errors::{SyncError, SyncResult};

/// Retry policy: delays slept between attempts
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// One delay per retry, applied in order
    pub backoff: Vec<Duration>,
}

impl RetryConfig {
    /// Schedule used for provider rate limits: 1s, 2s, 4s
    #[must_use]
    pub fn rate_limit_default() -> Self {
        Self {
            backoff: vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
            ],
        }
    }

    /// No retries at all
    #[must_use]
    pub fn none() -> Self {
        Self {
            backoff: Vec::new(),
        }
    }

    /// Total attempts this policy allows (initial call + retries)
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.backoff.len() as u32 + 1
    }
}

/// Run `op` until it succeeds, fails non-retryably, or the schedule is
/// exhausted. The last error is returned unchanged on exhaustion; callers
/// decide how exhaustion maps into their taxonomy.
pub async fn with_retry<T, F, Fut, S, SFut, P>(
    config: &RetryConfig,
    mut sleep: S,
    is_retryable: P,
    mut op: F,
) -> SyncResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SyncResult<T>>,
    S: FnMut(Duration) -> SFut,
    SFut: Future<Output = ()>,
    P: Fn(&SyncError) -> bool,
{
    let mut retries_used: usize = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if is_retryable(&err) => {
                let Some(delay) = config.backoff.get(retries_used).copied() else {
                    warn!(
                        retries = retries_used,
                        "retry schedule exhausted, giving up: {err}"
                    );
                    return Err(err);
                };
                retries_used += 1;
                warn!(
                    retry = retries_used,
                    delay_ms = delay.as_millis() as u64,
                    "retryable provider failure, backing off: {err}"
                );
                sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
