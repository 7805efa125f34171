// ABOUTME: Unified error taxonomy for the food-log synchronization engine
// ABOUTME: Wire-level error kinds with HTTP mapping plus the SyncError carrier type
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Synchronization Error Taxonomy
//!
//! Every failure that can escape this crate maps to one of the kinds below.
//! The split that matters most to callers is `Internal` vs `Partial`: both
//! mean a local write failed after a remote write succeeded, but `Internal`
//! means the remote side was rolled back and `Partial` means the rollback
//! itself failed and the remote account now holds a resource unknown to
//! local records. `Partial` must be rendered distinctly by upstream layers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable error codes exposed to the request-handling layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Re-authorization required; never retried
    #[serde(rename = "TOKEN_INVALID")]
    TokenInvalid,
    /// Remote rate limit, retries exhausted
    #[serde(rename = "RATE_LIMIT")]
    RateLimit,
    /// Remote rejected the request or returned unparsable data
    #[serde(rename = "API_ERROR")]
    ApiError,
    /// Remote 2xx payload violated the expected contract
    #[serde(rename = "INVALID_RESPONSE")]
    InvalidResponse,
    /// Local storage failure; remote state successfully compensated
    #[serde(rename = "INTERNAL_ERROR")]
    Internal,
    /// Local storage failure and remote compensation also failed
    #[serde(rename = "PARTIAL_ERROR")]
    Partial,
    /// Caller input rejected before any remote or local call
    #[serde(rename = "VALIDATION_ERROR")]
    Validation,
}

impl ErrorKind {
    /// HTTP status the request layer should answer with
    #[must_use]
    pub fn http_status(self) -> u16 {
        match self {
            Self::TokenInvalid => 401,
            Self::Validation => 400,
            Self::RateLimit => 429,
            Self::ApiError | Self::InvalidResponse => 502,
            Self::Internal | Self::Partial => 500,
        }
    }

    /// Whether this kind leaves remote state the system cannot self-heal
    #[must_use]
    pub fn requires_manual_cleanup(self) -> bool {
        matches!(self, Self::Partial)
    }
}

/// Error type for all synchronization operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// The stored credential is missing or the provider refused it.
    /// Callers must treat this as "re-authorization required", not transient.
    #[error("re-authorization required: {0}")]
    TokenInvalid(String),

    /// Rate limited by the provider and the bounded retries were exhausted
    #[error("provider rate limit exceeded after {attempts} attempts")]
    RateLimit {
        /// Attempts made before giving up
        attempts: u32,
    },

    /// The provider rejected a request or the transport failed.
    /// `body` is a truncated diagnostic capture, never shown verbatim to end
    /// callers.
    #[error("provider request failed: {message}")]
    ApiError {
        /// HTTP status, if a response was received at all
        status: Option<u16>,
        /// Operator-facing summary
        message: String,
        /// Truncated response body for diagnostics
        body: Option<String>,
    },

    /// A 2xx response was missing a field the contract requires
    #[error("provider response missing required field `{field}`")]
    InvalidResponse {
        /// Name of the absent field
        field: &'static str,
    },

    /// Local storage failed; remote state was rolled back successfully
    #[error("local save failed, remote rolled back: {0}")]
    Internal(String),

    /// Local storage failed and the remote rollback also failed.
    /// The remote account may hold a resource unknown to local records.
    #[error("local save failed and remote rollback failed: {0}")]
    Partial(String),

    /// Caller input rejected up front
    #[error("invalid input: {0}")]
    Validation(String),
}

impl SyncError {
    /// Wire-level kind for this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TokenInvalid(_) => ErrorKind::TokenInvalid,
            Self::RateLimit { .. } => ErrorKind::RateLimit,
            Self::ApiError { .. } => ErrorKind::ApiError,
            Self::InvalidResponse { .. } => ErrorKind::InvalidResponse,
            Self::Internal(_) => ErrorKind::Internal,
            Self::Partial(_) => ErrorKind::Partial,
            Self::Validation(_) => ErrorKind::Validation,
        }
    }

    /// HTTP status the request layer should answer with
    #[must_use]
    pub fn http_status(&self) -> u16 {
        self.kind().http_status()
    }

    /// Shorthand for an `ApiError` without a response body
    pub fn api(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
            body: None,
        }
    }
}

/// Storage-layer failures surface as `Internal` at the service boundary
impl From<anyhow::Error> for SyncError {
    fn from(error: anyhow::Error) -> Self {
        Self::Internal(error.to_string())
    }
}

/// Result type alias for synchronization operations
pub type SyncResult<T> = Result<T, SyncError>;
