// ABOUTME: Token lifecycle management for the remote nutrition account
// ABOUTME: Proactive refresh with persistence of rotated access/refresh pairs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Token Lifecycle Manager
//!
//! Guarantees callers a non-expired access token. The credential is passed
//! in explicitly — there is no ambient session state — which keeps refresh
//! behavior testable in isolation. Concurrent refreshes for the same owner
//! are not serialized; racing writers each persist a pair that was valid
//! when issued, and the last write wins.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::{SyncError, SyncResult};
use crate::models::Credential;
use crate::providers::NutritionApi;
use crate::storage::FoodStore;

/// Ensures a fresh access token for every remote call
pub struct TokenManager {
    api: Arc<dyn NutritionApi>,
    store: Arc<dyn FoodStore>,
}

impl TokenManager {
    /// Create a manager over the given provider client and store
    pub fn new(api: Arc<dyn NutritionApi>, store: Arc<dyn FoodStore>) -> Self {
        Self { api, store }
    }

    /// Load the owner's credential, failing with `TokenInvalid` if the
    /// account was never connected.
    pub async fn load_credential(&self, owner_id: Uuid) -> SyncResult<Credential> {
        self.store
            .get_credential(owner_id)
            .await?
            .ok_or_else(|| SyncError::TokenInvalid("no credential stored for owner".into()))
    }

    /// Return a credential whose access token is valid for at least the
    /// next hour, refreshing and persisting a new pair if needed.
    ///
    /// A refresh rejected by the provider surfaces as `TokenInvalid`:
    /// re-authorization is required and retrying is pointless.
    pub async fn ensure_fresh_token(&self, credential: &Credential) -> SyncResult<Credential> {
        if credential.is_fresh_at(Utc::now()) {
            return Ok(credential.clone());
        }

        info!(owner_id = %credential.owner_id, "access token near expiry, refreshing");

        let pair = self.api.refresh_token(&credential.refresh_token).await?;

        let refreshed = Credential {
            owner_id: credential.owner_id,
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_at: pair.expires_at,
        };

        if let Err(err) = self.store.upsert_credential(&refreshed).await {
            // The pair is already rotated remotely; losing it forces the
            // user back through authorization.
            warn!(owner_id = %refreshed.owner_id, "failed to persist refreshed token: {err}");
            return Err(SyncError::Internal(format!(
                "failed to persist refreshed token: {err}"
            )));
        }

        Ok(refreshed)
    }

    /// One-time code exchange after the user authorized the application.
    /// Persists and returns the initial credential.
    pub async fn connect_account(
        &self,
        owner_id: Uuid,
        code: &str,
        redirect_uri: &str,
    ) -> SyncResult<Credential> {
        let pair = self.api.exchange_code(code, redirect_uri).await?;

        let credential = Credential {
            owner_id,
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_at: pair.expires_at,
        };

        self.store.upsert_credential(&credential).await?;
        info!(owner_id = %owner_id, "remote account connected");

        Ok(credential)
    }
}
