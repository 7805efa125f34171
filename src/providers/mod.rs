// ABOUTME: Remote nutrition provider abstraction and its Fitbit implementation
// ABOUTME: NutritionApi trait plus the wire-level request/response types
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Remote nutrition provider boundary.
//!
//! The write saga and the token lifecycle manager only ever see
//! [`NutritionApi`]; the shipped implementation is
//! [`fitbit::FitbitNutritionClient`]. Tests substitute a scripted mock.

pub mod fitbit;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::errors::SyncResult;
use crate::models::{MealSlot, NutrientProfile};

pub use fitbit::FitbitNutritionClient;

/// Request to create a new remote food resource
#[derive(Debug, Clone)]
pub struct CreateFoodRequest {
    /// Display name
    pub name: String,
    /// Free-text description, sent when present
    pub description: Option<String>,
    /// Provider unit code for the default serving
    pub serving_unit_id: u64,
    /// Default serving amount
    pub serving_amount: f64,
    /// Nutrients for one default serving
    pub nutrients: NutrientProfile,
}

/// A remote food resource as returned by create-food
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteFood {
    /// Provider-assigned food id
    pub food_id: u64,
}

/// Request to log a food against an existing remote food resource
#[derive(Debug, Clone)]
pub struct LogFoodRequest {
    /// Remote food resource to log against
    pub remote_food_id: u64,
    /// Meal slot of the entry
    pub meal_slot: MealSlot,
    /// Amount eaten
    pub amount: f64,
    /// Provider unit code for `amount`
    pub unit_id: u64,
    /// Calendar date of the meal
    pub date: NaiveDate,
    /// Time of day of the meal
    pub time: NaiveTime,
}

/// A remote log resource as returned by log-food
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteLog {
    /// Provider-assigned log id
    pub log_id: u64,
}

/// Access/refresh token pair returned by the token endpoint
#[derive(Debug, Clone)]
pub struct TokenPair {
    /// Bearer token for API calls
    pub access_token: String,
    /// Token used to obtain the next pair
    pub refresh_token: String,
    /// Instant the access token stops being accepted
    pub expires_at: DateTime<Utc>,
}

/// Operations this crate needs from the remote nutrition provider.
///
/// Every method applies the provider's classification rules: 401 fails
/// immediately with `TokenInvalid`, 429 is retried on the bounded schedule
/// and surfaces as `RateLimit` once exhausted, other non-2xx responses
/// become `ApiError`, and 2xx payloads missing a required field become
/// `InvalidResponse`.
#[async_trait]
pub trait NutritionApi: Send + Sync {
    /// Create a new remote food resource. Always creates; the decision
    /// whether creation is needed belongs to the caller.
    async fn create_food(
        &self,
        access_token: &str,
        request: &CreateFoodRequest,
    ) -> SyncResult<RemoteFood>;

    /// Log a food against an existing remote food resource
    async fn log_food(&self, access_token: &str, request: &LogFoodRequest)
        -> SyncResult<RemoteLog>;

    /// Delete a remote log resource
    async fn delete_log(&self, access_token: &str, remote_log_id: u64) -> SyncResult<()>;

    /// Exchange an authorization code for the initial token pair
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> SyncResult<TokenPair>;

    /// Obtain a new token pair from a refresh token
    async fn refresh_token(&self, refresh_token: &str) -> SyncResult<TokenPair>;
}
