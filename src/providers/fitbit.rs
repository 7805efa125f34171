// ABOUTME: Fitbit food and food-log API client with retry and error classification
// ABOUTME: Implements NutritionApi over form-encoded requests and JSON responses
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Fitbit implementation of the remote nutrition provider.
//!
//! Classification rules, applied per attempt:
//! - 401 fails immediately with `TokenInvalid` (the caller must re-authorize)
//! - 429 is retried on the 1s/2s/4s schedule, then surfaces as `RateLimit`
//! - any other non-2xx becomes `ApiError` with a truncated diagnostic body
//! - a 2xx payload missing a required field becomes `InvalidResponse`
//!
//! # API Documentation
//! - [Food Logging](https://dev.fitbit.com/build/reference/web-api/nutrition/)
//! - [OAuth2 Authorization](https://dev.fitbit.com/build/reference/web-api/developer-guide/authorization/)

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde_json::from_str;
use tracing::{debug, error};

use super::{CreateFoodRequest, LogFoodRequest, NutritionApi, RemoteFood, RemoteLog, TokenPair};
use crate::config::SyncConfig;
use crate::errors::{SyncError, SyncResult};
use crate::utils::http_client::shared_client;
use crate::utils::retry::{with_retry, RetryConfig};

/// Bytes of a failed response body kept for diagnostics
const DIAGNOSTIC_BODY_LIMIT: usize = 512;

/// Fitbit API error response format
#[derive(Debug, Deserialize)]
struct FitbitErrorResponse {
    errors: Option<Vec<FitbitApiError>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FitbitApiError {
    error_type: Option<String>,
    message: Option<String>,
}

/// Create-food API response wrapper
#[derive(Debug, Deserialize)]
struct CreateFoodResponse {
    food: Option<FitbitFood>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FitbitFood {
    food_id: Option<u64>,
}

/// Log-food API response wrapper
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogFoodResponse {
    food_log: Option<FitbitFoodLog>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FitbitFoodLog {
    log_id: Option<u64>,
}

/// OAuth2 token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

/// Fitbit client for food, food-log, and token operations
pub struct FitbitNutritionClient {
    client: Client,
    client_id: String,
    client_secret: String,
    api_base_url: String,
    token_url: String,
    http_timeout: Duration,
    retry: RetryConfig,
}

impl FitbitNutritionClient {
    /// Create a client from runtime configuration
    #[must_use]
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            client: shared_client().clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            api_base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            token_url: config.token_url.clone(),
            http_timeout: config.http_timeout,
            retry: RetryConfig::rate_limit_default(),
        }
    }

    /// Retry wrapper: 429s follow the bounded schedule, exhaustion maps to
    /// `RateLimit`, everything else passes through unchanged.
    async fn with_rate_limit_retry<T, F, Fut>(&self, op: F) -> SyncResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = SyncResult<T>>,
    {
        let result = with_retry(&self.retry, tokio::time::sleep, is_rate_limited, op).await;
        match result {
            Err(err) if is_rate_limited(&err) => Err(SyncError::RateLimit {
                attempts: self.retry.max_attempts(),
            }),
            other => other,
        }
    }

    /// POST a form-encoded API request and return (status, body)
    async fn post_form(
        &self,
        url: &str,
        access_token: &str,
        params: &[(&str, String)],
    ) -> SyncResult<(u16, String)> {
        debug!("POST {url}");
        let response = self
            .client
            .post(url)
            .timeout(self.http_timeout)
            .bearer_auth(access_token)
            .form(params)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport_error)?;
        Ok((status, body))
    }

    /// Parse a 2xx JSON body, mapping parse failures to `ApiError`
    fn parse_payload<T>(body: &str) -> SyncResult<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        from_str(body).map_err(|e| {
            error!("Failed to parse Fitbit API response: {e}");
            SyncError::ApiError {
                status: None,
                message: format!("unparsable provider response: {e}"),
                body: Some(truncate_body(body)),
            }
        })
    }

    async fn create_food_once(
        &self,
        access_token: &str,
        request: &CreateFoodRequest,
    ) -> SyncResult<RemoteFood> {
        let url = format!("{}/1/user/-/foods.json", self.api_base_url);
        let params = create_food_params(request);
        let (status, body) = self.post_form(&url, access_token, &params).await?;

        if !(200..300).contains(&status) {
            return Err(classify_api_failure(status, &body));
        }

        let payload: CreateFoodResponse = Self::parse_payload(&body)?;
        let food_id = payload
            .food
            .and_then(|f| f.food_id)
            .ok_or(SyncError::InvalidResponse { field: "foodId" })?;
        Ok(RemoteFood { food_id })
    }

    async fn log_food_once(
        &self,
        access_token: &str,
        request: &LogFoodRequest,
    ) -> SyncResult<RemoteLog> {
        let url = format!("{}/1/user/-/foods/log.json", self.api_base_url);
        let params = log_food_params(request);
        let (status, body) = self.post_form(&url, access_token, &params).await?;

        if !(200..300).contains(&status) {
            return Err(classify_api_failure(status, &body));
        }

        let payload: LogFoodResponse = Self::parse_payload(&body)?;
        let log_id = payload
            .food_log
            .and_then(|l| l.log_id)
            .ok_or(SyncError::InvalidResponse { field: "logId" })?;
        Ok(RemoteLog { log_id })
    }

    async fn delete_log_once(&self, access_token: &str, remote_log_id: u64) -> SyncResult<()> {
        let url = format!(
            "{}/1/user/-/foods/log/{remote_log_id}.json",
            self.api_base_url
        );
        debug!("DELETE {url}");
        let response = self
            .client
            .delete(&url)
            .timeout(self.http_timeout)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_api_failure(status, &body));
        }
        Ok(())
    }

    /// POST to the token endpoint with Basic client authentication
    async fn token_request(&self, params: &[(&str, String)]) -> SyncResult<TokenPair> {
        let basic = BASE64_STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret));
        let response = self
            .client
            .post(&self.token_url)
            .timeout(self.http_timeout)
            .header("Authorization", format!("Basic {basic}"))
            .form(params)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport_error)?;

        if !(200..300).contains(&status) {
            return Err(classify_token_failure(status, &body));
        }

        let payload: TokenResponse = Self::parse_payload(&body)?;
        let access_token = payload.access_token.ok_or(SyncError::InvalidResponse {
            field: "access_token",
        })?;
        let refresh_token = payload.refresh_token.ok_or(SyncError::InvalidResponse {
            field: "refresh_token",
        })?;
        let expires_in = payload.expires_in.ok_or(SyncError::InvalidResponse {
            field: "expires_in",
        })?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_at: Utc::now() + chrono::Duration::seconds(expires_in),
        })
    }
}

#[async_trait]
impl NutritionApi for FitbitNutritionClient {
    async fn create_food(
        &self,
        access_token: &str,
        request: &CreateFoodRequest,
    ) -> SyncResult<RemoteFood> {
        self.with_rate_limit_retry(|| self.create_food_once(access_token, request))
            .await
    }

    async fn log_food(
        &self,
        access_token: &str,
        request: &LogFoodRequest,
    ) -> SyncResult<RemoteLog> {
        self.with_rate_limit_retry(|| self.log_food_once(access_token, request))
            .await
    }

    async fn delete_log(&self, access_token: &str, remote_log_id: u64) -> SyncResult<()> {
        self.with_rate_limit_retry(|| self.delete_log_once(access_token, remote_log_id))
            .await
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> SyncResult<TokenPair> {
        let params = [
            ("grant_type", "authorization_code".to_owned()),
            ("client_id", self.client_id.clone()),
            ("code", code.to_owned()),
            ("redirect_uri", redirect_uri.to_owned()),
        ];
        self.with_rate_limit_retry(|| self.token_request(&params))
            .await
    }

    async fn refresh_token(&self, refresh_token: &str) -> SyncResult<TokenPair> {
        let params = [
            ("grant_type", "refresh_token".to_owned()),
            ("refresh_token", refresh_token.to_owned()),
        ];
        self.with_rate_limit_retry(|| self.token_request(&params))
            .await
    }
}

/// Whether an error is a rate-limit response still eligible for retry
fn is_rate_limited(err: &SyncError) -> bool {
    matches!(
        err,
        SyncError::ApiError {
            status: Some(429),
            ..
        }
    )
}

/// Transport-level failures (connect, timeout, body read) have no status
fn transport_error(err: reqwest::Error) -> SyncError {
    SyncError::ApiError {
        status: None,
        message: format!("request failed: {err}"),
        body: None,
    }
}

/// Keep a bounded prefix of a response body for diagnostics
fn truncate_body(body: &str) -> String {
    if body.len() <= DIAGNOSTIC_BODY_LIMIT {
        return body.to_owned();
    }
    let mut end = DIAGNOSTIC_BODY_LIMIT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body[..end].to_owned()
}

/// Pull the first structured error message out of a Fitbit error body
fn parse_error_message(body: &str) -> Option<String> {
    let parsed: FitbitErrorResponse = from_str(body).ok()?;
    let first = parsed.errors?.into_iter().next()?;
    match (first.error_type, first.message) {
        (Some(t), Some(m)) => Some(format!("{t}: {m}")),
        (_, Some(m)) => Some(m),
        (Some(t), None) => Some(t),
        (None, None) => None,
    }
}

/// Classify a non-2xx food/log API response
fn classify_api_failure(status: u16, body: &str) -> SyncError {
    match status {
        401 => SyncError::TokenInvalid(
            parse_error_message(body).unwrap_or_else(|| "provider rejected access token".into()),
        ),
        status => SyncError::ApiError {
            status: Some(status),
            message: parse_error_message(body)
                .unwrap_or_else(|| format!("provider request failed with status {status}")),
            body: Some(truncate_body(body)),
        },
    }
}

/// Classify a non-2xx token endpoint response.
///
/// 400 and 401 both mean the grant is no good (expired or revoked refresh
/// token, bad client credentials) and require re-authorization.
fn classify_token_failure(status: u16, body: &str) -> SyncError {
    match status {
        400 | 401 => SyncError::TokenInvalid(
            parse_error_message(body).unwrap_or_else(|| "token grant rejected".into()),
        ),
        status => SyncError::ApiError {
            status: Some(status),
            message: parse_error_message(body)
                .unwrap_or_else(|| format!("token endpoint failed with status {status}")),
            body: Some(truncate_body(body)),
        },
    }
}

/// Form parameters for create-food
fn create_food_params(request: &CreateFoodRequest) -> Vec<(&'static str, String)> {
    let n = &request.nutrients;
    let mut params = vec![
        ("name", request.name.clone()),
        (
            "defaultFoodMeasurementUnitId",
            request.serving_unit_id.to_string(),
        ),
        ("defaultServingSize", request.serving_amount.to_string()),
        ("calories", n.calories.round().to_string()),
        ("protein", n.protein_g.to_string()),
        ("totalCarbohydrate", n.carbs_g.to_string()),
        ("totalFat", n.fat_g.to_string()),
        ("dietaryFiber", n.fiber_g.to_string()),
        ("sodium", n.sodium_mg.to_string()),
    ];
    if let Some(description) = &request.description {
        params.push(("description", description.clone()));
    }
    if let Some(v) = n.saturated_fat_g {
        params.push(("saturatedFat", v.to_string()));
    }
    if let Some(v) = n.trans_fat_g {
        params.push(("transFat", v.to_string()));
    }
    if let Some(v) = n.sugars_g {
        params.push(("sugars", v.to_string()));
    }
    if let Some(v) = n.calories_from_fat {
        params.push(("caloriesFromFat", v.round().to_string()));
    }
    params
}

/// Form parameters for log-food
fn log_food_params(request: &LogFoodRequest) -> Vec<(&'static str, String)> {
    vec![
        ("foodId", request.remote_food_id.to_string()),
        ("mealTypeId", request.meal_slot.meal_type_id().to_string()),
        ("unitId", request.unit_id.to_string()),
        ("amount", request.amount.to_string()),
        ("date", request.date.format("%Y-%m-%d").to_string()),
        ("time", request.time.format("%H:%M").to_string()),
    ]
}
