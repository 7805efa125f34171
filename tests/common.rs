// ABOUTME: Shared test fixtures for saga, token, and matching integration tests
// ABOUTME: Scripted mock provider, in-memory store with failure switches, builders
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use nutrisync::config::SyncConfig;
use nutrisync::errors::{SyncError, SyncResult};
use nutrisync::models::{
    ConfidenceTag, Credential, FoodLogEntry, FoodRecord, LogDetails, MealSlot, NutrientProfile,
};
use nutrisync::providers::{
    CreateFoodRequest, LogFoodRequest, NutritionApi, RemoteFood, RemoteLog, TokenPair,
};
use nutrisync::storage::{FoodStore, KeywordRecord, LogEntryPatch, RecordPatch};

/// First food id the mock hands out
pub const FIRST_FOOD_ID: u64 = 9000;
/// First log id the mock hands out
pub const FIRST_LOG_ID: u64 = 5000;

/// Scripted remote provider double recording every call
#[derive(Default)]
pub struct MockNutritionApi {
    calls: Mutex<Vec<String>>,
    next_food_id: AtomicU64,
    next_log_id: AtomicU64,
    /// Fail this many upcoming log-food calls with a 500
    pub fail_next_log_food: AtomicU32,
    /// Fail this many upcoming create-food calls with a 500
    pub fail_next_create_food: AtomicU32,
    /// Fail every delete-log call with a 500
    pub fail_delete_log: AtomicBool,
    /// Make token refresh fail as an auth rejection
    pub fail_refresh_auth: AtomicBool,
}

impl MockNutritionApi {
    pub fn new() -> Self {
        Self {
            next_food_id: AtomicU64::new(FIRST_FOOD_ID),
            next_log_id: AtomicU64::new(FIRST_LOG_ID),
            ..Self::default()
        }
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// How many recorded calls start with `prefix`
    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn server_error(op: &str) -> SyncError {
        SyncError::ApiError {
            status: Some(500),
            message: format!("simulated {op} failure"),
            body: None,
        }
    }

    fn token_pair(label: &str) -> TokenPair {
        TokenPair {
            access_token: format!("{label}-access"),
            refresh_token: format!("{label}-refresh"),
            expires_at: Utc::now() + Duration::hours(8),
        }
    }
}

#[async_trait]
impl NutritionApi for MockNutritionApi {
    async fn create_food(
        &self,
        _access_token: &str,
        request: &CreateFoodRequest,
    ) -> SyncResult<RemoteFood> {
        self.record(format!("create_food:{}", request.name));
        let remaining = self.fail_next_create_food.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next_create_food
                .store(remaining - 1, Ordering::SeqCst);
            return Err(Self::server_error("create-food"));
        }
        Ok(RemoteFood {
            food_id: self.next_food_id.fetch_add(1, Ordering::SeqCst),
        })
    }

    async fn log_food(
        &self,
        _access_token: &str,
        request: &LogFoodRequest,
    ) -> SyncResult<RemoteLog> {
        self.record(format!("log_food:{}", request.remote_food_id));
        let remaining = self.fail_next_log_food.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next_log_food
                .store(remaining - 1, Ordering::SeqCst);
            return Err(Self::server_error("log-food"));
        }
        Ok(RemoteLog {
            log_id: self.next_log_id.fetch_add(1, Ordering::SeqCst),
        })
    }

    async fn delete_log(&self, _access_token: &str, remote_log_id: u64) -> SyncResult<()> {
        self.record(format!("delete_log:{remote_log_id}"));
        if self.fail_delete_log.load(Ordering::SeqCst) {
            return Err(Self::server_error("delete-log"));
        }
        Ok(())
    }

    async fn exchange_code(&self, code: &str, _redirect_uri: &str) -> SyncResult<TokenPair> {
        self.record(format!("exchange_code:{code}"));
        Ok(Self::token_pair("exchanged"))
    }

    async fn refresh_token(&self, _refresh_token: &str) -> SyncResult<TokenPair> {
        self.record("refresh_token");
        if self.fail_refresh_auth.load(Ordering::SeqCst) {
            return Err(SyncError::TokenInvalid("refresh grant rejected".into()));
        }
        Ok(Self::token_pair("refreshed"))
    }
}

/// In-memory food store with per-operation failure switches
#[derive(Default)]
pub struct InMemoryFoodStore {
    pub records: Mutex<HashMap<Uuid, FoodRecord>>,
    pub entries: Mutex<HashMap<Uuid, FoodLogEntry>>,
    pub credentials: Mutex<HashMap<Uuid, Credential>>,
    pub fail_create_record: AtomicBool,
    pub fail_create_entry: AtomicBool,
    pub fail_update_entry: AtomicBool,
    pub fail_update_record: AtomicBool,
    pub fail_delete_entry: AtomicBool,
}

impl InMemoryFoodStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_record(&self, record: FoodRecord) {
        self.records.lock().unwrap().insert(record.id, record);
    }

    pub fn insert_entry(&self, entry: FoodLogEntry) {
        self.entries.lock().unwrap().insert(entry.id, entry);
    }

    pub fn insert_credential(&self, credential: Credential) {
        self.credentials
            .lock()
            .unwrap()
            .insert(credential.owner_id, credential);
    }

    pub fn entry_count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn entry(&self, entry_id: Uuid) -> Option<FoodLogEntry> {
        self.entries.lock().unwrap().get(&entry_id).cloned()
    }

    pub fn record(&self, record_id: Uuid) -> Option<FoodRecord> {
        self.records.lock().unwrap().get(&record_id).cloned()
    }
}

#[async_trait]
impl FoodStore for InMemoryFoodStore {
    async fn create_food_record(&self, record: &FoodRecord) -> Result<Uuid> {
        if self.fail_create_record.load(Ordering::SeqCst) {
            bail!("simulated record insert failure");
        }
        self.records
            .lock()
            .unwrap()
            .insert(record.id, record.clone());
        Ok(record.id)
    }

    async fn get_food_record(
        &self,
        owner_id: Uuid,
        record_id: Uuid,
    ) -> Result<Option<FoodRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(&record_id)
            .filter(|r| r.owner_id == owner_id)
            .cloned())
    }

    async fn create_log_entry(&self, entry: &FoodLogEntry) -> Result<Uuid> {
        if self.fail_create_entry.load(Ordering::SeqCst) {
            bail!("simulated entry insert failure");
        }
        self.entries.lock().unwrap().insert(entry.id, entry.clone());
        Ok(entry.id)
    }

    async fn get_log_entry(&self, owner_id: Uuid, entry_id: Uuid) -> Result<Option<FoodLogEntry>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(&entry_id)
            .filter(|e| e.owner_id == owner_id)
            .cloned())
    }

    async fn update_log_entry(&self, entry_id: Uuid, patch: &LogEntryPatch) -> Result<()> {
        if self.fail_update_entry.load(Ordering::SeqCst) {
            bail!("simulated entry update failure");
        }
        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .get_mut(&entry_id)
            .ok_or_else(|| anyhow::anyhow!("no such entry"))?;
        entry.meal_slot = patch.meal_slot;
        entry.amount = patch.amount;
        entry.unit_id = patch.unit_id;
        entry.date = patch.date;
        entry.time = patch.time;
        if let Some(remote_log_id) = patch.remote_log_id {
            entry.remote_log_id = Some(remote_log_id);
        }
        Ok(())
    }

    async fn update_food_record(&self, record_id: Uuid, patch: &RecordPatch) -> Result<()> {
        if self.fail_update_record.load(Ordering::SeqCst) {
            bail!("simulated record update failure");
        }
        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(&record_id)
            .ok_or_else(|| anyhow::anyhow!("no such record"))?;
        if let Some(name) = &patch.name {
            record.name = name.clone();
        }
        if let Some(nutrients) = &patch.nutrients {
            record.nutrients = nutrients.clone();
        }
        if let Some(description) = &patch.description {
            record.description = Some(description.clone());
        }
        if let Some(keywords) = &patch.keywords {
            record.keywords = keywords.clone();
        }
        if let Some(confidence) = patch.confidence {
            record.confidence = confidence;
        }
        if let Some(remote_food_id) = patch.remote_food_id {
            record.remote_food_id = Some(remote_food_id);
        }
        Ok(())
    }

    async fn delete_log_entry(&self, entry_id: Uuid) -> Result<()> {
        if self.fail_delete_entry.load(Ordering::SeqCst) {
            bail!("simulated entry delete failure");
        }
        self.entries.lock().unwrap().remove(&entry_id);
        Ok(())
    }

    async fn list_records_with_keywords(&self, owner_id: Uuid) -> Result<Vec<KeywordRecord>> {
        let entries = self.entries.lock().unwrap();
        let last_logged: HashMap<Uuid, DateTime<Utc>> =
            entries.values().fold(HashMap::new(), |mut acc, entry| {
                let instant = entry.date.and_time(entry.time).and_utc();
                acc.entry(entry.food_record_id)
                    .and_modify(|current| {
                        if instant > *current {
                            *current = instant;
                        }
                    })
                    .or_insert(instant);
                acc
            });

        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.owner_id == owner_id && !r.keywords.is_empty())
            .map(|r| KeywordRecord {
                record: r.clone(),
                last_logged_at: last_logged.get(&r.id).copied(),
            })
            .collect())
    }

    async fn get_credential(&self, owner_id: Uuid) -> Result<Option<Credential>> {
        Ok(self.credentials.lock().unwrap().get(&owner_id).cloned())
    }

    async fn upsert_credential(&self, credential: &Credential) -> Result<()> {
        self.credentials
            .lock()
            .unwrap()
            .insert(credential.owner_id, credential.clone());
        Ok(())
    }
}

// ================================
// Builders
// ================================

/// Live (non-dry-run) configuration; no network traffic happens in tests
/// because the provider is mocked.
pub fn live_config() -> SyncConfig {
    SyncConfig {
        client_id: "test-client".into(),
        client_secret: "test-secret".into(),
        api_base_url: "https://api.fitbit.com".into(),
        token_url: "https://api.fitbit.com/oauth2/token".into(),
        http_timeout: std::time::Duration::from_secs(10),
        dry_run: false,
    }
}

pub fn nutrients(calories: f64, protein: f64, carbs: f64, fat: f64) -> NutrientProfile {
    NutrientProfile {
        calories,
        protein_g: protein,
        carbs_g: carbs,
        fat_g: fat,
        fiber_g: 2.0,
        sodium_mg: 100.0,
        saturated_fat_g: None,
        trans_fat_g: None,
        sugars_g: None,
        calories_from_fat: None,
    }
}

pub fn details(slot: MealSlot, day: u32) -> LogDetails {
    LogDetails {
        meal_slot: slot,
        amount: 1.0,
        unit_id: 304,
        date: NaiveDate::from_ymd_opt(2025, 6, day).unwrap(),
        time: NaiveTime::from_hms_opt(12, 15, 0).unwrap(),
    }
}

pub fn record_with_keywords(
    owner_id: Uuid,
    name: &str,
    keywords: &[&str],
    profile: NutrientProfile,
    remote_food_id: Option<u64>,
) -> FoodRecord {
    FoodRecord {
        id: Uuid::new_v4(),
        owner_id,
        name: name.to_owned(),
        serving_amount: 1.0,
        serving_unit_id: 304,
        nutrients: profile,
        confidence: ConfidenceTag::Medium,
        description: None,
        keywords: keywords.iter().map(|k| (*k).to_owned()).collect(),
        remote_food_id,
        created_at: Utc::now(),
    }
}

pub fn entry_for(record: &FoodRecord, day: u32, remote_log_id: Option<u64>) -> FoodLogEntry {
    FoodLogEntry {
        id: Uuid::new_v4(),
        owner_id: record.owner_id,
        food_record_id: record.id,
        meal_slot: MealSlot::Lunch,
        amount: 1.0,
        unit_id: 304,
        date: NaiveDate::from_ymd_opt(2025, 6, day).unwrap(),
        time: NaiveTime::from_hms_opt(12, 15, 0).unwrap(),
        remote_log_id,
    }
}

pub fn fresh_credential(owner_id: Uuid) -> Credential {
    Credential {
        owner_id,
        access_token: "fresh-access".into(),
        refresh_token: "fresh-refresh".into(),
        expires_at: Utc::now() + Duration::hours(4),
    }
}

pub fn expiring_credential(owner_id: Uuid) -> Credential {
    Credential {
        owner_id,
        access_token: "stale-access".into(),
        refresh_token: "stale-refresh".into(),
        expires_at: Utc::now() + Duration::minutes(20),
    }
}
