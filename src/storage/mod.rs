// ABOUTME: Storage abstraction for food records, log entries, and credentials
// ABOUTME: FoodStore trait with single-row CRUD semantics plus patch types
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Storage boundary.
//!
//! Every operation is atomic at the single-row level; no multi-row
//! transaction is assumed or required by the synchronization engine — the
//! write saga's compensation logic exists precisely because there is none.
//! Failures use `anyhow::Result` here and are mapped to the sync error
//! taxonomy at the service boundary.

pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use crate::models::{
    ConfidenceTag, Credential, FoodLogEntry, FoodRecord, MealSlot, NutrientProfile,
};

pub use sqlite::SqliteFoodStore;

/// A food record paired with the most recent instant it was logged
#[derive(Debug, Clone)]
pub struct KeywordRecord {
    /// The stored record
    pub record: FoodRecord,
    /// Most recent log instant, if the record was ever logged
    pub last_logged_at: Option<DateTime<Utc>>,
}

/// Field updates for a log entry.
///
/// `remote_log_id: None` leaves the stored id untouched (dry-run edits rely
/// on this); `Some(id)` replaces it.
#[derive(Debug, Clone)]
pub struct LogEntryPatch {
    /// New meal slot
    pub meal_slot: MealSlot,
    /// New amount
    pub amount: f64,
    /// New unit code
    pub unit_id: u64,
    /// New date
    pub date: NaiveDate,
    /// New time
    pub time: NaiveTime,
    /// Replacement remote log id, when the sync step produced one
    pub remote_log_id: Option<u64>,
}

/// Field updates for a food record.
///
/// Unset options leave the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct RecordPatch {
    /// New display name
    pub name: Option<String>,
    /// New nutrient profile
    pub nutrients: Option<NutrientProfile>,
    /// New description
    pub description: Option<String>,
    /// Replacement keyword set
    pub keywords: Option<Vec<String>>,
    /// New confidence tag
    pub confidence: Option<ConfidenceTag>,
    /// Replacement remote food id (full-path edits only)
    pub remote_food_id: Option<u64>,
}

/// Local persistence consumed by the synchronization engine
#[async_trait]
pub trait FoodStore: Send + Sync {
    /// Persist a new food record, returning its id
    async fn create_food_record(&self, record: &FoodRecord) -> Result<Uuid>;

    /// Fetch a food record owned by `owner_id`
    async fn get_food_record(&self, owner_id: Uuid, record_id: Uuid)
        -> Result<Option<FoodRecord>>;

    /// Persist a new log entry, returning its id
    async fn create_log_entry(&self, entry: &FoodLogEntry) -> Result<Uuid>;

    /// Fetch a log entry owned by `owner_id`
    async fn get_log_entry(&self, owner_id: Uuid, entry_id: Uuid) -> Result<Option<FoodLogEntry>>;

    /// Apply a patch to a log entry
    async fn update_log_entry(&self, entry_id: Uuid, patch: &LogEntryPatch) -> Result<()>;

    /// Apply a patch to a food record
    async fn update_food_record(&self, record_id: Uuid, patch: &RecordPatch) -> Result<()>;

    /// Delete a log entry
    async fn delete_log_entry(&self, entry_id: Uuid) -> Result<()>;

    /// All of an owner's records that carry at least one keyword, with
    /// their most recent log instant
    async fn list_records_with_keywords(&self, owner_id: Uuid) -> Result<Vec<KeywordRecord>>;

    /// Fetch the owner's remote-account credential
    async fn get_credential(&self, owner_id: Uuid) -> Result<Option<Credential>>;

    /// Insert or replace the owner's remote-account credential
    async fn upsert_credential(&self, credential: &Credential) -> Result<()>;
}
