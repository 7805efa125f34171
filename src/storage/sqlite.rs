// ABOUTME: SQLite implementation of the FoodStore trait via sqlx
// ABOUTME: Schema init plus single-row CRUD for records, entries, and credentials
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! SQLite-backed food store.
//!
//! Timestamps are stored as RFC3339 text, uuids as text, nutrient profiles
//! and keyword sets as JSON text. Remote ids are SQLite integers.

use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

use super::{FoodStore, KeywordRecord, LogEntryPatch, RecordPatch};
use crate::models::{ConfidenceTag, Credential, FoodLogEntry, FoodRecord, MealSlot};

/// SQLite-backed implementation of [`FoodStore`]
#[derive(Clone)]
pub struct SqliteFoodStore {
    pool: SqlitePool,
}

impl SqliteFoodStore {
    /// Open (creating if missing) the database at `database_url`
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .context("invalid sqlite database url")?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("failed to open sqlite database")?;

        Ok(Self { pool })
    }

    /// Create tables and indexes if they do not exist yet
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS food_records (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                name TEXT NOT NULL,
                serving_amount REAL NOT NULL,
                serving_unit_id INTEGER NOT NULL,
                nutrients TEXT NOT NULL,
                confidence TEXT NOT NULL,
                description TEXT,
                keywords TEXT NOT NULL DEFAULT '[]',
                remote_food_id INTEGER,
                created_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_food_records_owner ON food_records(owner_id)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS food_log_entries (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                food_record_id TEXT NOT NULL REFERENCES food_records(id),
                meal_slot TEXT NOT NULL,
                amount REAL NOT NULL,
                unit_id INTEGER NOT NULL,
                date TEXT NOT NULL,
                time TEXT NOT NULL,
                remote_log_id INTEGER
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_log_entries_record ON food_log_entries(food_record_id)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS credentials (
                owner_id TEXT PRIMARY KEY,
                access_token TEXT NOT NULL,
                refresh_token TEXT NOT NULL,
                expires_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn row_to_record(row: &SqliteRow) -> Result<FoodRecord> {
        let nutrients: String = row.get("nutrients");
        let keywords: String = row.get("keywords");
        let created_at: String = row.get("created_at");
        let confidence: String = row.get("confidence");

        Ok(FoodRecord {
            id: Uuid::parse_str(row.get("id"))?,
            owner_id: Uuid::parse_str(row.get("owner_id"))?,
            name: row.get("name"),
            serving_amount: row.get("serving_amount"),
            serving_unit_id: row.get::<i64, _>("serving_unit_id") as u64,
            nutrients: serde_json::from_str(&nutrients).context("corrupt nutrients column")?,
            confidence: ConfidenceTag::from_str_lossy(&confidence),
            description: row.get("description"),
            keywords: serde_json::from_str(&keywords).context("corrupt keywords column")?,
            remote_food_id: row
                .get::<Option<i64>, _>("remote_food_id")
                .map(|id| id as u64),
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .context("corrupt created_at column")?
                .with_timezone(&Utc),
        })
    }

    fn row_to_entry(row: &SqliteRow) -> Result<FoodLogEntry> {
        let meal_slot: String = row.get("meal_slot");
        let date: String = row.get("date");
        let time: String = row.get("time");

        Ok(FoodLogEntry {
            id: Uuid::parse_str(row.get("id"))?,
            owner_id: Uuid::parse_str(row.get("owner_id"))?,
            food_record_id: Uuid::parse_str(row.get("food_record_id"))?,
            meal_slot: MealSlot::from_str_lossy(&meal_slot),
            amount: row.get("amount"),
            unit_id: row.get::<i64, _>("unit_id") as u64,
            date: NaiveDate::parse_from_str(&date, "%Y-%m-%d").context("corrupt date column")?,
            time: NaiveTime::parse_from_str(&time, "%H:%M:%S").context("corrupt time column")?,
            remote_log_id: row
                .get::<Option<i64>, _>("remote_log_id")
                .map(|id| id as u64),
        })
    }
}

#[async_trait]
impl FoodStore for SqliteFoodStore {
    async fn create_food_record(&self, record: &FoodRecord) -> Result<Uuid> {
        sqlx::query(
            r"
            INSERT INTO food_records
                (id, owner_id, name, serving_amount, serving_unit_id, nutrients,
                 confidence, description, keywords, remote_food_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ",
        )
        .bind(record.id.to_string())
        .bind(record.owner_id.to_string())
        .bind(&record.name)
        .bind(record.serving_amount)
        .bind(record.serving_unit_id as i64)
        .bind(serde_json::to_string(&record.nutrients)?)
        .bind(record.confidence.as_str())
        .bind(&record.description)
        .bind(serde_json::to_string(&record.keywords)?)
        .bind(record.remote_food_id.map(|id| id as i64))
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(record.id)
    }

    async fn get_food_record(
        &self,
        owner_id: Uuid,
        record_id: Uuid,
    ) -> Result<Option<FoodRecord>> {
        let row = sqlx::query("SELECT * FROM food_records WHERE id = ?1 AND owner_id = ?2")
            .bind(record_id.to_string())
            .bind(owner_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn create_log_entry(&self, entry: &FoodLogEntry) -> Result<Uuid> {
        sqlx::query(
            r"
            INSERT INTO food_log_entries
                (id, owner_id, food_record_id, meal_slot, amount, unit_id, date, time, remote_log_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
        )
        .bind(entry.id.to_string())
        .bind(entry.owner_id.to_string())
        .bind(entry.food_record_id.to_string())
        .bind(entry.meal_slot.as_str())
        .bind(entry.amount)
        .bind(entry.unit_id as i64)
        .bind(entry.date.format("%Y-%m-%d").to_string())
        .bind(entry.time.format("%H:%M:%S").to_string())
        .bind(entry.remote_log_id.map(|id| id as i64))
        .execute(&self.pool)
        .await?;

        Ok(entry.id)
    }

    async fn get_log_entry(&self, owner_id: Uuid, entry_id: Uuid) -> Result<Option<FoodLogEntry>> {
        let row = sqlx::query("SELECT * FROM food_log_entries WHERE id = ?1 AND owner_id = ?2")
            .bind(entry_id.to_string())
            .bind(owner_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_entry).transpose()
    }

    async fn update_log_entry(&self, entry_id: Uuid, patch: &LogEntryPatch) -> Result<()> {
        sqlx::query(
            r"
            UPDATE food_log_entries
            SET meal_slot = ?2, amount = ?3, unit_id = ?4, date = ?5, time = ?6,
                remote_log_id = COALESCE(?7, remote_log_id)
            WHERE id = ?1
            ",
        )
        .bind(entry_id.to_string())
        .bind(patch.meal_slot.as_str())
        .bind(patch.amount)
        .bind(patch.unit_id as i64)
        .bind(patch.date.format("%Y-%m-%d").to_string())
        .bind(patch.time.format("%H:%M:%S").to_string())
        .bind(patch.remote_log_id.map(|id| id as i64))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_food_record(&self, record_id: Uuid, patch: &RecordPatch) -> Result<()> {
        let nutrients = patch
            .nutrients
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let keywords = patch
            .keywords
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r"
            UPDATE food_records
            SET name = COALESCE(?2, name),
                nutrients = COALESCE(?3, nutrients),
                description = COALESCE(?4, description),
                keywords = COALESCE(?5, keywords),
                confidence = COALESCE(?6, confidence),
                remote_food_id = COALESCE(?7, remote_food_id)
            WHERE id = ?1
            ",
        )
        .bind(record_id.to_string())
        .bind(&patch.name)
        .bind(nutrients)
        .bind(&patch.description)
        .bind(keywords)
        .bind(patch.confidence.map(ConfidenceTag::as_str))
        .bind(patch.remote_food_id.map(|id| id as i64))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_log_entry(&self, entry_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM food_log_entries WHERE id = ?1")
            .bind(entry_id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn list_records_with_keywords(&self, owner_id: Uuid) -> Result<Vec<KeywordRecord>> {
        let rows = sqlx::query(
            r"
            SELECT r.*,
                   (SELECT MAX(e.date || 'T' || e.time)
                    FROM food_log_entries e
                    WHERE e.food_record_id = r.id) AS last_logged
            FROM food_records r
            WHERE r.owner_id = ?1 AND r.keywords != '[]'
            ",
        )
        .bind(owner_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let record = Self::row_to_record(row)?;
            let last_logged_at = row
                .get::<Option<String>, _>("last_logged")
                .map(|raw| {
                    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S")
                        .context("corrupt log timestamp")
                })
                .transpose()?
                .map(|naive| naive.and_utc());
            records.push(KeywordRecord {
                record,
                last_logged_at,
            });
        }

        Ok(records)
    }

    async fn get_credential(&self, owner_id: Uuid) -> Result<Option<Credential>> {
        let row = sqlx::query("SELECT * FROM credentials WHERE owner_id = ?1")
            .bind(owner_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            let expires_at: String = row.get("expires_at");
            Ok(Credential {
                owner_id: Uuid::parse_str(row.get("owner_id"))?,
                access_token: row.get("access_token"),
                refresh_token: row.get("refresh_token"),
                expires_at: DateTime::parse_from_rfc3339(&expires_at)
                    .context("corrupt expires_at column")?
                    .with_timezone(&Utc),
            })
        })
        .transpose()
    }

    async fn upsert_credential(&self, credential: &Credential) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO credentials (owner_id, access_token, refresh_token, expires_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(owner_id) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                expires_at = excluded.expires_at
            ",
        )
        .bind(credential.owner_id.to_string())
        .bind(&credential.access_token)
        .bind(&credential.refresh_token)
        .bind(credential.expires_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
