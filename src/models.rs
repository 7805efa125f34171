// ABOUTME: Core data models for food records, log entries, and remote credentials
// ABOUTME: Defines FoodRecord, FoodLogEntry, MealSlot, NutrientProfile and saga request types
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Data model for the food-log synchronization engine.
//!
//! A [`FoodRecord`] is the local description of a food (serving, nutrients,
//! keywords), optionally linked to a remote "food" resource. A
//! [`FoodLogEntry`] is one instance of that food being eaten. The remote ids
//! on both types are owned by the write saga: they are only ever assigned by
//! a successful synchronization step.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum number of keywords stored per food record
pub const MAX_KEYWORDS: usize = 20;

/// Meal slot for a log entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MealSlot {
    /// Breakfast
    Breakfast,
    /// Snack between breakfast and lunch
    MorningSnack,
    /// Lunch
    Lunch,
    /// Snack between lunch and dinner
    AfternoonSnack,
    /// Dinner
    Dinner,
    /// No particular meal
    Anytime,
}

impl MealSlot {
    /// Provider meal-type id for this slot
    #[must_use]
    pub fn meal_type_id(self) -> u8 {
        match self {
            Self::Breakfast => 1,
            Self::MorningSnack => 2,
            Self::Lunch => 3,
            Self::AfternoonSnack => 4,
            Self::Dinner => 5,
            Self::Anytime => 7,
        }
    }

    /// Stable lowercase name, used for storage and logging
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Breakfast => "breakfast",
            Self::MorningSnack => "morning_snack",
            Self::Lunch => "lunch",
            Self::AfternoonSnack => "afternoon_snack",
            Self::Dinner => "dinner",
            Self::Anytime => "anytime",
        }
    }

    /// Parse a meal slot from a lowercase string, falling back to `Anytime`
    #[must_use]
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "breakfast" => Self::Breakfast,
            "morning_snack" | "morning snack" => Self::MorningSnack,
            "lunch" => Self::Lunch,
            "afternoon_snack" | "afternoon snack" => Self::AfternoonSnack,
            "dinner" => Self::Dinner,
            _ => Self::Anytime,
        }
    }
}

/// How much the caller trusts the nutrient estimate behind a record
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTag {
    /// Verified or label-derived values
    High,
    /// Estimated with good signal
    Medium,
    /// Rough estimate
    Low,
}

impl ConfidenceTag {
    /// Stable lowercase name, used for storage and logging
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Parse a confidence tag, falling back to `Low`
    #[must_use]
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "high" => Self::High,
            "medium" => Self::Medium,
            _ => Self::Low,
        }
    }
}

/// Nutrient profile for one serving of a food
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutrientProfile {
    /// Calories (kcal)
    pub calories: f64,
    /// Protein in grams
    pub protein_g: f64,
    /// Carbohydrates in grams
    pub carbs_g: f64,
    /// Fat in grams
    pub fat_g: f64,
    /// Fiber in grams
    pub fiber_g: f64,
    /// Sodium in milligrams
    pub sodium_mg: f64,
    /// Saturated fat in grams
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saturated_fat_g: Option<f64>,
    /// Trans fat in grams
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trans_fat_g: Option<f64>,
    /// Sugars in grams
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sugars_g: Option<f64>,
    /// Calories from fat (kcal)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calories_from_fat: Option<f64>,
}

/// Local description of a food, optionally linked to a remote resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodRecord {
    /// Local identifier
    pub id: Uuid,
    /// Owning user
    pub owner_id: Uuid,
    /// Display name
    pub name: String,
    /// Default serving amount
    pub serving_amount: f64,
    /// Provider unit code for the default serving
    pub serving_unit_id: u64,
    /// Nutrients for one default serving
    pub nutrients: NutrientProfile,
    /// Trust level of the nutrient estimate
    pub confidence: ConfidenceTag,
    /// Free-text notes / description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Lowercase match keywords, at most [`MAX_KEYWORDS`]
    pub keywords: Vec<String>,
    /// Remote food resource id. Immutable once assigned: the record is
    /// reused by reference and never re-created remotely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_food_id: Option<u64>,
    /// Creation instant
    pub created_at: DateTime<Utc>,
}

/// One instance of a food being eaten at a specific date/time/meal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodLogEntry {
    /// Local identifier
    pub id: Uuid,
    /// Owning user
    pub owner_id: Uuid,
    /// The food this entry logs
    pub food_record_id: Uuid,
    /// Meal slot
    pub meal_slot: MealSlot,
    /// Amount eaten (may differ from the record's default serving)
    pub amount: f64,
    /// Provider unit code for `amount`
    pub unit_id: u64,
    /// Calendar date of the meal
    pub date: NaiveDate,
    /// Time of day of the meal
    pub time: NaiveTime,
    /// Remote log resource id. A non-null value always identifies a live
    /// remote resource created by this entry's most recent sync step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_log_id: Option<u64>,
}

/// Remote-account credential for one owner.
///
/// Created on first authorization, rotated by the token lifecycle manager,
/// never deleted by this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// Owning user
    pub owner_id: Uuid,
    /// Bearer token for API calls
    pub access_token: String,
    /// Token used to obtain a new pair
    pub refresh_token: String,
    /// Instant the access token stops being accepted
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Whether the access token is still comfortably inside its lifetime
    /// at `now` (one hour of headroom, matching the proactive refresh
    /// window of the token lifecycle manager).
    #[must_use]
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now + chrono::Duration::hours(1)
    }
}

/// Reuse candidate produced by the food identity resolver. Never persisted.
#[derive(Debug, Clone)]
pub struct MatchCandidate {
    /// The stored record being proposed for reuse
    pub record: FoodRecord,
    /// Fraction of the candidate's keywords present in the record (0–1)
    pub ratio: f64,
    /// Most recent instant this record was logged, if ever
    pub last_logged_at: Option<DateTime<Utc>>,
}

/// Details of where/when/how much for a log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogDetails {
    /// Meal slot
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

/// Caller request for the create-new flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFoodLog {
    /// Display name of the food
    pub name: String,
    /// Default serving amount
    pub serving_amount: f64,
    /// Provider unit code for the default serving
    pub serving_unit_id: u64,
    /// Nutrients for one default serving
    pub nutrients: NutrientProfile,
    /// Trust level of the nutrient estimate
    pub confidence: ConfidenceTag,
    /// Free-text notes / description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Lowercase match keywords
    pub keywords: Vec<String>,
    /// Where/when/how much
    pub details: LogDetails,
}

/// Caller request for the edit flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditFoodLog {
    /// New where/when/how much
    pub details: LogDetails,
    /// New nutrient profile, if the food itself changed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nutrients: Option<NutrientProfile>,
    /// New display name, used only when `nutrients` changed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Metadata refresh applied to a record after a successful reuse
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// New description, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Replacement keyword set, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
    /// New confidence tag, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<ConfidenceTag>,
}

/// Success payload returned by every saga entry point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOutcome {
    /// Local food record involved
    pub food_record_id: Uuid,
    /// Local log entry involved (absent for the delete flow)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_entry_id: Option<Uuid>,
    /// Remote food resource id, when one exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_food_id: Option<u64>,
    /// Remote log resource id, when one exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_log_id: Option<u64>,
    /// Whether an existing remote food was reused instead of created
    pub reused: bool,
}
