// ABOUTME: Food-log write saga orchestrating remote and local steps with compensation
// ABOUTME: Create-new, reuse, edit, and delete flows behind the FoodLogService facade
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Food Log Write Saga
//!
//! Each flow is an ordered sequence of remote and local steps without a
//! distributed transaction. A completed step registers its compensation on
//! a [`Saga`]; when a later step fails, compensations run in reverse order,
//! each exactly once. Which error the caller sees depends on *where* the
//! flow failed:
//!
//! - a remote step failing surfaces its own error (`ApiError`,
//!   `TokenInvalid`, `RateLimit`, ...) after best-effort rollback;
//! - the local persistence step failing surfaces `Internal` when rollback
//!   succeeded and `Partial` when it did not — `Partial` means the remote
//!   account holds a resource unknown to local records and requires manual
//!   cleanup.
//!
//! Compensations restore the *remote* account; local ids are only ever
//! written by successful flows.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::errors::{SyncError, SyncResult};
use crate::matching::FoodMatcher;
use crate::models::{
    EditFoodLog, FoodLogEntry, FoodRecord, LogDetails, MatchCandidate, NewFoodLog,
    NutrientProfile, RecordMetadata, SyncOutcome, MAX_KEYWORDS,
};
use crate::oauth::TokenManager;
use crate::providers::{CreateFoodRequest, LogFoodRequest, NutritionApi, RemoteLog};
use crate::storage::{FoodStore, LogEntryPatch, RecordPatch};

type CompensationFuture = Pin<Box<dyn Future<Output = SyncResult<()>> + Send>>;
type CompensationFn = Box<dyn FnOnce() -> CompensationFuture + Send>;

/// Result of running the compensation stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RollbackOutcome {
    /// Every registered compensation succeeded (or none were registered)
    Clean,
    /// At least one compensation failed; remote state needs manual cleanup
    Failed,
}

/// Ordered stack of compensations registered by completed forward steps
struct Saga {
    compensations: Vec<(&'static str, CompensationFn)>,
}

impl Saga {
    fn new() -> Self {
        Self {
            compensations: Vec::new(),
        }
    }

    /// Register the compensation for a step that just completed
    fn on_rollback(&mut self, label: &'static str, run: CompensationFn) {
        self.compensations.push((label, run));
    }

    /// Run all registered compensations in reverse order, each exactly
    /// once. Failures are logged at the highest severity and do not stop
    /// later compensations from running.
    async fn rollback(&mut self) -> RollbackOutcome {
        let mut outcome = RollbackOutcome::Clean;
        while let Some((label, run)) = self.compensations.pop() {
            match run().await {
                Ok(()) => info!("compensation succeeded: {label}"),
                Err(err) => {
                    error!(
                        manual_cleanup_required = true,
                        "compensation failed: {label}: {err}"
                    );
                    outcome = RollbackOutcome::Failed;
                }
            }
        }
        outcome
    }
}

/// Entry points for the four synchronization flows
pub struct FoodLogService {
    store: Arc<dyn FoodStore>,
    api: Arc<dyn NutritionApi>,
    tokens: TokenManager,
    matcher: FoodMatcher,
    dry_run: bool,
}

impl FoodLogService {
    /// Build the service over a store and a provider client
    pub fn new(store: Arc<dyn FoodStore>, api: Arc<dyn NutritionApi>, config: &SyncConfig) -> Self {
        Self {
            tokens: TokenManager::new(Arc::clone(&api), Arc::clone(&store)),
            matcher: FoodMatcher::new(Arc::clone(&store), config.dry_run),
            store,
            api,
            dry_run: config.dry_run,
        }
    }

    /// Token lifecycle manager, exposed for account connection
    #[must_use]
    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Ranked reuse candidates for a new food (read-only advisory)
    pub async fn find_matching_foods(
        &self,
        owner_id: Uuid,
        candidate_keywords: &[String],
        candidate_nutrients: &NutrientProfile,
    ) -> SyncResult<Vec<MatchCandidate>> {
        self.matcher
            .find_matching_foods(owner_id, candidate_keywords, candidate_nutrients)
            .await
    }

    // ================================
    // Create-new flow
    // ================================

    /// Log a food that has no reusable remote counterpart: create the
    /// remote food, log it, then persist the record and entry locally.
    pub async fn log_new_food(
        &self,
        owner_id: Uuid,
        request: NewFoodLog,
    ) -> SyncResult<SyncOutcome> {
        validate_new_food(&request)?;

        let now = Utc::now();
        let mut record = FoodRecord {
            id: Uuid::new_v4(),
            owner_id,
            name: request.name.clone(),
            serving_amount: request.serving_amount,
            serving_unit_id: request.serving_unit_id,
            nutrients: request.nutrients.clone(),
            confidence: request.confidence,
            description: request.description.clone(),
            keywords: request.keywords.clone(),
            remote_food_id: None,
            created_at: now,
        };

        if self.dry_run {
            let entry = new_entry(owner_id, record.id, &request.details, None);
            self.store.create_food_record(&record).await?;
            self.store.create_log_entry(&entry).await?;
            info!(owner_id = %owner_id, "dry-run: food logged locally only");
            return Ok(SyncOutcome {
                food_record_id: record.id,
                log_entry_id: Some(entry.id),
                remote_food_id: None,
                remote_log_id: None,
                reused: false,
            });
        }

        let token = self.fresh_access_token(owner_id).await?;

        // Remote food resources are inert without a log against them, so
        // create-food registers no compensation.
        let food = self
            .api
            .create_food(&token, &create_food_request(&record))
            .await?;
        record.remote_food_id = Some(food.food_id);

        let mut saga = Saga::new();
        let log = self
            .api
            .log_food(&token, &log_request(food.food_id, &request.details))
            .await?;
        saga.on_rollback("delete remote food log", self.delete_log_later(&token, log));

        let entry = new_entry(owner_id, record.id, &request.details, Some(log.log_id));
        let local = async {
            self.store.create_food_record(&record).await?;
            self.store.create_log_entry(&entry).await?;
            Ok::<(), anyhow::Error>(())
        };
        if let Err(err) = local.await {
            return Err(self.fail_local_write(&mut saga, &err.to_string()).await);
        }

        info!(owner_id = %owner_id, remote_food_id = food.food_id, remote_log_id = log.log_id,
            "new food created and logged");
        Ok(SyncOutcome {
            food_record_id: record.id,
            log_entry_id: Some(entry.id),
            remote_food_id: Some(food.food_id),
            remote_log_id: Some(log.log_id),
            reused: false,
        })
    }

    // ================================
    // Reuse flow
    // ================================

    /// Log against an existing record's remote food resource. Never calls
    /// create-food. Metadata, when given, is refreshed asynchronously
    /// after success and never fails the operation.
    pub async fn log_reused_food(
        &self,
        owner_id: Uuid,
        record_id: Uuid,
        details: LogDetails,
        metadata: Option<RecordMetadata>,
    ) -> SyncResult<SyncOutcome> {
        validate_details(&details)?;

        let record = self
            .store
            .get_food_record(owner_id, record_id)
            .await?
            .ok_or_else(|| SyncError::Validation("unknown food record".into()))?;

        if self.dry_run {
            let entry = new_entry(owner_id, record.id, &details, None);
            self.store.create_log_entry(&entry).await?;
            self.spawn_metadata_refresh(record.id, metadata);
            return Ok(SyncOutcome {
                food_record_id: record.id,
                log_entry_id: Some(entry.id),
                remote_food_id: record.remote_food_id,
                remote_log_id: None,
                reused: true,
            });
        }

        let remote_food_id = record.remote_food_id.ok_or_else(|| {
            SyncError::Validation("record has no remote food to reuse".into())
        })?;

        let token = self.fresh_access_token(owner_id).await?;

        let mut saga = Saga::new();
        let log = self
            .api
            .log_food(&token, &log_request(remote_food_id, &details))
            .await?;
        saga.on_rollback("delete remote food log", self.delete_log_later(&token, log));

        let entry = new_entry(owner_id, record.id, &details, Some(log.log_id));
        if let Err(err) = self.store.create_log_entry(&entry).await {
            return Err(self.fail_local_write(&mut saga, &err.to_string()).await);
        }

        self.spawn_metadata_refresh(record.id, metadata);

        info!(owner_id = %owner_id, remote_food_id, remote_log_id = log.log_id,
            "existing food reused for new log");
        Ok(SyncOutcome {
            food_record_id: record.id,
            log_entry_id: Some(entry.id),
            remote_food_id: Some(remote_food_id),
            remote_log_id: Some(log.log_id),
            reused: true,
        })
    }

    // ================================
    // Edit flow
    // ================================

    /// Edit an entry. When the nutrient profile is unchanged only the
    /// remote log is replaced (fast path); when it changed, a new remote
    /// food is created for the new profile (full path).
    pub async fn edit_log_entry(
        &self,
        owner_id: Uuid,
        entry_id: Uuid,
        request: EditFoodLog,
    ) -> SyncResult<SyncOutcome> {
        validate_details(&request.details)?;
        if let Some(nutrients) = &request.nutrients {
            validate_nutrients(nutrients)?;
        }

        let entry = self
            .store
            .get_log_entry(owner_id, entry_id)
            .await?
            .ok_or_else(|| SyncError::Validation("unknown log entry".into()))?;
        let record = self
            .store
            .get_food_record(owner_id, entry.food_record_id)
            .await?
            .ok_or_else(|| SyncError::Validation("entry references unknown food record".into()))?;

        let nutrients_changed = request
            .nutrients
            .as_ref()
            .is_some_and(|n| *n != record.nutrients);

        if self.dry_run {
            return self.edit_dry_run(&entry, &record, &request, nutrients_changed).await;
        }

        let token = self.fresh_access_token(owner_id).await?;
        if nutrients_changed {
            self.edit_full_path(&token, &entry, &record, &request).await
        } else {
            self.edit_fast_path(&token, &entry, &record, &request.details).await
        }
    }

    /// Dry-run edit: local update only, prior remote ids preserved
    async fn edit_dry_run(
        &self,
        entry: &FoodLogEntry,
        record: &FoodRecord,
        request: &EditFoodLog,
        nutrients_changed: bool,
    ) -> SyncResult<SyncOutcome> {
        if nutrients_changed {
            let patch = RecordPatch {
                name: request.name.clone(),
                nutrients: request.nutrients.clone(),
                ..RecordPatch::default()
            };
            self.store.update_food_record(record.id, &patch).await?;
        }
        self.store
            .update_log_entry(entry.id, &entry_patch(&request.details, None))
            .await?;

        Ok(SyncOutcome {
            food_record_id: record.id,
            log_entry_id: Some(entry.id),
            remote_food_id: record.remote_food_id,
            remote_log_id: entry.remote_log_id,
            reused: false,
        })
    }

    /// Fast path: nutrients unchanged, replace the remote log in place
    async fn edit_fast_path(
        &self,
        token: &str,
        entry: &FoodLogEntry,
        record: &FoodRecord,
        details: &LogDetails,
    ) -> SyncResult<SyncOutcome> {
        let remote_food_id = record.remote_food_id.ok_or_else(|| {
            SyncError::Validation("entry's record has no remote food".into())
        })?;

        let mut saga = Saga::new();
        let log = self
            .replace_remote_log(token, remote_food_id, entry, details)
            .await?;
        saga.on_rollback("delete replacement log", self.delete_log_later(token, log));

        if let Err(err) = self
            .store
            .update_log_entry(entry.id, &entry_patch(details, Some(log.log_id)))
            .await
        {
            return Err(self.fail_local_write(&mut saga, &err.to_string()).await);
        }

        info!(owner_id = %entry.owner_id, remote_log_id = log.log_id, "log entry edited (fast path)");
        Ok(SyncOutcome {
            food_record_id: record.id,
            log_entry_id: Some(entry.id),
            remote_food_id: Some(remote_food_id),
            remote_log_id: Some(log.log_id),
            reused: false,
        })
    }

    /// Full path: nutrients changed, a new remote food carries the new
    /// profile
    async fn edit_full_path(
        &self,
        token: &str,
        entry: &FoodLogEntry,
        record: &FoodRecord,
        request: &EditFoodLog,
    ) -> SyncResult<SyncOutcome> {
        let new_nutrients = request
            .nutrients
            .clone()
            .unwrap_or_else(|| record.nutrients.clone());
        let new_name = request.name.clone().unwrap_or_else(|| record.name.clone());

        // Delete the old remote log first; if anything later fails the
        // original profile is recreated so the account is not left missing
        // an entry.
        if let Some(old_log_id) = entry.remote_log_id {
            self.api.delete_log(token, old_log_id).await?;
        }

        let new_food_request = CreateFoodRequest {
            name: new_name.clone(),
            description: record.description.clone(),
            serving_unit_id: record.serving_unit_id,
            serving_amount: record.serving_amount,
            nutrients: new_nutrients.clone(),
        };

        let food = match self.api.create_food(token, &new_food_request).await {
            Ok(food) => food,
            Err(err) => {
                self.restore_original_profile(token, entry, record).await;
                return Err(err);
            }
        };

        let log = match self
            .api
            .log_food(token, &log_request(food.food_id, &request.details))
            .await
        {
            Ok(log) => log,
            Err(err) => {
                self.restore_original_profile(token, entry, record).await;
                return Err(err);
            }
        };

        let mut saga = Saga::new();
        saga.on_rollback("delete replacement log", self.delete_log_later(token, log));

        let record_patch = RecordPatch {
            name: Some(new_name),
            nutrients: Some(new_nutrients),
            remote_food_id: Some(food.food_id),
            ..RecordPatch::default()
        };
        let local = async {
            self.store.update_food_record(record.id, &record_patch).await?;
            self.store
                .update_log_entry(entry.id, &entry_patch(&request.details, Some(log.log_id)))
                .await?;
            Ok::<(), anyhow::Error>(())
        };
        if let Err(err) = local.await {
            return Err(self.fail_local_write(&mut saga, &err.to_string()).await);
        }

        info!(owner_id = %entry.owner_id, remote_food_id = food.food_id, remote_log_id = log.log_id,
            "log entry edited (full path)");
        Ok(SyncOutcome {
            food_record_id: record.id,
            log_entry_id: Some(entry.id),
            remote_food_id: Some(food.food_id),
            remote_log_id: Some(log.log_id),
            reused: false,
        })
    }

    // ================================
    // Delete flow
    // ================================

    /// Delete an entry, remote side first. The local row is only removed
    /// after the remote deletion succeeded, so a remote failure leaves
    /// local state untouched.
    pub async fn delete_log_entry(&self, owner_id: Uuid, entry_id: Uuid) -> SyncResult<SyncOutcome> {
        let entry = self
            .store
            .get_log_entry(owner_id, entry_id)
            .await?
            .ok_or_else(|| SyncError::Validation("unknown log entry".into()))?;

        if !self.dry_run {
            if let Some(remote_log_id) = entry.remote_log_id {
                let token = self.fresh_access_token(owner_id).await?;
                self.api.delete_log(&token, remote_log_id).await?;
            }
        }

        if let Err(err) = self.store.delete_log_entry(entry.id).await {
            // Remote side is now ahead of local state; nothing left to
            // compensate with.
            error!(
                manual_cleanup_required = true,
                owner_id = %owner_id, entry_id = %entry_id,
                "remote log deleted but local delete failed: {err}"
            );
            return Err(SyncError::Internal(format!(
                "remote log deleted but local delete failed: {err}"
            )));
        }

        info!(owner_id = %owner_id, entry_id = %entry_id, "log entry deleted");
        Ok(SyncOutcome {
            food_record_id: entry.food_record_id,
            log_entry_id: Some(entry.id),
            remote_food_id: None,
            remote_log_id: None,
            reused: false,
        })
    }

    // ================================
    // Shared steps
    // ================================

    /// Saga step 1 everywhere: a token valid for the whole flow
    async fn fresh_access_token(&self, owner_id: Uuid) -> SyncResult<String> {
        let credential = self.tokens.load_credential(owner_id).await?;
        let fresh = self.tokens.ensure_fresh_token(&credential).await?;
        Ok(fresh.access_token)
    }

    /// Compensation closure deleting a remote log
    fn delete_log_later(&self, token: &str, log: RemoteLog) -> CompensationFn {
        let api = Arc::clone(&self.api);
        let token = token.to_owned();
        Box::new(move || Box::pin(async move { api.delete_log(&token, log.log_id).await }))
    }

    /// Replace an entry's remote log: delete the old one (when present),
    /// then log the new details against the same remote food. If the
    /// re-log fails after the delete succeeded, the original details are
    /// re-logged best-effort so the account is not left missing an entry.
    async fn replace_remote_log(
        &self,
        token: &str,
        remote_food_id: u64,
        entry: &FoodLogEntry,
        details: &LogDetails,
    ) -> SyncResult<RemoteLog> {
        if let Some(old_log_id) = entry.remote_log_id {
            self.api.delete_log(token, old_log_id).await?;
        }

        match self
            .api
            .log_food(token, &log_request(remote_food_id, details))
            .await
        {
            Ok(log) => Ok(log),
            Err(err) => {
                if entry.remote_log_id.is_some() {
                    let original = entry_details(entry);
                    if let Err(restore_err) = self
                        .api
                        .log_food(token, &log_request(remote_food_id, &original))
                        .await
                    {
                        error!(
                            manual_cleanup_required = true,
                            owner_id = %entry.owner_id, entry_id = %entry.id,
                            "failed to restore original log after edit failure: {restore_err}"
                        );
                    }
                }
                Err(err)
            }
        }
    }

    /// Best-effort recreation of the original food profile and log after a
    /// failed full-path edit. The operation fails with the triggering
    /// error regardless of what happens here.
    async fn restore_original_profile(&self, token: &str, entry: &FoodLogEntry, record: &FoodRecord) {
        if entry.remote_log_id.is_none() {
            return;
        }

        let restore = async {
            let food = self
                .api
                .create_food(token, &create_food_request(record))
                .await?;
            self.api
                .log_food(token, &log_request(food.food_id, &entry_details(entry)))
                .await?;
            Ok::<(), SyncError>(())
        };
        if let Err(err) = restore.await {
            error!(
                manual_cleanup_required = true,
                owner_id = %entry.owner_id, entry_id = %entry.id,
                "failed to restore original food profile after edit failure: {err}"
            );
        }
    }

    /// Local persistence failed after remote writes: roll back and pick
    /// the clean or partial error variant from the rollback outcome.
    async fn fail_local_write(&self, saga: &mut Saga, cause: &str) -> SyncError {
        warn!("local write failed after remote success, rolling back: {cause}");
        match saga.rollback().await {
            RollbackOutcome::Clean => {
                SyncError::Internal(format!("local save failed, remote rolled back: {cause}"))
            }
            RollbackOutcome::Failed => SyncError::Partial(format!(
                "local save failed and remote rollback failed: {cause}"
            )),
        }
    }

    /// Fire-and-forget metadata refresh after a successful reuse
    fn spawn_metadata_refresh(&self, record_id: Uuid, metadata: Option<RecordMetadata>) {
        let Some(metadata) = metadata else { return };
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            let patch = RecordPatch {
                description: metadata.description,
                keywords: metadata.keywords,
                confidence: metadata.confidence,
                ..RecordPatch::default()
            };
            if let Err(err) = store.update_food_record(record_id, &patch).await {
                warn!(record_id = %record_id, "metadata refresh failed: {err}");
            }
        });
    }
}

// ================================
// Request construction and validation
// ================================

fn new_entry(
    owner_id: Uuid,
    food_record_id: Uuid,
    details: &LogDetails,
    remote_log_id: Option<u64>,
) -> FoodLogEntry {
    FoodLogEntry {
        id: Uuid::new_v4(),
        owner_id,
        food_record_id,
        meal_slot: details.meal_slot,
        amount: details.amount,
        unit_id: details.unit_id,
        date: details.date,
        time: details.time,
        remote_log_id,
    }
}

fn entry_details(entry: &FoodLogEntry) -> LogDetails {
    LogDetails {
        meal_slot: entry.meal_slot,
        amount: entry.amount,
        unit_id: entry.unit_id,
        date: entry.date,
        time: entry.time,
    }
}

fn entry_patch(details: &LogDetails, remote_log_id: Option<u64>) -> LogEntryPatch {
    LogEntryPatch {
        meal_slot: details.meal_slot,
        amount: details.amount,
        unit_id: details.unit_id,
        date: details.date,
        time: details.time,
        remote_log_id,
    }
}

fn create_food_request(record: &FoodRecord) -> CreateFoodRequest {
    CreateFoodRequest {
        name: record.name.clone(),
        description: record.description.clone(),
        serving_unit_id: record.serving_unit_id,
        serving_amount: record.serving_amount,
        nutrients: record.nutrients.clone(),
    }
}

fn log_request(remote_food_id: u64, details: &LogDetails) -> LogFoodRequest {
    LogFoodRequest {
        remote_food_id,
        meal_slot: details.meal_slot,
        amount: details.amount,
        unit_id: details.unit_id,
        date: details.date,
        time: details.time,
    }
}

fn validate_details(details: &LogDetails) -> SyncResult<()> {
    if details.amount <= 0.0 {
        return Err(SyncError::Validation("amount must be positive".into()));
    }
    Ok(())
}

fn validate_nutrients(nutrients: &NutrientProfile) -> SyncResult<()> {
    let headline = [
        nutrients.calories,
        nutrients.protein_g,
        nutrients.carbs_g,
        nutrients.fat_g,
        nutrients.fiber_g,
        nutrients.sodium_mg,
    ];
    if headline.iter().any(|v| *v < 0.0 || !v.is_finite()) {
        return Err(SyncError::Validation(
            "nutrient values must be finite and non-negative".into(),
        ));
    }
    Ok(())
}

fn validate_new_food(request: &NewFoodLog) -> SyncResult<()> {
    if request.name.trim().is_empty() {
        return Err(SyncError::Validation("food name must not be empty".into()));
    }
    if request.serving_amount <= 0.0 {
        return Err(SyncError::Validation(
            "serving amount must be positive".into(),
        ));
    }
    if request.keywords.len() > MAX_KEYWORDS {
        return Err(SyncError::Validation(format!(
            "at most {MAX_KEYWORDS} keywords are allowed"
        )));
    }
    if request
        .keywords
        .iter()
        .any(|k| k.is_empty() || *k != k.to_lowercase())
    {
        return Err(SyncError::Validation(
            "keywords must be non-empty lowercase tokens".into(),
        ));
    }
    validate_nutrients(&request.nutrients)?;
    validate_details(&request.details)
}
