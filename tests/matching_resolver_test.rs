// ABOUTME: Integration tests for the food identity resolver through the service facade
// ABOUTME: Remote-id eligibility, ranking, result capping, and tolerance filtering
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

mod common;

use std::sync::Arc;

use anyhow::Result;
use uuid::Uuid;

use common::{
    entry_for, live_config, nutrients, record_with_keywords, InMemoryFoodStore, MockNutritionApi,
};
use nutrisync::config::SyncConfig;
use nutrisync::providers::NutritionApi;
use nutrisync::saga::FoodLogService;
use nutrisync::storage::FoodStore;

fn keywords(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| (*w).to_owned()).collect()
}

fn build_service(store: &Arc<InMemoryFoodStore>, dry_run: bool) -> FoodLogService {
    let config = if dry_run {
        SyncConfig::for_dry_run()
    } else {
        live_config()
    };
    FoodLogService::new(
        Arc::clone(store) as Arc<dyn FoodStore>,
        Arc::new(MockNutritionApi::new()) as Arc<dyn NutritionApi>,
        &config,
    )
}

#[tokio::test]
async fn test_records_without_remote_id_are_ineligible_outside_dry_run() -> Result<()> {
    let store = Arc::new(InMemoryFoodStore::new());
    let owner = Uuid::new_v4();
    let profile = nutrients(100.0, 5.0, 10.0, 3.0);

    store.insert_record(record_with_keywords(
        owner,
        "Synced tea",
        &["tea"],
        profile.clone(),
        Some(9000),
    ));
    store.insert_record(record_with_keywords(
        owner,
        "Unsynced tea",
        &["tea"],
        profile.clone(),
        None,
    ));

    let service = build_service(&store, false);
    let candidates = service
        .find_matching_foods(owner, &keywords(&["tea"]), &profile)
        .await?;
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].record.name, "Synced tea");

    // Dry-run mode has nothing remote to reuse, so local-only records count.
    let dry_service = build_service(&store, true);
    let candidates = dry_service
        .find_matching_foods(owner, &keywords(&["tea"]), &profile)
        .await?;
    assert_eq!(candidates.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_low_ratio_and_out_of_band_records_are_excluded() -> Result<()> {
    let store = Arc::new(InMemoryFoodStore::new());
    let owner = Uuid::new_v4();
    let profile = nutrients(50.0, 2.0, 5.0, 2.0);

    // Ratio 1/3 < 0.5: excluded despite matching nutrients.
    store.insert_record(record_with_keywords(
        owner,
        "One of three",
        &["tea"],
        profile.clone(),
        Some(1),
    ));
    // Same keywords, ten times the calories: the tolerance band rejects it.
    store.insert_record(record_with_keywords(
        owner,
        "Milkshake in disguise",
        &["tea", "milk"],
        nutrients(500.0, 2.0, 5.0, 2.0),
        Some(2),
    ));
    // Should survive both filters.
    store.insert_record(record_with_keywords(
        owner,
        "Proper cuppa",
        &["tea", "milk"],
        profile.clone(),
        Some(3),
    ));

    let service = build_service(&store, false);
    let candidates = service
        .find_matching_foods(owner, &keywords(&["tea", "milk", "cup"]), &profile)
        .await?;

    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].record.name, "Proper cuppa");
    Ok(())
}

#[tokio::test]
async fn test_results_are_capped_at_three_and_ranked_by_recency() -> Result<()> {
    let store = Arc::new(InMemoryFoodStore::new());
    let owner = Uuid::new_v4();
    let profile = nutrients(100.0, 5.0, 10.0, 3.0);

    // Five equally matching records logged on different days.
    for (name, day) in [
        ("logged day 2", 2),
        ("logged day 9", 9),
        ("logged day 5", 5),
        ("logged day 1", 1),
        ("logged day 7", 7),
    ] {
        let record =
            record_with_keywords(owner, name, &["tea", "milk"], profile.clone(), Some(9000));
        let entry = entry_for(&record, day, None);
        store.insert_record(record);
        store.insert_entry(entry);
    }

    let service = build_service(&store, false);
    let candidates = service
        .find_matching_foods(owner, &keywords(&["tea", "milk"]), &profile)
        .await?;

    let names: Vec<&str> = candidates.iter().map(|c| c.record.name.as_str()).collect();
    assert_eq!(names, vec!["logged day 9", "logged day 7", "logged day 5"]);
    Ok(())
}
