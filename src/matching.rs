// ABOUTME: Food identity resolver scoring stored records for remote reuse
// ABOUTME: Keyword match ratio, nutrient tolerance bands, and candidate ranking
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Food Identity Resolver
//!
//! Read-only advisory matching: given a candidate food's keywords and
//! nutrient profile, score the owner's stored records for reuse
//! eligibility. The result only informs the caller's choice between the
//! reuse and create-new flows; nothing here mutates state.
//!
//! A record qualifies when at least half of the candidate's keywords appear
//! in its keyword set *and* all four headline nutrients sit inside their
//! tolerance band against the stored values. Near-identical keyword sets
//! with wildly different calories are different foods (half a cup of tea is
//! not a milkshake).

use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use crate::errors::SyncResult;
use crate::models::{MatchCandidate, NutrientProfile};
use crate::storage::FoodStore;

/// Candidates below this keyword ratio are never proposed
pub const MIN_MATCH_RATIO: f64 = 0.5;
/// At most this many candidates are returned, best first
pub const MAX_CANDIDATES: usize = 3;

/// Tolerance band: percentage of the stored value or an absolute floor,
/// whichever is larger
#[derive(Debug, Clone, Copy)]
struct Band {
    percentage: f64,
    floor: f64,
}

const CALORIES_BAND: Band = Band {
    percentage: 0.20,
    floor: 25.0,
};
const PROTEIN_BAND: Band = Band {
    percentage: 0.25,
    floor: 3.0,
};
const CARBS_BAND: Band = Band {
    percentage: 0.25,
    floor: 5.0,
};
const FAT_BAND: Band = Band {
    percentage: 0.25,
    floor: 3.0,
};

impl Band {
    /// Whether `candidate` is within this band of `stored`
    fn contains(self, candidate: f64, stored: f64) -> bool {
        let allowed = (stored.abs() * self.percentage).max(self.floor);
        (candidate - stored).abs() <= allowed
    }
}

/// Fraction of the candidate's keywords present in the record's set.
///
/// Defined as 0 for an empty candidate set. Duplicate keywords count once.
#[must_use]
pub fn match_ratio(candidate: &[String], record: &[String]) -> f64 {
    let candidate_set: HashSet<&str> = candidate.iter().map(String::as_str).collect();
    if candidate_set.is_empty() {
        return 0.0;
    }
    let record_set: HashSet<&str> = record.iter().map(String::as_str).collect();
    let hits = candidate_set.intersection(&record_set).count();
    hits as f64 / candidate_set.len() as f64
}

/// Whether all four headline nutrients of `candidate` fall inside their
/// band against the *stored* profile. One miss excludes the record.
#[must_use]
pub fn check_tolerance(candidate: &NutrientProfile, stored: &NutrientProfile) -> bool {
    CALORIES_BAND.contains(candidate.calories, stored.calories)
        && PROTEIN_BAND.contains(candidate.protein_g, stored.protein_g)
        && CARBS_BAND.contains(candidate.carbs_g, stored.carbs_g)
        && FAT_BAND.contains(candidate.fat_g, stored.fat_g)
}

/// Order candidates best-first: ratio descending, ties broken by the most
/// recently logged record. Records never logged sort last within a tie.
fn rank(candidates: &mut [MatchCandidate]) {
    candidates.sort_by(|a, b| {
        b.ratio
            .partial_cmp(&a.ratio)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.last_logged_at.cmp(&a.last_logged_at))
    });
}

/// Scores an owner's stored records against a new food
pub struct FoodMatcher {
    store: Arc<dyn FoodStore>,
    dry_run: bool,
}

impl FoodMatcher {
    /// Create a matcher over the given store.
    ///
    /// In dry-run mode records without a remote food id are eligible too
    /// (nothing remote exists to reuse in that mode anyway).
    pub fn new(store: Arc<dyn FoodStore>, dry_run: bool) -> Self {
        Self { store, dry_run }
    }

    /// Up to [`MAX_CANDIDATES`] ranked reuse candidates for the owner
    pub async fn find_matching_foods(
        &self,
        owner_id: Uuid,
        candidate_keywords: &[String],
        candidate_nutrients: &NutrientProfile,
    ) -> SyncResult<Vec<MatchCandidate>> {
        let stored = self.store.list_records_with_keywords(owner_id).await?;

        let mut candidates: Vec<MatchCandidate> = stored
            .into_iter()
            .filter(|kr| self.dry_run || kr.record.remote_food_id.is_some())
            .filter_map(|kr| {
                let ratio = match_ratio(candidate_keywords, &kr.record.keywords);
                if ratio < MIN_MATCH_RATIO {
                    return None;
                }
                if !check_tolerance(candidate_nutrients, &kr.record.nutrients) {
                    return None;
                }
                Some(MatchCandidate {
                    record: kr.record,
                    ratio,
                    last_logged_at: kr.last_logged_at,
                })
            })
            .collect();

        rank(&mut candidates);
        candidates.truncate(MAX_CANDIDATES);
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::models::{ConfidenceTag, FoodRecord};

    fn keywords(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| (*w).to_owned()).collect()
    }

    fn profile(calories: f64, protein: f64, carbs: f64, fat: f64) -> NutrientProfile {
        NutrientProfile {
            calories,
            protein_g: protein,
            carbs_g: carbs,
            fat_g: fat,
            fiber_g: 0.0,
            sodium_mg: 0.0,
            saturated_fat_g: None,
            trans_fat_g: None,
            sugars_g: None,
            calories_from_fat: None,
        }
    }

    fn record(name: &str, words: &[&str]) -> FoodRecord {
        FoodRecord {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: name.to_owned(),
            serving_amount: 1.0,
            serving_unit_id: 304,
            nutrients: profile(100.0, 5.0, 10.0, 3.0),
            confidence: ConfidenceTag::Medium,
            description: None,
            keywords: keywords(words),
            remote_food_id: Some(1),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_ratio_stays_in_unit_interval() {
        let cases = [
            (keywords(&["a", "b", "c"]), keywords(&["a"])),
            (keywords(&["a"]), keywords(&[])),
            (keywords(&["a", "b"]), keywords(&["a", "b", "c", "d"])),
        ];
        for (candidate, stored) in &cases {
            let ratio = match_ratio(candidate, stored);
            assert!((0.0..=1.0).contains(&ratio), "ratio {ratio} out of range");
        }
    }

    #[test]
    fn test_ratio_is_one_iff_fully_contained() {
        assert!((match_ratio(&keywords(&["tea"]), &keywords(&["tea", "milk"])) - 1.0).abs() < 1e-9);
        assert!(
            (match_ratio(&keywords(&["tea", "milk"]), &keywords(&["tea", "milk"])) - 1.0).abs()
                < 1e-9
        );
        assert!(match_ratio(&keywords(&["tea", "honey"]), &keywords(&["tea", "milk"])) < 1.0);
    }

    #[test]
    fn test_empty_candidate_set_scores_zero() {
        assert_eq!(match_ratio(&[], &keywords(&["tea"])), 0.0);
    }

    #[test]
    fn test_duplicate_keywords_count_once() {
        let ratio = match_ratio(&keywords(&["tea", "tea"]), &keywords(&["tea", "milk"]));
        assert!((ratio - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_tolerance_accepts_values_on_the_band_edge() {
        let stored = profile(100.0, 10.0, 20.0, 10.0);
        // calories band is max(20%, 25) = 25
        let candidate = profile(125.0, 10.0, 20.0, 10.0);
        assert!(check_tolerance(&candidate, &stored));
    }

    #[test]
    fn test_single_nutrient_outside_band_excludes() {
        let stored = profile(100.0, 10.0, 20.0, 10.0);
        // protein band is max(25%, 3) = 3; 14 is 4 away
        let candidate = profile(100.0, 14.0, 20.0, 10.0);
        assert!(!check_tolerance(&candidate, &stored));
    }

    #[test]
    fn test_identical_keywords_different_calories_do_not_match() {
        // Half a cup of milky tea vs a 500 kcal stored record: ratio 1.0
        // but the calories band max(100, 25) = 100 < 450.
        let candidate = profile(50.0, 2.0, 5.0, 2.0);
        let stored = profile(500.0, 2.0, 5.0, 2.0);
        assert!(
            (match_ratio(&keywords(&["tea", "milk"]), &keywords(&["tea", "milk"])) - 1.0).abs()
                < 1e-9
        );
        assert!(!check_tolerance(&candidate, &stored));
    }

    #[test]
    fn test_absolute_floor_dominates_small_references() {
        // 2 g stored protein: 25% is 0.5 g but the floor allows 3 g
        let stored = profile(100.0, 2.0, 10.0, 3.0);
        let candidate = profile(100.0, 5.0, 10.0, 3.0);
        assert!(check_tolerance(&candidate, &stored));
    }

    #[test]
    fn test_ranking_prefers_ratio_then_recency() {
        let newer = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        let older = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();

        let mut candidates = vec![
            MatchCandidate {
                record: record("old favourite", &["tea"]),
                ratio: 1.0,
                last_logged_at: Some(older),
            },
            MatchCandidate {
                record: record("weak match", &["tea"]),
                ratio: 0.5,
                last_logged_at: Some(newer),
            },
            MatchCandidate {
                record: record("recent favourite", &["tea"]),
                ratio: 1.0,
                last_logged_at: Some(newer),
            },
            MatchCandidate {
                record: record("never logged", &["tea"]),
                ratio: 1.0,
                last_logged_at: None,
            },
        ];
        rank(&mut candidates);

        let names: Vec<&str> = candidates.iter().map(|c| c.record.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "recent favourite",
                "old favourite",
                "never logged",
                "weak match"
            ]
        );
    }
}
