use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

use crate::cache::SharedCache;
use crate::key::ExerciseKey;
use crate::loader::{DailyRecordLoader, today};
use crate::record::DayLog;

/// Exercises trained on fewer days than this are hidden from the selector.
pub const DEFAULT_MIN_OCCURRENCES: usize = 3;

/// Enumerates the exercises worth offering for a year.
pub struct ExerciseCatalog<'a> {
    loader: &'a DailyRecordLoader,
    cache: &'a SharedCache,
}

impl<'a> ExerciseCatalog<'a> {
    pub fn new(loader: &'a DailyRecordLoader, cache: &'a SharedCache) -> Self {
        Self { loader, cache }
    }

    /// Keys trained on at least `min_occurrences` distinct days of `year`,
    /// sorted by their label.
    pub fn list_exercises(&self, year: i32, min_occurrences: usize) -> Vec<ExerciseKey> {
        self.list_exercises_until(year, min_occurrences, today())
    }

    pub fn list_exercises_until(
        &self,
        year: i32,
        min_occurrences: usize,
        today: NaiveDate,
    ) -> Vec<ExerciseKey> {
        let days = self.cache.days_for_year(self.loader, year, today);
        let counts = count_exercise_days(days.iter().map(|d| &**d));
        let keys = qualifying_exercises(&counts, min_occurrences);
        log::info!(
            "{} of {} exercises in {year} reach {min_occurrences} days",
            keys.len(),
            counts.len()
        );
        keys
    }

    /// Same as [`list_exercises`](Self::list_exercises) formatted as labels.
    pub fn list_exercise_labels(&self, year: i32, min_occurrences: usize) -> Vec<String> {
        labels(&self.list_exercises(year, min_occurrences))
    }
}

/// Number of distinct days each key was trained on.
///
/// Several sets of the same key on one day count once.
pub fn count_exercise_days<'d>(
    days: impl IntoIterator<Item = &'d DayLog>,
) -> BTreeMap<ExerciseKey, usize> {
    let mut counts: BTreeMap<ExerciseKey, usize> = BTreeMap::new();
    for day in days {
        let distinct: BTreeSet<&ExerciseKey> = day.keys();
        for key in distinct {
            *counts.entry(key.clone()).or_insert(0) += 1;
        }
    }
    counts
}

/// Keys meeting the threshold, sorted lexicographically by label.
pub fn qualifying_exercises(
    counts: &BTreeMap<ExerciseKey, usize>,
    min_occurrences: usize,
) -> Vec<ExerciseKey> {
    let mut keys: Vec<(String, ExerciseKey)> = counts
        .iter()
        .filter(|(_, n)| **n >= min_occurrences)
        .map(|(k, _)| (k.to_string(), k.clone()))
        .collect();
    keys.sort();
    keys.into_iter().map(|(_, k)| k).collect()
}

pub fn labels(keys: &[ExerciseKey]) -> Vec<String> {
    keys.iter().map(ToString::to_string).collect()
}

/// Filter keys for the selector search box.
///
/// Keeps keys whose label contains `query` (case-insensitive) and orders
/// them by Jaro-Winkler similarity to the query. An empty query keeps the
/// catalog order.
pub fn search<'k>(keys: &'k [ExerciseKey], query: &str) -> Vec<&'k ExerciseKey> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return keys.iter().collect();
    }
    let mut hits: Vec<(f64, String, &ExerciseKey)> = keys
        .iter()
        .filter_map(|k| {
            let label = k.to_string().to_lowercase();
            label
                .contains(&query)
                .then(|| (strsim::jaro_winkler(&query, &label), label, k))
        })
        .collect();
    hits.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.1.cmp(&b.1))
    });
    hits.into_iter().map(|(_, _, k)| k).collect()
}
