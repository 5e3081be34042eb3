//! Decides how an exercise is measured and summarizes its days.

use std::collections::HashMap;

use crate::cache::SharedCache;
use crate::key::{BODYWEIGHT_LABEL, ExerciseKey};
use crate::record::NOT_AVAILABLE;
use crate::series::{DayAggregate, DayRecord};

/// Muscle group used when no set names one.
pub const FALLBACK_MUSCLE_GROUP: &str = "Other";

/// Locations that mean "no external weight".
pub fn is_bodyweight_location(location: &str) -> bool {
    let location = location.trim();
    location.is_empty()
        || location.eq_ignore_ascii_case("null")
        || location.eq_ignore_ascii_case(NOT_AVAILABLE)
        || location.eq_ignore_ascii_case(BODYWEIGHT_LABEL)
}

/// Whether a series is repetition based.
///
/// Decided once per exercise from the location of the first set of the first
/// day, so one series never mixes units. Without any records the key's own
/// location decides.
pub fn classify(key: &ExerciseKey, records: &[DayRecord]) -> bool {
    match records.first().and_then(|r| r.sets.first()) {
        Some(set) => is_bodyweight_location(&set.location),
        None => key.is_bodyweight(),
    }
}

/// Min, max and average of one day in the series' unit.
pub fn aggregate_day(record: &DayRecord, is_bodyweight: bool) -> DayAggregate {
    let values: Vec<f64> = if is_bodyweight {
        record.sets.iter().map(|s| s.reps as f64).collect()
    } else {
        record.sets.iter().map(|s| s.weight).collect()
    };
    let max_value = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min_value = values.iter().copied().fold(f64::INFINITY, f64::min);
    let mean = if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    };
    let avg_value = if is_bodyweight {
        mean
    } else {
        let total_reps: f64 = record.sets.iter().map(|s| s.reps as f64).sum();
        if total_reps > 0.0 {
            record
                .sets
                .iter()
                .map(|s| s.weight * s.reps as f64)
                .sum::<f64>()
                / total_reps
        } else {
            mean
        }
    };
    DayAggregate {
        date: record.date,
        sets: record.sets.clone(),
        max_value: if values.is_empty() { 0.0 } else { max_value },
        min_value: if values.is_empty() { 0.0 } else { min_value },
        avg_value,
        is_bodyweight,
    }
}

/// Most frequent named muscle group across all sets, ignoring `"N/A"`.
///
/// Ties go to the alphabetically first group so the choice is stable.
pub fn dominant_muscle_group(records: &[DayRecord]) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for set in records.iter().flat_map(|r| &r.sets) {
        let group = set.muscle_group.trim();
        if group.is_empty() || group.eq_ignore_ascii_case(NOT_AVAILABLE) {
            continue;
        }
        *counts.entry(group).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(g, _)| g.to_string())
}

/// Muscle group for coloring, cached per base exercise name.
///
/// The first non-empty series loaded for an exercise decides for every
/// location of it.
pub fn muscle_group_for(cache: &SharedCache, key: &ExerciseKey, records: &[DayRecord]) -> String {
    if records.is_empty() {
        return cache
            .muscle_group(&key.name)
            .unwrap_or_else(|| FALLBACK_MUSCLE_GROUP.to_string());
    }
    cache.muscle_group_or_insert_with(&key.name, || {
        dominant_muscle_group(records).unwrap_or_else(|| FALLBACK_MUSCLE_GROUP.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::WorkoutSet;
    use chrono::NaiveDate;

    fn set(weight: f64, reps: u32, location: &str, group: &str) -> WorkoutSet {
        WorkoutSet {
            weight,
            reps,
            effort: NOT_AVAILABLE.into(),
            location: location.into(),
            muscle_group: group.into(),
        }
    }

    fn record(sets: Vec<WorkoutSet>) -> DayRecord {
        DayRecord {
            date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            sets,
        }
    }

    #[test]
    fn bodyweight_locations() {
        for loc in ["Bodyweight", "N/A", "null", ""] {
            assert!(is_bodyweight_location(loc), "{loc:?}");
        }
        assert!(!is_bodyweight_location("Bar"));
    }

    #[test]
    fn classification_uses_first_set() {
        let key = ExerciseKey::new("Dip", Some("Station"));
        let records = vec![
            record(vec![set(0.0, 10, "Bodyweight", "Chest")]),
            record(vec![set(20.0, 8, "Station", "Chest")]),
        ];
        assert!(classify(&key, &records));
        assert!(!classify(&key, &[]));
        assert!(classify(&ExerciseKey::bodyweight("Dip"), &[]));
    }

    #[test]
    fn weighted_average_uses_reps() {
        let day = aggregate_day(
            &record(vec![set(60.0, 5, "Bar", "Chest"), set(80.0, 3, "Bar", "Chest")]),
            false,
        );
        assert_eq!(day.avg_value, 67.5);
        assert_eq!((day.min_value, day.max_value), (60.0, 80.0));
    }

    #[test]
    fn zero_reps_falls_back_to_plain_mean() {
        let day = aggregate_day(
            &record(vec![set(60.0, 0, "Bar", "Chest"), set(80.0, 0, "Bar", "Chest")]),
            false,
        );
        assert_eq!(day.avg_value, 70.0);
    }

    #[test]
    fn dominant_group_ignores_placeholders() {
        let records = vec![
            record(vec![
                set(0.0, 5, "Bodyweight", "N/A"),
                set(0.0, 5, "Bodyweight", "N/A"),
                set(0.0, 5, "Bodyweight", "Back"),
            ]),
            record(vec![set(0.0, 5, "Bodyweight", "Biceps")]),
            record(vec![set(0.0, 5, "Bodyweight", "Back")]),
        ];
        assert_eq!(dominant_muscle_group(&records).as_deref(), Some("Back"));
        assert_eq!(
            dominant_muscle_group(&[record(vec![set(0.0, 5, "Bodyweight", "N/A")])]),
            None
        );
    }

    #[test]
    fn muscle_group_cached_per_exercise_name() {
        let cache = SharedCache::new();
        let bar = ExerciseKey::new("Row", Some("Bar"));
        let cable = ExerciseKey::new("Row", Some("Cable"));
        let first = muscle_group_for(&cache, &bar, &[record(vec![set(50.0, 8, "Bar", "Back")])]);
        let second = muscle_group_for(
            &cache,
            &cable,
            &[record(vec![set(30.0, 8, "Cable", "Biceps")])],
        );
        assert_eq!(first, "Back");
        assert_eq!(second, "Back");

        let fallback = muscle_group_for(&cache, &ExerciseKey::bodyweight("Plank"), &[]);
        assert_eq!(fallback, FALLBACK_MUSCLE_GROUP);
    }

    #[test]
    fn empty_series_does_not_fix_muscle_group() {
        let cache = SharedCache::new();
        let cable = ExerciseKey::new("Curl", Some("Cable"));
        let bar = ExerciseKey::new("Curl", Some("Bar"));
        assert_eq!(muscle_group_for(&cache, &cable, &[]), FALLBACK_MUSCLE_GROUP);
        assert_eq!(
            muscle_group_for(&cache, &bar, &[record(vec![set(20.0, 10, "Bar", "Biceps")])]),
            "Biceps"
        );
        assert_eq!(muscle_group_for(&cache, &cable, &[]), "Biceps");
    }
}
