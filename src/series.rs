//! Per-exercise time series of daily aggregates.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::cache::SharedCache;
use crate::classify::{aggregate_day, classify, muscle_group_for};
use crate::key::ExerciseKey;
use crate::loader::{DailyRecordLoader, today};
use crate::record::{DayLog, WorkoutSet};

/// The sets of one key performed on one date. Always holds at least one set.
#[derive(Debug, Clone, PartialEq)]
pub struct DayRecord {
    pub date: NaiveDate,
    pub sets: Vec<WorkoutSet>,
}

/// Summary of one day for one key.
///
/// For weight-based series the values are kilograms and `avg_value` is the
/// rep-weighted mean `Σ(weight·reps)/Σ(reps)`. For bodyweight series the
/// values are repetitions and `avg_value` is their arithmetic mean.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayAggregate {
    pub date: NaiveDate,
    pub sets: Vec<WorkoutSet>,
    pub max_value: f64,
    pub min_value: f64,
    pub avg_value: f64,
    pub is_bodyweight: bool,
}

impl DayAggregate {
    pub fn day_number(&self) -> f64 {
        day_number(self.date)
    }
}

/// Date-ordered aggregates for one key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub key: ExerciseKey,
    pub is_bodyweight: bool,
    pub muscle_group: String,
    pub days: Vec<DayAggregate>,
}

impl Series {
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.days.first().map(|d| d.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.days.last().map(|d| d.date)
    }

    /// Lowest `min_value` and highest `max_value` across all days.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.days.iter().fold(None, |acc, d| match acc {
            None => Some((d.min_value, d.max_value)),
            Some((lo, hi)) => Some((lo.min(d.min_value), hi.max(d.max_value))),
        })
    }

    pub fn unit(&self) -> &'static str {
        unit_label(self.is_bodyweight)
    }
}

pub fn unit_label(is_bodyweight: bool) -> &'static str {
    if is_bodyweight { "reps" } else { "kg" }
}

/// Position of a date on the time axis, in days.
pub fn day_number(date: NaiveDate) -> f64 {
    date.num_days_from_ce() as f64
}

pub fn date_from_day_number(day: f64) -> Option<NaiveDate> {
    if !day.is_finite() || day.abs() > i32::MAX as f64 {
        return None;
    }
    NaiveDate::from_num_days_from_ce_opt(day.floor() as i32)
}

/// Collect the sets matching `key` exactly, one record per date with at
/// least one match, ascending by date.
pub fn day_records<'d>(
    key: &ExerciseKey,
    days: impl IntoIterator<Item = &'d DayLog>,
) -> Vec<DayRecord> {
    let mut by_date: BTreeMap<NaiveDate, Vec<WorkoutSet>> = BTreeMap::new();
    for day in days {
        let sets = day.sets_for(key);
        if !sets.is_empty() {
            by_date.entry(day.date).or_default().extend(sets);
        }
    }
    by_date
        .into_iter()
        .map(|(date, sets)| DayRecord { date, sets })
        .collect()
}

/// Turn day records into a series with a single unit for its whole history.
pub fn assemble(key: &ExerciseKey, records: &[DayRecord], muscle_group: String) -> Series {
    let is_bodyweight = classify(key, records);
    Series {
        key: key.clone(),
        is_bodyweight,
        muscle_group,
        days: records
            .iter()
            .map(|r| aggregate_day(r, is_bodyweight))
            .collect(),
    }
}

/// Builds the series of one key for one year.
pub struct SeriesBuilder<'a> {
    loader: &'a DailyRecordLoader,
    cache: &'a SharedCache,
}

impl<'a> SeriesBuilder<'a> {
    pub fn new(loader: &'a DailyRecordLoader, cache: &'a SharedCache) -> Self {
        Self { loader, cache }
    }

    pub fn build(&self, key: &ExerciseKey, year: i32) -> Series {
        self.build_until(key, year, today())
    }

    pub fn build_until(&self, key: &ExerciseKey, year: i32, today: NaiveDate) -> Series {
        let days = self.cache.days_for_year(self.loader, year, today);
        let records = day_records(key, days.iter().map(|d| &**d));
        let muscle_group = muscle_group_for(self.cache, key, &records);
        let series = assemble(key, &records, muscle_group);
        log::info!("Built {} days for {key} in {year}", series.len());
        series
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{LoggedSet, file_name_for};
    use crate::source::DirectorySource;
    use std::sync::Arc;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    fn logged(key: &ExerciseKey, weight: f64, reps: u32) -> LoggedSet {
        LoggedSet {
            key: key.clone(),
            set: WorkoutSet {
                weight,
                reps,
                effort: "N/A".into(),
                location: key.location_label().to_string(),
                muscle_group: "Chest".into(),
            },
        }
    }

    fn bench() -> ExerciseKey {
        ExerciseKey::new("Bench Press", Some("Bar"))
    }

    #[test]
    fn bench_press_by_location() {
        let key = bench();
        let days = vec![DayLog {
            date: date(1, 10),
            sets: vec![logged(&key, 60.0, 5), logged(&key, 80.0, 3)],
        }];
        let records = day_records(&key, &days);
        let series = assemble(&key, &records, "Chest".into());
        let day = &series.days[0];
        assert_eq!(day.max_value, 80.0);
        assert_eq!(day.min_value, 60.0);
        assert_eq!(day.avg_value, 67.5);
        assert!(!day.is_bodyweight);
        assert_eq!(series.unit(), "kg");
    }

    #[test]
    fn pull_up_bodyweight_reps() {
        let key = ExerciseKey::bodyweight("Pull Up");
        let days = vec![DayLog {
            date: date(1, 11),
            sets: vec![logged(&key, 0.0, 10), logged(&key, 0.0, 8)],
        }];
        let series = assemble(&key, &day_records(&key, &days), "Back".into());
        let day = &series.days[0];
        assert!(day.is_bodyweight);
        assert_eq!((day.max_value, day.min_value, day.avg_value), (10.0, 8.0, 9.0));
        assert_eq!(series.unit(), "reps");
    }

    #[test]
    fn ordered_without_duplicates_or_empty_days() {
        let key = bench();
        let other = ExerciseKey::new("Bench Press", Some("Smith"));
        let days = vec![
            DayLog {
                date: date(3, 1),
                sets: vec![logged(&key, 70.0, 5)],
            },
            DayLog {
                date: date(1, 5),
                sets: vec![logged(&other, 50.0, 5)],
            },
            DayLog {
                date: date(2, 1),
                sets: vec![logged(&key, 65.0, 5), logged(&other, 40.0, 5)],
            },
        ];
        let series = assemble(&key, &day_records(&key, &days), "Chest".into());
        let dates: Vec<NaiveDate> = series.days.iter().map(|d| d.date).collect();
        assert_eq!(dates, vec![date(2, 1), date(3, 1)]);
        assert!(series.days.windows(2).all(|w| w[0].date < w[1].date));
        assert!(series.days.iter().all(|d| d.is_bodyweight == series.is_bodyweight));
        assert_eq!(series.days[0].sets.len(), 1);
    }

    #[test]
    fn scaling_weights_and_reps() {
        let key = bench();
        let build = |w: f64, r: u32| {
            let days = vec![DayLog {
                date: date(1, 10),
                sets: vec![
                    logged(&key, 60.0 * w, 5 * r),
                    logged(&key, 80.0 * w, 3 * r),
                    logged(&key, 72.5 * w, 4 * r),
                ],
            }];
            assemble(&key, &day_records(&key, &days), "Chest".into()).days[0].avg_value
        };
        let base = build(1.0, 1);
        assert!((build(2.0, 1) - 2.0 * base).abs() < 1e-9);
        assert!((build(1.0, 3) - base).abs() < 1e-9);
    }

    #[test]
    fn value_range_spans_all_days() {
        let key = bench();
        let days = vec![
            DayLog {
                date: date(1, 1),
                sets: vec![logged(&key, 60.0, 5), logged(&key, 90.0, 1)],
            },
            DayLog {
                date: date(1, 3),
                sets: vec![logged(&key, 55.0, 8)],
            },
        ];
        let series = assemble(&key, &day_records(&key, &days), "Chest".into());
        assert_eq!(series.value_range(), Some((55.0, 90.0)));
        assert_eq!(series.first_date(), Some(date(1, 1)));
        assert_eq!(series.last_date(), Some(date(1, 3)));
    }

    #[test]
    fn builder_reads_year_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        for (d, w) in [(6, "60 kg"), (13, "62.5 kg"), (20, "65 kg")] {
            std::fs::write(
                dir.path().join(file_name_for(date(1, d))),
                format!(
                    r#"{{"workout":[{{"Exercise":"Bench Press","Weight":"{w}","Reps":5,"Location":"Bar","Muscle-Group":"Chest"}}]}}"#
                ),
            )
            .unwrap();
        }
        let loader = DailyRecordLoader::new(Arc::new(DirectorySource::new(dir.path())));
        let cache = SharedCache::new();
        let series = SeriesBuilder::new(&loader, &cache).build_until(&bench(), 2025, date(12, 31));
        assert_eq!(series.len(), 3);
        assert_eq!(series.muscle_group, "Chest");
        assert_eq!(series.days[1].avg_value, 62.5);

        let missing = SeriesBuilder::new(&loader, &cache).build_until(
            &ExerciseKey::new("Squat", Some("Rack")),
            2025,
            date(12, 31),
        );
        assert!(missing.is_empty());
    }

    #[test]
    fn day_numbers_round_trip() {
        let d = date(7, 4);
        assert_eq!(date_from_day_number(day_number(d) + 0.6), Some(d));
        assert_eq!(date_from_day_number(f64::NAN), None);
    }
}
