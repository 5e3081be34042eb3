use chrono::{Datelike, Local, NaiveDate};
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use std::sync::Arc;

use crate::record::{DayLog, parse_day_log};
use crate::source::RecordSource;

pub const DEFAULT_FETCH_WORKERS: usize = 8;

/// Loads one day's workout log at a time from a [`RecordSource`].
///
/// Every failure mode (missing file, unreachable source, malformed JSON,
/// missing workout list) collapses into `None`: callers treat it as "no data
/// that day". There are no retries since the logs are static.
#[derive(Clone)]
pub struct DailyRecordLoader {
    source: Arc<dyn RecordSource>,
    workers: usize,
}

impl DailyRecordLoader {
    pub fn new(source: Arc<dyn RecordSource>) -> Self {
        Self {
            source,
            workers: DEFAULT_FETCH_WORKERS,
        }
    }

    /// Number of threads used by [`load_days`](Self::load_days).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn source_description(&self) -> String {
        self.source.describe()
    }

    pub fn load(&self, date: NaiveDate) -> Option<DayLog> {
        let text = match self.source.fetch(date) {
            Ok(Some(text)) => text,
            Ok(None) => return None,
            Err(e) => {
                log::debug!("No log for {date}: {e}");
                return None;
            }
        };
        match parse_day_log(date, &text) {
            Ok(day) => day,
            Err(e) => {
                log::warn!("{e}");
                None
            }
        }
    }

    /// Load many dates concurrently.
    ///
    /// Returns once every load has settled, ordered by date.
    pub fn load_days(&self, dates: &[NaiveDate]) -> Vec<(NaiveDate, Option<DayLog>)> {
        if dates.is_empty() {
            return Vec::new();
        }
        let workers = self.workers.clamp(1, dates.len());
        let mut out: Vec<(NaiveDate, Option<DayLog>)> =
            match ThreadPoolBuilder::new().num_threads(workers).build() {
                Ok(pool) => {
                    pool.install(|| dates.par_iter().map(|d| (*d, self.load(*d))).collect())
                }
                Err(e) => {
                    log::warn!("Falling back to sequential loading: {e}");
                    dates.iter().map(|d| (*d, self.load(*d))).collect()
                }
            };
        out.sort_by_key(|(d, _)| *d);
        let found = out.iter().filter(|(_, day)| day.is_some()).count();
        log::info!(
            "Loaded {found} of {} days from {}",
            dates.len(),
            self.source.describe()
        );
        out
    }
}

/// Every date from January 1 of `year` through `min(December 31, today)`.
pub fn year_dates(year: i32, today: NaiveDate) -> Vec<NaiveDate> {
    let (Some(start), Some(end)) = (
        NaiveDate::from_ymd_opt(year, 1, 1),
        NaiveDate::from_ymd_opt(year, 12, 31),
    ) else {
        return Vec::new();
    };
    let end = end.min(today);
    start.iter_days().take_while(|d| *d <= end).collect()
}

pub fn year_start(year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 1, 1)
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn current_year() -> i32 {
    today().year()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::DirectorySource;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn write_day(dir: &std::path::Path, name: &str, body: &str) {
        std::fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn full_past_year_has_every_day() {
        let dates = year_dates(2024, date(2026, 3, 1));
        assert_eq!(dates.len(), 366);
        assert_eq!(dates[0], date(2024, 1, 1));
        assert_eq!(dates[365], date(2024, 12, 31));
    }

    #[test]
    fn current_year_stops_at_today() {
        let dates = year_dates(2025, date(2025, 2, 3));
        assert_eq!(dates.len(), 34);
        assert_eq!(dates.last(), Some(&date(2025, 2, 3)));
    }

    #[test]
    fn future_year_is_empty() {
        assert!(year_dates(2030, date(2025, 6, 1)).is_empty());
    }

    #[test]
    fn load_tolerates_missing_and_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        write_day(
            dir.path(),
            "01-01-2025.json",
            r#"{"workout":[{"Exercise":"Squat","Weight":"100 kg","Reps":5,"Location":"Rack"}]}"#,
        );
        write_day(dir.path(), "02-01-2025.json", "{ broken");
        write_day(dir.path(), "03-01-2025.json", r#"{"date":"03-01-2025"}"#);
        let loader = DailyRecordLoader::new(Arc::new(DirectorySource::new(dir.path())));

        assert!(loader.load(date(2025, 1, 1)).is_some());
        assert!(loader.load(date(2025, 1, 2)).is_none());
        assert!(loader.load(date(2025, 1, 3)).is_none());
        assert!(loader.load(date(2025, 1, 4)).is_none());
    }

    #[test]
    fn load_days_is_sorted_and_complete() {
        let dir = tempfile::tempdir().unwrap();
        for d in [3, 9, 17, 28] {
            write_day(
                dir.path(),
                &format!("{d:02}-01-2025.json"),
                r#"{"workout":[{"Exercise":"Dip","Reps":10}]}"#,
            );
        }
        let loader =
            DailyRecordLoader::new(Arc::new(DirectorySource::new(dir.path()))).with_workers(3);
        let dates = year_dates(2025, date(2025, 1, 31));
        let days = loader.load_days(&dates);

        assert_eq!(days.len(), 31);
        assert!(days.windows(2).all(|w| w[0].0 < w[1].0));
        let present: Vec<u32> = days
            .iter()
            .filter(|(_, d)| d.is_some())
            .map(|(d, _)| d.day())
            .collect();
        assert_eq!(present, vec![3, 9, 17, 28]);
    }
}
