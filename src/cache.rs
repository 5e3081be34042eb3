use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use crate::loader::{DailyRecordLoader, year_dates};
use crate::record::DayLog;

/// In-memory data loaded for the active year.
///
/// Absence is cached too (`None`): a missing log is a permanent absence for
/// that date.
#[derive(Debug, Default)]
pub struct DataCache {
    days: HashMap<NaiveDate, Option<Arc<DayLog>>>,
    muscle_groups: HashMap<String, String>,
    loading: HashSet<NaiveDate>,
}

impl DataCache {
    pub fn cached_days(&self) -> usize {
        self.days.len()
    }

    /// Drops loaded data. Dates being loaded stay claimed by their loader.
    pub fn clear(&mut self) {
        self.days.clear();
        self.muscle_groups.clear();
    }
}

#[derive(Debug, Default)]
struct Shared {
    data: Mutex<DataCache>,
    settled: Condvar,
}

/// Handle to a [`DataCache`] shared between the session and its loader threads.
///
/// Concurrent callers never fetch the same date twice: a date claimed by one
/// load is waited for by the others.
#[derive(Debug, Clone, Default)]
pub struct SharedCache(Arc<Shared>);

/// Releases claimed dates and wakes waiting loads, also when a load panics.
struct Claim<'a> {
    cache: &'a SharedCache,
    dates: Vec<NaiveDate>,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        let mut cache = self.cache.lock();
        for date in &self.dates {
            cache.loading.remove(date);
        }
        drop(cache);
        self.cache.0.settled.notify_all();
    }
}

impl SharedCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, DataCache> {
        self.0.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Invalidate everything. Loads already running on this handle still
    /// store their results; use a fresh cache to detach from them.
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn cached_days(&self) -> usize {
        self.lock().cached_days()
    }

    /// Day logs of `year` up to `today`, loading only dates not yet cached.
    ///
    /// The lock is released while the loader runs. Dates another caller is
    /// already loading are waited for instead of fetched again.
    pub fn days_for_year(
        &self,
        loader: &DailyRecordLoader,
        year: i32,
        today: NaiveDate,
    ) -> Vec<Arc<DayLog>> {
        let dates = year_dates(year, today);
        let claim = {
            let mut cache = self.lock();
            let missing: Vec<NaiveDate> = dates
                .iter()
                .filter(|d| !cache.days.contains_key(d) && !cache.loading.contains(d))
                .copied()
                .collect();
            cache.loading.extend(missing.iter().copied());
            Claim {
                cache: self,
                dates: missing,
            }
        };
        let fetched = loader.load_days(&claim.dates);
        {
            let mut cache = self.lock();
            for (date, day) in fetched {
                cache.days.insert(date, day.map(Arc::new));
            }
        }
        drop(claim);

        let mut cache = self.lock();
        while dates.iter().any(|d| cache.loading.contains(d)) {
            cache = self
                .0
                .settled
                .wait(cache)
                .unwrap_or_else(PoisonError::into_inner);
        }
        dates
            .iter()
            .filter_map(|d| cache.days.get(d).cloned().flatten())
            .collect()
    }

    /// Cached muscle group for a base exercise name, if one was decided.
    pub fn muscle_group(&self, exercise: &str) -> Option<String> {
        self.lock().muscle_groups.get(exercise).cloned()
    }

    /// Cached muscle group for a base exercise name, computing it on first use.
    pub fn muscle_group_or_insert_with(
        &self,
        exercise: &str,
        compute: impl FnOnce() -> String,
    ) -> String {
        let mut cache = self.lock();
        cache
            .muscle_groups
            .entry(exercise.to_string())
            .or_insert_with(compute)
            .clone()
    }
}
