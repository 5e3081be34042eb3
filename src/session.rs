//! The controller the UI talks to.
//!
//! A [`ChartSession`] owns the loader, the cache, the current selection's
//! series and the viewport. Loads run on background threads and come back
//! through a channel; every request is tagged with a generation so an older
//! request that finishes late never overwrites a newer one.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use crate::cache::SharedCache;
use crate::catalog::{DEFAULT_MIN_OCCURRENCES, ExerciseCatalog};
use crate::config::Settings;
use crate::error::Result;
use crate::key::ExerciseKey;
use crate::loader::{DailyRecordLoader, today};
use crate::render::{ChartLayout, ChartRenderer, nearest_point};
use crate::scene::{Point, Scene};
use crate::series::{DayAggregate, Series, SeriesBuilder};
use crate::viewport::{DataExtent, Viewport, ViewportController, ViewportLimits};

enum Response {
    Catalog {
        generation: u64,
        keys: Vec<ExerciseKey>,
    },
    Series {
        generation: u64,
        series: BTreeMap<ExerciseKey, Series>,
    },
}

pub struct ChartSession {
    loader: DailyRecordLoader,
    cache: SharedCache,
    renderer: ChartRenderer,
    limits: ViewportLimits,
    min_occurrences: usize,
    year: i32,
    fixed_today: Option<NaiveDate>,
    plot_width: f64,

    catalog_generation: u64,
    series_generation: u64,
    in_flight: usize,
    tx: Sender<Response>,
    rx: Receiver<Response>,

    catalog: Option<Vec<ExerciseKey>>,
    results: BTreeMap<ExerciseKey, Series>,
    viewport: Option<ViewportController>,
}

impl ChartSession {
    pub fn new(loader: DailyRecordLoader, year: i32) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            loader,
            cache: SharedCache::new(),
            renderer: ChartRenderer::default(),
            limits: ViewportLimits::default(),
            min_occurrences: DEFAULT_MIN_OCCURRENCES,
            year,
            fixed_today: None,
            plot_width: crate::render::DEFAULT_WIDTH as f64,
            catalog_generation: 0,
            series_generation: 0,
            in_flight: 0,
            tx,
            rx,
            catalog: None,
            results: BTreeMap::new(),
            viewport: None,
        }
    }

    pub fn from_settings(settings: &Settings, year: i32) -> Self {
        let mut session = Self::new(settings.loader(), year);
        session.limits = settings.viewport;
        session.min_occurrences = settings.min_occurrences;
        session.plot_width = settings.plot_width as f64;
        session
    }

    pub fn with_limits(mut self, limits: ViewportLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_min_occurrences(mut self, min_occurrences: usize) -> Self {
        self.min_occurrences = min_occurrences;
        self
    }

    /// Pin the date used as "today" when deciding how much of the year exists.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.fixed_today = Some(today);
        self
    }

    pub fn with_renderer(mut self, renderer: ChartRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn today(&self) -> NaiveDate {
        self.fixed_today.unwrap_or_else(today)
    }

    pub fn source_description(&self) -> String {
        self.loader.source_description()
    }

    /// Exercises of the active year, computed on the calling thread.
    pub fn list_exercises(&self) -> Vec<ExerciseKey> {
        ExerciseCatalog::new(&self.loader, &self.cache).list_exercises_until(
            self.year,
            self.min_occurrences,
            self.today(),
        )
    }

    /// One series of the active year, computed on the calling thread.
    pub fn load_series(&self, key: &ExerciseKey) -> Series {
        SeriesBuilder::new(&self.loader, &self.cache).build_until(key, self.year, self.today())
    }

    /// Start listing exercises in the background; see [`poll`](Self::poll).
    pub fn request_catalog(&mut self) {
        self.catalog_generation += 1;
        self.in_flight += 1;
        let generation = self.catalog_generation;
        let (loader, cache, tx) = (self.loader.clone(), self.cache.clone(), self.tx.clone());
        let (year, min, today) = (self.year, self.min_occurrences, self.today());
        std::thread::spawn(move || {
            let keys = ExerciseCatalog::new(&loader, &cache).list_exercises_until(year, min, today);
            let _ = tx.send(Response::Catalog { generation, keys });
        });
    }

    /// Start building the series of `keys` in the background.
    ///
    /// The result replaces the displayed series and resets the viewport once
    /// it arrives, unless a newer request was made in the meantime.
    pub fn request_series(&mut self, keys: Vec<ExerciseKey>) {
        self.series_generation += 1;
        self.in_flight += 1;
        let generation = self.series_generation;
        let (loader, cache, tx) = (self.loader.clone(), self.cache.clone(), self.tx.clone());
        let (year, today) = (self.year, self.today());
        std::thread::spawn(move || {
            let builder = SeriesBuilder::new(&loader, &cache);
            let series = keys
                .into_iter()
                .map(|k| {
                    let s = builder.build_until(&k, year, today);
                    (k, s)
                })
                .collect();
            let _ = tx.send(Response::Series { generation, series });
        });
    }

    /// Apply every response that has arrived. Returns whether anything changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok(response) = self.rx.try_recv() {
            changed |= self.apply(response);
        }
        changed
    }

    /// Block until every outstanding request has answered or `timeout` passes.
    ///
    /// Returns `true` when nothing is left in flight.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.in_flight > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(response) => {
                    self.apply(response);
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return false;
                }
            }
        }
        true
    }

    fn apply(&mut self, response: Response) -> bool {
        self.in_flight = self.in_flight.saturating_sub(1);
        match response {
            Response::Catalog { generation, keys } => {
                if generation != self.catalog_generation {
                    log::debug!("Dropping stale exercise list #{generation}");
                    return false;
                }
                if keys.is_empty() {
                    log::info!("No exercises reach {} days in {}", self.min_occurrences, self.year);
                }
                self.catalog = Some(keys);
                true
            }
            Response::Series { generation, series } => {
                if generation != self.series_generation {
                    log::debug!("Dropping stale series #{generation}");
                    return false;
                }
                self.viewport = DataExtent::from_series(self.year, series.values())
                    .map(|extent| ViewportController::new(extent, self.limits, self.plot_width));
                self.results = series;
                true
            }
        }
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }

    /// Switch the active year. Cached data and results of the old year are
    /// dropped and outstanding requests become stale.
    pub fn set_year(&mut self, year: i32) {
        if year == self.year {
            return;
        }
        log::info!("Switching from {} to {year}", self.year);
        self.year = year;
        self.reload();
    }

    /// Forget everything loaded so far, e.g. after the data changed on disk.
    ///
    /// The cache is replaced rather than cleared: requests still running keep
    /// writing into the old one.
    pub fn reload(&mut self) {
        self.cache = SharedCache::new();
        self.catalog_generation += 1;
        self.series_generation += 1;
        self.catalog = None;
        self.results.clear();
        self.viewport = None;
    }

    /// Listed exercises, `None` until the first catalog response.
    pub fn catalog(&self) -> Option<&[ExerciseKey]> {
        self.catalog.as_deref()
    }

    pub fn series(&self) -> &BTreeMap<ExerciseKey, Series> {
        &self.results
    }

    pub fn cached_days(&self) -> usize {
        self.cache.cached_days()
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport.as_ref().map(ViewportController::viewport)
    }

    pub fn viewport_controller(&self) -> Option<&ViewportController> {
        self.viewport.as_ref()
    }

    pub fn viewport_mut(&mut self) -> Option<&mut ViewportController> {
        self.viewport.as_mut()
    }

    /// Returns `false` when nothing is displayed yet.
    pub fn set_viewport(&mut self, viewport: Viewport) -> bool {
        match self.viewport.as_mut() {
            Some(ctl) => {
                ctl.set_viewport(viewport);
                true
            }
            None => false,
        }
    }

    pub fn set_plot_width(&mut self, width: f64) {
        self.plot_width = width;
        if let Some(ctl) = self.viewport.as_mut() {
            ctl.set_plot_width(width);
        }
    }

    /// Advance a running spring-back. Returns whether the view changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        self.viewport.as_mut().is_some_and(|ctl| ctl.tick(now))
    }

    /// Scene of the current series and viewport on `layout`.
    pub fn scene(&self, layout: &ChartLayout) -> Scene {
        let viewport = self
            .viewport()
            .unwrap_or_else(|| Viewport::new([0.0, 1.0], [0.0, 1.0]));
        self.renderer.render(&self.results, &viewport, layout)
    }

    /// Scene for a surface of `width`×`height` pixels.
    pub fn get_scene(&self, width: f32, height: f32) -> Result<Scene> {
        Ok(self.scene(&ChartLayout::new(width, height)?))
    }

    /// Point under the pointer for a tooltip.
    pub fn hover(&self, layout: &ChartLayout, pos: Point) -> Option<(&ExerciseKey, &DayAggregate)> {
        let viewport = self.viewport()?;
        nearest_point(&self.results, &viewport, layout, pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChartError;
    use crate::record::file_name_for;
    use crate::render::LAYER_SERIES;
    use crate::source::{DirectorySource, RecordSource};
    use chrono::Datelike;
    use std::sync::Arc;

    const WAIT: Duration = Duration::from_secs(10);

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    fn write_day(dir: &std::path::Path, day: NaiveDate, body: &str) {
        std::fs::write(dir.join(file_name_for(day)), body).unwrap();
    }

    fn session(dir: &std::path::Path) -> ChartSession {
        for (m, d) in [(1, 6), (1, 13), (1, 20), (2, 3)] {
            write_day(
                dir,
                date(m, d),
                r#"{"workout":[
                    {"Exercise":"Bench Press","Weight":"60 kg","Reps":5,"Location":"Bar","Muscle-Group":"Chest"},
                    {"Exercise":"Bench Press","Weight":"80 kg","Reps":3,"Location":"Bar","Muscle-Group":"Chest"},
                    {"Exercise":"Pull Up","Reps":10,"Location":null,"Muscle-Group":"Back"}
                ]}"#,
            );
        }
        write_day(
            dir,
            date(1, 8),
            r#"{"workout":[{"Exercise":"Squat","Weight":"100 kg","Reps":5,"Location":"Rack"}]}"#,
        );
        let loader = DailyRecordLoader::new(Arc::new(DirectorySource::new(dir)));
        ChartSession::new(loader, 2025).with_today(date(3, 1))
    }

    fn bench() -> ExerciseKey {
        ExerciseKey::new("Bench Press", Some("Bar"))
    }

    #[test]
    fn catalog_request_lists_frequent_exercises() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(dir.path());
        assert!(s.catalog().is_none());
        s.request_catalog();
        assert!(s.is_loading());
        assert!(s.wait_idle(WAIT));
        let labels: Vec<String> = s.catalog().unwrap().iter().map(|k| k.to_string()).collect();
        assert_eq!(labels, vec!["Bench Press (Bar)", "Pull Up (Bodyweight)"]);
        assert_eq!(s.list_exercises().len(), 2);
    }

    #[test]
    fn empty_year_yields_empty_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(dir.path());
        s.set_year(2024);
        s.request_catalog();
        assert!(s.wait_idle(WAIT));
        assert_eq!(s.catalog(), Some(&[][..]));
    }

    #[test]
    fn series_request_initializes_viewport() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(dir.path());
        assert!(s.viewport().is_none());
        s.request_series(vec![bench()]);
        assert!(s.wait_idle(WAIT));
        assert_eq!(s.series()[&bench()].len(), 4);
        let v = s.viewport().unwrap();
        assert!(v.x_domain[0] <= crate::series::day_number(date(1, 6)));
        assert!(s.set_viewport(v));

        let scene = s.get_scene(600.0, 400.0).unwrap();
        assert!(scene.layer(LAYER_SERIES).is_some());
    }

    #[test]
    fn newer_series_request_wins() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(dir.path());
        let pull = ExerciseKey::bodyweight("Pull Up");
        s.request_series(vec![bench()]);
        s.request_series(vec![pull.clone()]);
        assert!(s.wait_idle(WAIT));
        assert_eq!(s.series().keys().collect::<Vec<_>>(), vec![&pull]);
        assert!(!s.is_loading());
    }

    #[test]
    fn year_change_drops_cache_and_pending_results() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(dir.path());
        assert_eq!(s.load_series(&bench()).len(), 4);
        assert!(s.cached_days() > 0);
        s.set_year(2024);
        assert_eq!(s.cached_days(), 0);

        s.set_year(2025);
        s.request_series(vec![bench()]);
        s.set_year(2024);
        assert!(s.wait_idle(WAIT));
        assert!(s.series().is_empty());
        assert!(s.viewport().is_none());
        assert!(!s.set_viewport(Viewport::new([0.0, 1.0], [0.0, 1.0])));
    }

    #[test]
    fn empty_session_renders_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let s = session(dir.path());
        let scene = s.get_scene(600.0, 400.0).unwrap();
        assert_eq!(scene.texts(), vec![crate::render::PLACEHOLDER_TEXT]);
        assert!(matches!(
            s.get_scene(0.0, 0.0),
            Err(ChartError::MissingSurface(_))
        ));
    }

    #[test]
    fn hover_reports_day_under_pointer() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(dir.path());
        s.request_series(vec![bench()]);
        assert!(s.wait_idle(WAIT));
        let layout = ChartLayout::new(600.0, 400.0).unwrap();
        let day = &s.series()[&bench()].days[1];
        let pos = layout
            .scales(&s.viewport().unwrap())
            .point(day.day_number(), day.avg_value);
        let (key, hit) = s.hover(&layout, pos).unwrap();
        assert_eq!(key, &bench());
        assert_eq!(hit.date, date(1, 13));
        assert_eq!(hit.avg_value, 67.5);
    }

    /// Rows logged under a different muscle group each year; 2025 is slow.
    struct YearlySource;

    impl RecordSource for YearlySource {
        fn fetch(&self, date: NaiveDate) -> Result<Option<String>> {
            if date.day() % 3 != 0 {
                return Ok(None);
            }
            let group = if date.year() == 2025 {
                std::thread::sleep(Duration::from_millis(5));
                "Back"
            } else {
                "Biceps"
            };
            Ok(Some(format!(
                r#"{{"workout":[{{"Exercise":"Row","Weight":"50 kg","Reps":8,"Location":"Bar","Muscle-Group":"{group}"}}]}}"#
            )))
        }

        fn describe(&self) -> String {
            "yearly".into()
        }
    }

    #[test]
    fn stale_request_does_not_refill_new_year_cache() {
        let loader = DailyRecordLoader::new(Arc::new(YearlySource)).with_workers(2);
        let mut s = ChartSession::new(loader, 2025).with_today(date(3, 1));
        let row = ExerciseKey::new("Row", Some("Bar"));

        s.request_series(vec![row.clone()]);
        s.set_year(2024);
        assert_eq!(s.cached_days(), 0);
        assert!(s.wait_idle(WAIT));
        assert_eq!(s.cached_days(), 0);
        assert!(s.series().is_empty());

        let series = s.load_series(&row);
        assert!(!series.is_empty());
        assert_eq!(series.muscle_group, "Biceps");
        assert_eq!(s.cached_days(), 366);
    }
}
