//! Persistent settings and data source selection.

use dirs_next as dirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::catalog::DEFAULT_MIN_OCCURRENCES;
use crate::loader::{DEFAULT_FETCH_WORKERS, DailyRecordLoader};
use crate::render::{DEFAULT_HEIGHT, DEFAULT_WIDTH};
use crate::source::{DirectorySource, HttpSource, RecordSource};
use crate::viewport::ViewportLimits;

/// Base URL of a server exposing `data/DD-MM-YYYY.json`. Wins over everything.
pub const DATA_URL_ENV: &str = "WORKOUT_DATA_URL";
/// Directory holding `DD-MM-YYYY.json` files. Wins over the settings file.
pub const DATA_DIR_ENV: &str = "WORKOUT_DATA_DIR";

/// Where day logs are read from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum DataSource {
    Directory(PathBuf),
    Http(String),
}

impl Default for DataSource {
    fn default() -> Self {
        DataSource::Directory(PathBuf::from("data"))
    }
}

impl DataSource {
    pub fn into_source(self) -> Arc<dyn RecordSource> {
        match self {
            DataSource::Directory(root) => Arc::new(DirectorySource::new(root)),
            DataSource::Http(base) => Arc::new(HttpSource::new(&base)),
        }
    }
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSource::Directory(root) => write!(f, "{}", root.display()),
            DataSource::Http(base) => write!(f, "{base}"),
        }
    }
}

/// Environment overrides first, then the configured source.
pub fn resolve_data_source(configured: &DataSource) -> DataSource {
    if let Some(url) = std::env::var(DATA_URL_ENV).ok().filter(|v| !v.trim().is_empty()) {
        return DataSource::Http(url);
    }
    std::env::var_os(DATA_DIR_ENV)
        .filter(|v| !v.is_empty())
        .map(|dir| DataSource::Directory(PathBuf::from(dir)))
        .unwrap_or_else(|| configured.clone())
}

fn default_min_occurrences() -> usize {
    DEFAULT_MIN_OCCURRENCES
}

fn default_fetch_workers() -> usize {
    DEFAULT_FETCH_WORKERS
}

fn default_plot_width() -> f32 {
    DEFAULT_WIDTH
}

fn default_plot_height() -> f32 {
    DEFAULT_HEIGHT
}

/// User preferences stored between runs.
///
/// Every field falls back to its default when missing, so files written by
/// older versions keep loading. Chosen exercises and the viewport are not
/// stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub data_source: DataSource,
    /// Minimum number of distinct training days for an exercise to be listed.
    #[serde(default = "default_min_occurrences")]
    pub min_occurrences: usize,
    #[serde(default = "default_fetch_workers")]
    pub fetch_workers: usize,
    #[serde(default = "default_plot_width")]
    pub plot_width: f32,
    #[serde(default = "default_plot_height")]
    pub plot_height: f32,
    #[serde(default)]
    pub viewport: ViewportLimits,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_source: DataSource::default(),
            min_occurrences: DEFAULT_MIN_OCCURRENCES,
            fetch_workers: DEFAULT_FETCH_WORKERS,
            plot_width: DEFAULT_WIDTH,
            plot_height: DEFAULT_HEIGHT,
            viewport: ViewportLimits::default(),
        }
    }
}

impl Settings {
    const FILE: &'static str = "workout_log_charts_settings.json";

    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(Self::FILE))
    }

    /// Load settings from the JSON configuration file, or defaults.
    pub fn load() -> Self {
        let Some(path) = Self::path() else {
            return Self::default();
        };
        match std::fs::read_to_string(&path) {
            Ok(data) => match serde_json::from_str(&data) {
                Ok(cfg) => cfg,
                Err(e) => {
                    log::warn!("Ignoring malformed settings {}: {e}", path.display());
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) {
        let Some(path) = Self::path() else {
            return;
        };
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match serde_json::to_string_pretty(self) {
            Ok(data) => {
                if let Err(e) = std::fs::write(&path, data) {
                    log::warn!("Failed to save settings to {}: {e}", path.display());
                }
            }
            Err(e) => log::warn!("Failed to serialize settings: {e}"),
        }
    }

    /// Loader for the effective data source.
    pub fn loader(&self) -> DailyRecordLoader {
        let source = resolve_data_source(&self.data_source);
        log::info!("Reading workout logs from {source}");
        DailyRecordLoader::new(source.into_source()).with_workers(self.fetch_workers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use std::env;
    use std::sync::Mutex;

    static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    fn restore(name: &str, prev: Option<std::ffi::OsString>) {
        unsafe {
            match prev {
                Some(val) => env::set_var(name, val),
                None => env::remove_var(name),
            }
        }
    }

    #[test]
    fn settings_roundtrip() {
        let mut s = Settings::default();
        s.data_source = DataSource::Http("http://localhost:8080".into());
        s.min_occurrences = 5;
        s.fetch_workers = 2;
        s.viewport.max_span = 150.0;
        let json = serde_json::to_string(&s).unwrap();
        let loaded: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(s, loaded);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let loaded: Settings =
            serde_json::from_str(r#"{"min_occurrences":4,"viewport":{"max_span":120.0}}"#).unwrap();
        assert_eq!(loaded.min_occurrences, 4);
        assert_eq!(loaded.fetch_workers, DEFAULT_FETCH_WORKERS);
        assert_eq!(loaded.viewport.max_span, 120.0);
        assert_eq!(loaded.viewport.min_span, crate::viewport::MIN_SPAN);
        assert_eq!(loaded.data_source, DataSource::default());
    }

    #[test]
    fn settings_persist_in_config_dir() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let prev = env::var_os("XDG_CONFIG_HOME");
        unsafe {
            env::set_var("XDG_CONFIG_HOME", dir.path());
        }

        let mut s = Settings::default();
        s.min_occurrences = 7;
        s.save();
        assert_eq!(Settings::load().min_occurrences, 7);

        let path = Settings::path().unwrap();
        std::fs::write(&path, "{}").unwrap();
        assert_eq!(Settings::load(), Settings::default());

        std::fs::write(&path, "not json").unwrap();
        assert_eq!(Settings::load(), Settings::default());

        restore("XDG_CONFIG_HOME", prev);
    }

    #[test]
    fn environment_overrides_configured_source() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let prev_url = env::var_os(DATA_URL_ENV);
        let prev_dir = env::var_os(DATA_DIR_ENV);
        let configured = DataSource::Directory("logs".into());
        unsafe {
            env::remove_var(DATA_URL_ENV);
            env::remove_var(DATA_DIR_ENV);
        }
        assert_eq!(resolve_data_source(&configured), configured);

        unsafe {
            env::set_var(DATA_DIR_ENV, "/tmp/workouts");
        }
        assert_eq!(
            resolve_data_source(&configured),
            DataSource::Directory("/tmp/workouts".into())
        );

        unsafe {
            env::set_var(DATA_URL_ENV, "http://example.test");
        }
        assert_eq!(
            resolve_data_source(&configured),
            DataSource::Http("http://example.test".into())
        );

        restore(DATA_URL_ENV, prev_url);
        restore(DATA_DIR_ENV, prev_dir);
    }
}
