//! Daily workout log documents and the sets parsed from them.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::error::{ChartError, Result};
use crate::key::{BODYWEIGHT_LABEL, ExerciseKey, normalize_location};

/// File name date format, e.g. `10-01-2025`.
pub const FILE_DATE_FORMAT: &str = "%d-%m-%Y";

/// Placeholder used by the logs for unknown text fields.
pub const NOT_AVAILABLE: &str = "N/A";

const LBS_TO_KG: f64 = 0.453_592;

static WEIGHT_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(\d+(?:[.,]\d+)?)\s*(kgs?|lbs?)?\s*$").ok());

/// One document as stored on disk: `{ date, workout: [...] }`.
#[derive(Debug, Clone, Deserialize)]
struct RawDayLog {
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    workout: Option<Vec<RawLogEntry>>,
}

/// A single logged set before normalization.
///
/// Numeric fields are kept as raw JSON values because the logs mix numbers,
/// numeric strings and unit suffixed strings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawLogEntry {
    #[serde(rename = "Exercise", default)]
    pub exercise: Option<String>,
    #[serde(rename = "Weight", default)]
    pub weight: Option<Value>,
    #[serde(rename = "Reps", default)]
    pub reps: Option<Value>,
    #[serde(rename = "Effort", default)]
    pub effort: Option<Value>,
    #[serde(rename = "Location", default)]
    pub location: Option<Value>,
    #[serde(rename = "Muscle-Group", default)]
    pub muscle_group: Option<Value>,
}

/// A normalized set. Weight is in kilograms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSet {
    pub weight: f64,
    pub reps: u32,
    pub effort: String,
    pub location: String,
    pub muscle_group: String,
}

/// A set together with the series key it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedSet {
    pub key: ExerciseKey,
    pub set: WorkoutSet,
}

/// Everything logged on one calendar date, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct DayLog {
    pub date: NaiveDate,
    pub sets: Vec<LoggedSet>,
}

impl DayLog {
    /// Sets matching `key` exactly, in logged order.
    pub fn sets_for(&self, key: &ExerciseKey) -> Vec<WorkoutSet> {
        self.sets
            .iter()
            .filter(|s| s.key == *key)
            .map(|s| s.set.clone())
            .collect()
    }

    /// Distinct keys trained on this day.
    pub fn keys(&self) -> BTreeSet<&ExerciseKey> {
        self.sets.iter().map(|s| &s.key).collect()
    }
}

/// File name for the log of `date`.
pub fn file_name_for(date: NaiveDate) -> String {
    format!("{}.json", date.format(FILE_DATE_FORMAT))
}

/// Parse the document for `date`.
///
/// Returns `Ok(None)` when the document has no workout list. Entries without
/// an exercise name are skipped.
pub fn parse_day_log(date: NaiveDate, text: &str) -> Result<Option<DayLog>> {
    let raw: RawDayLog =
        serde_json::from_str(text).map_err(|source| ChartError::Parse { date, source })?;
    if let Some(stated) = raw.date.as_deref() {
        if NaiveDate::parse_from_str(stated, FILE_DATE_FORMAT).ok() != Some(date) {
            log::warn!("Log for {date} states date {stated:?}; using file date");
        }
    }
    let Some(workout) = raw.workout else {
        return Ok(None);
    };
    let sets = workout
        .into_iter()
        .filter_map(|entry| logged_set_from_raw(date, entry))
        .collect();
    Ok(Some(DayLog { date, sets }))
}

fn logged_set_from_raw(date: NaiveDate, entry: RawLogEntry) -> Option<LoggedSet> {
    let name = entry.exercise.as_deref().map(str::trim).unwrap_or("");
    if name.is_empty() {
        log::warn!("Skipping entry without exercise name on {date}");
        return None;
    }
    let location_text = entry.location.as_ref().and_then(value_to_text);
    let key = ExerciseKey::new(name, location_text.as_deref());
    let set = WorkoutSet {
        weight: parse_weight(entry.weight.as_ref()),
        reps: parse_reps(entry.reps.as_ref()),
        effort: entry
            .effort
            .as_ref()
            .and_then(value_to_text)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        location: key
            .location
            .clone()
            .unwrap_or_else(|| BODYWEIGHT_LABEL.to_string()),
        muscle_group: entry
            .muscle_group
            .as_ref()
            .and_then(value_to_text)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
    };
    Some(LoggedSet { key, set })
}

fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Parse a weight field into kilograms.
///
/// Accepts JSON numbers and strings such as `"60 kg"`, `"60kg"`, `"135 lbs"`
/// or `"62,5"`. Missing weights are 0; anything unparseable is logged and
/// treated as 0.
pub fn parse_weight(value: Option<&Value>) -> f64 {
    match value {
        None | Some(Value::Null) => 0.0,
        Some(Value::Number(n)) => match n.as_f64() {
            Some(w) if w.is_finite() && w >= 0.0 => w,
            _ => {
                log::warn!("Invalid weight {n}; using 0");
                0.0
            }
        },
        Some(Value::String(s)) if s.trim().is_empty() => 0.0,
        Some(Value::String(s)) => match WEIGHT_RE.as_ref().and_then(|re| re.captures(s)) {
            Some(caps) => {
                let number = caps[1].replace(',', ".").parse::<f64>().unwrap_or(0.0);
                let is_lbs = caps
                    .get(2)
                    .map(|u| u.as_str().to_ascii_lowercase().starts_with("lb"))
                    .unwrap_or(false);
                if is_lbs { number * LBS_TO_KG } else { number }
            }
            None => {
                log::warn!("Unparseable weight {s:?}; using 0");
                0.0
            }
        },
        Some(other) => {
            log::warn!("Unexpected weight value {other}; using 0");
            0.0
        }
    }
}

/// Parse a repetition count from a number or numeric string.
pub fn parse_reps(value: Option<&Value>) -> u32 {
    let parsed = match value {
        None | Some(Value::Null) => return 0,
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };
    match parsed {
        Some(r) if r.is_finite() && r >= 0.0 && r <= u32::MAX as f64 => r.round() as u32,
        _ => {
            log::warn!("Unparseable reps {value:?}; using 0");
            0
        }
    }
}
