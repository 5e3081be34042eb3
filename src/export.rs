use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use crate::error::{ChartError, Result};
use crate::key::ExerciseKey;
use crate::series::Series;

/// One exported day of one series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesRow<'a> {
    pub exercise: &'a str,
    pub location: &'a str,
    pub date: NaiveDate,
    pub sets: usize,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub unit: &'static str,
}

/// Rows for every day of every series, in key then date order.
pub fn series_rows(series: &BTreeMap<ExerciseKey, Series>) -> Vec<SeriesRow<'_>> {
    series
        .values()
        .flat_map(|s| {
            s.days.iter().map(move |d| SeriesRow {
                exercise: &s.key.name,
                location: s.key.location_label(),
                date: d.date,
                sets: d.sets.len(),
                min: d.min_value,
                max: d.max_value,
                avg: d.avg_value,
                unit: s.unit(),
            })
        })
        .collect()
}

pub fn write_json<T: Serialize + ?Sized, P: AsRef<Path>>(value: &T, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = std::fs::File::create(path).map_err(|source| ChartError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::to_writer_pretty(file, value)?;
    Ok(())
}

pub fn write_csv<T: Serialize>(writer: impl Write, records: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for r in records {
        wtr.serialize(r)?;
    }
    wtr.flush().map_err(|e| ChartError::Csv(e.into()))
}

pub fn save_series_csv<P: AsRef<Path>>(path: P, series: &BTreeMap<ExerciseKey, Series>) -> Result<()> {
    let path = path.as_ref();
    let file = std::fs::File::create(path).map_err(|source| ChartError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let rows = series_rows(series);
    write_csv(file, &rows)?;
    log::info!("Exported {} rows to {}", rows.len(), path.display());
    Ok(())
}

pub fn save_series_json<P: AsRef<Path>>(
    path: P,
    series: &BTreeMap<ExerciseKey, Series>,
) -> Result<()> {
    let rows = series_rows(series);
    write_json(&rows, path.as_ref())?;
    log::info!("Exported {} rows to {}", rows.len(), path.as_ref().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::WorkoutSet;
    use crate::series::DayAggregate;

    fn sample() -> BTreeMap<ExerciseKey, Series> {
        let key = ExerciseKey::new("Bench Press", Some("Bar"));
        let set = WorkoutSet {
            weight: 60.0,
            reps: 5,
            effort: "N/A".into(),
            location: "Bar".into(),
            muscle_group: "Chest".into(),
        };
        let day = DayAggregate {
            date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            sets: vec![set.clone(), WorkoutSet { weight: 80.0, reps: 3, ..set }],
            max_value: 80.0,
            min_value: 60.0,
            avg_value: 67.5,
            is_bodyweight: false,
        };
        let pull = ExerciseKey::bodyweight("Pull Up");
        let pull_day = DayAggregate {
            date: NaiveDate::from_ymd_opt(2025, 1, 11).unwrap(),
            sets: Vec::new(),
            max_value: 10.0,
            min_value: 8.0,
            avg_value: 9.0,
            is_bodyweight: true,
        };
        BTreeMap::from([
            (
                key.clone(),
                Series {
                    key,
                    is_bodyweight: false,
                    muscle_group: "Chest".into(),
                    days: vec![day],
                },
            ),
            (
                pull.clone(),
                Series {
                    key: pull,
                    is_bodyweight: true,
                    muscle_group: "Back".into(),
                    days: vec![pull_day],
                },
            ),
        ])
    }

    #[test]
    fn csv_has_one_row_per_day() {
        let series = sample();
        let mut buf = Vec::new();
        write_csv(&mut buf, &series_rows(&series)).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "exercise,location,date,sets,min,max,avg,unit");
        assert_eq!(lines[1], "Bench Press,Bar,2025-01-10,2,60.0,80.0,67.5,kg");
        assert_eq!(lines[2], "Pull Up,Bodyweight,2025-01-11,0,8.0,10.0,9.0,reps");
    }

    #[test]
    fn json_export_round_trips_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("series.json");
        save_series_json(&path, &sample()).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value[0]["date"], "2025-01-10");
        assert_eq!(value[1]["unit"], "reps");

        let csv_path = dir.path().join("series.csv");
        save_series_csv(&csv_path, &sample()).unwrap();
        assert_eq!(std::fs::read_to_string(csv_path).unwrap().lines().count(), 3);
    }

    #[test]
    fn unwritable_path_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.csv");
        assert!(matches!(
            save_series_csv(&path, &sample()),
            Err(ChartError::Io { .. })
        ));
    }
}
