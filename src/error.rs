use chrono::NaiveDate;
use std::path::PathBuf;

/// Errors produced by the chart core.
///
/// Absent data is not an error: missing or unreadable day logs are reported
/// by the loader as `None`. The variants below only reach callers for
/// integration problems (bad keys, missing drawing surface) and exports.
#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("request to {url} failed: {message}")]
    Http { url: String, message: String },
    #[error("malformed workout log for {date}: {source}")]
    Parse {
        date: NaiveDate,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid exercise key {0:?}")]
    InvalidKey(String),
    #[error("no drawing surface: {0}")]
    MissingSurface(String),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ChartError>;
