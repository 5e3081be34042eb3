//! Charts of daily workout logs.
//!
//! Day logs (`DD-MM-YYYY.json`) are loaded from a directory or an HTTP server,
//! grouped into per-exercise series of daily min/max/average values and
//! rendered into a backend-neutral [`scene::Scene`] through a pannable,
//! zoomable viewport. [`ChartSession`] ties the pieces together for a UI.

pub mod cache;
pub mod catalog;
pub mod classify;
pub mod config;
pub mod error;
pub mod export;
pub mod key;
pub mod loader;
pub mod record;
pub mod render;
pub mod report;
pub mod scene;
pub mod series;
pub mod session;
pub mod source;
pub mod viewport;

pub use catalog::ExerciseCatalog;
pub use error::{ChartError, Result};
pub use key::ExerciseKey;
pub use loader::DailyRecordLoader;
pub use render::{ChartLayout, ChartRenderer};
pub use series::{DayAggregate, Series, SeriesBuilder};
pub use session::ChartSession;
pub use viewport::{DragAxis, Viewport, ViewportController};
