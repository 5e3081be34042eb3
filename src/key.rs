use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ChartError;

/// Label used for exercises performed without equipment.
pub const BODYWEIGHT_LABEL: &str = "Bodyweight";

/// Identifies one trackable series: an exercise at a location.
///
/// A `None` location means bodyweight / no equipment. Two keys are equal only
/// when both the name and the normalized location match exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExerciseKey {
    pub name: String,
    pub location: Option<String>,
}

impl ExerciseKey {
    /// Build a key, normalizing the raw location value.
    pub fn new(name: impl Into<String>, location: Option<&str>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            location: normalize_location(location),
        }
    }

    pub fn bodyweight(name: impl Into<String>) -> Self {
        Self::new(name, None)
    }

    pub fn is_bodyweight(&self) -> bool {
        self.location.is_none()
    }

    /// Location as shown to the user.
    pub fn location_label(&self) -> &str {
        self.location.as_deref().unwrap_or(BODYWEIGHT_LABEL)
    }
}

/// Map absent, empty, `"null"`, `"N/A"` and `"Bodyweight"` to `None`.
pub fn normalize_location(raw: Option<&str>) -> Option<String> {
    let value = raw?.trim();
    if value.is_empty()
        || value.eq_ignore_ascii_case("null")
        || value.eq_ignore_ascii_case("n/a")
        || value.eq_ignore_ascii_case(BODYWEIGHT_LABEL)
    {
        None
    } else {
        Some(value.to_string())
    }
}

impl fmt::Display for ExerciseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.location_label())
    }
}

impl FromStr for ExerciseKey {
    type Err = ChartError;

    /// Parse the `"{exercise} ({location})"` label form.
    ///
    /// A label without a trailing parenthesised location is treated as a
    /// bodyweight exercise.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ChartError::InvalidKey(s.to_string()));
        }
        let parsed = s
            .strip_suffix(')')
            .and_then(|body| body.rsplit_once(" ("))
            .map(|(name, location)| (name.trim(), location.trim()));
        match parsed {
            Some((name, _)) if name.is_empty() => Err(ChartError::InvalidKey(s.to_string())),
            Some((name, location)) => Ok(Self::new(name, Some(location))),
            None => Ok(Self::bodyweight(s)),
        }
    }
}
