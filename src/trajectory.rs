//! Trajectory representations shared by the generator, cache and evaluator.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::traits::ResidentId;

/// Unprocessed generator output, persisted verbatim.
///
/// Usually a JSON string holding the model's text, but older artifacts may
/// hold an already-decoded array, so any JSON value is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawTrajectory(pub Value);

impl RawTrajectory {
    pub fn text(text: impl Into<String>) -> Self {
        Self(Value::String(text.into()))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl From<String> for RawTrajectory {
    fn from(text: String) -> Self {
        Self::text(text)
    }
}

/// Ordered POI names visited during one day.
pub type CanonicalTrajectory = Vec<String>;

/// One row of the aggregate batch artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEntry {
    pub id: ResidentId,
    pub trajectory: RawTrajectory,
}
