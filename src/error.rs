//! Error types for loading, generation, persistence and evaluation.

use std::io;

use thiserror::Error;

/// A `"lon,lat"` field that could not be turned into a [`crate::geo::Coordinate`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordinateError {
    #[error("expected \"lon,lat\", got {field_count} field(s) in {input:?}")]
    FieldCount { input: String, field_count: usize },
    #[error("non-numeric coordinate component {component:?} in {input:?}")]
    NotNumeric { input: String, component: String },
    #[error("coordinate out of range: lon={lon}, lat={lat}")]
    OutOfRange { lon: f64, lat: f64 },
}

/// Failure while reading a tabular dataset.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: {source}")]
    Coordinate {
        row: usize,
        #[source]
        source: CoordinateError,
    },
}

/// Failure of the external generative service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("missing api key: environment variable {0} is not set")]
    MissingApiKey(String),
    #[error("malformed service response: {0}")]
    MalformedResponse(String),
    #[error("{0}")]
    Other(String),
}

/// Failure of a [`crate::traits::TrajectoryStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no cached trajectory for resident {0}")]
    NotFound(i64),
    #[error("cached trajectory for resident {resident_id} is corrupt: {source}")]
    Corrupt {
        resident_id: i64,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Umbrella error for a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("generation failed for resident {resident_id}: {source}")]
    Generation {
        resident_id: i64,
        #[source]
        source: ServiceError,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("cannot evaluate an empty trajectory batch")]
    EmptyBatch,
    #[error("no visits fall into the reference categories")]
    NoReferenceVisits,
    #[error("invalid reference distribution: {0}")]
    InvalidReference(String),
    #[error("configuration error: {0}")]
    Config(String),
}
