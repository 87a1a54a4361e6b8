use std::path::PathBuf;

use thiserror::Error;

/// Fatal conditions that abort a channel-narrowing run.
#[derive(Debug, Error)]
pub enum Error {
    /// The run was asked for something its inputs cannot satisfy.
    #[error("invalid input configuration: {0}")]
    InputConfiguration(String),

    /// The spatial reference reports a linear unit other than foot or meter.
    #[error("unsupported linear unit {0:?} (expected \"foot\" or \"meter\")")]
    UnsupportedUnit(String),

    /// A denominator needed for a derived field is zero.
    #[error("{field} is zero{}; refusing to divide by it", at_record(.record))]
    DivisionByZero { field: String, record: Option<usize> },

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("project layout: {0:#}")]
    Project(#[from] anyhow::Error),
}

/// Failures raised by a [`GeometryEngine`](crate::engine::GeometryEngine).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("i/o error on {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error("shapefile error on {path}: {source}")]
    Shapefile { path: PathBuf, source: shapefile::Error },

    #[error("dataset already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("dataset not found: {0}")]
    NotFound(PathBuf),

    #[error("unsupported shape type {0} (expected polygon or polyline)")]
    UnsupportedShape(String),

    #[error("field {0:?} already exists")]
    FieldExists(String),

    #[error("field {0:?} does not exist")]
    MissingField(String),

    #[error("cannot delete required field {0:?}")]
    RequiredField(String),

    #[error("invalid field name {0:?}")]
    InvalidFieldName(String),

    #[error("GEOS {0}")]
    Geos(String),

    #[error("{0}")]
    Unsupported(String),
}

impl EngineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

fn at_record(record: &Option<usize>) -> String {
    record.map(|r| format!(" for record {r}")).unwrap_or_default()
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
