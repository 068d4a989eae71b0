use std::path::PathBuf;

use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RiskError {
    #[error("io error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported table format {path:?}")]
    UnsupportedFormat { path: PathBuf },
    #[error("required column {column:?} not found in input table")]
    MissingColumn { column: String },
    #[error("workbook {path:?} has no worksheet")]
    EmptySheet { path: PathBuf },
    #[error("could not read spreadsheet: {0}")]
    Spreadsheet(#[from] calamine::Error),
    #[error("input table has no columns to use as index")]
    MissingIndex,
    #[error("row {row}: field {field:?} is missing or not numeric")]
    MalformedInput { row: String, field: String },
    #[error("empty output, nothing written to {path:?}")]
    EmptyResult { path: PathBuf },
    #[error("worker count must be at least 1")]
    InvalidWorkers,
    #[error("could not build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("could not serialise run report: {0}")]
    Report(#[from] serde_json::Error),
    #[error(transparent)]
    Polars(#[from] PolarsError),
}

pub type Result<T> = std::result::Result<T, RiskError>;

impl RiskError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RiskError::Io {
            path: path.into(),
            source,
        }
    }
}
