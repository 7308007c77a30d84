//! Error types.

use std::path::PathBuf;

use crate::loader::TableKind;

#[derive(thiserror::Error, Debug)]
pub enum EtlError {
    #[error("{table} data not found: {}", .path.display())]
    MissingFile { table: TableKind, path: PathBuf },
    #[error("{table} table has no '{column}' column (available: {})", .available.join(", "))]
    MissingColumn {
        table: TableKind,
        column: String,
        available: Vec<String>,
    },
    #[error("Population of '{country}' is {} so no rate can be computed", .population.map_or("missing".to_string(), |p| p.to_string()))]
    InvalidPopulation {
        country: String,
        population: Option<u64>,
    },
    #[error("Unparseable date '{value}' for '{country}', expected YYYY-MM-DD")]
    UnparseableDate { country: String, value: String },
    #[error("{table} table has an empty cell in column '{column}' at row {row}")]
    MissingValue {
        table: TableKind,
        column: String,
        row: usize,
    },
    #[error("{table} table has negative value {value} in column '{column}' at row {row}")]
    NegativeValue {
        table: TableKind,
        column: String,
        row: usize,
        value: i64,
    },
    #[error(
        "{table} table has '{value}' in column '{column}' at row {row}, expected a whole number"
    )]
    InvalidValue {
        table: TableKind,
        column: String,
        row: usize,
        value: String,
    },
    #[error("Invalid country name corrections: {0}")]
    InvalidCorrections(String),
    #[error("Wrapped anyhow error: {0}")]
    AnyhowError(#[from] anyhow::Error),
    #[error("Wrapped polars error: {0}")]
    PolarsError(#[from] polars::error::PolarsError),
    #[error("std IO error: {0}")]
    IOError(#[from] std::io::Error),
}

pub type EtlResult<T> = Result<T, EtlError>;
