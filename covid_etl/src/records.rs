//! Typed rows flowing through the pipeline, and their conversion to polars `DataFrame`s for
//! output.

use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{EtlError, EtlResult};
use crate::loader::TableKind;
use crate::rates::DATE_FORMAT;
use crate::COL;

/// A cell that should hold a non-negative whole number, as read. Checking is left to the merge
/// so that rows the join drops can never fail a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CountCell {
    Count(u64),
    Missing,
    Negative(i64),
    /// Not a whole number, e.g. `1000.7`, `n/a` or `331,000,000`
    Invalid(String),
}

impl CountCell {
    /// Parse the text of a cell. Integral floats such as `5.0` are accepted since polars reads a
    /// column holding any fractional value as floats.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
            return Self::Missing;
        };
        let whole = raw.parse::<i64>().ok().or_else(|| {
            raw.parse::<f64>()
                .ok()
                .filter(|value| value.fract() == 0.0 && value.abs() < i64::MAX as f64)
                .map(|value| value as i64)
        });
        match whole {
            Some(value) => u64::try_from(value).map_or(Self::Negative(value), Self::Count),
            None => Self::Invalid(raw.to_string()),
        }
    }

    /// The count, `None` for an empty cell, or an error naming the cell.
    pub fn to_count(&self, table: TableKind, column: &str, row: usize) -> EtlResult<Option<u64>> {
        match self {
            Self::Count(value) => Ok(Some(*value)),
            Self::Missing => Ok(None),
            Self::Negative(value) => Err(EtlError::NegativeValue {
                table,
                column: column.to_string(),
                row,
                value: *value,
            }),
            Self::Invalid(value) => Err(EtlError::InvalidValue {
                table,
                column: column.to_string(),
                row,
                value: value.clone(),
            }),
        }
    }
}

/// One row of the population table after reconciliation. `row` is the position in the source
/// table, used in errors.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationRecord {
    pub country_name: String,
    pub row: usize,
    pub population_2022: CountCell,
}

/// One observation of the case time series after reconciliation. The date is kept as read and
/// only parsed once the row has survived the merge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub country_name: String,
    pub row: usize,
    pub date: Option<String>,
    pub confirmed: CountCell,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedRecord {
    pub country_name: String,
    pub date: String,
    pub confirmed: u64,
    pub population_2022: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RateRecord {
    pub country_name: String,
    pub date: NaiveDate,
    pub confirmed: u64,
    pub population_2022: Option<u64>,
    pub cases_per_100k: f64,
}

/// Build the merged output table, columns in `COL::MERGED_COLUMNS` order.
pub fn merged_to_df(records: &[MergedRecord]) -> PolarsResult<DataFrame> {
    DataFrame::new(vec![
        Series::new(
            COL::COUNTRY,
            records
                .iter()
                .map(|r| r.country_name.as_str())
                .collect::<Vec<_>>(),
        ),
        Series::new(
            COL::DATE,
            records.iter().map(|r| r.date.as_str()).collect::<Vec<_>>(),
        ),
        Series::new(
            COL::CONFIRMED,
            records.iter().map(|r| r.confirmed).collect::<Vec<u64>>(),
        ),
        Series::new(
            COL::POPULATION_2022,
            records
                .iter()
                .map(|r| r.population_2022)
                .collect::<Vec<Option<u64>>>(),
        ),
    ])
}

/// Build the rate output table, columns in `COL::RATE_COLUMNS` order.
pub fn rates_to_df(records: &[RateRecord]) -> PolarsResult<DataFrame> {
    DataFrame::new(vec![
        Series::new(
            COL::COUNTRY,
            records
                .iter()
                .map(|r| r.country_name.as_str())
                .collect::<Vec<_>>(),
        ),
        Series::new(
            COL::DATE,
            records
                .iter()
                .map(|r| r.date.format(DATE_FORMAT).to_string())
                .collect::<Vec<String>>(),
        ),
        Series::new(
            COL::CONFIRMED,
            records.iter().map(|r| r.confirmed).collect::<Vec<u64>>(),
        ),
        Series::new(
            COL::POPULATION_2022,
            records
                .iter()
                .map(|r| r.population_2022)
                .collect::<Vec<Option<u64>>>(),
        ),
        Series::new(
            COL::CASES_PER_100K,
            records
                .iter()
                .map(|r| r.cases_per_100k)
                .collect::<Vec<f64>>(),
        ),
    ])
}
