//! Reading the input tables (and a previously written rate table) from CSV files.

use std::fmt::Display;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use itertools::{izip, Itertools};
use log::{debug, info};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::Display as StrumDisplay;

use crate::error::{EtlError, EtlResult};
use crate::rates::DATE_FORMAT;
use crate::records::{CountCell, RateRecord};
use crate::COL;

/// Which table a frame came from; used to name the table in errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, StrumDisplay)]
pub enum TableKind {
    Population,
    #[strum(to_string = "COVID")]
    Cases,
    #[strum(to_string = "Rate")]
    Rates,
}

/// A raw input table as read from disk.
#[derive(Clone, Debug)]
pub struct Table {
    pub kind: TableKind,
    pub frame: DataFrame,
}

impl Table {
    pub fn new(kind: TableKind, frame: DataFrame) -> Self {
        Self { kind, frame }
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_names().iter().any(|c| c == name)
    }
}

/// Paths of the two input tables supplied by the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputPaths {
    pub population: PathBuf,
    pub cases: PathBuf,
}

/// Shape and distinct country count of a loaded table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableSummary {
    pub kind: TableKind,
    pub rows: usize,
    pub columns: usize,
    pub distinct_countries: usize,
}

impl Display for TableSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} data: {} rows x {} columns, {} distinct countries",
            self.kind, self.rows, self.columns, self.distinct_countries
        )
    }
}

/// Fails with `MissingFile` naming the table if `path` does not exist.
pub fn validate_path(kind: TableKind, path: &Path) -> EtlResult<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(EtlError::MissingFile {
            table: kind,
            path: path.to_path_buf(),
        })
    }
}

fn read_csv(path: &Path) -> PolarsResult<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
}

/// Validate that `path` exists and read it as a headered CSV.
pub fn load_table(kind: TableKind, path: &Path) -> EtlResult<Table> {
    validate_path(kind, path)?;
    info!("Attempting to load {kind} data from {}", path.display());
    let frame = read_csv(path)?;
    info!("Loaded {kind} data with shape: {:?}", frame.shape());
    debug!("{kind} columns: {:?}", frame.get_column_names());
    Ok(Table::new(kind, frame))
}

/// Load both input tables, checking both paths before reading either.
pub fn load_inputs(paths: &InputPaths) -> EtlResult<(Table, Table)> {
    validate_path(TableKind::Population, &paths.population)?;
    validate_path(TableKind::Cases, &paths.cases)?;
    Ok((
        load_table(TableKind::Population, &paths.population)?,
        load_table(TableKind::Cases, &paths.cases)?,
    ))
}

/// Summarise a table given the name of its country column.
pub fn summarize(table: &Table, country_column: &str) -> EtlResult<TableSummary> {
    let (rows, columns) = table.frame.shape();
    let countries = table.frame.column(country_column)?.cast(&DataType::String)?;
    let distinct_countries = countries.str()?.into_iter().flatten().unique().count();
    Ok(TableSummary {
        kind: table.kind,
        rows,
        columns,
        distinct_countries,
    })
}

/// List the CSV files directly inside `dir`, sorted by path.
pub fn list_csv_files(dir: &Path) -> EtlResult<Vec<PathBuf>> {
    let mut files = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .filter_ok(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    files.sort();
    Ok(files)
}

fn required_column(table: &DataFrame, kind: TableKind, column: &str) -> EtlResult<Series> {
    table.column(column).cloned().map_err(|_| EtlError::MissingColumn {
        table: kind,
        column: column.to_string(),
        available: table
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect(),
    })
}

fn parse_rate(kind: TableKind, row: usize, raw: Option<&str>) -> EtlResult<f64> {
    match raw {
        None => Ok(f64::NAN),
        Some(raw) => raw.trim().parse().map_err(|_| EtlError::InvalidValue {
            table: kind,
            column: COL::CASES_PER_100K.to_string(),
            row,
            value: raw.to_string(),
        }),
    }
}

/// Read a rate table written by a previous pipeline run, keeping its row order.
pub fn load_rate_table(path: &Path) -> EtlResult<Vec<RateRecord>> {
    let kind = TableKind::Rates;
    validate_path(kind, path)?;
    let df = read_csv(path)?;
    info!("Loaded rate table with shape: {:?}", df.shape());

    let text = |column: &str| -> EtlResult<Series> {
        Ok(required_column(&df, kind, column)?.cast(&DataType::String)?)
    };
    let countries = text(COL::COUNTRY)?;
    let dates = text(COL::DATE)?;
    let confirmed = text(COL::CONFIRMED)?;
    let population = text(COL::POPULATION_2022)?;
    let rates = text(COL::CASES_PER_100K)?;

    izip!(
        countries.str()?,
        dates.str()?,
        confirmed.str()?,
        population.str()?,
        rates.str()?,
    )
    .enumerate()
    .map(|(row, (country, date, confirmed, population, rate))| -> EtlResult<RateRecord> {
        let missing = |column: &str| EtlError::MissingValue {
            table: kind,
            column: column.to_string(),
            row,
        };
        let country = country.ok_or_else(|| missing(COL::COUNTRY))?.to_string();
        let date = date.ok_or_else(|| missing(COL::DATE))?;
        let date = NaiveDate::parse_from_str(date, DATE_FORMAT).map_err(|_| {
            EtlError::UnparseableDate {
                country: country.clone(),
                value: date.to_string(),
            }
        })?;
        let confirmed = CountCell::parse(confirmed)
            .to_count(kind, COL::CONFIRMED, row)?
            .ok_or_else(|| missing(COL::CONFIRMED))?;
        Ok(RateRecord {
            date,
            confirmed,
            population_2022: CountCell::parse(population).to_count(
                kind,
                COL::POPULATION_2022,
                row,
            )?,
            cases_per_100k: parse_rate(kind, row, rate)?,
            country_name: country,
        })
    })
    .collect()
}
