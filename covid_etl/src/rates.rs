//! Cases per 100,000 inhabitants, reduced to the latest observation of each country and ranked
//! from the highest rate to the lowest.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::NaiveDate;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::error::{EtlError, EtlResult};
use crate::records::{MergedRecord, RateRecord};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
const PER_POPULATION: f64 = 100_000.0;

/// What to do with a merged row whose population is zero or missing.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive, serialize_all = "lowercase")]
pub enum ZeroPopulationPolicy {
    /// Leave the row out of the rate table and count it
    #[default]
    Skip,
    /// Halt the run with `EtlError::InvalidPopulation`
    Error,
    /// Keep the row with a NaN rate, ranked after every finite rate
    Nan,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RateSummary {
    pub input_rows: usize,
    pub skipped_rows: usize,
    pub countries: usize,
}

/// Round half to even at two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

pub fn cases_per_100k(confirmed: u64, population: u64) -> f64 {
    confirmed as f64 / population as f64 * PER_POPULATION
}

fn parse_date(record: &MergedRecord) -> EtlResult<NaiveDate> {
    NaiveDate::parse_from_str(&record.date, DATE_FORMAT).map_err(|_| EtlError::UnparseableDate {
        country: record.country_name.clone(),
        value: record.date.clone(),
    })
}

/// Rate of one row, `None` when the row is skipped under `policy`.
fn rate(record: &MergedRecord, policy: ZeroPopulationPolicy) -> EtlResult<Option<f64>> {
    match (record.population_2022, policy) {
        (Some(population), _) if population > 0 => {
            Ok(Some(round2(cases_per_100k(record.confirmed, population))))
        }
        (_, ZeroPopulationPolicy::Skip) => Ok(None),
        (_, ZeroPopulationPolicy::Nan) => Ok(Some(f64::NAN)),
        (population, ZeroPopulationPolicy::Error) => Err(EtlError::InvalidPopulation {
            country: record.country_name.clone(),
            population,
        }),
    }
}

/// Descending by rate, NaN last.
fn by_rate_descending(a: &RateRecord, b: &RateRecord) -> Ordering {
    match (a.cases_per_100k.is_nan(), b.cases_per_100k.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.cases_per_100k.total_cmp(&a.cases_per_100k),
    }
}

/// Keep the latest row per country. Countries stay in order of first appearance; among rows
/// sharing a country's latest date the first one wins.
pub fn latest_per_country(rows: Vec<RateRecord>) -> Vec<RateRecord> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut latest: Vec<RateRecord> = Vec::new();
    for row in rows {
        match positions.get(&row.country_name) {
            Some(&idx) => {
                if row.date > latest[idx].date {
                    latest[idx] = row;
                }
            }
            None => {
                positions.insert(row.country_name.clone(), latest.len());
                latest.push(row);
            }
        }
    }
    latest
}

/// Parse dates, compute rates, reduce to the latest row per country and sort by rate.
///
/// Any unparseable date fails the whole computation.
pub fn calculate_per_capita(
    merged: &[MergedRecord],
    policy: ZeroPopulationPolicy,
) -> EtlResult<(Vec<RateRecord>, RateSummary)> {
    let dated = merged
        .iter()
        .map(|record| -> EtlResult<(&MergedRecord, NaiveDate)> {
            Ok((record, parse_date(record)?))
        })
        .collect::<EtlResult<Vec<_>>>()?;

    let mut skipped_rows = 0;
    let mut rows = Vec::with_capacity(dated.len());
    for (record, date) in dated {
        match rate(record, policy)? {
            Some(cases_per_100k) => rows.push(RateRecord {
                country_name: record.country_name.clone(),
                date,
                confirmed: record.confirmed,
                population_2022: record.population_2022,
                cases_per_100k,
            }),
            None => skipped_rows += 1,
        }
    }
    if skipped_rows > 0 {
        warn!("Skipped {skipped_rows} row(s) with zero or missing population");
    }

    let mut latest = latest_per_country(rows);
    // `sort_by` is stable, so equal rates keep their relative order
    latest.sort_by(by_rate_descending);

    let summary = RateSummary {
        input_rows: merged.len(),
        skipped_rows,
        countries: latest.len(),
    };
    info!("Total countries analyzed: {}", summary.countries);
    if let Some(top) = latest.first() {
        info!(
            "Top country: {} with {:.2} cases per 100k",
            top.country_name, top.cases_per_100k
        );
    }
    Ok((latest, summary))
}
