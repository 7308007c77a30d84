//! Inner join of the case time series with the population table on canonical country name.

use std::collections::{BTreeSet, HashMap};
use std::fmt::Display;

use log::{debug, info, warn};

use crate::error::{EtlError, EtlResult};
use crate::loader::TableKind;
use crate::records::{CaseRecord, MergedRecord, PopulationRecord};
use crate::COL;

/// Row counts describing what the join kept and what it dropped.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub merged_rows: usize,
    pub unmatched_case_rows: usize,
    /// Countries of the case table with no population entry
    pub unmatched_case_countries: BTreeSet<String>,
    /// Countries of the population table with no case rows
    pub unmatched_population_countries: BTreeSet<String>,
    /// Later population entries for a country already seen
    pub duplicate_population_rows: usize,
}

impl Display for MergeSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Merged {} rows; dropped {} case rows from {} unmatched countries; {} population \
             countries had no cases; {} duplicate population rows ignored",
            self.merged_rows,
            self.unmatched_case_rows,
            self.unmatched_case_countries.len(),
            self.unmatched_population_countries.len(),
            self.duplicate_population_rows
        )
    }
}

/// Index population by country, keeping the first entry seen for each country.
fn population_index(population: &[PopulationRecord]) -> (HashMap<&str, &PopulationRecord>, usize) {
    let mut index = HashMap::with_capacity(population.len());
    let mut duplicates = 0;
    for record in population {
        if index.contains_key(record.country_name.as_str()) {
            debug!("Ignoring duplicate population entry for '{}'", record.country_name);
            duplicates += 1;
        } else {
            index.insert(record.country_name.as_str(), record);
        }
    }
    (index, duplicates)
}

/// Check the cells of a matched pair. An empty population is allowed and left to the rate policy.
fn merged_record(case: &CaseRecord, population: &PopulationRecord) -> EtlResult<MergedRecord> {
    let missing = |column: &str| EtlError::MissingValue {
        table: TableKind::Cases,
        column: column.to_string(),
        row: case.row,
    };
    let date = case.date.clone().ok_or_else(|| missing(COL::DATE))?;
    let confirmed = case
        .confirmed
        .to_count(TableKind::Cases, COL::CONFIRMED, case.row)?
        .ok_or_else(|| missing(COL::CONFIRMED))?;
    let population_2022 = population.population_2022.to_count(
        TableKind::Population,
        COL::POPULATION_2022,
        population.row,
    )?;
    Ok(MergedRecord {
        country_name: case.country_name.clone(),
        date,
        confirmed,
        population_2022,
    })
}

/// Join each case row to the population of its country. Case rows keep their input order and
/// only the population figure is taken from the population side.
///
/// Cells are only checked on rows that match, so an unusable row for a country missing from
/// either table is dropped like any other unmatched row.
pub fn merge(
    cases: &[CaseRecord],
    population: &[PopulationRecord],
) -> EtlResult<(Vec<MergedRecord>, MergeSummary)> {
    let (index, duplicate_population_rows) = population_index(population);
    let mut summary = MergeSummary {
        duplicate_population_rows,
        ..MergeSummary::default()
    };
    let mut matched_countries: BTreeSet<&str> = BTreeSet::new();

    let mut merged = Vec::with_capacity(cases.len());
    for case in cases {
        match index.get(case.country_name.as_str()) {
            Some(population) => {
                matched_countries.insert(case.country_name.as_str());
                merged.push(merged_record(case, population)?);
            }
            None => {
                summary.unmatched_case_rows += 1;
                summary
                    .unmatched_case_countries
                    .insert(case.country_name.clone());
            }
        }
    }

    summary.merged_rows = merged.len();
    summary.unmatched_population_countries = index
        .keys()
        .filter(|country| !matched_countries.contains(*country))
        .map(|country| country.to_string())
        .collect();

    info!("{summary}");
    if !summary.unmatched_case_countries.is_empty() {
        warn!(
            "Countries without population data: {:?}",
            summary.unmatched_case_countries
        );
    }
    if duplicate_population_rows > 0 {
        warn!("Ignored {duplicate_population_rows} duplicate population row(s), first entry wins");
    }
    Ok((merged, summary))
}
