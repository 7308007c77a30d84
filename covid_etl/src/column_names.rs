//! This module stores the column names read from the input tables and written to the output
//! tables. Input names follow the upstream datasets (the world population table and the
//! aggregated COVID-19 time series), so they must be kept in sync with those sources.

pub const COUNTRY: &str = "Country";
pub const DATE: &str = "Date";
pub const CONFIRMED: &str = "Confirmed";
pub const POPULATION_2022: &str = "2022 Population";
pub const CASES_PER_100K: &str = "Cases_per_100k";

/// Alternative headers for the country column, tried in order when `COUNTRY` is absent.
pub const COUNTRY_ALIASES: [&str; 4] = ["Country/Territory", "Country Name", "Region", "Nation"];

/// Column order of the merged table.
pub const MERGED_COLUMNS: [&str; 4] = [COUNTRY, DATE, CONFIRMED, POPULATION_2022];

/// Column order of the rate table.
pub const RATE_COLUMNS: [&str; 5] = [COUNTRY, DATE, CONFIRMED, POPULATION_2022, CASES_PER_100K];
