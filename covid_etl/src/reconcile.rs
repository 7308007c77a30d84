//! Country name reconciliation: locating the country column of each table and mapping every
//! spelling onto the canonical vocabulary before the tables are joined.

use std::collections::BTreeMap;

use itertools::izip;
use log::{debug, info, warn};
use polars::prelude::*;

use crate::error::{EtlError, EtlResult};
use crate::loader::{Table, TableKind};
use crate::records::{CaseRecord, CountCell, PopulationRecord};
use crate::COL;

/// Fixed table of known alternate spellings. Names without an entry pass through unchanged.
///
/// Construction rejects chains (`A -> B` alongside `B -> C`), so applying the map twice gives
/// the same result as applying it once.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CanonicalNameMap(BTreeMap<String, String>);

impl CanonicalNameMap {
    pub fn new(corrections: BTreeMap<String, String>) -> EtlResult<Self> {
        for (from, to) in &corrections {
            if let Some(next) = corrections.get(to).filter(|next| *next != to) {
                return Err(EtlError::InvalidCorrections(format!(
                    "'{from}' maps to '{to}', which itself maps to '{next}'"
                )));
            }
        }
        Ok(Self(corrections))
    }

    /// Exact-match lookup with identity fallback.
    pub fn canonical<'a>(&'a self, name: &'a str) -> &'a str {
        self.0.get(name).map(String::as_str).unwrap_or(name)
    }

    pub fn reconcile<'a, I>(&'a self, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names
            .into_iter()
            .map(|name| self.canonical(name).to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// What the pipeline is looking for when it asks a `ColumnChooser` for help.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnRequest {
    pub table: TableKind,
    pub wanted: String,
    pub available: Vec<String>,
}

/// Strategy consulted when a required column cannot be found by exact name or alias. Returning
/// `Ok(None)` declines, which surfaces as `EtlError::MissingColumn`.
pub trait ColumnChooser {
    fn choose_column(&self, request: &ColumnRequest) -> anyhow::Result<Option<String>>;
}

/// Never chooses; missing columns are always errors.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoChooser;

impl ColumnChooser for NoChooser {
    fn choose_column(&self, _request: &ColumnRequest) -> anyhow::Result<Option<String>> {
        Ok(None)
    }
}

/// Explicit per-table column names for the country column, e.g. from command line flags.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FixedColumns {
    pub population_country: Option<String>,
    pub cases_country: Option<String>,
}

impl ColumnChooser for FixedColumns {
    fn choose_column(&self, request: &ColumnRequest) -> anyhow::Result<Option<String>> {
        if request.wanted != COL::COUNTRY {
            return Ok(None);
        }
        Ok(match request.table {
            TableKind::Population => self.population_country.clone(),
            TableKind::Cases => self.cases_country.clone(),
            TableKind::Rates => None,
        })
    }
}

/// Tries each chooser in turn until one makes a choice.
impl<A: ColumnChooser, B: ColumnChooser> ColumnChooser for (A, B) {
    fn choose_column(&self, request: &ColumnRequest) -> anyhow::Result<Option<String>> {
        match self.0.choose_column(request)? {
            Some(column) => Ok(Some(column)),
            None => self.1.choose_column(request),
        }
    }
}

/// Reconciled records plus the number of input rows dropped for having no country.
#[derive(Clone, Debug, PartialEq)]
pub struct Reconciled<T> {
    pub records: Vec<T>,
    pub dropped_without_country: usize,
}

pub struct Reconciler<'a> {
    names: &'a CanonicalNameMap,
    aliases: &'a [String],
    chooser: &'a dyn ColumnChooser,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        names: &'a CanonicalNameMap,
        aliases: &'a [String],
        chooser: &'a dyn ColumnChooser,
    ) -> Self {
        Self {
            names,
            aliases,
            chooser,
        }
    }

    /// Find `wanted` in the table, falling back to `aliases` and then to the chooser.
    pub fn resolve_column(
        &self,
        table: &Table,
        wanted: &str,
        aliases: &[String],
    ) -> EtlResult<String> {
        if table.has_column(wanted) {
            return Ok(wanted.to_string());
        }
        let available = table.column_names();
        if let Some(alias) = aliases.iter().find(|alias| available.contains(alias)) {
            info!(
                "Using column '{alias}' as '{wanted}' in {} table",
                table.kind
            );
            return Ok(alias.clone());
        }
        let request = ColumnRequest {
            table: table.kind,
            wanted: wanted.to_string(),
            available,
        };
        match self.chooser.choose_column(&request)? {
            Some(chosen) if request.available.contains(&chosen) => {
                info!(
                    "Using chosen column '{chosen}' as '{wanted}' in {} table",
                    table.kind
                );
                Ok(chosen)
            }
            Some(chosen) => Err(EtlError::MissingColumn {
                table: table.kind,
                column: chosen,
                available: request.available,
            }),
            None => Err(EtlError::MissingColumn {
                table: table.kind,
                column: wanted.to_string(),
                available: request.available,
            }),
        }
    }

    pub fn country_column(&self, table: &Table) -> EtlResult<String> {
        self.resolve_column(table, COL::COUNTRY, self.aliases)
    }

    /// Cells of a column as text. Casting to a string never loses a value, so numbers are parsed
    /// strictly afterwards rather than by a lossy numeric cast.
    fn text_column(&self, table: &Table, wanted: &str) -> EtlResult<Series> {
        let name = self.resolve_column(table, wanted, &[])?;
        Ok(table.frame.column(&name)?.cast(&DataType::String)?)
    }

    /// Canonical country names of the table, `None` where the cell is empty.
    fn countries(&self, table: &Table) -> EtlResult<Vec<Option<String>>> {
        let column = self.country_column(table)?;
        let series = table.frame.column(&column)?.cast(&DataType::String)?;
        Ok(series
            .str()?
            .into_iter()
            .map(|name| name.map(|name| self.names.canonical(name).to_string()))
            .collect())
    }

    pub fn population_records(&self, table: &Table) -> EtlResult<Reconciled<PopulationRecord>> {
        let countries = self.countries(table)?;
        let population = self.text_column(table, COL::POPULATION_2022)?;

        let mut records = Vec::with_capacity(countries.len());
        let mut dropped_without_country = 0;
        for (row, (country, population)) in izip!(countries, population.str()?).enumerate() {
            let Some(country_name) = country else {
                dropped_without_country += 1;
                continue;
            };
            records.push(PopulationRecord {
                country_name,
                row,
                population_2022: CountCell::parse(population),
            });
        }
        log_dropped(table.kind, dropped_without_country);
        debug!("Reconciled {} population records", records.len());
        Ok(Reconciled {
            records,
            dropped_without_country,
        })
    }

    pub fn case_records(&self, table: &Table) -> EtlResult<Reconciled<CaseRecord>> {
        let countries = self.countries(table)?;
        let dates = self.text_column(table, COL::DATE)?;
        let confirmed = self.text_column(table, COL::CONFIRMED)?;

        let mut records = Vec::with_capacity(countries.len());
        let mut dropped_without_country = 0;
        for (row, (country, date, confirmed)) in
            izip!(countries, dates.str()?, confirmed.str()?).enumerate()
        {
            let Some(country_name) = country else {
                dropped_without_country += 1;
                continue;
            };
            records.push(CaseRecord {
                country_name,
                row,
                date: date.map(str::to_string),
                confirmed: CountCell::parse(confirmed),
            });
        }
        log_dropped(table.kind, dropped_without_country);
        debug!("Reconciled {} case records", records.len());
        Ok(Reconciled {
            records,
            dropped_without_country,
        })
    }
}

fn log_dropped(kind: TableKind, dropped: usize) {
    if dropped > 0 {
        warn!("Dropped {dropped} {kind} row(s) with no country name");
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use polars::df;

    use super::*;
    use crate::config::Config;

    fn default_names() -> CanonicalNameMap {
        CanonicalNameMap::new(Config::default().corrections).unwrap()
    }

    fn default_aliases() -> Vec<String> {
        Config::default().country_aliases
    }

    fn population_table() -> Table {
        Table::new(
            TableKind::Population,
            df!(
                "Rank" => &[3, 1, 2],
                "Country/Territory" => &["United States", "Burma", "France"],
                "2022 Population" => &[331_000_000i64, 54_000_000, 67_000_000]
            )
            .unwrap(),
        )
    }

    fn case_table() -> Table {
        Table::new(
            TableKind::Cases,
            df!(
                "Date" => &["2021-01-01", "2021-01-02", "2021-01-01"],
                "Country" => &[Some("US"), Some("US"), None],
                "Confirmed" => &[1000i64, 2000, 7]
            )
            .unwrap(),
        )
    }

    #[test]
    fn unmapped_names_pass_through() {
        let names = default_names();
        assert_eq!(names.canonical("US"), "United States");
        assert_eq!(names.canonical("Taiwan*"), "Taiwan");
        assert_eq!(names.canonical("France"), "France");
        // Matching is exact, not fuzzy
        assert_eq!(names.canonical("us"), "us");
        assert_eq!(names.len(), 10);
        assert!(CanonicalNameMap::default().is_empty());
    }

    #[test]
    fn reconciliation_is_idempotent() {
        let names = default_names();
        let raw = [
            "US",
            "Korea, South",
            "Burma",
            "Czechia",
            "Taiwan*",
            "Cote d'Ivoire",
            "Congo (Brazzaville)",
            "Congo (Kinshasa)",
            "West Bank and Gaza",
            "Cape Verde",
            "France",
            "",
        ];
        let once = names.reconcile(raw);
        let twice = names.reconcile(once.iter().map(String::as_str));
        assert_eq!(once, twice);
    }

    #[test]
    fn chained_corrections_are_rejected() {
        let corrections = BTreeMap::from([
            ("A".to_string(), "B".to_string()),
            ("B".to_string(), "C".to_string()),
        ]);
        assert!(matches!(
            CanonicalNameMap::new(corrections),
            Err(EtlError::InvalidCorrections(_))
        ));

        let fixed_point = BTreeMap::from([
            ("A".to_string(), "B".to_string()),
            ("B".to_string(), "B".to_string()),
        ]);
        assert!(CanonicalNameMap::new(fixed_point).is_ok());
    }

    #[test]
    fn country_alias_is_detected() {
        let names = default_names();
        let aliases = default_aliases();
        let reconciler = Reconciler::new(&names, &aliases, &NoChooser);
        assert_eq!(
            reconciler.country_column(&population_table()).unwrap(),
            "Country/Territory"
        );
        assert_eq!(reconciler.country_column(&case_table()).unwrap(), "Country");
    }

    #[test]
    fn missing_country_column_names_table() {
        let names = default_names();
        let aliases = default_aliases();
        let reconciler = Reconciler::new(&names, &aliases, &NoChooser);
        let table = Table::new(
            TableKind::Population,
            df!("Land" => &["France"], "2022 Population" => &[1i64]).unwrap(),
        );
        match reconciler.country_column(&table) {
            Err(EtlError::MissingColumn {
                table,
                column,
                available,
            }) => {
                assert_eq!(table, TableKind::Population);
                assert_eq!(column, "Country");
                assert_eq!(available, vec!["Land", "2022 Population"]);
            }
            other => panic!("expected MissingColumn, got {other:?}"),
        }
    }

    struct RecordingChooser {
        answer: Option<String>,
        requests: RefCell<Vec<ColumnRequest>>,
    }

    impl ColumnChooser for RecordingChooser {
        fn choose_column(&self, request: &ColumnRequest) -> anyhow::Result<Option<String>> {
            self.requests.borrow_mut().push(request.clone());
            Ok(self.answer.clone())
        }
    }

    #[test]
    fn chooser_supplies_missing_column() {
        let names = default_names();
        let aliases = default_aliases();
        let chooser = RecordingChooser {
            answer: Some("Land".into()),
            requests: RefCell::new(vec![]),
        };
        let reconciler = Reconciler::new(&names, &aliases, &chooser);
        let table = Table::new(
            TableKind::Population,
            df!("Land" => &["Burma"], "2022 Population" => &[54_000_000i64]).unwrap(),
        );
        let reconciled = reconciler.population_records(&table).unwrap();
        assert_eq!(reconciled.records[0].country_name, "Myanmar");

        let requests = chooser.requests.borrow();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].table, TableKind::Population);
        assert_eq!(requests[0].wanted, "Country");
    }

    #[test]
    fn chooser_answer_must_exist() {
        let names = default_names();
        let aliases = default_aliases();
        let chooser = RecordingChooser {
            answer: Some("Nope".into()),
            requests: RefCell::new(vec![]),
        };
        let reconciler = Reconciler::new(&names, &aliases, &chooser);
        let table = Table::new(TableKind::Cases, df!("Land" => &["Burma"]).unwrap());
        assert!(matches!(
            reconciler.country_column(&table),
            Err(EtlError::MissingColumn { ref column, .. }) if column == "Nope"
        ));
    }

    #[test]
    fn fixed_columns_only_answer_for_their_table() {
        let fixed = FixedColumns {
            population_country: None,
            cases_country: Some("Land".into()),
        };
        let request = |table| ColumnRequest {
            table,
            wanted: COL::COUNTRY.into(),
            available: vec!["Land".into()],
        };
        assert_eq!(
            fixed.choose_column(&request(TableKind::Cases)).unwrap(),
            Some("Land".into())
        );
        assert_eq!(
            fixed.choose_column(&request(TableKind::Population)).unwrap(),
            None
        );
        assert_eq!(
            (fixed.clone(), NoChooser)
                .choose_column(&request(TableKind::Cases))
                .unwrap(),
            Some("Land".into())
        );
    }

    #[test]
    fn both_tables_use_the_same_mapping() {
        let names = default_names();
        let aliases = default_aliases();
        let reconciler = Reconciler::new(&names, &aliases, &NoChooser);

        let population = reconciler.population_records(&population_table()).unwrap();
        assert_eq!(
            population
                .records
                .iter()
                .map(|r| r.country_name.as_str())
                .collect::<Vec<_>>(),
            vec!["United States", "Myanmar", "France"]
        );

        let cases = reconciler.case_records(&case_table()).unwrap();
        assert_eq!(cases.dropped_without_country, 1);
        assert_eq!(cases.records.len(), 2);
        assert!(cases
            .records
            .iter()
            .all(|r| r.country_name == "United States"));
        assert_eq!(cases.records[1].confirmed, CountCell::Count(2000));
        assert_eq!(cases.records[1].row, 1);
    }

    #[test]
    fn case_cells_are_kept_as_read() {
        let names = default_names();
        let aliases = default_aliases();
        let reconciler = Reconciler::new(&names, &aliases, &NoChooser);
        let table = Table::new(
            TableKind::Cases,
            df!(
                "Date" => &[Some("2021-01-01"), None, Some("2021-01-03")],
                "Country" => &["France", "Atlantis", "France"],
                "Confirmed" => &[Some("5"), None, Some("1000.7")]
            )
            .unwrap(),
        );
        let cases = reconciler.case_records(&table).unwrap();
        assert_eq!(cases.records.len(), 3);
        assert_eq!(cases.records[1].date, None);
        assert_eq!(cases.records[1].confirmed, CountCell::Missing);
        assert_eq!(
            cases.records[2].confirmed,
            CountCell::Invalid("1000.7".into())
        );
    }

    #[test]
    fn float_confirmed_column_is_not_truncated() {
        let names = default_names();
        let aliases = default_aliases();
        let reconciler = Reconciler::new(&names, &aliases, &NoChooser);
        let table = Table::new(
            TableKind::Cases,
            df!(
                "Date" => &["2021-01-01", "2021-01-02"],
                "Country" => &["France", "France"],
                "Confirmed" => &[5.0f64, 1000.7]
            )
            .unwrap(),
        );
        let cases = reconciler.case_records(&table).unwrap();
        assert_eq!(cases.records[0].confirmed, CountCell::Count(5));
        assert!(matches!(cases.records[1].confirmed, CountCell::Invalid(_)));
    }

    #[test]
    fn population_cells_are_parsed_strictly() {
        let names = default_names();
        let aliases = default_aliases();
        let reconciler = Reconciler::new(&names, &aliases, &NoChooser);
        let table = Table::new(
            TableKind::Population,
            df!(
                "Country" => &["France", "Atlantis", "United States", "Lemuria"],
                "2022 Population" => &[Some("67000000"), Some("unknown"), Some("331,000,000"), None]
            )
            .unwrap(),
        );
        let reconciled = reconciler.population_records(&table).unwrap();
        let cells: Vec<_> = reconciled
            .records
            .iter()
            .map(|r| r.population_2022.clone())
            .collect();
        assert_eq!(
            cells,
            vec![
                CountCell::Count(67_000_000),
                CountCell::Invalid("unknown".into()),
                CountCell::Invalid("331,000,000".into()),
                CountCell::Missing,
            ]
        );
    }
}
