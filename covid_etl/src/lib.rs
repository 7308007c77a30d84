use std::path::PathBuf;

use log::{debug, info, warn};

use crate::config::Config;
use crate::error::EtlResult;
use crate::formatters::write_csv;
use crate::loader::{InputPaths, Table};
use crate::merge::MergeSummary;
use crate::rates::RateSummary;
use crate::reconcile::{CanonicalNameMap, ColumnChooser, Reconciler};
use crate::records::{MergedRecord, RateRecord};

// Re-exports
pub use column_names as COL;

// Modules
pub mod column_names;
pub mod config;
pub mod error;
pub mod formatters;
pub mod loader;
pub mod merge;
pub mod rates;
pub mod reconcile;
pub mod records;

/// Everything produced by one pipeline run.
#[derive(Debug)]
pub struct PipelineOutput {
    pub merged: Vec<MergedRecord>,
    pub rates: Vec<RateRecord>,
    pub merge_summary: MergeSummary,
    pub rate_summary: RateSummary,
    pub merged_path: PathBuf,
    pub rates_path: PathBuf,
}

/// The join + rate pipeline, configured once and run over a pair of input tables
pub struct Pipeline {
    pub config: Config,
    pub names: CanonicalNameMap,
}

impl Pipeline {
    /// Setup the pipeline with default configuration
    pub fn new() -> EtlResult<Self> {
        Self::new_with_config(Config::default())
    }

    /// Setup the pipeline with custom configuration. Fails if the correction table is chained.
    pub fn new_with_config(config: Config) -> EtlResult<Self> {
        debug!("config: {config:?}");
        let names = CanonicalNameMap::new(config.corrections.clone())?;
        if names.is_empty() {
            warn!("No country name corrections configured, names must match exactly");
        } else {
            info!("Using {} country name corrections", names.len());
        }
        Ok(Self { config, names })
    }

    pub fn reconciler<'a>(&'a self, chooser: &'a dyn ColumnChooser) -> Reconciler<'a> {
        Reconciler::new(&self.names, &self.config.country_aliases, chooser)
    }

    /// Load both input tables, failing before any read if either path is missing
    pub fn load(&self, paths: &InputPaths) -> EtlResult<(Table, Table)> {
        loader::load_inputs(paths)
    }

    /// Reconcile and merge already loaded tables
    pub fn merge_tables(
        &self,
        population: &Table,
        cases: &Table,
        chooser: &dyn ColumnChooser,
    ) -> EtlResult<(Vec<MergedRecord>, MergeSummary)> {
        let reconciler = self.reconciler(chooser);
        let population = reconciler.population_records(population)?;
        let cases = reconciler.case_records(cases)?;
        info!(
            "Reconciled {} population rows and {} case rows",
            population.records.len(),
            cases.records.len()
        );
        merge::merge(&cases.records, &population.records)
    }

    /// Run every step and write the merged and rate tables under `config.output_dir`
    pub fn run(&self, paths: &InputPaths, chooser: &dyn ColumnChooser) -> EtlResult<PipelineOutput> {
        let (population, cases) = self.load(paths)?;

        let (merged, merge_summary) = self.merge_tables(&population, &cases, chooser)?;
        let merged_path = self.config.merged_path();
        write_csv(&merged_path, &mut records::merged_to_df(&merged)?)?;
        info!("Merged dataset saved to: {}", merged_path.display());

        let (rates, rate_summary) =
            rates::calculate_per_capita(&merged, self.config.zero_population)?;
        let rates_path = self.config.rates_path();
        write_csv(&rates_path, &mut records::rates_to_df(&rates)?)?;
        info!("Rate table saved to: {}", rates_path.display());

        Ok(PipelineOutput {
            merged,
            rates,
            merge_summary,
            rate_summary,
            merged_path,
            rates_path,
        })
    }
}
