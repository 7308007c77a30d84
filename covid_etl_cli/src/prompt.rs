//! Interactive collaborators: choosing input files from a data directory and choosing a column
//! when a table has no recognisable country column.

use std::path::{Path, PathBuf};

use anyhow::anyhow;
use covid_etl::loader::{list_csv_files, InputPaths};
use covid_etl::reconcile::{ColumnChooser, ColumnRequest};
use dialoguer::Select;
use log::info;

use crate::error::CliResult;

const ABORT_ITEM: &str = "(none, abort)";

/// Asks on the terminal which column to use. Disabled choosers always decline.
#[derive(Clone, Copy, Debug, Default)]
pub struct PromptColumnChooser {
    pub enabled: bool,
}

impl ColumnChooser for PromptColumnChooser {
    fn choose_column(&self, request: &ColumnRequest) -> anyhow::Result<Option<String>> {
        if !self.enabled {
            return Ok(None);
        }
        let items: Vec<&str> = request
            .available
            .iter()
            .map(String::as_str)
            .chain([ABORT_ITEM])
            .collect();
        let idx = Select::new()
            .with_prompt(format!(
                "{} table has no '{}' column, select the column to use",
                request.table, request.wanted
            ))
            .items(&items)
            .default(0)
            .interact()?;
        Ok(request.available.get(idx).cloned())
    }
}

/// Display names for the files, relative to `dir` where possible.
fn file_items(dir: &Path, files: &[PathBuf]) -> Vec<String> {
    files
        .iter()
        .map(|file| {
            file.strip_prefix(dir)
                .unwrap_or(file)
                .to_string_lossy()
                .to_string()
        })
        .collect()
}

/// Prompt for the population and case tables among the CSV files of `dir`. Either path may be
/// given already, in which case only the other is asked for.
pub fn select_input_files(
    dir: &Path,
    population: Option<PathBuf>,
    cases: Option<PathBuf>,
) -> CliResult<InputPaths> {
    let files = list_csv_files(dir)?;
    if files.is_empty() {
        return Err(anyhow!("No CSV files found in {}", dir.display()).into());
    }
    let items = file_items(dir, &files);
    let select = |prompt: &str| -> CliResult<PathBuf> {
        let idx = Select::new()
            .with_prompt(prompt)
            .items(&items)
            .default(0)
            .interact()?;
        info!("Selected {}", files[idx].display());
        Ok(files[idx].clone())
    };
    let population = match population {
        Some(path) => path,
        None => select("Select the population data")?,
    };
    let cases = match cases {
        Some(path) => path,
        None => select("Select the COVID data")?,
    };
    Ok(InputPaths { population, cases })
}
