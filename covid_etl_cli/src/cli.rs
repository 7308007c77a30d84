use std::path::PathBuf;

use anyhow::anyhow;
use clap::{Args, Parser, Subcommand};
use covid_etl::{
    config::Config,
    formatters::{CSVFormatter, JSONFormatter, OutputFormatter, OutputGenerator},
    loader::{load_rate_table, summarize, InputPaths},
    rates::ZeroPopulationPolicy,
    reconcile::FixedColumns,
    records::rates_to_df,
    Pipeline,
};
use enum_dispatch::enum_dispatch;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use spinners::{Spinner, Spinners};
use strum_macros::EnumString;

use crate::display::{display_run_summary, display_table_summary, display_top_countries};
use crate::error::CliResult;
use crate::prompt::{select_input_files, PromptColumnChooser};

const DEFAULT_PROGRESS_SPINNER: Spinners = Spinners::Dots;
const COMPLETE_PROGRESS_STRING: &str = "✔";
const RUNNING_TAIL_STRING: &str = "...";
const HEAD_ROWS: usize = 5;

/// Defines the formats the rate table can be printed in.
#[derive(Clone, Debug, Deserialize, Serialize, EnumString, PartialEq, Eq)]
#[strum(ascii_case_insensitive)]
pub enum OutputFormat {
    Csv,
    Json,
}

impl From<&OutputFormat> for OutputFormatter {
    fn from(value: &OutputFormat) -> Self {
        match value {
            OutputFormat::Csv => OutputFormatter::Csv(CSVFormatter::default()),
            OutputFormat::Json => OutputFormatter::Json(JSONFormatter),
        }
    }
}

/// Trait that defines what to run when a given subcommand is invoked.
#[enum_dispatch]
pub trait RunCommand {
    fn run(&self, config: Config) -> CliResult<()>;
}

/// Where the two input tables come from.
#[derive(Args, Debug, Clone)]
struct InputArgs {
    #[arg(short = 'p', long, help = "Population table (CSV)")]
    population: Option<PathBuf>,
    #[arg(short = 'c', long, help = "COVID case time series (CSV)")]
    cases: Option<PathBuf>,
    #[arg(
        long,
        default_value = "data",
        help = "Directory offered for file selection in interactive mode"
    )]
    data_dir: PathBuf,
    #[arg(
        short = 'i',
        long,
        help = "Prompt for input files and for columns that cannot be found"
    )]
    interactive: bool,
}

impl InputArgs {
    fn input_paths(&self) -> CliResult<InputPaths> {
        if self.interactive {
            return select_input_files(&self.data_dir, self.population.clone(), self.cases.clone());
        }
        match (&self.population, &self.cases) {
            (Some(population), Some(cases)) => Ok(InputPaths {
                population: population.clone(),
                cases: cases.clone(),
            }),
            _ => Err(anyhow!(
                "Both --population and --cases are required unless --interactive is set"
            )
            .into()),
        }
    }
}

/// Explicit names for the country column of each table.
#[derive(Args, Debug, Clone)]
struct ColumnArgs {
    #[arg(
        long,
        value_name = "COLUMN NAME",
        help = "Country column of the population table"
    )]
    population_country_column: Option<String>,
    #[arg(
        long,
        value_name = "COLUMN NAME",
        help = "Country column of the COVID table"
    )]
    cases_country_column: Option<String>,
}

impl ColumnArgs {
    fn chooser(&self, interactive: bool) -> (FixedColumns, PromptColumnChooser) {
        (
            FixedColumns {
                population_country: self.population_country_column.clone(),
                cases_country: self.cases_country_column.clone(),
            },
            PromptColumnChooser {
                enabled: interactive,
            },
        )
    }
}

fn spinner(quiet: bool, message: &str) -> Option<Spinner> {
    (!quiet).then(|| {
        Spinner::with_timer(
            DEFAULT_PROGRESS_SPINNER,
            message.to_string() + RUNNING_TAIL_STRING,
        )
    })
}

/// The `explore` command prints the shape, head and distinct countries of each input table.
#[derive(Args, Debug)]
pub struct ExploreCommand {
    #[command(flatten)]
    input: InputArgs,
    #[command(flatten)]
    columns: ColumnArgs,
}

impl RunCommand for ExploreCommand {
    fn run(&self, config: Config) -> CliResult<()> {
        info!("Running `explore` subcommand");
        let paths = self.input.input_paths()?;
        let pipeline = Pipeline::new_with_config(config)?;
        let (population, cases) = pipeline.load(&paths)?;
        let chooser = self.columns.chooser(self.input.interactive);
        let reconciler = pipeline.reconciler(&chooser);
        for table in [&population, &cases] {
            let country_column = reconciler.country_column(table)?;
            let summary = summarize(table, &country_column)?;
            display_table_summary(&summary, &table.frame.head(Some(HEAD_ROWS)));
        }
        Ok(())
    }
}

/// The `run` command reconciles, merges and ranks the input tables, writing both output tables.
#[derive(Args, Debug)]
pub struct RunPipelineCommand {
    #[command(flatten)]
    input: InputArgs,
    #[command(flatten)]
    columns: ColumnArgs,
    #[arg(short = 'o', long, help = "Directory to write the output tables to")]
    output_dir: Option<PathBuf>,
    #[arg(short = 'n', long, help = "Number of countries to show")]
    top_n: Option<usize>,
    #[arg(
        long,
        value_name = "skip|error|nan",
        help = "How to treat rows with zero or missing population"
    )]
    zero_population: Option<ZeroPopulationPolicy>,
    #[arg(long, help = "Also print the rate table to stdout")]
    stdout: bool,
    #[arg(
        short = 'f',
        long,
        value_name = "csv|json",
        default_value = "csv",
        help = "Format of the rate table printed with --stdout"
    )]
    format: OutputFormat,
    #[arg(from_global)]
    quiet: bool,
}

impl RunPipelineCommand {
    fn apply(&self, mut config: Config) -> Config {
        if let Some(output_dir) = &self.output_dir {
            config.output_dir = output_dir.clone();
        }
        if let Some(top_n) = self.top_n {
            config.top_n = top_n;
        }
        if let Some(policy) = self.zero_population {
            config.zero_population = policy;
        }
        config
    }
}

impl RunCommand for RunPipelineCommand {
    fn run(&self, config: Config) -> CliResult<()> {
        info!("Running `run` subcommand");
        let config = self.apply(config);
        debug!("effective config: {config:?}");
        let paths = self.input.input_paths()?;
        let pipeline = Pipeline::new_with_config(config)?;
        let chooser = self.columns.chooser(self.input.interactive);

        // A spinner would garble the prompts
        let sp = spinner(self.quiet || self.input.interactive, "Running pipeline");
        let output = pipeline.run(&paths, &chooser)?;
        if let Some(mut s) = sp {
            s.stop_with_symbol(COMPLETE_PROGRESS_STRING);
        }

        display_run_summary(&output.merge_summary, &output.rate_summary);
        println!("Merged dataset saved to: {}", output.merged_path.display());
        println!("Rate table saved to: {}", output.rates_path.display());
        if self.stdout {
            let formatter: OutputFormatter = (&self.format).into();
            let mut stdout_lock = std::io::stdout().lock();
            formatter.save(&mut stdout_lock, &mut rates_to_df(&output.rates)?)?;
        }
        display_top_countries(&output.rates, pipeline.config.top_n);
        Ok(())
    }
}

/// The `report` command shows the highest ranked countries of a previously written rate table.
#[derive(Args, Debug)]
pub struct ReportCommand {
    #[arg(
        short = 'r',
        long,
        help = "Rate table to read, defaults to the one written by `run`"
    )]
    rates: Option<PathBuf>,
    #[arg(short = 'n', long, help = "Number of countries to show")]
    top_n: Option<usize>,
}

impl RunCommand for ReportCommand {
    fn run(&self, config: Config) -> CliResult<()> {
        info!("Running `report` subcommand");
        let path = self.rates.clone().unwrap_or_else(|| config.rates_path());
        let rates = load_rate_table(&path)?;
        if rates.is_empty() {
            println!("No rows in {}", path.display());
            return Ok(());
        }
        display_top_countries(&rates, self.top_n.unwrap_or(config.top_n));
        Ok(())
    }
}

/// The entrypoint for the CLI.
#[derive(Parser, Debug)]
#[command(version, about="Join COVID case counts with population figures and rank countries by cases per 100,000 inhabitants", long_about = None, name="covid-etl")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
    #[arg(
        short = 'q',
        long = "quiet",
        help = "\
            Do not print progress spinner to stdout. Prompts, results and logs (when `RUST_LOG`\n\
            is set) will still be printed.",
        global = true
    )]
    quiet: bool,
    #[arg(
        long,
        value_name = "FILE",
        help = "Config file, defaults to `covid-etl/config.toml` in the user config directory",
        global = true
    )]
    pub config: Option<PathBuf>,
}

/// Commands contains the list of subcommands available for use in the CLI.
/// Each command should implement the RunCommand trait and specify the list
/// of required args for that command.
#[derive(Subcommand, Debug)]
#[enum_dispatch(RunCommand)]
pub enum Commands {
    /// Print the shape, first rows and distinct countries of both input tables
    Explore(ExploreCommand),
    /// Merge the input tables, compute cases per 100k and write the results
    Run(RunPipelineCommand),
    /// Show the top countries of a rate table
    Report(ReportCommand),
}
