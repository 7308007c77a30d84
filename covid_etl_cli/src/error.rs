use covid_etl::error::EtlError;
use polars::error::PolarsError;

#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
    #[error("{0}")]
    EtlError(#[from] EtlError),
    #[error("polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("invalid TOML in config file: {0}")]
    TomlError(#[from] toml::de::Error),
    #[error("prompt error: {0}")]
    DialoguerError(#[from] dialoguer::Error),
    #[error("std IO error: {0}")]
    IOError(#[from] std::io::Error),
}

pub type CliResult<T> = Result<T, CliError>;
