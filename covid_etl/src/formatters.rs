use std::io::{Cursor, Write};

use anyhow::Result;
use enum_dispatch::enum_dispatch;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Decimal places used for floats unless a formatter says otherwise. Rates are rounded to two
/// places, so this keeps e.g. `0.60` rather than `0.6` in the written table.
pub const DEFAULT_FLOAT_PRECISION: usize = 2;

/// Trait to define different output generators. Defines two
/// functions, format which generates a serialized string of the
/// `DataFrame` and save which writes it to any writer
#[enum_dispatch]
pub trait OutputGenerator {
    fn save(&self, writer: &mut impl Write, df: &mut DataFrame) -> Result<()>;
    fn format(&self, df: &mut DataFrame) -> Result<String> {
        // Just creating an empty vec to store the buffered output
        let mut data: Vec<u8> = vec![];
        let mut buff = Cursor::new(&mut data);
        self.save(&mut buff, df)?;

        Ok(String::from_utf8(data)?)
    }
}

/// Enum of OutputFormatters one for each potential
/// output type
#[enum_dispatch(OutputGenerator)]
#[derive(Serialize, Deserialize, Debug)]
pub enum OutputFormatter {
    Csv(CSVFormatter),
    Json(JSONFormatter),
}

/// Format the results as a headered CSV file
#[derive(Serialize, Deserialize, Debug)]
pub struct CSVFormatter {
    pub float_precision: Option<usize>,
}

impl Default for CSVFormatter {
    fn default() -> Self {
        Self {
            float_precision: Some(DEFAULT_FLOAT_PRECISION),
        }
    }
}

impl OutputGenerator for CSVFormatter {
    fn save(&self, writer: &mut impl Write, df: &mut DataFrame) -> Result<()> {
        CsvWriter::new(writer)
            .include_header(true)
            .with_float_precision(self.float_precision)
            .finish(df)?;
        Ok(())
    }
}

/// Format the results as a JSON array with one object per row
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct JSONFormatter;

impl OutputGenerator for JSONFormatter {
    fn save(&self, writer: &mut impl Write, df: &mut DataFrame) -> Result<()> {
        JsonWriter::new(writer)
            .with_json_format(JsonFormat::Json)
            .finish(df)?;
        Ok(())
    }
}

/// Write `df` to a new file at `path` as CSV, creating parent directories as needed.
pub fn write_csv(path: &std::path::Path, df: &mut DataFrame) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut f = std::fs::File::create(path)?;
    CSVFormatter::default().save(&mut f, df)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_df() -> DataFrame {
        df!(
             "Country" => &["United States", "France"],
             "Confirmed" => &[2000i64, 3],
             "Cases_per_100k" => &[0.6, 12.5]
        )
        .unwrap()
    }

    #[test]
    fn csv_formatter_should_work() {
        let formatter = CSVFormatter::default();
        let mut df = test_df();
        let output = formatter.format(&mut df);
        let correct_str = [
            "Country,Confirmed,Cases_per_100k",
            "United States,2000,0.60",
            "France,3,12.50",
            "",
        ]
        .join("\n");

        assert!(output.is_ok(), "Output should not error");
        assert_eq!(output.unwrap(), correct_str, "Output should be correct");
    }

    #[test]
    fn json_formatter_should_work() {
        let formatter: OutputFormatter = JSONFormatter.into();
        let mut df = test_df();
        let output = formatter.format(&mut df).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        let rows = value.as_array().expect("JSON output should be an array");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["Country"], "United States");
        assert_eq!(rows[1]["Confirmed"], 3);
        assert_eq!(rows[1]["Cases_per_100k"], 12.5);
    }

    #[test]
    fn write_csv_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.csv");
        write_csv(&path, &mut test_df()).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("Country,Confirmed,Cases_per_100k\n"));
    }
}
