use comfy_table::{presets::NOTHING, *};
use covid_etl::loader::TableSummary;
use covid_etl::merge::MergeSummary;
use covid_etl::rates::{RateSummary, DATE_FORMAT};
use covid_etl::records::RateRecord;
use polars::frame::DataFrame;

const BAR_WIDTH: usize = 40;
const BAR_CHAR: char = '█';

fn styled_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_style(comfy_table::TableComponent::BottomBorder, '─')
        .set_style(comfy_table::TableComponent::MiddleHeaderIntersections, '─')
        .set_style(comfy_table::TableComponent::HeaderLines, '─')
        .set_style(comfy_table::TableComponent::BottomBorderIntersections, '─')
        .set_style(comfy_table::TableComponent::TopBorder, '─')
        .set_style(comfy_table::TableComponent::TopBorderIntersections, '─');
    table
}

/// Bar proportional to `rate / max`, empty for NaN or a non-positive maximum.
fn bar(rate: f64, max: f64) -> String {
    if !rate.is_finite() || !max.is_finite() || max <= 0.0 {
        return String::new();
    }
    let len = ((rate / max) * BAR_WIDTH as f64).round().clamp(0.0, BAR_WIDTH as f64) as usize;
    BAR_CHAR.to_string().repeat(len)
}

/// Table of the first `top_n` rows of an already ranked rate table, with a text bar chart.
pub fn top_countries_table(rates: &[RateRecord], top_n: usize) -> Table {
    let top = &rates[..top_n.min(rates.len())];
    let max = top
        .iter()
        .map(|r| r.cases_per_100k)
        .filter(|r| r.is_finite())
        .fold(0.0_f64, f64::max);

    let mut table = styled_table();
    table.set_header(vec![
        Cell::new("#").add_attribute(Attribute::Bold),
        Cell::new("Country").add_attribute(Attribute::Bold),
        Cell::new("Date").add_attribute(Attribute::Bold),
        Cell::new("Confirmed").add_attribute(Attribute::Bold),
        Cell::new("2022 Population").add_attribute(Attribute::Bold),
        Cell::new("Cases per 100k").add_attribute(Attribute::Bold),
        Cell::new("").add_attribute(Attribute::Bold),
    ]);
    for (rank, record) in top.iter().enumerate() {
        table.add_row(vec![
            Cell::new(rank + 1),
            Cell::new(&record.country_name),
            Cell::new(record.date.format(DATE_FORMAT)),
            Cell::new(record.confirmed),
            Cell::new(
                record
                    .population_2022
                    .map(|p| p.to_string())
                    .unwrap_or_default(),
            ),
            Cell::new(format!("{:.2}", record.cases_per_100k)),
            Cell::new(bar(record.cases_per_100k, max)).fg(Color::Green),
        ]);
    }
    for idx in [0, 3, 4, 5] {
        if let Some(column) = table.column_mut(idx) {
            column.set_cell_alignment(CellAlignment::Right);
        }
    }
    table
}

pub fn display_top_countries(rates: &[RateRecord], top_n: usize) {
    let shown = top_n.min(rates.len());
    println!(
        "\nTop {shown} Countries with Highest COVID-19 Cases per 100,000 Inhabitants"
    );
    println!("{}", top_countries_table(rates, top_n));
    if let Some(top) = rates.first() {
        println!(
            "\nTop country: {} with {:.2} cases per 100k",
            top.country_name, top.cases_per_100k
        );
    }
}

pub fn display_table_summary(summary: &TableSummary, head: &DataFrame) {
    println!("\n=== {} Data ===", summary.kind);
    println!("Shape: ({}, {})", summary.rows, summary.columns);
    println!("{head}");
    println!("Countries in {} data: {}", summary.kind, summary.distinct_countries);
}

pub fn display_run_summary(merge: &MergeSummary, rates: &RateSummary) {
    let mut table = styled_table();
    table
        .add_row(vec![
            Cell::new("Rows merged").add_attribute(Attribute::Bold),
            Cell::new(merge.merged_rows),
        ])
        .add_row(vec![
            Cell::new("Case rows without population").add_attribute(Attribute::Bold),
            Cell::new(merge.unmatched_case_rows),
        ])
        .add_row(vec![
            Cell::new("Countries without population").add_attribute(Attribute::Bold),
            Cell::new(
                merge
                    .unmatched_case_countries
                    .iter()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
        ])
        .add_row(vec![
            Cell::new("Duplicate population rows").add_attribute(Attribute::Bold),
            Cell::new(merge.duplicate_population_rows),
        ])
        .add_row(vec![
            Cell::new("Rows skipped (no population)").add_attribute(Attribute::Bold),
            Cell::new(rates.skipped_rows),
        ])
        .add_row(vec![
            Cell::new("Countries analyzed").add_attribute(Attribute::Bold),
            Cell::new(rates.countries),
        ]);
    if let Some(column) = table.column_mut(0) {
        column.set_cell_alignment(CellAlignment::Right);
    }
    println!("\n{table}");
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn record(country: &str, rate: f64) -> RateRecord {
        RateRecord {
            country_name: country.into(),
            date: NaiveDate::from_ymd_opt(2021, 1, 2).unwrap(),
            confirmed: 1,
            population_2022: Some(100_000),
            cases_per_100k: rate,
        }
    }

    #[test]
    fn bar_scales_to_maximum() {
        assert_eq!(bar(10.0, 10.0).chars().count(), BAR_WIDTH);
        assert_eq!(bar(5.0, 10.0).chars().count(), BAR_WIDTH / 2);
        assert_eq!(bar(0.0, 10.0), "");
        assert_eq!(bar(f64::NAN, 10.0), "");
        assert_eq!(bar(1.0, 0.0), "");
    }

    #[test]
    fn top_table_is_truncated_to_top_n() {
        let rates = vec![
            record("Andorra", 11274.81),
            record("United States", 0.6),
            record("Myanmar", 0.05),
        ];
        let rendered = top_countries_table(&rates, 2).to_string();
        assert!(rendered.contains("Andorra"));
        assert!(rendered.contains("0.60"));
        assert!(!rendered.contains("Myanmar"));

        let all = top_countries_table(&rates, 10).to_string();
        assert!(all.contains("Myanmar"));
    }
}
