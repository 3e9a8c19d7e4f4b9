//! Output formatting for price records and training results (table, JSON, markdown, CSV).

use crate::commands::train::TrainSummary;
use crate::config::OutputFormat;
use crate::dataset::FEATURE_NAMES;
use crate::normalizer::RegionPriceRecord;
use serde::Serialize;

/// Formats command results for output.
pub struct Formatter {
    format: OutputFormat,
}

impl Formatter {
    /// Creates a new formatter.
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats ranked price records.
    pub fn format_records(&self, records: &[RegionPriceRecord]) -> String {
        if records.is_empty() {
            return match self.format {
                OutputFormat::Json => "[]".to_string(),
                OutputFormat::Csv => RECORD_CSV_HEADER.to_string(),
                _ => "No prices found.".to_string(),
            };
        }

        match self.format {
            OutputFormat::Json => json(records, "[]"),
            OutputFormat::Table => self.table_records(records),
            OutputFormat::Markdown => self.markdown_records(records),
            OutputFormat::Csv => csv_rows(records),
        }
    }

    /// Formats the result of a training run.
    pub fn format_training(&self, summary: &TrainSummary) -> String {
        match self.format {
            OutputFormat::Json => json(summary, "{}"),
            OutputFormat::Table => self.table_training(summary),
            OutputFormat::Markdown => self.markdown_training(summary),
            OutputFormat::Csv => self.csv_training(summary),
        }
    }

    // Table formatting

    fn table_records(&self, records: &[RegionPriceRecord]) -> String {
        let mut lines = Vec::new();

        lines.push(format!(
            "{:<4}  {:<16}  {:<8}  {:>12}  {:>10}  {:>10}",
            "Code", "Country", "Currency", "Price", "PPP", "USD (PPP)"
        ));
        lines.push(format!(
            "{:-<4}  {:-<16}  {:-<8}  {:-<12}  {:-<10}  {:-<10}",
            "", "", "", "", "", ""
        ));

        for record in records {
            lines.push(format!(
                "{:<4}  {:<16}  {:<8}  {:>12.2}  {:>10}  {:>10}",
                record.region_code().as_str(),
                record.region_code().name().unwrap_or("-"),
                record.currency(),
                record.observed_price(),
                optional(record.ppp_factor(), 3),
                optional(record.adjusted_price(), 2),
            ));
        }

        lines.push(String::new());
        lines.push(format!("Total: {} regions", records.len()));

        lines.join("\n")
    }

    fn table_training(&self, s: &TrainSummary) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Game:      {}", s.game));
        lines.push(format!("Year:      {}", s.year));
        lines.push(format!("Samples:   {}", s.model.samples));
        lines.push(format!("R²:        {:.4}", s.model.r_squared));
        lines.push(format!("Intercept: {:.6}", s.model.intercept));
        for (name, coef) in FEATURE_NAMES.iter().zip(&s.model.coefficients) {
            lines.push(format!("  {:<16} {:.6}", name, coef));
        }
        lines.push(format!("Output:    {}", s.output.display()));

        lines.join("\n")
    }

    // Markdown formatting

    fn markdown_records(&self, records: &[RegionPriceRecord]) -> String {
        let mut lines = Vec::new();

        lines.push("| Region | Currency | Price | PPP | USD (PPP) |".to_string());
        lines.push("|--------|----------|-------|-----|-----------|".to_string());

        for record in records {
            let region = match record.region_code().name() {
                Some(name) => format!("{} ({})", name, record.region_code()),
                None => record.region_code().to_string(),
            };
            lines.push(format!(
                "| {} | {} | {:.2} | {} | {} |",
                region,
                record.currency(),
                record.observed_price(),
                optional(record.ppp_factor(), 3),
                optional(record.adjusted_price(), 2),
            ));
        }

        lines.push(String::new());
        lines.push(format!("*{} regions*", records.len()));

        lines.join("\n")
    }

    fn markdown_training(&self, s: &TrainSummary) -> String {
        let mut lines = Vec::new();

        lines.push(format!("## {} ({})", s.game, s.year));
        lines.push(String::new());
        lines.push(format!("- **Samples:** {}", s.model.samples));
        lines.push(format!("- **R²:** {:.4}", s.model.r_squared));
        lines.push(format!("- **Training file:** `{}`", s.output.display()));
        lines.push(String::new());
        lines.push("| Term | Coefficient |".to_string());
        lines.push("|------|-------------|".to_string());
        lines.push(format!("| intercept | {:.6} |", s.model.intercept));
        for (name, coef) in FEATURE_NAMES.iter().zip(&s.model.coefficients) {
            lines.push(format!("| {} | {:.6} |", name, coef));
        }

        lines.join("\n")
    }

    // CSV formatting

    fn csv_training(&self, s: &TrainSummary) -> String {
        let mut lines = vec!["term,coefficient".to_string()];
        lines.push(format!("intercept,{}", s.model.intercept));
        for (name, coef) in FEATURE_NAMES.iter().zip(&s.model.coefficients) {
            lines.push(format!("{},{}", name, coef));
        }
        lines.join("\n")
    }
}

const RECORD_CSV_HEADER: &str = "region_code,currency,observed_price,ppp_factor,adjusted_price";

fn json<T: Serialize + ?Sized>(value: &T, fallback: &str) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| fallback.to_string())
}

fn csv_rows<T: Serialize>(rows: &[T]) -> String {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        if writer.serialize(row).is_err() {
            return String::new();
        }
    }
    writer
        .into_inner()
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .map(|s| s.trim_end().to_string())
        .unwrap_or_default()
}

fn optional(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", decimals, v),
        None => "N/A".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regression::LinearModel;
    use std::path::PathBuf;

    fn record(code: &str, currency: &str, price: f64, ppp: Option<f64>) -> RegionPriceRecord {
        RegionPriceRecord::new(code.parse().unwrap(), currency, price, ppp)
    }

    fn make_records() -> Vec<RegionPriceRecord> {
        vec![record("US", "USD", 59.99, Some(1.0)), record("PL", "PLN", 199.0, Some(1.8))]
    }

    fn make_summary() -> TrainSummary {
        TrainSummary {
            game: "Cyberpunk_2077".to_string(),
            year: 2023,
            output: PathBuf::from("combined_train_2023_Cyberpunk_2077.csv"),
            model: LinearModel {
                coefficients: vec![-1.5, 0.0004, 0.25],
                intercept: 42.0,
                r_squared: 0.8123,
                samples: 17,
            },
        }
    }

    #[test]
    fn test_table_records() {
        let output = Formatter::new(OutputFormat::Table).format_records(&make_records());

        assert!(output.contains("Code"));
        assert!(output.contains("USD (PPP)"));
        assert!(output.contains("United States"));
        assert!(output.contains("Poland"));
        assert!(output.contains("199.00"));
        assert!(output.contains("110.56"));
        assert!(output.contains("1.800"));
        assert!(output.contains("Total: 2 regions"));
    }

    #[test]
    fn test_table_missing_ppp() {
        let output = Formatter::new(OutputFormat::Table)
            .format_records(&[record("XK", "EUR", 10.0, None)]);

        assert!(output.contains("XK"));
        assert!(output.contains("N/A"));
    }

    #[test]
    fn test_json_records() {
        let output = Formatter::new(OutputFormat::Json).format_records(&make_records());
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value[0]["region_code"], "US");
        assert_eq!(value[1]["adjusted_price"], 110.56);
    }

    #[test]
    fn test_markdown_records() {
        let output = Formatter::new(OutputFormat::Markdown).format_records(&make_records());

        assert!(output.starts_with("| Region |"));
        assert!(output.contains("| Poland (PL) | PLN | 199.00 | 1.800 | 110.56 |"));
        assert!(output.contains("*2 regions*"));
    }

    #[test]
    fn test_csv_records() {
        let output = Formatter::new(OutputFormat::Csv)
            .format_records(&[record("US", "USD", 59.99, Some(1.0)), record("XK", "EUR", 9.5, None)]);

        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], RECORD_CSV_HEADER);
        assert_eq!(lines[1], "US,USD,59.99,1.0,59.99");
        assert_eq!(lines[2], "XK,EUR,9.5,,");
    }

    #[test]
    fn test_empty_records() {
        assert_eq!(Formatter::new(OutputFormat::Json).format_records(&[]), "[]");
        assert_eq!(Formatter::new(OutputFormat::Csv).format_records(&[]), RECORD_CSV_HEADER);
        assert_eq!(Formatter::new(OutputFormat::Table).format_records(&[]), "No prices found.");
        assert_eq!(Formatter::new(OutputFormat::Markdown).format_records(&[]), "No prices found.");
    }

    #[test]
    fn test_training_table() {
        let output = Formatter::new(OutputFormat::Table).format_training(&make_summary());

        assert!(output.contains("Game:      Cyberpunk_2077"));
        assert!(output.contains("Samples:   17"));
        assert!(output.contains("R²:        0.8123"));
        assert!(output.contains("gdp_per_capita"));
        assert!(output.contains("42.000000"));
    }

    #[test]
    fn test_training_markdown_and_csv() {
        let md = Formatter::new(OutputFormat::Markdown).format_training(&make_summary());
        assert!(md.starts_with("## Cyberpunk_2077 (2023)"));
        assert!(md.contains("| inflation | 0.250000 |"));

        let csv = Formatter::new(OutputFormat::Csv).format_training(&make_summary());
        assert_eq!(csv, "term,coefficient\nintercept,42\nppp,-1.5\ngdp_per_capita,0.0004\ninflation,0.25");
    }

    #[test]
    fn test_training_json() {
        let output = Formatter::new(OutputFormat::Json).format_training(&make_summary());
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["model"]["samples"], 17);
        assert_eq!(value["game"], "Cyberpunk_2077");
    }
}
