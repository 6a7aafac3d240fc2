//! Training command

use anyhow::{Context, Result};
use colored::Colorize;
use pricer_lib::{LabeledRow, PriceService, TrainingError};
use std::path::Path;
use std::sync::Arc;

use crate::output::{print_heading, print_json, print_success, OutputFormat};

/// Read labeled rows from a JSON array or a JSON lines file
pub fn read_rows(path: &Path) -> Result<Vec<LabeledRow>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read training data from {}", path.display()))?;

    if content.trim_start().starts_with('[') {
        return serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON array in {}", path.display()));
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("Failed to parse line {} of {}", idx + 1, path.display()))
        })
        .collect()
}

/// Retrain the model on a labeled batch and persist it
pub async fn train(service: &Arc<PriceService>, input: &Path, format: OutputFormat) -> Result<()> {
    let rows = read_rows(input)?;
    let old_version = service.model_version();

    let report = service
        .train_in_background(rows)
        .await
        .map_err(|e| TrainingError::Join(e.to_string()))
        .and_then(|result| result)
        .context("Training failed")?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            print_heading("Training Report");
            println!("Previous model:         {}", old_version);
            println!("New model:              {}", service.model_version().green());
            println!("Rows:                   {}", report.rows);
            println!(
                "Categories:             {} ({} new)",
                report.categories, report.new_categories
            );
            println!("RMSE (in-sample):       {:.4}", report.rmse);
            println!("R² (in-sample):         {:.4}", report.r2);
            println!("Duration:               {} ms", report.duration_ms);
            println!();
            print_success(&format!("Model generation {} persisted", report.generation));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricer_lib::PriceInput;
    use std::io::Write;

    #[test]
    fn test_read_json_array() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"historical_price": 100, "category": "phones", "price": 110}},
                {{"historical_price": "1,000 DT", "price": "990 DT"}}]"#
        )
        .unwrap();

        let rows = read_rows(file.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].category.as_deref(), Some("phones"));
        assert_eq!(rows[1].price, Some(PriceInput::Text("990 DT".to_string())));
        assert!(rows[1].price_mytech.is_none());
    }

    #[test]
    fn test_read_json_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"historical_price": 100, "price": 110}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"historical_price": 200, "price": 205}}"#).unwrap();

        let rows = read_rows(file.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].historical_price, Some(PriceInput::Number(200.0)));
    }

    #[test]
    fn test_bad_line_reports_position() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"price": 110}}"#).unwrap();
        writeln!(file, "not json").unwrap();

        let err = read_rows(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"));
    }
}
