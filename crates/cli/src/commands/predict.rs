//! Prediction and feature inspection commands

use anyhow::Result;
use colored::Colorize;
use pricer_lib::{PredictionRequest, PriceInput, PriceService, FEATURE_NAMES};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{
    color_label, format_price, print_heading, print_json, print_table, print_warning, OutputFormat,
};

/// Row for the feature table
#[derive(Tabled)]
struct FeatureRow {
    #[tabled(rename = "Feature")]
    name: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Serialize)]
struct FeaturesOutput<'a> {
    category: &'a str,
    input_price: Option<&'a PriceInput>,
    features: pricer_lib::FeatureVector,
}

/// Command-line prices are passed through as text; the feature builder
/// normalizes them the same way as prices coming from scraped listings.
pub fn parse_price_arg(price: Option<String>) -> Option<PriceInput> {
    price.map(PriceInput::Text)
}

/// Predict a price for one product
pub fn predict(service: &PriceService, request: &PredictionRequest, format: OutputFormat) -> Result<()> {
    let prediction = service.predict(request);

    match format {
        OutputFormat::Json => print_json(&prediction)?,
        OutputFormat::Table => {
            print_heading("Price Prediction");
            println!("Title:                  {}", request.title);
            if let Some(description) = &request.description {
                println!("Description:            {}", description.dimmed());
            }
            println!("Category:               {}", request.category.cyan());
            println!("Anchor:                 {}", format_price(prediction.anchor));
            println!();
            println!(
                "{}                  {}",
                "Price:".bold(),
                format_price(prediction.price).green().bold()
            );
            println!("Source:                 {}", color_label(prediction.source.as_str()));
            if let Some(raw) = prediction.raw_output {
                println!("Raw model output:       {}", format_price(raw));
            }
            if let Some(bound) = prediction.clamp {
                println!("Clamped to:             {}", bound.as_str().yellow());
            }
            println!("Model:                  {}", prediction.model_version);

            if prediction.is_fallback() {
                println!();
                print_warning("Model inference failed; the anchor price was returned unchanged");
            }
        }
    }

    Ok(())
}

/// Show the feature vector the model would see for an input
pub fn features(
    service: &PriceService,
    category: &str,
    input_price: Option<PriceInput>,
    format: OutputFormat,
) -> Result<()> {
    let fv = service.features_for(category, input_price.as_ref());

    match format {
        OutputFormat::Json => print_json(&FeaturesOutput {
            category,
            input_price: input_price.as_ref(),
            features: fv,
        })?,
        OutputFormat::Table => {
            let rows: Vec<FeatureRow> = FEATURE_NAMES
                .into_iter()
                .zip(fv.to_row())
                .map(|(name, value)| FeatureRow {
                    name,
                    value: format!("{:.4}", value),
                })
                .collect();

            print_heading("Feature Vector");
            println!("Category:               {}", category.cyan());
            println!();
            print_table(&rows);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_price_arg() {
        assert_eq!(parse_price_arg(None), None);
        assert_eq!(
            parse_price_arg(Some("1,299.000 DT".to_string())),
            Some(PriceInput::Text("1,299.000 DT".to_string()))
        );
    }
}
