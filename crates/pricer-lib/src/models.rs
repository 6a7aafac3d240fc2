//! Core data models for the price predictor

use serde::{Deserialize, Serialize};

/// Category used when the caller does not supply one
pub const DEFAULT_CATEGORY: &str = "electronics";

/// Number of features the regression model consumes
pub const NUM_FEATURES: usize = 8;

/// Feature names in model input order
pub const FEATURE_NAMES: [&str; NUM_FEATURES] = [
    "historical_price",
    "price_tunisianet",
    "price_mytech",
    "historical_discount",
    "price_diff_competitors",
    "price_ratio_competitors",
    "discount_impact",
    "category_encoded",
];

/// Feature vector for price inference and training
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureVector {
    pub historical_price: f64,
    pub price_tunisianet: f64,
    pub price_mytech: f64,
    pub historical_discount: f64,
    pub price_diff_competitors: f64,
    pub price_ratio_competitors: f64,
    pub discount_impact: f64,
    pub category_encoded: f64,
}

impl FeatureVector {
    /// Model input row, ordered as [`FEATURE_NAMES`]
    pub fn to_row(&self) -> [f64; NUM_FEATURES] {
        [
            self.historical_price,
            self.price_tunisianet,
            self.price_mytech,
            self.historical_discount,
            self.price_diff_competitors,
            self.price_ratio_competitors,
            self.discount_impact,
            self.category_encoded,
        ]
    }

    pub fn is_finite(&self) -> bool {
        self.to_row().iter().all(|v| v.is_finite())
    }
}

/// A price as supplied by callers: either already numeric or scraped text
/// such as `"1,299.000 DT"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PriceInput {
    Number(f64),
    Text(String),
}

impl From<f64> for PriceInput {
    fn from(value: f64) -> Self {
        PriceInput::Number(value)
    }
}

impl From<&str> for PriceInput {
    fn from(value: &str) -> Self {
        PriceInput::Text(value.to_string())
    }
}

impl From<String> for PriceInput {
    fn from(value: String) -> Self {
        PriceInput::Text(value)
    }
}

/// Prediction request coming from the product layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub input_price: Option<PriceInput>,
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

impl PredictionRequest {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            category: default_category(),
            input_price: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_price(mut self, price: impl Into<PriceInput>) -> Self {
        self.input_price = Some(price.into());
        self
    }
}

/// Labeled training record. Raw signal fields are optional and default to 0
/// when missing or unparseable; `price` is the ground-truth target.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabeledRow {
    #[serde(default)]
    pub historical_price: Option<PriceInput>,
    #[serde(default)]
    pub price_tunisianet: Option<PriceInput>,
    #[serde(default)]
    pub price_mytech: Option<PriceInput>,
    #[serde(default)]
    pub historical_discount: Option<PriceInput>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub price: Option<PriceInput>,
}

/// Where the returned price came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionSource {
    /// Regression output, clamped and rounded
    Model,
    /// Inference failed or no model is loaded; the anchor is returned as-is
    AnchorFallback,
}

impl PredictionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionSource::Model => "model",
            PredictionSource::AnchorFallback => "anchor_fallback",
        }
    }
}

/// Which clamp bound was applied to the raw model output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClampBound {
    Floor,
    Ceiling,
}

impl ClampBound {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClampBound::Floor => "floor",
            ClampBound::Ceiling => "ceiling",
        }
    }
}

/// Price prediction output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePrediction {
    pub price: f64,
    pub anchor: f64,
    pub source: PredictionSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clamp: Option<ClampBound>,
    pub model_version: String,
}

impl PricePrediction {
    pub fn is_fallback(&self) -> bool {
        self.source == PredictionSource::AnchorFallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_row_order() {
        let fv = FeatureVector {
            historical_price: 1.0,
            price_tunisianet: 2.0,
            price_mytech: 3.0,
            historical_discount: 4.0,
            price_diff_competitors: 5.0,
            price_ratio_competitors: 6.0,
            discount_impact: 7.0,
            category_encoded: 8.0,
        };
        assert_eq!(fv.to_row(), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        assert_eq!(FEATURE_NAMES.len(), NUM_FEATURES);
    }

    #[test]
    fn test_request_defaults_category() {
        let req: PredictionRequest = serde_json::from_str(r#"{"title": "Laptop"}"#).unwrap();
        assert_eq!(req.category, DEFAULT_CATEGORY);
        assert!(req.input_price.is_none());
        assert!(req.description.is_none());
    }

    #[test]
    fn test_price_input_accepts_number_or_text() {
        let row: LabeledRow =
            serde_json::from_str(r#"{"historical_price": 1200, "price": "1 350 DT"}"#).unwrap();
        assert_eq!(row.historical_price, Some(PriceInput::Number(1200.0)));
        assert_eq!(row.price, Some(PriceInput::Text("1 350 DT".to_string())));
        assert!(row.category.is_none());
    }

    #[test]
    fn test_prediction_serialization_skips_empty_fields() {
        let prediction = PricePrediction {
            price: 1000.0,
            anchor: 1000.0,
            source: PredictionSource::AnchorFallback,
            raw_output: None,
            clamp: None,
            model_version: "none".to_string(),
        };
        let json = serde_json::to_string(&prediction).unwrap();
        assert!(json.contains("\"anchor_fallback\""));
        assert!(!json.contains("raw_output"));
        assert!(prediction.is_fallback());
    }
}
