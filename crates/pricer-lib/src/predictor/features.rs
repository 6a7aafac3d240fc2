//! Feature construction for price inference and training
//!
//! Both inference and training go through [`FeatureBuilder::derive`], so the
//! model never sees features computed two different ways. At inference time
//! the raw signals are synthesized from the anchor price using fixed
//! competitor markups; at training time they come from the labeled row.

use crate::models::{FeatureVector, LabeledRow, PriceInput};
use serde::{Deserialize, Serialize};

/// Anchor used when the caller supplies no usable price
pub const DEFAULT_ANCHOR_PRICE: f64 = 1000.0;

/// Competitor A markup over the anchor
pub const TUNISIANET_MARKUP: f64 = 1.10;

/// Competitor B markup over the anchor
pub const MYTECH_MARKUP: f64 = 1.05;

/// Discount assumed when none is known
pub const DEFAULT_DISCOUNT: f64 = 0.10;

/// Configuration for feature construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub default_anchor: f64,
    pub tunisianet_markup: f64,
    pub mytech_markup: f64,
    pub default_discount: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            default_anchor: DEFAULT_ANCHOR_PRICE,
            tunisianet_markup: TUNISIANET_MARKUP,
            mytech_markup: MYTECH_MARKUP,
            default_discount: DEFAULT_DISCOUNT,
        }
    }
}

/// Raw price signals before derived features are computed
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawSignals {
    pub historical_price: f64,
    pub price_tunisianet: f64,
    pub price_mytech: f64,
    pub historical_discount: f64,
}

impl RawSignals {
    /// Signals from a labeled row; missing or unparseable fields become 0
    pub fn from_row(row: &LabeledRow) -> Self {
        Self {
            historical_price: price_or_zero(row.historical_price.as_ref()),
            price_tunisianet: price_or_zero(row.price_tunisianet.as_ref()),
            price_mytech: price_or_zero(row.price_mytech.as_ref()),
            historical_discount: price_or_zero(row.historical_discount.as_ref()),
        }
    }
}

/// Builds feature vectors from anchors or raw signals
#[derive(Debug, Clone, Default)]
pub struct FeatureBuilder {
    config: FeatureConfig,
}

impl FeatureBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FeatureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Anchor price: the parsed input if it is a finite non-negative number
    /// whose synthesized features are finite, otherwise the configured default.
    pub fn resolve_anchor(&self, input: Option<&PriceInput>) -> f64 {
        input
            .map(clean_price)
            .filter(|p| p.is_finite() && *p >= 0.0)
            .filter(|p| self.from_anchor(*p, 0).is_finite())
            .unwrap_or(self.config.default_anchor)
    }

    /// Raw signals synthesized from an anchor price
    pub fn signals_from_anchor(&self, anchor: f64) -> RawSignals {
        RawSignals {
            historical_price: anchor,
            price_tunisianet: anchor * self.config.tunisianet_markup,
            price_mytech: anchor * self.config.mytech_markup,
            historical_discount: self.config.default_discount,
        }
    }

    /// Full feature vector for an anchor price and category code
    pub fn from_anchor(&self, anchor: f64, category_code: u32) -> FeatureVector {
        self.derive(self.signals_from_anchor(anchor), category_code)
    }

    /// Derived features over raw signals. This is the single place the
    /// model's input schema is computed.
    pub fn derive(&self, raw: RawSignals, category_code: u32) -> FeatureVector {
        let denominator = if raw.price_mytech == 0.0 {
            1.0
        } else {
            raw.price_mytech
        };

        FeatureVector {
            historical_price: raw.historical_price,
            price_tunisianet: raw.price_tunisianet,
            price_mytech: raw.price_mytech,
            historical_discount: raw.historical_discount,
            price_diff_competitors: raw.price_tunisianet - raw.price_mytech,
            price_ratio_competitors: raw.price_tunisianet / denominator,
            discount_impact: raw.historical_discount * raw.historical_price,
            category_encoded: category_code as f64,
        }
    }
}

/// Normalize a numeric or textual price to `f64`.
///
/// Strips currency markers, thousands separators and (non-breaking) spaces.
/// Returns `NaN` for anything that still does not parse.
pub fn clean_price(input: &PriceInput) -> f64 {
    match input {
        PriceInput::Number(value) => *value,
        PriceInput::Text(text) => parse_price_text(text),
    }
}

const CURRENCY_MARKERS: &[&str] = &["TND", "DT", "€", "$"];

fn parse_price_text(text: &str) -> f64 {
    let mut cleaned = text.to_string();
    for marker in CURRENCY_MARKERS {
        cleaned = cleaned.replace(marker, "");
    }
    let cleaned: String = cleaned
        .chars()
        .filter(|c| !matches!(c, ',' | '\u{a0}' | '\u{202f}') && !c.is_whitespace())
        .collect();

    if cleaned.is_empty() {
        return f64::NAN;
    }
    cleaned.parse::<f64>().unwrap_or(f64::NAN)
}

fn price_or_zero(input: Option<&PriceInput>) -> f64 {
    input
        .map(clean_price)
        .filter(|p| p.is_finite())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_anchor_1000_scenario() {
        let builder = FeatureBuilder::new();
        let fv = builder.from_anchor(1000.0, 1);

        assert!(approx(fv.historical_price, 1000.0));
        assert!(approx(fv.price_tunisianet, 1100.0));
        assert!(approx(fv.price_mytech, 1050.0));
        assert!(approx(fv.historical_discount, 0.10));
        assert!(approx(fv.price_diff_competitors, 50.0));
        assert!((fv.price_ratio_competitors - 1.047_619).abs() < 1e-6);
        assert!(approx(fv.discount_impact, 100.0));
        assert_eq!(fv.category_encoded, 1.0);
    }

    #[test]
    fn test_missing_price_matches_explicit_default() {
        let builder = FeatureBuilder::new();
        let defaulted = builder.from_anchor(builder.resolve_anchor(None), 1);
        let explicit = builder.from_anchor(
            builder.resolve_anchor(Some(&PriceInput::Number(1000.0))),
            1,
        );
        assert_eq!(defaulted, explicit);
    }

    #[test]
    fn test_unparseable_price_uses_default_anchor() {
        let builder = FeatureBuilder::new();
        for bad in ["", "abc", "DT", "12..5", "n/a"] {
            let anchor = builder.resolve_anchor(Some(&PriceInput::from(bad)));
            assert_eq!(anchor, DEFAULT_ANCHOR_PRICE, "input {:?}", bad);
        }
        assert_eq!(
            builder.resolve_anchor(Some(&PriceInput::Number(f64::NAN))),
            DEFAULT_ANCHOR_PRICE
        );
        assert_eq!(
            builder.resolve_anchor(Some(&PriceInput::Number(-5.0))),
            DEFAULT_ANCHOR_PRICE
        );
    }

    #[test]
    fn test_overflowing_anchor_uses_default() {
        let builder = FeatureBuilder::new();
        assert_eq!(
            builder.resolve_anchor(Some(&PriceInput::Number(1e307))),
            1e307
        );
        // 1.1 × anchor overflows to infinity
        assert_eq!(
            builder.resolve_anchor(Some(&PriceInput::Number(f64::MAX))),
            DEFAULT_ANCHOR_PRICE
        );
    }

    #[test]
    fn test_ratio_finite_for_zero_anchor() {
        let builder = FeatureBuilder::new();
        let fv = builder.from_anchor(0.0, 0);
        assert!(fv.price_ratio_competitors.is_finite());
        assert_eq!(fv.price_ratio_competitors, 0.0);
        assert!(fv.is_finite());
    }

    #[test]
    fn test_ratio_finite_across_anchors() {
        let builder = FeatureBuilder::new();
        for anchor in [0.0, 1e-9, 0.5, 1.0, 999.99, 1e6, 1e12] {
            let fv = builder.from_anchor(anchor, 3);
            assert!(fv.price_ratio_competitors.is_finite(), "anchor {}", anchor);
        }
    }

    #[test]
    fn test_clean_price_variants() {
        assert_eq!(clean_price(&PriceInput::from("1,299.000 DT")), 1299.0);
        assert_eq!(clean_price(&PriceInput::from("1\u{a0}299 DT")), 1299.0);
        assert_eq!(clean_price(&PriceInput::from(" 450 TND ")), 450.0);
        assert_eq!(clean_price(&PriceInput::from("$19.99")), 19.99);
        assert_eq!(clean_price(&PriceInput::Number(12.5)), 12.5);
        assert!(clean_price(&PriceInput::from("price on request")).is_nan());
    }

    #[test]
    fn test_row_signals_default_to_zero() {
        let row = LabeledRow {
            historical_price: Some(PriceInput::from("800 DT")),
            price_tunisianet: Some(PriceInput::from("n/a")),
            price: Some(PriceInput::Number(820.0)),
            ..Default::default()
        };
        let raw = RawSignals::from_row(&row);
        assert_eq!(raw.historical_price, 800.0);
        assert_eq!(raw.price_tunisianet, 0.0);
        assert_eq!(raw.price_mytech, 0.0);
        assert_eq!(raw.historical_discount, 0.0);

        let fv = FeatureBuilder::new().derive(raw, 2);
        assert_eq!(fv.price_ratio_competitors, 0.0);
        assert_eq!(fv.discount_impact, 0.0);
    }

    #[test]
    fn test_training_and_inference_share_derivation() {
        let builder = FeatureBuilder::new();
        let row = LabeledRow {
            historical_price: Some(PriceInput::Number(1000.0)),
            price_tunisianet: Some(PriceInput::Number(1100.0)),
            price_mytech: Some(PriceInput::Number(1050.0)),
            historical_discount: Some(PriceInput::Number(0.10)),
            ..Default::default()
        };
        let from_row = builder.derive(RawSignals::from_row(&row), 4);
        let from_anchor = builder.from_anchor(1000.0, 4);
        for (a, b) in from_row.to_row().iter().zip(from_anchor.to_row().iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }
}
