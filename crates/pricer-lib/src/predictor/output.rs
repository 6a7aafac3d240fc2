//! Prediction output post-processing
//!
//! Bounds raw model output relative to the anchor price and rounds it to
//! currency precision.

use crate::models::ClampBound;
use serde::{Deserialize, Serialize};

/// Lowest price allowed, as a fraction of the anchor
pub const FLOOR_RATIO: f64 = 0.8;

/// Highest price allowed, as a multiple of the anchor
pub const CEILING_RATIO: f64 = 1.5;

/// Decimal places kept in the returned price
pub const PRICE_DECIMALS: u32 = 2;

/// Configuration for the business-rule clamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClampConfig {
    pub floor_ratio: f64,
    pub ceiling_ratio: f64,
    pub decimals: u32,
}

impl Default for ClampConfig {
    fn default() -> Self {
        Self {
            floor_ratio: FLOOR_RATIO,
            ceiling_ratio: CEILING_RATIO,
            decimals: PRICE_DECIMALS,
        }
    }
}

impl ClampConfig {
    /// Reject ratios that leave no valid price range
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.floor_ratio.is_finite() || !self.ceiling_ratio.is_finite() {
            anyhow::bail!("Clamp ratios must be finite");
        }
        if self.floor_ratio < 0.0 {
            anyhow::bail!("floor_ratio {} must not be negative", self.floor_ratio);
        }
        if self.floor_ratio > self.ceiling_ratio {
            anyhow::bail!(
                "floor_ratio {} is above ceiling_ratio {}",
                self.floor_ratio,
                self.ceiling_ratio
            );
        }
        Ok(())
    }
}

/// Result of clamping one raw output
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClampOutcome {
    pub price: f64,
    pub bound: Option<ClampBound>,
}

/// Applies the anchor-relative clamp and rounding
#[derive(Debug, Clone, Default)]
pub struct OutputFormatter {
    config: ClampConfig,
}

impl OutputFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ClampConfig) -> Self {
        Self { config }
    }

    /// Price bounds for an anchor
    pub fn bounds(&self, anchor: f64) -> (f64, f64) {
        (anchor * self.config.floor_ratio, anchor * self.config.ceiling_ratio)
    }

    /// Pull `raw` into the anchor bounds, then round. The rounded price is
    /// kept inside the bounds by rounding them inward; when no rounded value
    /// fits between them the clamped price is returned unrounded.
    pub fn format(&self, raw: f64, anchor: f64) -> ClampOutcome {
        let (floor, ceiling) = self.bounds(anchor);

        let (clamped, bound) = if raw < floor {
            (floor, Some(ClampBound::Floor))
        } else if raw > ceiling {
            (ceiling, Some(ClampBound::Ceiling))
        } else {
            (raw, None)
        };

        let inner_floor = self.scaled(floor, f64::ceil);
        let inner_ceiling = self.scaled(ceiling, f64::floor);
        let price = if inner_floor <= inner_ceiling {
            self.round(clamped)
                .max(inner_floor)
                .min(inner_ceiling)
                .max(floor)
                .min(ceiling)
        } else {
            clamped
        };

        ClampOutcome { price, bound }
    }

    /// Round to the configured number of decimals
    pub fn round(&self, value: f64) -> f64 {
        self.scaled(value, f64::round)
    }

    /// Apply `op` at the configured precision. Values too large to scale
    /// have no fractional part left and are returned as is.
    fn scaled(&self, value: f64, op: fn(f64) -> f64) -> f64 {
        let factor = 10f64.powi(self.config.decimals as i32);
        let scaled = value * factor;
        if !scaled.is_finite() {
            return value;
        }
        op(scaled) / factor
    }
}
