//! Model training on labeled batches
//!
//! Preprocesses rows through the same feature derivation used at inference,
//! fits a fresh forest on the whole batch and reports in-sample fit quality.
//! No I/O happens here; persisting and swapping the result is the caller's
//! job (see [`crate::service::PriceService::update_model`]).

use crate::encoder::{CategoryEncoder, UNKNOWN_CATEGORY};
use crate::error::TrainingError;
use crate::models::{FeatureVector, LabeledRow, PriceInput, DEFAULT_CATEGORY};
use crate::predictor::{
    clean_price, FeatureBuilder, ForestParams, PriceModel, RawSignals, DEFAULT_DISCOUNT,
    MYTECH_MARKUP, TUNISIANET_MARKUP,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Anchors of the synthetic rows used to bootstrap a model
pub const SEED_ANCHORS: [f64; 3] = [1000.0, 2000.0, 3000.0];

/// Summary of a completed training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub generation: u64,
    pub rows: usize,
    pub categories: usize,
    pub new_categories: usize,
    /// In-sample root mean squared error
    pub rmse: f64,
    /// In-sample coefficient of determination
    pub r2: f64,
    pub duration_ms: u64,
}

/// Output of [`Trainer::fit`]: a model and the encoder it was trained with
#[derive(Debug)]
pub struct TrainedModel {
    pub model: PriceModel,
    pub encoder: CategoryEncoder,
    pub report: TrainingReport,
}

/// Fits price models from labeled rows
#[derive(Debug, Clone, Default)]
pub struct Trainer {
    builder: FeatureBuilder,
    params: ForestParams,
}

impl Trainer {
    pub fn new(params: ForestParams) -> Self {
        Self {
            builder: FeatureBuilder::new(),
            params,
        }
    }

    pub fn with_builder(builder: FeatureBuilder, params: ForestParams) -> Self {
        Self { builder, params }
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    /// Turn rows into feature vectors and targets, registering any new
    /// categories in `encoder`.
    pub fn preprocess(
        &self,
        rows: &[LabeledRow],
        encoder: &mut CategoryEncoder,
    ) -> Result<(Vec<FeatureVector>, Vec<f64>), TrainingError> {
        if rows.is_empty() {
            return Err(TrainingError::EmptyBatch);
        }

        let mut features = Vec::with_capacity(rows.len());
        let mut targets = Vec::with_capacity(rows.len());

        for (idx, row) in rows.iter().enumerate() {
            let target = parse_target(idx, row.price.as_ref())?;
            let category = row.category.as_deref().unwrap_or(UNKNOWN_CATEGORY);
            let code = encoder.fit_encode(category);

            let fv = self.builder.derive(RawSignals::from_row(row), code);
            if !fv.is_finite() {
                return Err(TrainingError::InvalidFeatures { row: idx });
            }

            features.push(fv);
            targets.push(target);
        }

        debug!(rows = features.len(), categories = encoder.len(), "Training batch preprocessed");
        Ok((features, targets))
    }

    /// Fit a forest on already preprocessed features and score it in-sample
    pub fn fit_prepared(
        &self,
        features: &[FeatureVector],
        targets: &[f64],
        generation: u64,
    ) -> Result<(PriceModel, FitQuality), TrainingError> {
        let model = PriceModel::fit(features, targets, &self.params, generation)?;
        let fitted = model
            .predict_many(features)
            .map_err(|e| TrainingError::Fit(format!("{:#}", e)))?;
        let quality = FitQuality::measure(targets, &fitted);
        Ok((model, quality))
    }

    /// Fit a new model. `base_encoder` is copied and extended; it is never
    /// modified, so a failed fit leaves the caller's state untouched.
    pub fn fit(
        &self,
        rows: &[LabeledRow],
        base_encoder: &CategoryEncoder,
        generation: u64,
    ) -> Result<TrainedModel, TrainingError> {
        let start = Instant::now();
        let mut encoder = base_encoder.clone();

        let (features, targets) = self.preprocess(rows, &mut encoder)?;
        let (model, quality) = self.fit_prepared(&features, &targets, generation)?;

        let report = TrainingReport {
            generation,
            rows: features.len(),
            categories: encoder.len(),
            new_categories: encoder.len() - base_encoder.len(),
            rmse: quality.rmse,
            r2: quality.r2,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            generation = generation,
            rows = report.rows,
            rmse = report.rmse,
            r2 = report.r2,
            "Model fitted"
        );

        Ok(TrainedModel {
            model,
            encoder,
            report,
        })
    }
}

/// Synthetic rows spanning a small price range in the default category.
/// Competitor prices follow the same markups used at inference.
pub fn seed_rows() -> Vec<LabeledRow> {
    SEED_ANCHORS
        .iter()
        .map(|&anchor| LabeledRow {
            historical_price: Some(PriceInput::Number(anchor)),
            price_tunisianet: Some(PriceInput::Number(anchor * TUNISIANET_MARKUP)),
            price_mytech: Some(PriceInput::Number(anchor * MYTECH_MARKUP)),
            historical_discount: Some(PriceInput::Number(DEFAULT_DISCOUNT)),
            category: Some(DEFAULT_CATEGORY.to_string()),
            price: Some(PriceInput::Number(anchor)),
        })
        .collect()
}

fn parse_target(row: usize, price: Option<&PriceInput>) -> Result<f64, TrainingError> {
    let input = price.ok_or(TrainingError::MissingTarget { row })?;
    let value = clean_price(input);
    if !value.is_finite() || value < 0.0 {
        let raw = match input {
            PriceInput::Number(n) => n.to_string(),
            PriceInput::Text(t) => t.clone(),
        };
        return Err(TrainingError::InvalidTarget { row, value: raw });
    }
    Ok(value)
}

/// In-sample fit quality of a trained model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitQuality {
    pub rmse: f64,
    pub r2: f64,
}

impl FitQuality {
    fn measure(targets: &[f64], fitted: &[f64]) -> Self {
        let n = targets.len() as f64;
        let mean = targets.iter().sum::<f64>() / n;
        let ss_res: f64 = targets
            .iter()
            .zip(fitted)
            .map(|(y, f)| (y - f).powi(2))
            .sum();
        let ss_tot: f64 = targets.iter().map(|y| (y - mean).powi(2)).sum();

        let r2 = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else if ss_res == 0.0 {
            1.0
        } else {
            0.0
        };
        Self {
            rmse: (ss_res / n).sqrt(),
            r2,
        }
    }
}
