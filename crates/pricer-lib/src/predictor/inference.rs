//! Random-forest regression using smartcore
//!
//! Wraps the fitted forest together with the metadata that identifies it.
//! A `PriceModel` is immutable once fitted; retraining produces a new one.

use crate::error::TrainingError;
use crate::models::{FeatureVector, NUM_FEATURES};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use std::time::Instant;
use tracing::{debug, warn};

/// Maximum inference latency before warning
const MAX_INFERENCE_MS: u128 = 5;

type Forest = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// Forest hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: u16,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 10,
            min_samples_split: 5,
            min_samples_leaf: 2,
            seed: 42,
        }
    }
}

impl ForestParams {
    fn to_smartcore(&self) -> RandomForestRegressorParameters {
        RandomForestRegressorParameters::default()
            .with_n_trees(self.n_trees)
            .with_max_depth(self.max_depth)
            .with_min_samples_split(self.min_samples_split)
            .with_min_samples_leaf(self.min_samples_leaf)
            .with_seed(self.seed)
    }
}

/// Fitted price regressor plus identifying metadata
#[derive(Serialize, Deserialize)]
pub struct PriceModel {
    forest: Forest,
    generation: u64,
    trained_at: i64,
    training_rows: usize,
}

impl PriceModel {
    /// Fit a new forest on the full batch
    pub fn fit(
        features: &[FeatureVector],
        targets: &[f64],
        params: &ForestParams,
        generation: u64,
    ) -> Result<Self, TrainingError> {
        if features.is_empty() {
            return Err(TrainingError::EmptyBatch);
        }
        if features.len() != targets.len() {
            return Err(TrainingError::Fit(format!(
                "{} feature rows but {} targets",
                features.len(),
                targets.len()
            )));
        }

        let x = to_matrix(features).map_err(|e| TrainingError::Fit(e.to_string()))?;
        let y = targets.to_vec();

        let start = Instant::now();
        let forest = RandomForestRegressor::fit(&x, &y, params.to_smartcore())
            .map_err(|e| TrainingError::Fit(e.to_string()))?;

        debug!(
            rows = features.len(),
            n_trees = params.n_trees,
            elapsed_ms = start.elapsed().as_millis(),
            "Random forest fitted"
        );

        Ok(Self {
            forest,
            generation,
            trained_at: chrono::Utc::now().timestamp(),
            training_rows: features.len(),
        })
    }

    /// Raw regression output for one feature vector
    pub fn predict(&self, features: &FeatureVector) -> Result<f64> {
        let start = Instant::now();

        let x = to_matrix(std::slice::from_ref(features))?;
        let predictions = self
            .forest
            .predict(&x)
            .map_err(|e| anyhow::anyhow!("Prediction failed: {}", e))?;
        let value = *predictions.first().context("No prediction returned")?;

        let elapsed = start.elapsed();
        if elapsed.as_millis() > MAX_INFERENCE_MS {
            warn!(elapsed_ms = elapsed.as_millis(), "Inference exceeded {}ms target", MAX_INFERENCE_MS);
        } else {
            debug!(elapsed_us = elapsed.as_micros(), "Inference completed");
        }

        if !value.is_finite() {
            anyhow::bail!("Model produced non-finite output {}", value);
        }
        Ok(value)
    }

    /// Raw outputs for a batch, in input order
    pub fn predict_many(&self, features: &[FeatureVector]) -> Result<Vec<f64>> {
        if features.is_empty() {
            return Ok(Vec::new());
        }
        let x = to_matrix(features)?;
        self.forest
            .predict(&x)
            .map_err(|e| anyhow::anyhow!("Prediction failed: {}", e))
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn trained_at(&self) -> i64 {
        self.trained_at
    }

    pub fn training_rows(&self) -> usize {
        self.training_rows
    }

    /// Human-readable version label, e.g. `rf-g3`
    pub fn version(&self) -> String {
        format!("rf-g{}", self.generation)
    }
}

impl std::fmt::Debug for PriceModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceModel")
            .field("generation", &self.generation)
            .field("trained_at", &self.trained_at)
            .field("training_rows", &self.training_rows)
            .finish_non_exhaustive()
    }
}

fn to_matrix(features: &[FeatureVector]) -> Result<DenseMatrix<f64>> {
    let rows: Vec<Vec<f64>> = features.iter().map(|f| f.to_row().to_vec()).collect();
    debug_assert!(rows.iter().all(|r| r.len() == NUM_FEATURES));
    DenseMatrix::from_2d_vec(&rows).map_err(|e| anyhow::anyhow!("Matrix creation failed: {}", e))
}
