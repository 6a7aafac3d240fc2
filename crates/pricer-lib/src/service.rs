//! Price prediction service
//!
//! `PriceService` is constructed once at process start and shared by
//! reference (usually behind an `Arc`). Inference takes read locks only;
//! training is serialized and swaps the model/encoder pair after the new
//! artifacts are on disk.

use crate::encoder::{CategoryEncoder, UnseenCategoryPolicy};
use crate::error::TrainingError;
use crate::models::{
    FeatureVector, LabeledRow, PriceInput, PricePrediction, PredictionRequest, PredictionSource,
};
use crate::observability::{PricerMetrics, StructuredLogger};
use crate::predictor::{
    ClampConfig, FeatureBuilder, FeatureConfig, ForestParams, OutputFormatter, PriceModel,
};
use crate::store::{ModelOrigin, ModelStore, StoreConfig};
use crate::trainer::{Trainer, TrainingReport};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::debug;

/// Version label reported when no model is loaded
pub const NO_MODEL_VERSION: &str = "none";

/// Everything needed to construct a [`PriceService`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub store: StoreConfig,
    pub features: FeatureConfig,
    pub clamp: ClampConfig,
    pub forest: ForestParams,
    pub unseen_category: UnseenCategoryPolicy,
}

/// A category and its code, for reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCode {
    pub label: String,
    pub code: u32,
}

/// Snapshot of the serving model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelStatus {
    pub model_version: String,
    pub generation: Option<u64>,
    pub trained_at: Option<i64>,
    pub training_rows: Option<usize>,
    pub origin: String,
    pub encoder_version: u64,
    pub categories: Vec<CategoryCode>,
    pub model_path: PathBuf,
}

/// Price predictor service
pub struct PriceService {
    store: ModelStore,
    builder: FeatureBuilder,
    formatter: OutputFormatter,
    trainer: Trainer,
    policy: UnseenCategoryPolicy,
    model: RwLock<Option<Arc<PriceModel>>>,
    encoder: RwLock<CategoryEncoder>,
    origin: RwLock<ModelOrigin>,
    train_lock: Mutex<()>,
    metrics: PricerMetrics,
    logger: StructuredLogger,
}

impl PriceService {
    /// Build the service, loading the persisted model or bootstrapping one.
    /// Never fails.
    pub fn new(config: ServiceConfig) -> Self {
        let builder = FeatureBuilder::with_config(config.features);
        let trainer = Trainer::with_builder(builder.clone(), config.forest);
        let store = ModelStore::new(config.store);
        let logger = StructuredLogger::new("price_service");
        let metrics = PricerMetrics::new();

        let loaded = store.load_or_bootstrap(&trainer);
        if let ModelOrigin::Bootstrapped { reason } = &loaded.origin {
            logger.log_bootstrap(reason);
        }

        let version = loaded
            .model
            .as_ref()
            .map(|m| m.version())
            .unwrap_or_else(|| NO_MODEL_VERSION.to_string());
        logger.log_model_ready(loaded.origin.as_str(), &version, loaded.encoder.len());
        metrics.set_model_state(
            loaded.model.as_ref().map(|m| m.generation()).unwrap_or(0),
            loaded.encoder.len(),
        );

        Self {
            store,
            builder,
            formatter: OutputFormatter::with_config(config.clamp),
            trainer,
            policy: config.unseen_category,
            model: RwLock::new(loaded.model.map(Arc::new)),
            encoder: RwLock::new(loaded.encoder),
            origin: RwLock::new(loaded.origin),
            train_lock: Mutex::new(()),
            metrics,
            logger,
        }
    }

    /// Predict a price. Never fails: on any inference problem the anchor
    /// price is returned and the result is tagged `AnchorFallback`.
    pub fn predict(&self, request: &PredictionRequest) -> PricePrediction {
        let start = Instant::now();
        let anchor = self.builder.resolve_anchor(request.input_price.as_ref());

        debug!(
            title = %request.title,
            description = ?request.description,
            category = %request.category,
            input_price = ?request.input_price,
            anchor = anchor,
            "Predicting price"
        );

        let prediction = match self.infer(anchor, &request.category) {
            Ok((raw, model_version)) => {
                let outcome = self.formatter.format(raw, anchor);
                PricePrediction {
                    price: outcome.price,
                    anchor,
                    source: PredictionSource::Model,
                    raw_output: Some(raw),
                    clamp: outcome.bound,
                    model_version,
                }
            }
            Err(e) => {
                self.logger.log_inference_error(&request.title, &e);
                PricePrediction {
                    price: anchor,
                    anchor,
                    source: PredictionSource::AnchorFallback,
                    raw_output: None,
                    clamp: None,
                    model_version: self.model_version(),
                }
            }
        };

        self.metrics
            .observe_prediction(&prediction, start.elapsed().as_secs_f64());
        self.logger
            .log_prediction(&request.title, &request.category, &prediction);
        prediction
    }

    /// Numeric-only form used by the product layer
    pub fn predict_price(
        &self,
        title: &str,
        description: Option<&str>,
        category: &str,
        input_price: Option<PriceInput>,
    ) -> f64 {
        let request = PredictionRequest {
            title: title.to_string(),
            description: description.map(str::to_string),
            category: category.to_string(),
            input_price,
        };
        self.predict(&request).price
    }

    /// Predict each request independently, preserving order
    pub fn predict_batch(&self, requests: &[PredictionRequest]) -> Vec<PricePrediction> {
        requests.iter().map(|r| self.predict(r)).collect()
    }

    /// Feature vector the model would see for this input. Unseen categories
    /// are reported with the `unknown` code and not registered.
    pub fn features_for(&self, category: &str, input_price: Option<&PriceInput>) -> FeatureVector {
        let anchor = self.builder.resolve_anchor(input_price);
        let code = self
            .encoder
            .read()
            .map(|enc| enc.encode_or_unknown(category))
            .unwrap_or(0);
        self.builder.from_anchor(anchor, code)
    }

    /// Retrain on a labeled batch, persist, then swap the serving model.
    ///
    /// On error the previously persisted model and the serving model are
    /// left as they were.
    pub fn update_model(&self, rows: &[LabeledRow]) -> Result<TrainingReport, TrainingError> {
        let result = self.train_locked(rows);
        match &result {
            Ok(report) => {
                self.metrics.inc_training_runs();
                self.metrics.set_model_state(report.generation, report.categories);
            }
            Err(e) => {
                self.metrics.inc_training_failures();
                self.logger.log_training_failure(&self.model_version(), e);
            }
        }
        result
    }

    /// Run [`update_model`](Self::update_model) on tokio's blocking pool
    pub fn train_in_background(
        self: &Arc<Self>,
        rows: Vec<LabeledRow>,
    ) -> JoinHandle<Result<TrainingReport, TrainingError>> {
        let service = Arc::clone(self);
        tokio::task::spawn_blocking(move || service.update_model(&rows))
    }

    /// Current model and encoder state
    pub fn status(&self) -> ModelStatus {
        let model = self.current_model().ok().flatten();
        let (encoder_version, categories) = match self.encoder.read() {
            Ok(enc) => (
                enc.version(),
                enc.categories()
                    .into_iter()
                    .map(|(label, code)| CategoryCode { label, code })
                    .collect(),
            ),
            Err(_) => (0, Vec::new()),
        };
        let origin = self
            .origin
            .read()
            .map(|o| o.as_str().to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        ModelStatus {
            model_version: model
                .as_ref()
                .map(|m| m.version())
                .unwrap_or_else(|| NO_MODEL_VERSION.to_string()),
            generation: model.as_ref().map(|m| m.generation()),
            trained_at: model.as_ref().map(|m| m.trained_at()),
            training_rows: model.as_ref().map(|m| m.training_rows()),
            origin,
            encoder_version,
            categories,
            model_path: self.store.model_path(),
        }
    }

    pub fn model_version(&self) -> String {
        self.current_model()
            .ok()
            .flatten()
            .map(|m| m.version())
            .unwrap_or_else(|| NO_MODEL_VERSION.to_string())
    }

    fn current_model(&self) -> Result<Option<Arc<PriceModel>>> {
        let guard = self
            .model
            .read()
            .map_err(|e| anyhow::anyhow!("Lock poisoned: {}", e))?;
        Ok(guard.clone())
    }

    fn infer(&self, anchor: f64, category: &str) -> Result<(f64, String)> {
        let model = self.current_model()?.context("No model loaded")?;
        let code = self.category_code(category)?;
        let features = self.builder.from_anchor(anchor, code);
        let raw = model.predict(&features)?;
        Ok((raw, model.version()))
    }

    fn category_code(&self, category: &str) -> Result<u32> {
        {
            let encoder = self
                .encoder
                .read()
                .map_err(|e| anyhow::anyhow!("Lock poisoned: {}", e))?;
            if let Ok(code) = encoder.encode(category) {
                return Ok(code);
            }
            if self.policy == UnseenCategoryPolicy::MapToUnknown {
                return Ok(encoder.encode_or_unknown(category));
            }
        }

        let mut encoder = self
            .encoder
            .write()
            .map_err(|e| anyhow::anyhow!("Lock poisoned: {}", e))?;
        let before = encoder.version();
        let code = encoder.fit_encode(category);
        if encoder.version() != before {
            self.logger
                .log_category_extended(category, code, encoder.version());
        }
        Ok(code)
    }

    fn train_locked(&self, rows: &[LabeledRow]) -> Result<TrainingReport, TrainingError> {
        let start = Instant::now();
        let _guard = self
            .train_lock
            .lock()
            .map_err(|e| TrainingError::LockPoisoned(e.to_string()))?;

        let old_version = self.model_version();
        let generation = self
            .current_model()
            .map_err(|e| TrainingError::LockPoisoned(e.to_string()))?
            .map(|m| m.generation() + 1)
            .unwrap_or(1);

        // The encoder write lock is held until the new pair is live, so no
        // code is handed out by inference while the candidate extends it.
        let mut live = self
            .encoder
            .write()
            .map_err(|e| TrainingError::LockPoisoned(e.to_string()))?;
        let mut candidate = live.clone();
        let (features, targets) = self.trainer.preprocess(rows, &mut candidate)?;
        let new_categories = candidate.len() - live.len();

        let (model, quality) = self.trainer.fit_prepared(&features, &targets, generation)?;
        self.store
            .save(&model, &candidate)
            .map_err(TrainingError::Persist)?;

        {
            let mut serving = self
                .model
                .write()
                .map_err(|e| TrainingError::LockPoisoned(e.to_string()))?;
            *serving = Some(Arc::new(model));
        }
        let categories = candidate.len();
        *live = candidate;
        drop(live);

        if let Ok(mut origin) = self.origin.write() {
            *origin = ModelOrigin::Trained;
        }

        let report = TrainingReport {
            generation,
            rows: features.len(),
            categories,
            new_categories,
            rmse: quality.rmse,
            r2: quality.r2,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        self.logger.log_training(&old_version, &report);
        Ok(report)
    }
}
