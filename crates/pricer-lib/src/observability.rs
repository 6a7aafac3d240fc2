//! Observability infrastructure for the price predictor
//!
//! Provides:
//! - Prometheus metrics (prediction latency, prediction sources, clamps, training runs)
//! - Structured event logging with tracing

use crate::models::{PricePrediction, PredictionSource};
use crate::trainer::TrainingReport;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<PricerMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct PricerMetricsInner {
    prediction_latency_seconds: Histogram,
    predictions_total: IntCounterVec,
    clamps_total: IntCounterVec,
    training_runs_total: IntCounter,
    training_failures_total: IntCounter,
    model_generation: IntGauge,
    known_categories: IntGauge,
}

impl PricerMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram!(
                "pricer_prediction_latency_seconds",
                "Time spent building features and running price inference",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            predictions_total: register_int_counter_vec!(
                "pricer_predictions_total",
                "Predictions returned, by source",
                &["source"]
            )
            .expect("Failed to register predictions_total"),

            clamps_total: register_int_counter_vec!(
                "pricer_clamps_total",
                "Model outputs pulled into the anchor bounds, by bound",
                &["bound"]
            )
            .expect("Failed to register clamps_total"),

            training_runs_total: register_int_counter!(
                "pricer_training_runs_total",
                "Successful training runs"
            )
            .expect("Failed to register training_runs_total"),

            training_failures_total: register_int_counter!(
                "pricer_training_failures_total",
                "Failed training runs"
            )
            .expect("Failed to register training_failures_total"),

            model_generation: register_int_gauge!(
                "pricer_model_generation",
                "Generation of the model currently serving predictions"
            )
            .expect("Failed to register model_generation"),

            known_categories: register_int_gauge!(
                "pricer_known_categories",
                "Number of categories known to the encoder"
            )
            .expect("Failed to register known_categories"),
        }
    }
}

/// Pricer metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct PricerMetrics {
    _private: (),
}

impl Default for PricerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PricerMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(PricerMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &PricerMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    /// Record one prediction: latency, source and clamp bound
    pub fn observe_prediction(&self, prediction: &PricePrediction, duration_secs: f64) {
        let inner = self.inner();
        inner.prediction_latency_seconds.observe(duration_secs);
        inner
            .predictions_total
            .with_label_values(&[prediction.source.as_str()])
            .inc();
        if let Some(bound) = prediction.clamp {
            inner.clamps_total.with_label_values(&[bound.as_str()]).inc();
        }
    }

    pub fn inc_training_runs(&self) {
        self.inner().training_runs_total.inc();
    }

    pub fn inc_training_failures(&self) {
        self.inner().training_failures_total.inc();
    }

    /// Update the serving model generation and encoder size
    pub fn set_model_state(&self, generation: u64, categories: usize) {
        self.inner().model_generation.set(generation as i64);
        self.inner().known_categories.set(categories as i64);
    }

    pub fn predictions_by_source(&self, source: PredictionSource) -> u64 {
        self.inner()
            .predictions_total
            .with_label_values(&[source.as_str()])
            .get()
    }
}

/// Structured logger for pricer events
///
/// Emits consistently shaped records for predictions, model lifecycle and
/// training outcomes.
#[derive(Clone)]
pub struct StructuredLogger {
    component: String,
}

impl StructuredLogger {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }

    /// Log a returned price
    pub fn log_prediction(&self, title: &str, category: &str, prediction: &PricePrediction) {
        match prediction.source {
            PredictionSource::Model => {
                info!(
                    event = "price_predicted",
                    component = %self.component,
                    title = %title,
                    category = %category,
                    anchor = prediction.anchor,
                    raw_output = ?prediction.raw_output,
                    clamp = ?prediction.clamp,
                    price = prediction.price,
                    model_version = %prediction.model_version,
                    "Predicted price"
                );
            }
            PredictionSource::AnchorFallback => {
                warn!(
                    event = "price_fallback",
                    component = %self.component,
                    title = %title,
                    category = %category,
                    anchor = prediction.anchor,
                    price = prediction.price,
                    "Returned anchor price without model prediction"
                );
            }
        }
    }

    /// Log an inference failure that triggered the anchor fallback
    pub fn log_inference_error(&self, title: &str, error: &anyhow::Error) {
        error!(
            event = "inference_failed",
            component = %self.component,
            title = %title,
            error = %format!("{:#}", error),
            "Error predicting price, falling back to anchor"
        );
    }

    /// Log where the serving model came from at startup
    pub fn log_model_ready(&self, origin: &str, model_version: &str, categories: usize) {
        info!(
            event = "model_ready",
            component = %self.component,
            origin = %origin,
            model_version = %model_version,
            categories = categories,
            "Price model ready"
        );
    }

    /// Log a seed model replacing missing or corrupt artifacts
    pub fn log_bootstrap(&self, reason: &str) {
        warn!(
            event = "model_bootstrapped",
            component = %self.component,
            reason = %reason,
            "Created default price model from seed data"
        );
    }

    /// Log a category first seen at inference time
    pub fn log_category_extended(&self, category: &str, code: u32, encoder_version: u64) {
        info!(
            event = "category_extended",
            component = %self.component,
            category = %category,
            code = code,
            encoder_version = encoder_version,
            "Registered new category at inference time"
        );
    }

    /// Log a completed training run
    pub fn log_training(&self, old_version: &str, report: &TrainingReport) {
        info!(
            event = "model_trained",
            component = %self.component,
            old_version = %old_version,
            generation = report.generation,
            rows = report.rows,
            categories = report.categories,
            new_categories = report.new_categories,
            rmse = report.rmse,
            r2 = report.r2,
            duration_ms = report.duration_ms,
            "Price model retrained and persisted"
        );
    }

    /// Log a failed training run
    pub fn log_training_failure(&self, current_version: &str, error: &crate::error::TrainingError) {
        error!(
            event = "training_failed",
            component = %self.component,
            current_version = %current_version,
            error = %error,
            "Training failed, keeping previous model"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClampBound;

    #[test]
    fn test_pricer_metrics_creation() {
        let metrics = PricerMetrics::new();
        let prediction = PricePrediction {
            price: 800.0,
            anchor: 1000.0,
            source: PredictionSource::Model,
            raw_output: Some(10.0),
            clamp: Some(ClampBound::Floor),
            model_version: "rf-g1".to_string(),
        };

        let before = metrics.predictions_by_source(PredictionSource::Model);
        metrics.observe_prediction(&prediction, 0.001);
        assert!(metrics.predictions_by_source(PredictionSource::Model) > before);

        metrics.inc_training_runs();
        metrics.inc_training_failures();
        metrics.set_model_state(3, 4);
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("pricer");
        assert_eq!(logger.component, "pricer");
    }
}
