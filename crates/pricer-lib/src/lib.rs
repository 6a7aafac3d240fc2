//! Product price prediction library
//!
//! This crate provides the core functionality for:
//! - Feature construction from anchor and competitor prices
//! - Category encoding with stable codes
//! - Random-forest price inference with business-rule clamping
//! - Model persistence, bootstrap and retraining
//! - Metrics and structured logging

pub mod encoder;
pub mod error;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod service;
pub mod store;
pub mod trainer;

pub use encoder::{CategoryEncoder, UnseenCategoryPolicy, UNKNOWN_CATEGORY};
pub use error::{EncoderError, TrainingError};
pub use models::*;
pub use observability::{PricerMetrics, StructuredLogger};
pub use service::{CategoryCode, ModelStatus, PriceService, ServiceConfig};
pub use store::{ModelOrigin, ModelStore, StoreConfig};
pub use trainer::{Trainer, TrainingReport};
