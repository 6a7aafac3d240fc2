//! Error types surfaced by the pricing library
//!
//! Prediction never fails from the caller's point of view, so only the
//! encoder and the trainer expose typed errors.

use thiserror::Error;

/// Category encoder errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncoderError {
    #[error("category {0:?} has not been seen by the encoder")]
    UnknownCategory(String),
}

/// Training failures. The previously persisted model stays authoritative
/// whenever one of these is returned.
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("training batch is empty")]
    EmptyBatch,

    #[error("row {row}: missing target price")]
    MissingTarget { row: usize },

    #[error("row {row}: target price {value:?} is not a finite number")]
    InvalidTarget { row: usize, value: String },

    #[error("row {row}: feature vector is not finite")]
    InvalidFeatures { row: usize },

    #[error("model fit failed: {0}")]
    Fit(String),

    #[error("failed to persist model artifacts: {0:#}")]
    Persist(#[source] anyhow::Error),

    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("background training task failed: {0}")]
    Join(String),
}
