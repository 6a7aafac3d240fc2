//! Model store: persisted model and encoder artifacts
//!
//! This module provides:
//! - Checksummed JSON artifacts for the forest and the category encoder
//! - Temp-file-then-rename writes for both artifacts
//! - Generation matching so a torn model/encoder pair is rejected at load,
//!   unless the interrupted save left the matching encoder in its temp file
//! - Bootstrap of a seed model when nothing usable is on disk

use crate::encoder::CategoryEncoder;
use crate::predictor::PriceModel;
use crate::trainer::{seed_rows, Trainer};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Artifact envelope format version
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

const MODEL_KIND: &str = "price_model";
const ENCODER_KIND: &str = "category_encoder";

/// Configuration for the model store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the artifacts
    pub model_dir: PathBuf,
    /// Model artifact file name
    pub model_file: String,
    /// Encoder artifact file name
    pub encoder_file: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            model_file: "price_model.json".to_string(),
            encoder_file: "encoders.json".to_string(),
        }
    }
}

/// How the in-memory model came to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelOrigin {
    /// Read from persisted artifacts
    Loaded,
    /// Artifacts missing or corrupt; a seed model was fitted
    Bootstrapped { reason: String },
    /// Nothing could be loaded or fitted; predictions fall back to the anchor
    Unavailable { reason: String },
    /// Replaced by a successful training run in this process
    Trained,
}

impl ModelOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelOrigin::Loaded => "loaded",
            ModelOrigin::Bootstrapped { .. } => "bootstrapped",
            ModelOrigin::Unavailable { .. } => "unavailable",
            ModelOrigin::Trained => "trained",
        }
    }
}

/// Model state produced by [`ModelStore::load_or_bootstrap`]
#[derive(Debug)]
pub struct LoadedModel {
    pub model: Option<PriceModel>,
    pub encoder: CategoryEncoder,
    pub origin: ModelOrigin,
}

/// On-disk envelope shared by both artifacts
#[derive(Debug, Serialize, Deserialize)]
struct Artifact {
    format_version: u32,
    kind: String,
    generation: u64,
    written_at: i64,
    checksum: String,
    payload: String,
}

impl Artifact {
    fn encode<T: Serialize>(kind: &str, generation: u64, value: &T) -> Result<Self> {
        let payload = serde_json::to_string(value)
            .with_context(|| format!("Failed to serialize {}", kind))?;
        Ok(Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            kind: kind.to_string(),
            generation,
            written_at: chrono::Utc::now().timestamp(),
            checksum: compute_checksum(payload.as_bytes()),
            payload,
        })
    }

    fn decode<T: DeserializeOwned>(&self, kind: &str) -> Result<T> {
        if self.kind != kind {
            anyhow::bail!("Artifact kind mismatch: expected {}, got {}", kind, self.kind);
        }
        if self.format_version != ARTIFACT_FORMAT_VERSION {
            anyhow::bail!(
                "Unsupported artifact format version {} (expected {})",
                self.format_version,
                ARTIFACT_FORMAT_VERSION
            );
        }
        let computed = compute_checksum(self.payload.as_bytes());
        if computed != self.checksum {
            anyhow::bail!("Checksum mismatch: expected {}, got {}", self.checksum, computed);
        }
        serde_json::from_str(&self.payload).with_context(|| format!("Failed to decode {} payload", kind))
    }
}

/// File-backed store for the model/encoder pair
#[derive(Debug, Clone)]
pub struct ModelStore {
    config: StoreConfig,
}

impl ModelStore {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn model_path(&self) -> PathBuf {
        self.config.model_dir.join(&self.config.model_file)
    }

    pub fn encoder_path(&self) -> PathBuf {
        self.config.model_dir.join(&self.config.encoder_file)
    }

    /// Load the persisted pair, verifying checksums and generations
    pub fn load(&self) -> Result<(PriceModel, CategoryEncoder)> {
        let model_path = self.model_path();
        let encoder_path = self.encoder_path();

        debug!(
            model = %model_path.display(),
            encoder = %encoder_path.display(),
            "Looking for model artifacts"
        );

        let model_artifact = read_artifact(&model_path)?;
        let encoder_artifact = match read_artifact(&encoder_path) {
            Ok(artifact) if artifact.generation == model_artifact.generation => artifact,
            Ok(artifact) => self
                .recover_pending_encoder(model_artifact.generation)
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "Model generation {} does not match encoder generation {}",
                        model_artifact.generation,
                        artifact.generation
                    )
                })?,
            Err(e) => self
                .recover_pending_encoder(model_artifact.generation)
                .ok_or(e)?,
        };

        let model: PriceModel = model_artifact.decode(MODEL_KIND)?;
        let encoder: CategoryEncoder = encoder_artifact.decode(ENCODER_KIND)?;

        if model.generation() != model_artifact.generation {
            anyhow::bail!(
                "Model payload generation {} does not match envelope generation {}",
                model.generation(),
                model_artifact.generation
            );
        }

        Ok((model, encoder))
    }

    /// A save interrupted between its two renames leaves the new model in
    /// place and the matching encoder in its temp file. Finish that rename
    /// when the temp artifact belongs to `generation`.
    fn recover_pending_encoder(&self, generation: u64) -> Option<Artifact> {
        let encoder_path = self.encoder_path();
        let pending = encoder_path.with_extension("tmp");
        if !pending.exists() {
            return None;
        }

        let artifact = match read_artifact(&pending) {
            Ok(artifact) => artifact,
            Err(e) => {
                debug!(error = %format!("{:#}", e), "Pending encoder artifact unreadable");
                return None;
            }
        };
        if artifact.generation != generation
            || artifact.decode::<CategoryEncoder>(ENCODER_KIND).is_err()
        {
            return None;
        }

        if let Err(e) = fs::rename(&pending, &encoder_path) {
            warn!(error = %e, path = %pending.display(), "Failed to move recovered encoder into place");
        }
        warn!(generation = generation, "Recovered encoder from interrupted save");
        Some(artifact)
    }

    /// Persist the pair. Both artifacts are fully written and synced to temp
    /// files before either is renamed into place.
    pub fn save(&self, model: &PriceModel, encoder: &CategoryEncoder) -> Result<()> {
        fs::create_dir_all(&self.config.model_dir).with_context(|| {
            format!("Failed to create model directory {:?}", self.config.model_dir)
        })?;

        let generation = model.generation();
        let model_artifact = Artifact::encode(MODEL_KIND, generation, model)?;
        let encoder_artifact = Artifact::encode(ENCODER_KIND, generation, encoder)?;

        let model_path = self.model_path();
        let encoder_path = self.encoder_path();
        let model_tmp = write_temp(&model_path, &model_artifact)?;
        let encoder_tmp = match write_temp(&encoder_path, &encoder_artifact) {
            Ok(path) => path,
            Err(e) => {
                let _ = fs::remove_file(&model_tmp);
                return Err(e);
            }
        };

        // A crash between these two renames leaves the new encoder in its
        // temp file, which load() picks up.
        if let Err(e) = fs::rename(&model_tmp, &model_path) {
            let _ = fs::remove_file(&model_tmp);
            let _ = fs::remove_file(&encoder_tmp);
            return Err(e)
                .with_context(|| format!("Failed to rename {:?} to {:?}", model_tmp, model_path));
        }
        fs::rename(&encoder_tmp, &encoder_path)
            .with_context(|| format!("Failed to rename {:?} to {:?}", encoder_tmp, encoder_path))?;

        info!(
            generation = generation,
            path = %model_path.display(),
            "Model artifacts saved"
        );
        Ok(())
    }

    /// Load the persisted model, or fit and persist a seed model. Never
    /// fails: the worst case is a service with no model at all.
    pub fn load_or_bootstrap(&self, trainer: &Trainer) -> LoadedModel {
        let reason = match self.load() {
            Ok((model, encoder)) => {
                info!(
                    generation = model.generation(),
                    categories = encoder.len(),
                    "Loaded existing price model"
                );
                return LoadedModel {
                    model: Some(model),
                    encoder,
                    origin: ModelOrigin::Loaded,
                };
            }
            Err(e) => format!("{:#}", e),
        };

        warn!(reason = %reason, "No usable model artifacts, bootstrapping seed model");

        let trained = match trainer.fit(&seed_rows(), &CategoryEncoder::new(), 1) {
            Ok(trained) => trained,
            Err(e) => {
                error!(error = %e, "Failed to fit seed model, predictions will use the anchor price");
                return LoadedModel {
                    model: None,
                    encoder: CategoryEncoder::new(),
                    origin: ModelOrigin::Unavailable {
                        reason: format!("{}; seed fit failed: {}", reason, e),
                    },
                };
            }
        };

        if let Err(e) = self.save(&trained.model, &trained.encoder) {
            warn!(error = %format!("{:#}", e), "Failed to persist seed model, keeping it in memory");
        }

        LoadedModel {
            model: Some(trained.model),
            encoder: trained.encoder,
            origin: ModelOrigin::Bootstrapped { reason },
        }
    }
}

fn read_artifact(path: &Path) -> Result<Artifact> {
    if !path.exists() {
        return Err(anyhow::anyhow!("Artifact not found: {:?}", path));
    }
    let bytes = fs::read(path).with_context(|| format!("Failed to read artifact {:?}", path))?;
    serde_json::from_slice(&bytes).with_context(|| format!("Failed to parse artifact {:?}", path))
}

fn write_temp(path: &Path, artifact: &Artifact) -> Result<PathBuf> {
    let temp_path = path.with_extension("tmp");
    let bytes = serde_json::to_vec(artifact).context("Failed to encode artifact")?;

    let mut file = File::create(&temp_path)
        .with_context(|| format!("Failed to create temp artifact {:?}", temp_path))?;
    file.write_all(&bytes).context("Failed to write artifact")?;
    file.sync_all().context("Failed to sync artifact")?;

    Ok(temp_path)
}

/// Compute SHA256 checksum of data
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
