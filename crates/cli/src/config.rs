//! Configuration management for the CLI

use anyhow::{Context, Result};
use pricer_lib::predictor::{
    ClampConfig, FeatureConfig, ForestParams, CEILING_RATIO, DEFAULT_ANCHOR_PRICE, FLOOR_RATIO,
};
use pricer_lib::{ServiceConfig, StoreConfig, UnseenCategoryPolicy};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable prefix (`PRICER_MODEL_DIR`, `PRICER_N_TREES`, ...)
const ENV_PREFIX: &str = "PRICER";

/// Pricer configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PricerConfig {
    /// Directory holding the model and encoder artifacts
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    #[serde(default = "default_model_file")]
    pub model_file: String,

    #[serde(default = "default_encoder_file")]
    pub encoder_file: String,

    /// Anchor used when a request carries no usable price
    #[serde(default = "default_anchor")]
    pub default_anchor: f64,

    #[serde(default = "default_floor_ratio")]
    pub floor_ratio: f64,

    #[serde(default = "default_ceiling_ratio")]
    pub ceiling_ratio: f64,

    #[serde(default = "default_n_trees")]
    pub n_trees: usize,

    #[serde(default = "default_max_depth")]
    pub max_depth: u16,

    #[serde(default)]
    pub unseen_category: UnseenCategoryPolicy,
}

fn default_model_dir() -> PathBuf {
    StoreConfig::default().model_dir
}

fn default_model_file() -> String {
    StoreConfig::default().model_file
}

fn default_encoder_file() -> String {
    StoreConfig::default().encoder_file
}

fn default_anchor() -> f64 {
    DEFAULT_ANCHOR_PRICE
}

fn default_floor_ratio() -> f64 {
    FLOOR_RATIO
}

fn default_ceiling_ratio() -> f64 {
    CEILING_RATIO
}

fn default_n_trees() -> usize {
    ForestParams::default().n_trees
}

fn default_max_depth() -> u16 {
    ForestParams::default().max_depth
}

impl PricerConfig {
    /// Load configuration from a config file and `PRICER_*` environment
    /// variables. An explicit `path` must exist; otherwise the user config
    /// file is read if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        match path {
            Some(p) => {
                builder = builder.add_source(config::File::from(p.to_path_buf()).required(true));
            }
            None => {
                if let Some(p) = Self::user_config_path() {
                    builder = builder.add_source(config::File::from(p).required(false));
                }
            }
        }

        let config = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()
            .context("Failed to read configuration")?;

        let loaded: Self = config
            .try_deserialize()
            .context("Failed to parse configuration")?;
        loaded.clamp().validate().context("Invalid clamp configuration")?;
        Ok(loaded)
    }

    fn clamp(&self) -> ClampConfig {
        ClampConfig {
            floor_ratio: self.floor_ratio,
            ceiling_ratio: self.ceiling_ratio,
            ..Default::default()
        }
    }

    /// `~/.config/pricer/config.toml`
    fn user_config_path() -> Option<PathBuf> {
        dirs_next::home_dir().map(|home| home.join(".config").join("pricer").join("config.toml"))
    }

    /// Library configuration, with an optional model directory override
    pub fn into_service_config(self, model_dir: Option<PathBuf>) -> ServiceConfig {
        let clamp = self.clamp();
        ServiceConfig {
            store: StoreConfig {
                model_dir: model_dir.unwrap_or(self.model_dir),
                model_file: self.model_file,
                encoder_file: self.encoder_file,
            },
            features: FeatureConfig {
                default_anchor: self.default_anchor,
                ..Default::default()
            },
            clamp,
            forest: ForestParams {
                n_trees: self.n_trees,
                max_depth: self.max_depth,
                ..Default::default()
            },
            unseen_category: self.unseen_category,
        }
    }
}
