use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::phoneme::data::FeatureFormat;
use crate::phoneme::model::{AdamWConfig, MlpArchitecture};
use crate::phoneme::training::TrainerSettings;
use crate::phoneme::{self, PhonemeError};

/// Every hyperparameter and path the pipeline needs, passed explicitly to the entry points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Corpus root holding the manifests, `train_labels.txt` and `feat/`.
    pub data_root: PathBuf,
    pub feature_format: FeatureFormat,
    /// Coefficients per raw frame.
    pub feature_dim: usize,
    pub class_count: usize,
    /// Frames per window, must be odd.
    pub concat_nframes: usize,
    pub train_ratio: f64,
    pub split_seed: u64,
    /// Seeds weight initialisation and per-epoch shuffling.
    pub seed: u64,
    pub batch_size: usize,
    pub num_epoch: usize,
    pub learning_rate: f32,
    pub weight_decay: f32,
    pub hidden_layers: usize,
    pub hidden_dim: usize,
    pub model_path: PathBuf,
    pub prediction_path: PathBuf,
    pub parallel_load: bool,
    pub progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("./libriphone"),
            feature_format: FeatureFormat::Json,
            feature_dim: 39,
            class_count: 41,
            concat_nframes: 11,
            train_ratio: 0.8,
            split_seed: 1337,
            seed: 0,
            batch_size: 512,
            num_epoch: 30,
            learning_rate: 1e-4,
            weight_decay: 0.01,
            hidden_layers: 5,
            hidden_dim: 256,
            model_path: PathBuf::from("./model.ckpt"),
            prediction_path: PathBuf::from("./prediction.csv"),
            parallel_load: false,
            progress: false,
        }
    }
}

impl PipelineConfig {
    /// Reads a JSON config file. Missing fields fall back to the defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {:?}", path))?;
        serde_json::from_str(&data).with_context(|| format!("failed to parse config file {:?}", path))
    }

    /// Replaces `data_root` with its canonical form, failing if it is not a directory.
    pub fn with_resolved_data_root(mut self) -> Result<Self> {
        self.data_root = canonicalize_dir(&self.data_root)?;
        Ok(self)
    }

    pub fn validate(&self) -> phoneme::Result<()> {
        if self.concat_nframes % 2 == 0 {
            return Err(invalid(format!(
                "concat_nframes must be odd, got {}",
                self.concat_nframes
            )));
        }
        if !self.train_ratio.is_finite() || self.train_ratio <= 0.0 || self.train_ratio > 1.0 {
            return Err(invalid(format!(
                "train_ratio must be in (0, 1], got {}",
                self.train_ratio
            )));
        }
        if self.feature_dim == 0 || self.class_count == 0 {
            return Err(invalid("feature_dim and class_count must be positive"));
        }
        if self.batch_size == 0 || self.num_epoch == 0 {
            return Err(invalid("batch_size and num_epoch must be positive"));
        }
        if self.hidden_layers > 0 && self.hidden_dim == 0 {
            return Err(invalid("hidden_dim must be positive"));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(invalid(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !self.weight_decay.is_finite() || self.weight_decay < 0.0 {
            return Err(invalid(format!(
                "weight_decay must be non-negative, got {}",
                self.weight_decay
            )));
        }
        Ok(())
    }

    /// Width of one windowed frame.
    pub fn input_dim(&self) -> usize {
        self.feature_dim * self.concat_nframes
    }

    pub fn architecture(&self) -> MlpArchitecture {
        MlpArchitecture {
            input_dim: self.input_dim(),
            hidden_dim: self.hidden_dim,
            hidden_layers: self.hidden_layers,
            output_dim: self.class_count,
        }
    }

    pub fn optimizer(&self) -> AdamWConfig {
        AdamWConfig {
            learning_rate: self.learning_rate,
            weight_decay: self.weight_decay,
            ..AdamWConfig::default()
        }
    }

    pub fn trainer_settings(&self) -> TrainerSettings {
        TrainerSettings {
            batch_size: self.batch_size,
            num_epoch: self.num_epoch,
            seed: self.seed,
            model_path: self.model_path.clone(),
            progress: self.progress,
        }
    }
}

fn invalid(message: impl Into<String>) -> PhonemeError {
    PhonemeError::invalid_argument(message)
}

fn canonicalize_dir(path: &Path) -> Result<PathBuf> {
    let canonical = path
        .canonicalize()
        .with_context(|| format!("failed to resolve data directory at {:?}", path))?;
    if canonical.is_dir() {
        Ok(canonical)
    } else {
        Err(anyhow!("data path {:?} is not a directory", canonical))
    }
}
