use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::config::PipelineConfig;
use crate::phoneme::data::FeatureFormat;

#[derive(Parser, Debug)]
#[command(
    name = "libriphone",
    version,
    about = "Frame-level phoneme classification from MFCC features"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Train on the train/validation pool and keep the best checkpoint.
    Train(PipelineArgs),
    /// Predict the test manifest with a saved checkpoint and write the CSV.
    Predict(PipelineArgs),
    /// Train, then predict.
    Run(PipelineArgs),
}

impl Command {
    pub fn args(&self) -> &PipelineArgs {
        match self {
            Command::Train(args) | Command::Predict(args) | Command::Run(args) => args,
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct PipelineArgs {
    /// JSON config file; flags below override its values.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Corpus root with the split manifests, label file and `feat/`.
    #[arg(long = "data-root", value_name = "DIR")]
    pub data_root: Option<PathBuf>,
    #[arg(long = "feature-format", value_enum)]
    pub feature_format: Option<FeatureFormat>,
    /// Number of frames per window (odd).
    #[arg(long = "concat-nframes")]
    pub concat_nframes: Option<usize>,
    #[arg(long = "train-ratio")]
    pub train_ratio: Option<f64>,
    #[arg(long)]
    pub epochs: Option<usize>,
    #[arg(long = "batch-size")]
    pub batch_size: Option<usize>,
    #[arg(long = "learning-rate")]
    pub learning_rate: Option<f32>,
    #[arg(long = "hidden-layers")]
    pub hidden_layers: Option<usize>,
    #[arg(long = "hidden-dim")]
    pub hidden_dim: Option<usize>,
    /// Seed for weight initialisation and batch shuffling.
    #[arg(long)]
    pub seed: Option<u64>,
    #[arg(long = "model-path", value_name = "PATH")]
    pub model_path: Option<PathBuf>,
    /// Prediction CSV destination.
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,
    /// Load and window utterances in parallel.
    #[arg(long, overrides_with = "no_parallel")]
    pub parallel: bool,
    /// Load sequentially even if the config file enables parallel loading.
    #[arg(long = "no-parallel", overrides_with = "parallel")]
    pub no_parallel: bool,
    /// Show progress bars.
    #[arg(long, overrides_with = "no_progress")]
    pub progress: bool,
    #[arg(long = "no-progress", overrides_with = "progress")]
    pub no_progress: bool,
}

impl PipelineArgs {
    /// Builds the pipeline config from the optional file plus command-line overrides.
    pub fn to_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(root) = &self.data_root {
            config.data_root = root.clone();
        }
        if let Some(format) = self.feature_format {
            config.feature_format = format;
        }
        if let Some(n) = self.concat_nframes {
            config.concat_nframes = n;
        }
        if let Some(ratio) = self.train_ratio {
            config.train_ratio = ratio;
        }
        if let Some(epochs) = self.epochs {
            config.num_epoch = epochs;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(lr) = self.learning_rate {
            config.learning_rate = lr;
        }
        if let Some(layers) = self.hidden_layers {
            config.hidden_layers = layers;
        }
        if let Some(dim) = self.hidden_dim {
            config.hidden_dim = dim;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(path) = &self.model_path {
            config.model_path = path.clone();
        }
        if let Some(path) = &self.output {
            config.prediction_path = path.clone();
        }
        if let Some(parallel) = switch(self.parallel, self.no_parallel) {
            config.parallel_load = parallel;
        }
        if let Some(progress) = switch(self.progress, self.no_progress) {
            config.progress = progress;
        }

        Ok(config)
    }
}

/// `--flag` / `--no-flag` pair. Neither given keeps the config value.
fn switch(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (false, true) => Some(false),
        (false, false) => None,
    }
}
