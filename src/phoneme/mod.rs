pub mod cli;
pub mod data;
pub mod features;
pub mod model;
pub mod training;

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::{Array1, Array2, Axis};
use tracing::info;

use crate::config::PipelineConfig;
use data::{
    read_manifest, save_predictions, split_utterances, CorpusLayout, FeatureDir, LabelTable,
    Partition,
};
use features::DatasetAssembler;
use model::{MlpClassifier, PhonemeModel};

/// Convenient alias for results returned by the phoneme pipeline.
pub type Result<T> = std::result::Result<T, PhonemeError>;

/// Broad failure classes surfaced by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A caller-supplied parameter is out of range (even window size, bad ratio, ...).
    InvalidArgument,
    /// A requested utterance has no feature file or no label entry.
    MissingData,
    /// Data exists but is malformed or inconsistent.
    InvalidData,
    /// Filesystem failure unrelated to the content of the data.
    Io,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::MissingData => "missing data",
            ErrorKind::InvalidData => "invalid data",
            ErrorKind::Io => "i/o error",
        };
        f.write_str(label)
    }
}

/// Error type shared by every stage of the pipeline.
#[derive(Debug, Clone)]
pub struct PhonemeError {
    kind: ErrorKind,
    message: Arc<str>,
}

impl PhonemeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: Arc::from(message.into()),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn missing_data(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MissingData, message)
    }

    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidData, message)
    }

    pub fn io(path: &Path, err: &std::io::Error) -> Self {
        Self::new(ErrorKind::Io, format!("{}: {err}", path.display()))
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for PhonemeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl Error for PhonemeError {}

/// All windowed frames of one split, concatenated in utterance order.
///
/// Row `i` of `features` is labelled by `labels[i]` when labels are present.
#[derive(Debug, Clone)]
pub struct FlatDataset {
    pub features: Array2<f32>,
    pub labels: Option<Array1<usize>>,
}

impl FlatDataset {
    pub fn empty(feature_dim: usize, labelled: bool) -> Self {
        Self {
            features: Array2::zeros((0, feature_dim)),
            labels: labelled.then(|| Array1::zeros(0)),
        }
    }

    pub fn len(&self) -> usize {
        self.features.len_of(Axis(0))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn feature_dim(&self) -> usize {
        self.features.len_of(Axis(1))
    }
}

/// Accuracy and mean batch loss for one pass over a split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitMetrics {
    pub accuracy: f64,
    pub loss: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EpochReport {
    pub epoch: usize,
    pub train: SplitMetrics,
    pub validation: Option<SplitMetrics>,
    pub checkpoint_saved: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSummary {
    pub epochs: Vec<EpochReport>,
    pub best_validation_accuracy: Option<f64>,
    pub checkpoint: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionSummary {
    pub frames: usize,
    pub output: PathBuf,
}

/// Loads the train/validation pool, trains a fresh classifier and keeps the best checkpoint.
pub fn train(config: &PipelineConfig) -> Result<TrainingSummary> {
    config.validate()?;
    let layout = CorpusLayout::new(&config.data_root);

    let labels = LabelTable::from_path(&layout.train_labels(), config.class_count)?;
    let pool = read_manifest(&layout.train_manifest())?;
    let (train_ids, val_ids) = split_utterances(&pool, config.train_ratio, config.split_seed)?;
    info!(
        classes = config.class_count,
        train_utterances = train_ids.len(),
        val_utterances = val_ids.len(),
        "split train/validation pool"
    );

    let assembler = DatasetAssembler::new(config.concat_nframes, config.feature_dim)?
        .with_parallel(config.parallel_load);
    let source = FeatureDir::new(
        layout.feature_dir(Partition::Train),
        config.feature_format,
        config.feature_dim,
    );
    let train_set = assembler.assemble(&train_ids, &source, Some(&labels))?;
    info!(frames = train_set.len(), dim = train_set.feature_dim(), "assembled train set");
    let val_set = assembler.assemble(&val_ids, &source, Some(&labels))?;
    info!(frames = val_set.len(), dim = val_set.feature_dim(), "assembled validation set");
    drop(labels);

    let mut model = MlpClassifier::new(config.architecture(), config.optimizer(), config.seed)?;
    training::train_model(&mut model, &train_set, &val_set, &config.trainer_settings())
}

/// Restores the saved checkpoint and writes predictions for the test manifest.
pub fn predict(config: &PipelineConfig) -> Result<PredictionSummary> {
    config.validate()?;
    let layout = CorpusLayout::new(&config.data_root);
    let test_ids = read_manifest(&layout.test_manifest())?;
    info!(test_utterances = test_ids.len(), "loaded test manifest");

    let assembler = DatasetAssembler::new(config.concat_nframes, config.feature_dim)?
        .with_parallel(config.parallel_load);
    let source = FeatureDir::new(
        layout.feature_dir(Partition::Test),
        config.feature_format,
        config.feature_dim,
    );
    let test_set = assembler.assemble(&test_ids, &source, None)?;
    info!(frames = test_set.len(), dim = test_set.feature_dim(), "assembled test set");

    let mut model = MlpClassifier::new(config.architecture(), config.optimizer(), config.seed)?;
    model.load_checkpoint(&config.model_path)?;
    let predictions =
        training::predict_dataset(&model, &test_set, config.batch_size, config.progress)?;
    save_predictions(&config.prediction_path, &predictions)?;
    info!(
        rows = predictions.len(),
        path = %config.prediction_path.display(),
        "wrote predictions"
    );

    Ok(PredictionSummary {
        frames: predictions.len(),
        output: config.prediction_path.clone(),
    })
}

/// Primary orchestration entry point: train, then predict with the best checkpoint.
pub fn run_pipeline(config: &PipelineConfig) -> Result<(TrainingSummary, PredictionSummary)> {
    let summary = train(config)?;
    let predictions = predict(config)?;
    Ok((summary, predictions))
}
