mod stats;

use std::path::PathBuf;

use kdam::{tqdm, BarExt};
use ndarray::{Array1, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{info, warn};

pub use stats::EpochTally;

use crate::phoneme::model::PhonemeModel;
use crate::phoneme::{EpochReport, FlatDataset, PhonemeError, Result, SplitMetrics, TrainingSummary};

/// Knobs of the epoch loop that are independent of the model.
#[derive(Debug, Clone)]
pub struct TrainerSettings {
    pub batch_size: usize,
    pub num_epoch: usize,
    pub seed: u64,
    pub model_path: PathBuf,
    pub progress: bool,
}

/// Trains `model` on `train`, validating on `val` after every epoch.
///
/// A checkpoint is written whenever the number of correctly classified validation frames
/// improves. Without validation frames the final epoch is saved instead.
pub fn train_model<M: PhonemeModel>(
    model: &mut M,
    train: &FlatDataset,
    val: &FlatDataset,
    settings: &TrainerSettings,
) -> Result<TrainingSummary> {
    if settings.batch_size == 0 {
        return Err(PhonemeError::invalid_argument("batch size must be positive"));
    }
    let train_labels = require_labels(train, "training")?;
    let val_labels = require_labels(val, "validation")?;
    if train.is_empty() {
        return Err(PhonemeError::missing_data("training split contains no frames"));
    }

    let mut rng = StdRng::seed_from_u64(settings.seed);
    let mut order: Vec<usize> = (0..train.len()).collect();
    let mut best_correct: Option<usize> = None;
    let mut epochs = Vec::with_capacity(settings.num_epoch);

    for epoch in 0..settings.num_epoch {
        order.shuffle(&mut rng);
        let mut train_tally = EpochTally::new();
        let mut bar = tqdm!(
            total = order.len().div_ceil(settings.batch_size),
            desc = format!("Epoch {}/{}", epoch + 1, settings.num_epoch),
            unit = "batch",
            disable = !settings.progress
        );

        for indices in order.chunks(settings.batch_size) {
            let features = train.features.select(Axis(0), indices);
            let labels = train_labels.select(Axis(0), indices);
            let output = model.train_step(features.view(), labels.view())?;
            ensure_finite(output.loss, epoch)?;
            let correct = count_correct(&output.predictions, labels.view());
            train_tally = train_tally.push(output.loss, correct, indices.len());
            bar.update(1).ok();
        }

        let train_metrics = metrics_of(&train_tally);
        let mut checkpoint_saved = false;

        let validation = if val.is_empty() {
            info!(
                "[{:03}/{:03}] Train Acc: {:3.6} Loss: {:3.6}",
                epoch + 1,
                settings.num_epoch,
                train_metrics.accuracy,
                train_metrics.loss
            );
            None
        } else {
            let val_tally = evaluate(model, val, val_labels, settings.batch_size)?;
            let val_metrics = metrics_of(&val_tally);
            info!(
                "[{:03}/{:03}] Train Acc: {:3.6} Loss: {:3.6} | Val Acc: {:3.6} loss: {:3.6}",
                epoch + 1,
                settings.num_epoch,
                train_metrics.accuracy,
                train_metrics.loss,
                val_metrics.accuracy,
                val_metrics.loss
            );

            if best_correct.map_or(true, |best| val_tally.correct() > best) {
                best_correct = Some(val_tally.correct());
                model.save_checkpoint(&settings.model_path)?;
                checkpoint_saved = true;
                info!(
                    accuracy = val_metrics.accuracy,
                    path = %settings.model_path.display(),
                    "saving model with improved validation accuracy"
                );
            }
            Some(val_metrics)
        };

        epochs.push(EpochReport {
            epoch: epoch + 1,
            train: train_metrics,
            validation,
            checkpoint_saved,
        });
    }

    if val.is_empty() {
        model.save_checkpoint(&settings.model_path)?;
        if let Some(last) = epochs.last_mut() {
            last.checkpoint_saved = true;
        }
        info!(path = %settings.model_path.display(), "saving model at last epoch");
    } else if best_correct.is_none() {
        warn!("no epochs ran; checkpoint was not written");
    }

    Ok(TrainingSummary {
        epochs,
        best_validation_accuracy: best_correct.map(|correct| correct as f64 / val.len() as f64),
        checkpoint: settings.model_path.clone(),
    })
}

/// Predicts every row of `dataset` in table order.
pub fn predict_dataset<M: PhonemeModel>(
    model: &M,
    dataset: &FlatDataset,
    batch_size: usize,
    progress: bool,
) -> Result<Vec<usize>> {
    if batch_size == 0 {
        return Err(PhonemeError::invalid_argument("batch size must be positive"));
    }
    let mut predictions = Vec::with_capacity(dataset.len());
    let batches = dataset.features.axis_chunks_iter(Axis(0), batch_size);
    for features in tqdm!(batches, desc = "Predict", unit = "batch", disable = !progress) {
        let (_, batch) = model.eval_step(features, None)?;
        predictions.extend(batch.iter().copied());
    }
    Ok(predictions)
}

fn evaluate<M: PhonemeModel>(
    model: &M,
    dataset: &FlatDataset,
    labels: &Array1<usize>,
    batch_size: usize,
) -> Result<EpochTally> {
    let mut tally = EpochTally::new();
    for (features, targets) in dataset
        .features
        .axis_chunks_iter(Axis(0), batch_size)
        .zip(labels.axis_chunks_iter(Axis(0), batch_size))
    {
        let (loss, predictions) = model.eval_step(features, Some(targets))?;
        let loss = loss.unwrap_or(f32::NAN);
        tally = tally.push(loss, count_correct(&predictions, targets), targets.len());
    }
    Ok(tally)
}

fn require_labels<'a>(dataset: &'a FlatDataset, split: &str) -> Result<&'a Array1<usize>> {
    dataset
        .labels
        .as_ref()
        .ok_or_else(|| PhonemeError::missing_data(format!("{split} split has no labels")))
}

fn count_correct(predictions: &Array1<usize>, labels: ArrayView1<'_, usize>) -> usize {
    predictions
        .iter()
        .zip(labels.iter())
        .filter(|(predicted, actual)| predicted == actual)
        .count()
}

fn metrics_of(tally: &EpochTally) -> SplitMetrics {
    SplitMetrics {
        accuracy: tally.accuracy().unwrap_or(0.0),
        loss: tally.loss().unwrap_or(0.0),
    }
}

fn ensure_finite(loss: f32, epoch: usize) -> Result<()> {
    if loss.is_finite() {
        Ok(())
    } else {
        Err(PhonemeError::invalid_data(format!(
            "training loss diverged to {loss} in epoch {}",
            epoch + 1
        )))
    }
}
