use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, Ix1, Ix2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::loss::{argmax_rows, softmax_cross_entropy};
use super::optimizer::{AdamW, AdamWConfig, Moments};
use super::{BatchOutput, PhonemeModel};
use crate::phoneme::{PhonemeError, Result};

/// Layer sizes of the feed-forward classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MlpArchitecture {
    pub input_dim: usize,
    pub hidden_dim: usize,
    pub hidden_layers: usize,
    pub output_dim: usize,
}

impl MlpArchitecture {
    fn layer_shapes(&self) -> Vec<(usize, usize)> {
        let mut shapes = Vec::with_capacity(self.hidden_layers + 1);
        let mut fan_in = self.input_dim;
        for _ in 0..self.hidden_layers {
            shapes.push((fan_in, self.hidden_dim));
            fan_in = self.hidden_dim;
        }
        shapes.push((fan_in, self.output_dim));
        shapes
    }

    fn validate(&self) -> Result<()> {
        if self.input_dim == 0 || self.output_dim == 0 {
            return Err(PhonemeError::invalid_argument(
                "classifier input and output dimensions must be positive",
            ));
        }
        if self.hidden_layers > 0 && self.hidden_dim == 0 {
            return Err(PhonemeError::invalid_argument(
                "hidden dimension must be positive when hidden layers are used",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Linear {
    /// `[fan_in, fan_out]`
    weight: Array2<f32>,
    bias: Array1<f32>,
}

impl Linear {
    fn he_normal(fan_in: usize, fan_out: usize, rng: &mut StdRng) -> Result<Self> {
        let std = (2.0 / fan_in.max(1) as f32).sqrt();
        let normal = Normal::new(0.0, std)
            .map_err(|err| PhonemeError::invalid_argument(format!("weight init: {err}")))?;
        Ok(Self {
            weight: Array2::from_shape_fn((fan_in, fan_out), |_| normal.sample(&mut *rng)),
            bias: Array1::zeros(fan_out),
        })
    }

    fn forward(&self, input: ArrayView2<'_, f32>) -> Array2<f32> {
        input.dot(&self.weight) + &self.bias
    }
}

#[derive(Debug, Clone)]
struct LinearMoments {
    weight: Moments<Ix2>,
    bias: Moments<Ix1>,
}

struct LinearGrad {
    weight: Array2<f32>,
    bias: Array1<f32>,
}

#[derive(Serialize, Deserialize)]
struct MlpCheckpoint {
    architecture: MlpArchitecture,
    layers: Vec<Linear>,
}

/// `hidden_layers` blocks of `Linear + ReLU` followed by an output `Linear` producing logits.
#[derive(Debug, Clone)]
pub struct MlpClassifier {
    architecture: MlpArchitecture,
    layers: Vec<Linear>,
    moments: Vec<LinearMoments>,
    optimizer: AdamW,
}

impl MlpClassifier {
    pub fn new(architecture: MlpArchitecture, optimizer: AdamWConfig, seed: u64) -> Result<Self> {
        architecture.validate()?;
        let mut rng = StdRng::seed_from_u64(seed);
        let layers = architecture
            .layer_shapes()
            .into_iter()
            .map(|(fan_in, fan_out)| Linear::he_normal(fan_in, fan_out, &mut rng))
            .collect::<Result<Vec<_>>>()?;
        let moments = fresh_moments(&layers);

        Ok(Self {
            architecture,
            layers,
            moments,
            optimizer: AdamW::new(optimizer),
        })
    }

    pub fn parameter_count(&self) -> usize {
        self.layers
            .iter()
            .map(|layer| layer.weight.len() + layer.bias.len())
            .sum()
    }

    pub fn logits(&self, features: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
        self.check_input(features)?;
        let mut activation = features.to_owned();
        for (idx, layer) in self.layers.iter().enumerate() {
            activation = layer.forward(activation.view());
            if idx + 1 < self.layers.len() {
                activation.mapv_inplace(relu);
            }
        }
        Ok(activation)
    }

    /// Returns the input of every layer followed by the final logits.
    fn forward_cached(&self, features: ArrayView2<'_, f32>) -> (Vec<Array2<f32>>, Array2<f32>) {
        let mut inputs = Vec::with_capacity(self.layers.len());
        let mut activation = features.to_owned();
        for (idx, layer) in self.layers.iter().enumerate() {
            let mut output = layer.forward(activation.view());
            if idx + 1 < self.layers.len() {
                output.mapv_inplace(relu);
            }
            inputs.push(activation);
            activation = output;
        }
        (inputs, activation)
    }

    fn backward(&self, inputs: &[Array2<f32>], grad_logits: Array2<f32>) -> Vec<LinearGrad> {
        let mut grads = Vec::with_capacity(self.layers.len());
        let mut upstream = grad_logits;
        for (idx, layer) in self.layers.iter().enumerate().rev() {
            let input = &inputs[idx];
            let weight = input.t().dot(&upstream);
            let bias = upstream.sum_axis(Axis(0));
            if idx > 0 {
                let mut next = upstream.dot(&layer.weight.t());
                // ReLU gate: the layer input is the post-activation of the previous block.
                next.zip_mut_with(input, |g, &a| {
                    if a <= 0.0 {
                        *g = 0.0;
                    }
                });
                upstream = next;
            }
            grads.push(LinearGrad { weight, bias });
        }
        grads.reverse();
        grads
    }

    fn check_input(&self, features: ArrayView2<'_, f32>) -> Result<()> {
        let width = features.len_of(Axis(1));
        if width != self.architecture.input_dim {
            return Err(PhonemeError::invalid_data(format!(
                "batch has {width} features per row, classifier expects {}",
                self.architecture.input_dim
            )));
        }
        Ok(())
    }
}

impl PhonemeModel for MlpClassifier {
    fn train_step(
        &mut self,
        features: ArrayView2<'_, f32>,
        labels: ArrayView1<'_, usize>,
    ) -> Result<BatchOutput> {
        self.check_input(features)?;
        let (inputs, logits) = self.forward_cached(features);
        let (loss, grad_logits) = softmax_cross_entropy(logits.view(), labels)?;
        let predictions = argmax_rows(logits.view());
        let grads = self.backward(&inputs, grad_logits);

        self.optimizer.begin_step();
        for ((layer, moments), grad) in self
            .layers
            .iter_mut()
            .zip(self.moments.iter_mut())
            .zip(grads.iter())
        {
            self.optimizer
                .update(&mut layer.weight, &grad.weight, &mut moments.weight);
            self.optimizer
                .update(&mut layer.bias, &grad.bias, &mut moments.bias);
        }

        Ok(BatchOutput { loss, predictions })
    }

    fn eval_step(
        &self,
        features: ArrayView2<'_, f32>,
        labels: Option<ArrayView1<'_, usize>>,
    ) -> Result<(Option<f32>, Array1<usize>)> {
        let logits = self.logits(features)?;
        let loss = match labels {
            Some(labels) => Some(softmax_cross_entropy(logits.view(), labels)?.0),
            None => None,
        };
        Ok((loss, argmax_rows(logits.view())))
    }

    fn save_checkpoint(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| PhonemeError::io(parent, &err))?;
        }
        let checkpoint = MlpCheckpoint {
            architecture: self.architecture,
            layers: self.layers.clone(),
        };

        // The previous checkpoint stays intact until the new one is fully on disk.
        let staging = staging_path(path);
        let file = File::create(&staging).map_err(|err| PhonemeError::io(&staging, &err))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &checkpoint).map_err(|err| {
            PhonemeError::invalid_data(format!("cannot write checkpoint {}: {err}", path.display()))
        })?;
        writer
            .into_inner()
            .map_err(|err| PhonemeError::io(&staging, err.error()))?
            .sync_all()
            .map_err(|err| PhonemeError::io(&staging, &err))?;
        fs::rename(&staging, path).map_err(|err| PhonemeError::io(path, &err))?;
        debug!(path = %path.display(), params = self.parameter_count(), "checkpoint saved");
        Ok(())
    }

    fn load_checkpoint(&mut self, path: &Path) -> Result<()> {
        let file = File::open(path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                PhonemeError::missing_data(format!("checkpoint {} not found", path.display()))
            } else {
                PhonemeError::io(path, &err)
            }
        })?;
        let checkpoint: MlpCheckpoint =
            serde_json::from_reader(BufReader::new(file)).map_err(|err| {
                PhonemeError::invalid_data(format!("malformed checkpoint {}: {err}", path.display()))
            })?;

        if checkpoint.architecture != self.architecture {
            return Err(PhonemeError::invalid_data(format!(
                "checkpoint architecture {:?} does not match classifier {:?}",
                checkpoint.architecture, self.architecture
            )));
        }
        let expected = self.architecture.layer_shapes();
        let shapes_match = checkpoint.layers.len() == expected.len()
            && checkpoint
                .layers
                .iter()
                .zip(expected.iter())
                .all(|(layer, &shape)| layer.weight.dim() == shape && layer.bias.len() == shape.1);
        if !shapes_match {
            return Err(PhonemeError::invalid_data(format!(
                "checkpoint {} has inconsistent layer shapes",
                path.display()
            )));
        }

        self.moments = fresh_moments(&checkpoint.layers);
        self.layers = checkpoint.layers;
        self.optimizer = AdamW::new(*self.optimizer.config());
        debug!(path = %path.display(), "checkpoint loaded");
        Ok(())
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    PathBuf::from(staging)
}

fn fresh_moments(layers: &[Linear]) -> Vec<LinearMoments> {
    layers
        .iter()
        .map(|layer| LinearMoments {
            weight: Moments::zeros(layer.weight.raw_dim()),
            bias: Moments::zeros(layer.bias.raw_dim()),
        })
        .collect()
}

fn relu(value: f32) -> f32 {
    value.max(0.0)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use approx::assert_abs_diff_eq;
    use ndarray::{Array1, Array2};
    use tempfile::tempdir;

    use super::{MlpArchitecture, MlpClassifier};
    use crate::phoneme::model::{AdamWConfig, PhonemeModel};
    use crate::phoneme::ErrorKind;

    fn toy_architecture() -> MlpArchitecture {
        MlpArchitecture {
            input_dim: 4,
            hidden_dim: 8,
            hidden_layers: 1,
            output_dim: 3,
        }
    }

    fn optimizer() -> AdamWConfig {
        AdamWConfig {
            learning_rate: 0.01,
            ..AdamWConfig::default()
        }
    }

    /// Class `c` lights up input coordinate `c` with a small per-row wobble.
    fn separable_batch() -> (Array2<f32>, Array1<usize>) {
        let rows = 30;
        let features = Array2::from_shape_fn((rows, 4), |(row, col)| {
            let class = row % 3;
            let wobble = (row as f32 * 0.37).sin() * 0.1;
            if col == class {
                1.0 + wobble
            } else {
                wobble
            }
        });
        let labels = Array1::from_shape_fn(rows, |row| row % 3);
        (features, labels)
    }

    #[test]
    fn learns_separable_classes() {
        let (features, labels) = separable_batch();
        let mut model = MlpClassifier::new(toy_architecture(), optimizer(), 7).unwrap();

        let first = model.train_step(features.view(), labels.view()).unwrap().loss;
        let mut last = first;
        for _ in 0..300 {
            last = model.train_step(features.view(), labels.view()).unwrap().loss;
        }

        assert!(last < first * 0.5, "loss went from {first} to {last}");
        let (_, predictions) = model.eval_step(features.view(), None).unwrap();
        assert_eq!(predictions, labels);
    }

    #[test]
    fn same_seed_builds_identical_models() {
        let (features, _) = separable_batch();
        let a = MlpClassifier::new(toy_architecture(), optimizer(), 3).unwrap();
        let b = MlpClassifier::new(toy_architecture(), optimizer(), 3).unwrap();
        assert_eq!(
            a.logits(features.view()).unwrap(),
            b.logits(features.view()).unwrap()
        );
    }

    #[test]
    fn checkpoint_round_trip_preserves_logits() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("model.ckpt");
        let (features, labels) = separable_batch();

        let mut trained = MlpClassifier::new(toy_architecture(), optimizer(), 1).unwrap();
        for _ in 0..5 {
            trained.train_step(features.view(), labels.view()).unwrap();
        }
        trained.save_checkpoint(&path).unwrap();

        let mut restored = MlpClassifier::new(toy_architecture(), optimizer(), 99).unwrap();
        restored.load_checkpoint(&path).unwrap();

        let expected = trained.logits(features.view()).unwrap();
        let actual = restored.logits(features.view()).unwrap();
        for (a, b) in expected.iter().zip(actual.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-5);
        }
    }

    #[test]
    fn failed_save_keeps_previous_checkpoint() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.ckpt");
        let (features, labels) = separable_batch();

        let mut model = MlpClassifier::new(toy_architecture(), optimizer(), 5).unwrap();
        model.save_checkpoint(&path).unwrap();
        assert!(!dir.path().join("model.ckpt.tmp").exists());
        let saved = model.logits(features.view()).unwrap();

        model.train_step(features.view(), labels.view()).unwrap();
        fs::create_dir(dir.path().join("model.ckpt.tmp")).unwrap();
        let err = model.save_checkpoint(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);

        let mut restored = MlpClassifier::new(toy_architecture(), optimizer(), 6).unwrap();
        restored.load_checkpoint(&path).unwrap();
        let actual = restored.logits(features.view()).unwrap();
        for (a, b) in saved.iter().zip(actual.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-5);
        }
    }

    #[test]
    fn rejects_checkpoint_with_other_architecture() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.ckpt");
        MlpClassifier::new(toy_architecture(), optimizer(), 1)
            .unwrap()
            .save_checkpoint(&path)
            .unwrap();

        let wider = MlpArchitecture {
            hidden_dim: 16,
            ..toy_architecture()
        };
        let mut model = MlpClassifier::new(wider, optimizer(), 1).unwrap();
        let err = model.load_checkpoint(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn missing_checkpoint_is_missing_data() {
        let dir = tempdir().unwrap();
        let mut model = MlpClassifier::new(toy_architecture(), optimizer(), 1).unwrap();
        let err = model
            .load_checkpoint(&dir.path().join("absent.ckpt"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingData);
    }

    #[test]
    fn rejects_batches_of_the_wrong_width() {
        let model = MlpClassifier::new(toy_architecture(), optimizer(), 1).unwrap();
        let err = model
            .eval_step(Array2::zeros((2, 5)).view(), None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn zero_hidden_layers_is_a_linear_classifier() {
        let architecture = MlpArchitecture {
            hidden_layers: 0,
            ..toy_architecture()
        };
        let model = MlpClassifier::new(architecture, optimizer(), 1).unwrap();
        assert_eq!(model.parameter_count(), 4 * 3 + 3);
    }
}
