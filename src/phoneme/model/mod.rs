mod loss;
mod mlp;
mod optimizer;

use std::path::Path;

use ndarray::{Array1, ArrayView1, ArrayView2};

use crate::phoneme::Result;

pub use loss::{argmax_rows, softmax_cross_entropy};
pub use mlp::{MlpArchitecture, MlpClassifier};
pub use optimizer::{AdamW, AdamWConfig, Moments};

/// Loss and predicted classes for one mini-batch.
#[derive(Debug, Clone)]
pub struct BatchOutput {
    pub loss: f32,
    pub predictions: Array1<usize>,
}

/// Minimal capability the trainer needs from a frame classifier.
pub trait PhonemeModel {
    /// Runs forward and backward passes and applies one optimizer update.
    fn train_step(
        &mut self,
        features: ArrayView2<'_, f32>,
        labels: ArrayView1<'_, usize>,
    ) -> Result<BatchOutput>;

    /// Forward pass only. The loss is reported when labels are supplied.
    fn eval_step(
        &self,
        features: ArrayView2<'_, f32>,
        labels: Option<ArrayView1<'_, usize>>,
    ) -> Result<(Option<f32>, Array1<usize>)>;

    fn save_checkpoint(&self, path: &Path) -> Result<()>;

    fn load_checkpoint(&mut self, path: &Path) -> Result<()>;
}
