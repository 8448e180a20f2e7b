/// Running counters for one pass over a split.
///
/// Accuracy is `correct / frames`; loss is the mean of the per-batch losses.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct EpochTally {
    correct: usize,
    frames: usize,
    loss_sum: f64,
    batches: usize,
}

impl EpochTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(self, loss: f32, correct: usize, frames: usize) -> Self {
        Self {
            correct: self.correct + correct,
            frames: self.frames + frames,
            loss_sum: self.loss_sum + f64::from(loss),
            batches: self.batches + 1,
        }
    }

    pub fn correct(&self) -> usize {
        self.correct
    }

    pub fn accuracy(&self) -> Option<f64> {
        if self.frames == 0 {
            None
        } else {
            Some(self.correct as f64 / self.frames as f64)
        }
    }

    pub fn loss(&self) -> Option<f64> {
        if self.batches == 0 {
            None
        } else {
            Some(self.loss_sum / self.batches as f64)
        }
    }
}
