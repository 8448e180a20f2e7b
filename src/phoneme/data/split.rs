use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::phoneme::{PhonemeError, Result};

/// Shuffles utterance ids with a seeded generator and cuts them into train/validation.
///
/// The first `floor(len * ratio)` shuffled ids go to training, the rest to validation.
/// The result depends only on `(ids, ratio, seed)`. Ids must be unique.
pub fn split_utterances(
    utterance_ids: &[String],
    ratio: f64,
    seed: u64,
) -> Result<(Vec<String>, Vec<String>)> {
    if !ratio.is_finite() || ratio <= 0.0 || ratio > 1.0 {
        return Err(PhonemeError::invalid_argument(format!(
            "train ratio must be in (0, 1], got {ratio}"
        )));
    }

    let mut seen = HashSet::with_capacity(utterance_ids.len());
    for id in utterance_ids {
        if !seen.insert(id.as_str()) {
            return Err(PhonemeError::invalid_argument(format!(
                "utterance {id} appears more than once in the split pool"
            )));
        }
    }

    let mut shuffled = utterance_ids.to_vec();
    let mut rng = StdRng::seed_from_u64(seed);
    shuffled.shuffle(&mut rng);

    let pivot = ((shuffled.len() as f64) * ratio).floor() as usize;
    let validation = shuffled.split_off(pivot.min(shuffled.len()));
    Ok((shuffled, validation))
}
