use ndarray::{s, Array2, ArrayView2, Axis};

use crate::phoneme::{PhonemeError, Result};

/// Expands every frame into the concatenation of its `concat_n` centered neighbours.
///
/// Slot `r` of output row `t` holds input row `clamp(t + r - k, 0, len - 1)` with
/// `k = concat_n / 2`, so the first and last frames are repeated at the edges and the
/// output keeps exactly one row per input frame.
pub fn concat_frames(frames: ArrayView2<'_, f32>, concat_n: usize) -> Result<Array2<f32>> {
    if concat_n % 2 == 0 {
        return Err(PhonemeError::invalid_argument(format!(
            "window size must be odd, got {concat_n}"
        )));
    }
    if concat_n < 2 {
        return Ok(frames.to_owned());
    }

    let frame_count = frames.len_of(Axis(0));
    let feature_dim = frames.len_of(Axis(1));
    let half = concat_n / 2;
    let mut output = Array2::zeros((frame_count, concat_n * feature_dim));

    for (t, mut row) in output.outer_iter_mut().enumerate() {
        for slot in 0..concat_n {
            let source = (t + slot).saturating_sub(half).min(frame_count - 1);
            row.slice_mut(s![slot * feature_dim..(slot + 1) * feature_dim])
                .assign(&frames.row(source));
        }
    }

    Ok(output)
}
