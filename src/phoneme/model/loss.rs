use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::phoneme::{PhonemeError, Result};

/// Mean softmax cross-entropy over the batch and its gradient with respect to the logits.
pub fn softmax_cross_entropy(
    logits: ArrayView2<'_, f32>,
    labels: ArrayView1<'_, usize>,
) -> Result<(f32, Array2<f32>)> {
    let (batch, classes) = logits.dim();
    if labels.len() != batch {
        return Err(PhonemeError::invalid_data(format!(
            "batch has {batch} rows but {} labels",
            labels.len()
        )));
    }
    if batch == 0 {
        return Ok((0.0, Array2::zeros((0, classes))));
    }

    let mut grad = Array2::zeros((batch, classes));
    let mut total = 0.0_f64;
    for ((row, &label), mut grad_row) in logits
        .outer_iter()
        .zip(labels.iter())
        .zip(grad.outer_iter_mut())
    {
        if label >= classes {
            return Err(PhonemeError::invalid_data(format!(
                "label {label} outside [0, {classes})"
            )));
        }
        let max = row.fold(f32::NEG_INFINITY, |acc, &v| acc.max(v));
        for (g, &v) in grad_row.iter_mut().zip(row.iter()) {
            *g = (v - max).exp();
        }
        let sum = grad_row.sum();
        total += f64::from(max - row[label] + sum.ln());

        grad_row.mapv_inplace(|e| e / sum);
        grad_row[label] -= 1.0;
    }

    grad.mapv_inplace(|g| g / batch as f32);
    Ok(((total / batch as f64) as f32, grad))
}

/// Index of the largest logit in every row. Ties resolve to the lowest index.
pub fn argmax_rows(logits: ArrayView2<'_, f32>) -> Array1<usize> {
    logits
        .axis_iter(Axis(0))
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |best, (idx, &value)| {
                    if value > best.1 {
                        (idx, value)
                    } else {
                        best
                    }
                })
                .0
        })
        .collect()
}
