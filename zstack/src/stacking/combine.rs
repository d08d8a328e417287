use super::{Frame, ScaleModel, StackError};
use crate::plane::Plane;

/// Median of `data`, reordering it in place. Even lengths average the two
/// middle values.
#[inline]
pub fn median_f32_mut(data: &mut [f32]) -> f32 {
    debug_assert!(!data.is_empty());

    let len = data.len();
    let mid = len / 2;

    let (left_part, median, _) = data.select_nth_unstable_by(mid, f32::total_cmp);
    let upper = *median;
    if len & 1 == 1 {
        upper
    } else {
        let lower = left_part.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        (lower + upper) * 0.5
    }
}

/// Inverse-variance weighted mean of `(value, variance)` samples. Falls back
/// to the plain mean when any variance is not positive.
fn weighted_mean(samples: &[(f64, f64)]) -> f64 {
    if samples.iter().all(|&(_, var)| var > 0.0 && var.is_finite()) {
        let (sum, weights) = samples
            .iter()
            .fold((0.0, 0.0), |(sum, weights), &(value, var)| {
                (sum + value / var, weights + 1.0 / var)
            });
        sum / weights
    } else {
        samples.iter().map(|&(value, _)| value).sum::<f64>() / samples.len() as f64
    }
}

/// Combines frames on the scale of `model`.
///
/// All frames must share one shape. Returns [`StackError::EmptyInput`] for
/// an empty stack.
pub fn combine(frames: &[Frame], model: ScaleModel) -> Result<Plane<f32>, StackError> {
    let Some(first) = frames.first() else {
        return Err(StackError::EmptyInput);
    };
    let (width, height) = first.data.shape();
    debug_assert!(frames.iter().all(|f| f.data.shape() == (width, height)));

    let scales: Vec<f64> = frames
        .iter()
        .map(|f| f.calibration.scale(model))
        .collect();
    let use_median = frames.len() > 2;

    let mut out = Plane::new_filled(width, height, f32::NAN);
    let mut samples: Vec<(f64, f64)> = Vec::with_capacity(frames.len());
    let mut values: Vec<f32> = Vec::with_capacity(frames.len());

    for (i, pixel) in out.pixels_mut().iter_mut().enumerate() {
        samples.clear();
        for (frame, &scale) in frames.iter().zip(&scales) {
            if frame.mask.pixels()[i] {
                continue;
            }
            let raw = frame.data.pixels()[i];
            let value = (raw as f64 - frame.calibration.bgmedian) * scale;
            samples.push((value, frame.calibration.variance(raw, scale)));
        }

        if samples.is_empty() {
            continue;
        }

        *pixel = if use_median {
            values.clear();
            values.extend(samples.iter().map(|&(value, _)| value as f32));
            median_f32_mut(&mut values)
        } else {
            weighted_mean(&samples) as f32
        };
    }

    Ok(out)
}
