use tracing::warn;

use super::{combine, Frame, ScaleModel, StackError};
use crate::plane::Plane;

/// Output planes of one scaling model.
#[derive(Debug, Clone)]
pub struct ModelPlanes {
    pub combined: Plane<f32>,
    /// Combined minus baseline, when a baseline could be combined.
    pub difference: Option<Plane<f32>>,
}

/// `nightly - baseline`, pixel by pixel. NaN in either operand gives NaN.
/// Returns `None` when the shapes differ.
pub fn difference(nightly: &Plane<f32>, baseline: &Plane<f32>) -> Option<Plane<f32>> {
    if !nightly.same_shape(baseline) {
        return None;
    }
    let pixels = nightly
        .pixels()
        .iter()
        .zip(baseline.pixels())
        .map(|(n, b)| n - b)
        .collect();
    Some(Plane::new(nightly.width(), nightly.height(), pixels))
}

/// Combines the nightly frames and, if possible, the baseline frames for
/// `model`. A baseline that is empty or unusable only drops the difference.
pub fn stack_model(
    nightly: &[Frame],
    baseline: &[Frame],
    model: ScaleModel,
) -> Result<ModelPlanes, StackError> {
    let combined = combine(nightly, model)?;

    let difference = match combine(baseline, model) {
        Ok(base) => {
            let diff = difference(&combined, &base);
            if diff.is_none() {
                warn!(
                    "Baseline shape {:?} differs from nightly {:?}, no {} difference",
                    base.shape(),
                    combined.shape(),
                    model
                );
            }
            diff
        }
        Err(StackError::EmptyInput) => None,
        Err(err) => return Err(err),
    };

    Ok(ModelPlanes {
        combined,
        difference,
    })
}
