//! Masked combination engine and baseline differencer.
//!
//! Frames are background-subtracted, converted to a flux rate at a common
//! zero point and scaled for observing geometry before being combined:
//!
//! - one frame: the frame itself
//! - two frames: inverse-variance weighted mean
//! - three or more: masked median
//!
//! Pixels masked in every frame come out as NaN.

mod baseline;
mod combine;
mod error;
mod normalize;
#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

pub use baseline::{difference, stack_model, ModelPlanes};
pub use combine::{combine, median_f32_mut};
pub use error::StackError;
pub use normalize::{load_frames, prepare_mask, target_pixel, Calibration, Frame};

/// Common photometric zero point of every output plane.
pub const REFERENCE_MAGZP: f64 = 25.0;

/// Half-size of the box around the target that is never masked (5 -> 11x11).
pub const DEFAULT_UNMASK_HALF_WIDTH: usize = 5;

/// Flux scaling convention, named after the output plane it produces.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ScaleModel {
    /// Extended coma: flux scales as 1/Δ.
    Coma,
    /// Unresolved surface: flux scales as 1/Δ².
    Surface,
}

impl ScaleModel {
    /// Exponent `k` of the observer distance in the `Δ^k · rh²` normalization.
    pub fn delta_exponent(self) -> i32 {
        match self {
            ScaleModel::Coma => 1,
            ScaleModel::Surface => 2,
        }
    }

    pub fn plane_name(self) -> String {
        self.to_string()
    }

    pub fn baseline_plane_name(self) -> String {
        format!("{self}-baseline")
    }
}
