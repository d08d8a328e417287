use std::path::PathBuf;

use tracing::warn;

use super::{ScaleModel, StackError, REFERENCE_MAGZP};
use crate::cutout::{Cutout, CutoutHeader, ImageIo};
use crate::header::{keys, Header};
use crate::plane::Plane;
use crate::wcs::Wcs;

/// Per-frame photometric and geometric calibration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub magzp: f64,
    /// e-/count
    pub gain: f64,
    /// seconds
    pub exptime: f64,
    /// counts
    pub bgmedian: f64,
    /// Background noise in counts, when measured.
    pub bgstdev: Option<f64>,
    /// Observer distance, au.
    pub delta: f64,
    /// Heliocentric distance, au.
    pub rh: f64,
}

impl Calibration {
    pub fn from_header(header: &Header) -> Result<Self, StackError> {
        let get = |key: &'static str| {
            header
                .get_f64(key)
                .ok_or(StackError::MissingCalibration { key })
        };
        let positive = |key: &'static str| {
            get(key).and_then(|v| {
                if v > 0.0 {
                    Ok(v)
                } else {
                    Err(StackError::MissingCalibration { key })
                }
            })
        };

        Ok(Self {
            magzp: get(keys::MAGZP)?,
            gain: positive(keys::GAIN)?,
            exptime: positive(keys::EXPTIME)?,
            bgmedian: get(keys::BGMEDIAN)?,
            bgstdev: header.get_f64(keys::BGSTDEV),
            delta: positive(keys::DELTA)?,
            rh: positive(keys::RH)?,
        })
    }

    /// Factor taking background-subtracted counts to the common scale:
    /// flux rate at the reference zero point times `Δ^k · rh²`.
    pub fn scale(&self, model: ScaleModel) -> f64 {
        self.gain / self.exptime
            * 10f64.powf(-0.4 * (self.magzp - REFERENCE_MAGZP))
            * self.delta.powi(model.delta_exponent())
            * self.rh.powi(2)
    }

    /// Variance of a normalized pixel whose raw value is `raw` counts.
    pub fn variance(&self, raw: f32, scale: f64) -> f64 {
        let signal = (raw as f64 - self.bgmedian).max(0.0) / self.gain;
        let background = self.bgstdev.map_or(0.0, |s| s * s);
        (signal + background) * scale * scale
    }
}

/// A cutout ready for combination.
#[derive(Debug, Clone)]
pub struct Frame {
    pub path: PathBuf,
    /// Raw counts.
    pub data: Plane<f32>,
    /// `true` = excluded.
    pub mask: Plane<bool>,
    pub calibration: Calibration,
}

/// Expected 0-based pixel position of the target, from its ephemeris position
/// and the alignment plane's world coordinates.
pub fn target_pixel(header: &CutoutHeader) -> Option<(f64, f64)> {
    let wcs = Wcs::from_header(&header.alignment)?;
    let ra = header.science.get_f64(keys::TGTRA)?;
    let dec = header.science.get_f64(keys::TGTDEC)?;
    wcs.sky_to_pixel(ra, dec)
}

/// Validity mask of a cutout: its own mask (or nothing), with the box around
/// the target cleared and non-finite pixels added.
///
/// A target position whose box would not touch the plane falls back to the
/// plane centre.
pub fn prepare_mask(cutout: &Cutout, unmask_half_width: usize) -> Plane<bool> {
    let (width, height) = cutout.data.shape();
    let mut mask = match &cutout.mask {
        Some(mask) if mask.same_shape(&cutout.data) => mask.clone(),
        _ => Plane::new_filled(width, height, false),
    };

    let half = unmask_half_width as f64;
    let reachable = |v: f64, len: usize| v >= -half - 0.5 && v < len as f64 + half - 0.5;
    let (cx, cy) = match target_pixel(&cutout.header) {
        Some((x, y)) if reachable(x, width) && reachable(y, height) => (x, y),
        other => {
            if let Some((x, y)) = other {
                warn!(
                    "{}: target pixel ({x:.1}, {y:.1}) is off the image, unmasking the centre",
                    cutout.header.science.get_str(keys::OBJECT).unwrap_or("cutout")
                );
            }
            ((width / 2) as f64, (height / 2) as f64)
        }
    };
    mask.fill_box(
        cx.round() as i64,
        cy.round() as i64,
        unmask_half_width as i64,
        false,
    );

    for (masked, value) in mask.pixels_mut().iter_mut().zip(cutout.data.pixels()) {
        *masked |= !value.is_finite();
    }
    mask
}

/// Reads every cutout in `paths` that can take part in a combination.
///
/// Unreadable files, frames without calibration, and frames whose shape
/// differs from the first usable frame are logged and skipped.
pub fn load_frames<I: ImageIo + ?Sized>(
    io: &I,
    paths: &[PathBuf],
    unmask_half_width: usize,
) -> Vec<Frame> {
    let mut frames: Vec<Frame> = Vec::with_capacity(paths.len());

    for path in paths {
        let cutout = match io.read_cutout(path) {
            Ok(cutout) => cutout,
            Err(err) => {
                warn!("Skipping {}: {err}", path.display());
                continue;
            }
        };

        let calibration = match Calibration::from_header(&cutout.header.science) {
            Ok(calibration) => calibration,
            Err(err) => {
                warn!("Skipping {}: {err}", path.display());
                continue;
            }
        };

        if let Some(first) = frames.first() {
            if !first.data.same_shape(&cutout.data) {
                warn!(
                    "Skipping {}: shape {:?} differs from {:?}",
                    path.display(),
                    cutout.data.shape(),
                    first.data.shape()
                );
                continue;
            }
        }

        let mask = prepare_mask(&cutout, unmask_half_width);
        frames.push(Frame {
            path: path.clone(),
            data: cutout.data,
            mask,
            calibration,
        });
    }

    frames
}
