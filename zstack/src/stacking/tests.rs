use std::path::PathBuf;

use super::*;
use crate::header::{keys, Header, HeaderValue};
use crate::plane::Plane;
use crate::testing::{cutout, MemoryIo};

fn calibration() -> Calibration {
    Calibration {
        magzp: 25.0,
        gain: 1.0,
        exptime: 1.0,
        bgmedian: 0.0,
        bgstdev: None,
        delta: 1.0,
        rh: 1.0,
    }
}

fn frame(width: usize, height: usize, pixels: Vec<f32>, calibration: Calibration) -> Frame {
    Frame {
        path: PathBuf::from("frame.fits"),
        data: Plane::new(width, height, pixels),
        mask: Plane::new_filled(width, height, false),
        calibration,
    }
}

fn assert_close(actual: f32, expected: f64) {
    let tolerance = 1e-5 * expected.abs().max(1.0);
    assert!(
        (actual as f64 - expected).abs() < tolerance,
        "{actual} != {expected}"
    );
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

#[test]
fn test_scale_model_names() {
    assert_eq!(ScaleModel::Coma.plane_name(), "coma");
    assert_eq!(ScaleModel::Surface.baseline_plane_name(), "surface-baseline");
    assert_eq!("surface".parse::<ScaleModel>().unwrap(), ScaleModel::Surface);
}

#[test]
fn test_scale_combines_all_factors() {
    let c = Calibration {
        magzp: 26.0,
        gain: 2.0,
        exptime: 4.0,
        bgmedian: 10.0,
        bgstdev: None,
        delta: 3.0,
        rh: 2.0,
    };
    let zp = 10f64.powf(-0.4);
    assert!((c.scale(ScaleModel::Coma) - 0.5 * zp * 3.0 * 4.0).abs() < 1e-12);
    assert!((c.scale(ScaleModel::Surface) - 0.5 * zp * 9.0 * 4.0).abs() < 1e-12);
}

#[test]
fn test_surface_and_coma_scaling_invariant() {
    let near = Calibration {
        delta: 1.5,
        ..calibration()
    };
    let far = Calibration {
        delta: 3.0,
        ..calibration()
    };

    for (model, k) in [(ScaleModel::Coma, 1), (ScaleModel::Surface, 2)] {
        let a = combine(&[frame(1, 1, vec![100.0], near)], model).unwrap();
        let b = combine(&[frame(1, 1, vec![100.0], far)], model).unwrap();
        let ratio = a[(0, 0)] as f64 / b[(0, 0)] as f64;
        assert!(
            (ratio - (1.5f64 / 3.0).powi(k)).abs() < 1e-6,
            "{model}: ratio {ratio}"
        );
    }
}

#[test]
fn test_background_subtracted_before_scaling() {
    let c = Calibration {
        bgmedian: 40.0,
        exptime: 2.0,
        ..calibration()
    };
    let out = combine(&[frame(1, 1, vec![100.0], c)], ScaleModel::Coma).unwrap();
    assert_close(out[(0, 0)], 30.0);
}

#[test]
fn test_missing_zero_point_is_missing_calibration() {
    let mut header = cutout(1, 2_458_311.6, 1.0, 3, 3).header.science;
    header.remove(keys::MAGZP);
    assert_eq!(
        Calibration::from_header(&header),
        Err(StackError::MissingCalibration { key: keys::MAGZP })
    );

    header.set(keys::MAGZP, f64::NAN);
    assert!(Calibration::from_header(&header).is_err());

    header.set(keys::MAGZP, 25.0);
    header.set(keys::EXPTIME, 0.0);
    assert_eq!(
        Calibration::from_header(&header),
        Err(StackError::MissingCalibration { key: keys::EXPTIME })
    );
}

// ---------------------------------------------------------------------------
// Masks
// ---------------------------------------------------------------------------

#[test]
fn test_mask_clears_target_box_and_adds_non_finite() {
    let mut c = cutout(1, 2_458_311.6, 1.0, 21, 21);
    c.mask = Some(Plane::new_filled(21, 21, true));
    c.data[(0, 10)] = f32::NAN;
    c.data[(10, 10)] = f32::INFINITY;

    let mask = prepare_mask(&c, 5);
    // Target at the centre pixel; box covers 5..=15 on both axes.
    assert!(mask[(0, 0)]);
    assert!(mask[(4, 10)]);
    assert!(!mask[(5, 5)]);
    assert!(!mask[(15, 15)]);
    assert!(mask[(16, 10)]);
    // Non-finite pixels are masked even inside the box.
    assert!(mask[(10, 10)]);
    assert!(mask[(0, 10)]);
    assert_eq!(mask.pixels().iter().filter(|m| !**m).count(), 11 * 11 - 1);
}

#[test]
fn test_far_off_target_unmasks_the_centre() {
    let mut c = cutout(1, 2_458_311.6, 1.0, 21, 21);
    c.mask = Some(Plane::new_filled(21, 21, true));
    let ra = c.header.alignment.get_f64("CRVAL1").unwrap() + 89.999999999999;
    c.header.science.set(keys::TGTRA, ra);

    let (x, _) = target_pixel(&c.header).unwrap();
    assert!(x.abs() > 1e12);

    let mask = prepare_mask(&c, 5);
    assert!(!mask[(10, 10)]);
    assert!(!mask[(5, 15)]);
    assert!(mask[(4, 10)]);
    assert_eq!(mask.pixels().iter().filter(|m| !**m).count(), 11 * 11);
}

#[test]
fn test_target_just_off_the_edge_keeps_its_box() {
    let mut c = cutout(1, 2_458_311.6, 1.0, 21, 21);
    c.mask = Some(Plane::new_filled(21, 21, true));
    // CD1_1 is -1"/px: +13" in RA moves 13 px toward x = -3.
    let dec = c.header.alignment.get_f64("CRVAL2").unwrap();
    let ra = c.header.alignment.get_f64("CRVAL1").unwrap()
        + 13.0 / 3600.0 / dec.to_radians().cos();
    c.header.science.set(keys::TGTRA, ra);

    let mask = prepare_mask(&c, 5);
    assert!(!mask[(0, 10)]);
    assert!(!mask[(2, 15)]);
    assert!(mask[(3, 10)]);
    assert!(mask[(10, 10)]);
}

#[test]
fn test_target_pixel_from_wcs() {
    let c = cutout(1, 2_458_311.6, 1.0, 21, 21);
    let (x, y) = target_pixel(&c.header).unwrap();
    assert!((x - 10.0).abs() < 1e-9);
    assert!((y - 10.0).abs() < 1e-9);
}

#[test]
fn test_without_wcs_box_is_centred() {
    let mut c = cutout(1, 2_458_311.6, 1.0, 9, 9);
    c.header.alignment = Header::new();
    c.mask = Some(Plane::new_filled(9, 9, true));

    let mask = prepare_mask(&c, 1);
    assert!(!mask[(4, 4)]);
    assert!(!mask[(3, 5)]);
    assert!(mask[(2, 4)]);
}

// ---------------------------------------------------------------------------
// Combination
// ---------------------------------------------------------------------------

#[test]
fn test_empty_stack_is_empty_input() {
    assert_eq!(
        combine(&[], ScaleModel::Coma).unwrap_err(),
        StackError::EmptyInput
    );
}

#[test]
fn test_two_frames_give_inverse_variance_weighted_mean() {
    let noisy = Calibration {
        bgstdev: Some(4.0),
        ..calibration()
    };
    let quiet = Calibration {
        bgstdev: Some(2.0),
        ..calibration()
    };
    let a = frame(1, 1, vec![10.0], noisy);
    let b = frame(1, 1, vec![20.0], quiet);

    let out = combine(&[a.clone(), b.clone()], ScaleModel::Surface).unwrap();

    let var_a = a.calibration.variance(10.0, 1.0);
    let var_b = b.calibration.variance(20.0, 1.0);
    assert!((var_a - 26.0).abs() < 1e-12);
    assert!((var_b - 24.0).abs() < 1e-12);
    let expected = (10.0 / var_a + 20.0 / var_b) / (1.0 / var_a + 1.0 / var_b);
    assert_close(out[(0, 0)], expected);
}

#[test]
fn test_two_frames_without_variance_average() {
    let a = frame(1, 1, vec![0.0], calibration());
    let b = frame(1, 1, vec![6.0], calibration());
    let out = combine(&[a, b], ScaleModel::Coma).unwrap();
    assert_close(out[(0, 0)], 3.0);
}

#[test]
fn test_three_or_more_frames_take_median() {
    let frames: Vec<Frame> = [1.0, 100.0, 3.0, 2.0, 50.0]
        .into_iter()
        .map(|v| frame(1, 1, vec![v], calibration()))
        .collect();
    let out = combine(&frames[..3], ScaleModel::Coma).unwrap();
    assert_close(out[(0, 0)], 3.0);
    let out = combine(&frames[..4], ScaleModel::Coma).unwrap();
    assert_close(out[(0, 0)], 2.5);
    let out = combine(&frames, ScaleModel::Coma).unwrap();
    assert_close(out[(0, 0)], 3.0);
}

#[test]
fn test_masked_pixels_are_excluded_and_fully_masked_are_nan() {
    let mut frames: Vec<Frame> = [1.0, 2.0, 30.0]
        .into_iter()
        .map(|v| frame(2, 1, vec![v, v], calibration()))
        .collect();
    frames[2].mask[(0, 0)] = true;
    for f in &mut frames {
        f.mask[(1, 0)] = true;
    }

    let out = combine(&frames, ScaleModel::Coma).unwrap();
    assert_close(out[(0, 0)], 1.5);
    assert!(out[(1, 0)].is_nan());
}

#[test]
fn test_median_helper() {
    let mut odd = [5.0f32, 1.0, 3.0];
    assert_eq!(median_f32_mut(&mut odd), 3.0);
    let mut even = [4.0f32, 1.0, 3.0, 2.0];
    assert_eq!(median_f32_mut(&mut even), 2.5);
    let mut single = [-7.0f32];
    assert_eq!(median_f32_mut(&mut single), -7.0);
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

#[test]
fn test_frames_without_zero_point_are_skipped() {
    let io = MemoryIo::new();
    let mut bad = cutout(1, 2_458_311.6, 5.0, 3, 3);
    bad.header.science.set(keys::MAGZP, HeaderValue::Undefined);
    io.insert("/c/1.fits", bad);
    io.insert("/c/2.fits", cutout(2, 2_458_311.6, 7.0, 3, 3));

    let paths = vec![PathBuf::from("/c/1.fits"), PathBuf::from("/c/2.fits")];
    let frames = load_frames(&io, &paths, 5);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].path, PathBuf::from("/c/2.fits"));

    let out = combine(&frames, ScaleModel::Coma).unwrap();
    assert!(out.pixels().iter().all(|&v| (v - 7.0).abs() < 1e-6));
}

#[test]
fn test_all_frames_uncalibrated_is_empty_input() {
    let io = MemoryIo::new();
    let mut bad = cutout(1, 2_458_311.6, 5.0, 3, 3);
    bad.header.science.remove(keys::MAGZP);
    io.insert("/c/1.fits", bad);

    let paths = vec![PathBuf::from("/c/1.fits"), PathBuf::from("/c/missing.fits")];
    let frames = load_frames(&io, &paths, 5);
    assert!(frames.is_empty());
    assert_eq!(
        combine(&frames, ScaleModel::Surface).unwrap_err(),
        StackError::EmptyInput
    );
}

#[test]
fn test_shape_mismatch_is_skipped() {
    let io = MemoryIo::new();
    io.insert("/c/1.fits", cutout(1, 2_458_311.6, 1.0, 3, 3));
    io.insert("/c/2.fits", cutout(2, 2_458_311.6, 1.0, 4, 3));
    let paths = vec![PathBuf::from("/c/1.fits"), PathBuf::from("/c/2.fits")];
    assert_eq!(load_frames(&io, &paths, 5).len(), 1);
}

// ---------------------------------------------------------------------------
// Baseline differencing
// ---------------------------------------------------------------------------

#[test]
fn test_difference_is_exact_with_mask_propagation() {
    let mut nightly: Vec<Frame> = [4.0, 5.0, 6.0]
        .into_iter()
        .map(|v| frame(3, 1, vec![v, v * 2.0, v], calibration()))
        .collect();
    let mut baseline: Vec<Frame> = [1.0, 2.0]
        .into_iter()
        .map(|v| frame(3, 1, vec![v, v, v], calibration()))
        .collect();
    // Pixel 1 masked in every nightly frame, pixel 2 in every baseline frame.
    for f in &mut nightly {
        f.mask[(1, 0)] = true;
    }
    for f in &mut baseline {
        f.mask[(2, 0)] = true;
    }

    let planes = stack_model(&nightly, &baseline, ScaleModel::Coma).unwrap();
    let base = combine(&baseline, ScaleModel::Coma).unwrap();
    let diff = planes.difference.unwrap();

    for i in 0..3 {
        let expected = planes.combined.pixels()[i] - base.pixels()[i];
        let actual = diff.pixels()[i];
        assert!(
            actual == expected || (actual.is_nan() && expected.is_nan()),
            "pixel {i}: {actual} != {expected}"
        );
    }
    assert!(diff[(0, 0)].is_finite());
    assert!(diff[(1, 0)].is_nan());
    assert!(diff[(2, 0)].is_nan());
}

#[test]
fn test_empty_baseline_drops_difference_only() {
    let nightly = vec![frame(1, 1, vec![1.0], calibration())];
    let planes = stack_model(&nightly, &[], ScaleModel::Surface).unwrap();
    assert!(planes.difference.is_none());
    assert_eq!(planes.combined[(0, 0)], 1.0);
}

#[test]
fn test_baseline_shape_mismatch_drops_difference() {
    let nightly = vec![frame(2, 1, vec![1.0, 1.0], calibration())];
    let baseline = vec![frame(1, 1, vec![1.0], calibration())];
    let planes = stack_model(&nightly, &baseline, ScaleModel::Coma).unwrap();
    assert!(planes.difference.is_none());
}

#[test]
fn test_empty_nightly_is_empty_input() {
    let baseline = vec![frame(1, 1, vec![1.0], calibration())];
    assert_eq!(
        stack_model(&[], &baseline, ScaleModel::Coma).unwrap_err(),
        StackError::EmptyInput
    );
}
