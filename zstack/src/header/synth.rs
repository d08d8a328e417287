use std::path::{Path, PathBuf};

use tracing::warn;

use super::keys::*;
use super::{Header, HeaderValue};
use crate::cutout::{CutoutHeader, ImageIo};
use crate::time::jd_to_iso;

/// Facility cards present on every composite, including empty ones.
pub const INSTRUMENT_CARDS: [(&str, &str); 4] = [
    ("ORIGIN", "Zwicky Transient Facility"),
    ("OBSERVAT", "Palomar"),
    ("TELESCOP", "P48"),
    ("INSTRUME", "ZTF/MOSAIC"),
];

/// Keywords averaged arithmetically across inputs.
pub const MEAN_KEYS: [&str; 14] = [
    OBSJD, RH, RDOT, DELTA, PHASE, SELONG, SANGLE, VANGLE, TRUEANOM, TMTP, TGTDRA, TGTDDEC,
    TGTRASIG, TGTDESIG,
];

/// Reads the headers of `paths` and aggregates them.
///
/// Inputs are taken in file-name order. Unreadable files are logged and left
/// out, so the result describes the files that could be read.
pub fn synthesize<I: ImageIo + ?Sized>(io: &I, paths: &[PathBuf]) -> Header {
    let mut sorted: Vec<&Path> = paths.iter().map(PathBuf::as_path).collect();
    sorted.sort();

    let headers: Vec<CutoutHeader> = sorted
        .into_iter()
        .filter_map(|path| match io.read_header(path) {
            Ok(header) => Some(header),
            Err(err) => {
                warn!("Skipping header of {}: {err}", path.display());
                None
            }
        })
        .collect();

    aggregate(&headers)
}

/// Aggregates already-ordered cutout headers into one composite header.
pub fn aggregate(inputs: &[CutoutHeader]) -> Header {
    let mut header = Header::new();
    for (key, value) in INSTRUMENT_CARDS {
        header.set(key, value);
    }

    let (Some(first), Some(last)) = (inputs.first(), inputs.last()) else {
        return header;
    };
    let science: Vec<&Header> = inputs.iter().map(|h| &h.science).collect();

    header.set(OBJECT, first.science.get(OBJECT).cloned().unwrap_or(HeaderValue::Undefined));
    header.set(NIMAGES, inputs.len());
    header.set(EXPTIME, sum(&science, EXPTIME));

    let first_jd = first.science.get_f64(OBSJD);
    let last_jd = last.science.get_f64(OBSJD);
    header.set(OBSJD1, first_jd);
    header.set(OBSJD2, last_jd);
    header.set(DATE1, shutter_date(&first.science));
    header.set(DATE2, shutter_date(&last.science));

    for key in MEAN_KEYS {
        header.set(key, mean(&science, key));
    }

    let coords: Option<Vec<(f64, f64)>> = science
        .iter()
        .map(|h| Some((h.get_f64(TGTRA)?, h.get_f64(TGTDEC)?)))
        .collect();
    let (ra, dec) = coords
        .and_then(|c| spherical_mean(&c))
        .map_or((None, None), |(ra, dec)| (Some(ra), Some(dec)));
    header.set(TGTRA, ra);
    header.set(TGTDEC, dec);

    let pids: Vec<String> = science
        .iter()
        .filter_map(|h| h.get_i64(DBPID))
        .map(|pid| pid.to_string())
        .collect();
    header.set(DBPIDS, pids.join(","));

    for card in first.alignment.cards() {
        if is_wcs_key(&card.key) && !card.value.is_undefined() {
            header.set(&card.key, card.value.clone());
        }
    }

    header
}

/// `BL`-prefixed provenance cards from a baseline aggregate. An empty
/// baseline yields only `BLNIMG = 0`.
pub fn baseline_cards(baseline: &Header) -> Header {
    let mut cards = Header::new();
    let count = baseline.get_i64(NIMAGES).unwrap_or(0);
    cards.set(BLNIMG, count);
    if count == 0 {
        return cards;
    }

    for (bl_key, key) in [
        (BLEXPT, EXPTIME),
        (BLDATE1, DATE1),
        (BLDATE2, DATE2),
        (BLOBSJD, OBSJD),
        (BLPIDS, DBPIDS),
    ] {
        if let Some(value) = baseline.get(key) {
            cards.set(bl_key, value.clone());
        }
    }
    cards
}

/// World coordinate keywords copied verbatim from the alignment plane.
pub fn is_wcs_key(key: &str) -> bool {
    const EXACT: [&str; 6] = ["WCSAXES", "RADESYS", "RADECSYS", "EQUINOX", "LONPOLE", "LATPOLE"];
    const INDEXED: [&str; 7] = ["CTYPE", "CUNIT", "CRPIX", "CRVAL", "CDELT", "CROTA", "PC"];

    if EXACT.contains(&key) {
        return true;
    }
    let indexed = |prefix: &str| {
        key.strip_prefix(prefix).is_some_and(|rest| {
            !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit() || c == '_')
        })
    };
    indexed("CD") || INDEXED.iter().any(|p| indexed(*p))
}

/// Mean direction of points on the sphere, degrees in and out; RA in `[0, 360)`.
///
/// Returns `None` for an empty input or points that cancel out.
pub fn spherical_mean(coords: &[(f64, f64)]) -> Option<(f64, f64)> {
    if coords.is_empty() {
        return None;
    }

    let (mut x, mut y, mut z) = (0.0, 0.0, 0.0);
    for &(ra, dec) in coords {
        let (sin_ra, cos_ra) = ra.to_radians().sin_cos();
        let (sin_dec, cos_dec) = dec.to_radians().sin_cos();
        x += cos_dec * cos_ra;
        y += cos_dec * sin_ra;
        z += sin_dec;
    }

    if (x * x + y * y + z * z).sqrt() < 1e-12 {
        return None;
    }

    let ra = y.atan2(x).to_degrees().rem_euclid(360.0);
    let ra = if ra >= 360.0 { 0.0 } else { ra };
    let dec = z.atan2(x.hypot(y)).to_degrees();
    Some((ra, dec))
}

fn sum(headers: &[&Header], key: &str) -> Option<f64> {
    headers.iter().map(|h| h.get_f64(key)).sum()
}

/// Arithmetic mean, or `None` if any input has no defined value.
fn mean(headers: &[&Header], key: &str) -> Option<f64> {
    sum(headers, key).map(|total| total / headers.len() as f64)
}

fn shutter_date(header: &Header) -> Option<String> {
    header
        .get_f64(OBSJD)
        .and_then(jd_to_iso)
        .or_else(|| header.get_str(DATE_OBS).map(str::to_string))
}
