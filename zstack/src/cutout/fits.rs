use std::ffi::CString;
use std::fs;
use std::path::{Path, PathBuf};

use fitsio::errors::check_status;
use fitsio::hdu::{FitsHdu, HduInfo};
use fitsio::images::{ImageDescription, ImageType};
use fitsio::FitsFile;

use super::{Composite, Cutout, CutoutError, CutoutHeader, ImageIo};
use crate::header::{keys, Header, HeaderValue};
use crate::plane::Plane;

/// cfitsio status for a keyword that is not present at all.
const KEY_NO_EXIST: i32 = 202;

/// Longest string value that fits a single header card.
const MAX_SHORT_STRING: usize = 68;

#[derive(Clone, Copy)]
enum Kind {
    Float,
    Int,
    Str,
}

const SCIENCE_KEYS: &[(&str, Kind)] = &[
    (keys::OBJECT, Kind::Str),
    (keys::DBPID, Kind::Int),
    (keys::OBSJD, Kind::Float),
    (keys::DATE_OBS, Kind::Str),
    (keys::EXPTIME, Kind::Float),
    (keys::MAGZP, Kind::Float),
    (keys::GAIN, Kind::Float),
    (keys::BGMEDIAN, Kind::Float),
    (keys::BGSTDEV, Kind::Float),
    (keys::RH, Kind::Float),
    (keys::RDOT, Kind::Float),
    (keys::DELTA, Kind::Float),
    (keys::PHASE, Kind::Float),
    (keys::SELONG, Kind::Float),
    (keys::SANGLE, Kind::Float),
    (keys::VANGLE, Kind::Float),
    (keys::TRUEANOM, Kind::Float),
    (keys::TMTP, Kind::Float),
    (keys::TGTRA, Kind::Float),
    (keys::TGTDEC, Kind::Float),
    (keys::TGTDRA, Kind::Float),
    (keys::TGTDDEC, Kind::Float),
    (keys::TGTRASIG, Kind::Float),
    (keys::TGTDESIG, Kind::Float),
];

const WCS_KEYS: &[(&str, Kind)] = &[
    ("WCSAXES", Kind::Int),
    ("CTYPE1", Kind::Str),
    ("CTYPE2", Kind::Str),
    ("CUNIT1", Kind::Str),
    ("CUNIT2", Kind::Str),
    ("CRPIX1", Kind::Float),
    ("CRPIX2", Kind::Float),
    ("CRVAL1", Kind::Float),
    ("CRVAL2", Kind::Float),
    ("CD1_1", Kind::Float),
    ("CD1_2", Kind::Float),
    ("CD2_1", Kind::Float),
    ("CD2_2", Kind::Float),
    ("CDELT1", Kind::Float),
    ("CDELT2", Kind::Float),
    ("PC1_1", Kind::Float),
    ("PC1_2", Kind::Float),
    ("PC2_1", Kind::Float),
    ("PC2_2", Kind::Float),
    ("CROTA2", Kind::Float),
    ("LONPOLE", Kind::Float),
    ("LATPOLE", Kind::Float),
    ("RADESYS", Kind::Str),
    ("EQUINOX", Kind::Float),
];

/// FITS-backed [`ImageIo`].
///
/// The science plane is the primary HDU; the mask and alignment planes are
/// looked up by `EXTNAME`.
#[derive(Debug, Clone)]
pub struct FitsIo {
    mask_plane: String,
    alignment_plane: String,
}

impl FitsIo {
    pub fn new(mask_plane: impl Into<String>, alignment_plane: impl Into<String>) -> Self {
        Self {
            mask_plane: mask_plane.into(),
            alignment_plane: alignment_plane.into(),
        }
    }

    fn open(path: &Path) -> Result<FitsFile, CutoutError> {
        FitsFile::open(path).map_err(|source| CutoutError::Open {
            path: path.to_path_buf(),
            source,
        })
    }

    fn read_headers(&self, fptr: &mut FitsFile, path: &Path) -> Result<CutoutHeader, CutoutError> {
        let primary = fptr.primary_hdu().map_err(|source| CutoutError::Read {
            path: path.to_path_buf(),
            what: "primary header".into(),
            source,
        })?;
        let science = read_cards(&primary, fptr, SCIENCE_KEYS);

        // A cutout whose alignment failed upstream has no solution to copy.
        let alignment = match fptr.hdu(self.alignment_plane.as_str()) {
            Ok(hdu) => read_cards(&hdu, fptr, WCS_KEYS),
            Err(_) => Header::new(),
        };

        Ok(CutoutHeader { science, alignment })
    }
}

impl Default for FitsIo {
    fn default() -> Self {
        Self::new("MASK", "SANGLE")
    }
}

impl ImageIo for FitsIo {
    fn read_header(&self, path: &Path) -> Result<CutoutHeader, CutoutError> {
        let mut fptr = Self::open(path)?;
        self.read_headers(&mut fptr, path)
    }

    fn read_cutout(&self, path: &Path) -> Result<Cutout, CutoutError> {
        let mut fptr = Self::open(path)?;
        let header = self.read_headers(&mut fptr, path)?;

        let primary = fptr.primary_hdu().map_err(|source| CutoutError::Read {
            path: path.to_path_buf(),
            what: "primary header".into(),
            source,
        })?;
        let (width, height) = image_shape(&primary, path, "PRIMARY")?;
        let pixels: Vec<f32> = primary
            .read_image(&mut fptr)
            .map_err(|source| CutoutError::Read {
                path: path.to_path_buf(),
                what: "science plane".into(),
                source,
            })?;
        let data = Plane::new(width, height, pixels);

        let mask = match fptr.hdu(self.mask_plane.as_str()) {
            Ok(hdu) => {
                let shape = image_shape(&hdu, path, &self.mask_plane)?;
                if shape != data.shape() {
                    return Err(CutoutError::MaskShape {
                        path: path.to_path_buf(),
                        expected: data.shape(),
                        actual: shape,
                    });
                }
                let values: Vec<i32> =
                    hdu.read_image(&mut fptr)
                        .map_err(|source| CutoutError::Read {
                            path: path.to_path_buf(),
                            what: format!("{} plane", self.mask_plane),
                            source,
                        })?;
                Some(Plane::new(
                    width,
                    height,
                    values.into_iter().map(|v| v != 0).collect(),
                ))
            }
            Err(_) => None,
        };

        Ok(Cutout { header, data, mask })
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn write_composite(&self, path: &Path, composite: &Composite) -> Result<(), CutoutError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| CutoutError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let tmp = tmp_path(path);
        if let Err(err) = write_fits(&tmp, composite) {
            let _ = fs::remove_file(&tmp);
            return Err(err);
        }
        fs::rename(&tmp, path).map_err(|source| CutoutError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_fits(path: &Path, composite: &Composite) -> Result<(), CutoutError> {
    let write_err = |source| CutoutError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut fptr = FitsFile::create(path)
        .overwrite()
        .open()
        .map_err(write_err)?;

    let primary = fptr.primary_hdu().map_err(write_err)?;
    write_header(&mut fptr, &primary, path, &composite.header)?;

    for plane in &composite.planes {
        let (width, height) = plane.data.shape();
        let description = ImageDescription {
            data_type: ImageType::Float,
            dimensions: &[height, width],
        };
        let hdu = fptr
            .create_image(plane.name.as_str(), &description)
            .map_err(write_err)?;
        hdu.write_image(&mut fptr, plane.data.pixels())
            .map_err(write_err)?;
        write_header(&mut fptr, &hdu, path, &composite.wcs)?;
    }

    Ok(())
}

/// `(width, height)` of a 2-D image HDU.
fn image_shape(hdu: &FitsHdu, path: &Path, plane: &str) -> Result<(usize, usize), CutoutError> {
    match &hdu.info {
        HduInfo::ImageInfo { shape, .. } if shape.len() == 2 => Ok((shape[1], shape[0])),
        _ => Err(CutoutError::NotAnImage {
            path: path.to_path_buf(),
            plane: plane.to_string(),
        }),
    }
}

/// Reads the listed keywords. Absent keywords are left out; keywords that are
/// present without a usable value become [`HeaderValue::Undefined`].
fn read_cards(hdu: &FitsHdu, fptr: &mut FitsFile, keys: &[(&str, Kind)]) -> Header {
    let mut header = Header::new();
    for &(key, kind) in keys {
        let value = match kind {
            Kind::Float => hdu.read_key::<f64>(fptr, key).map(HeaderValue::Float),
            Kind::Int => hdu.read_key::<i64>(fptr, key).map(HeaderValue::Int),
            Kind::Str => hdu.read_key::<String>(fptr, key).map(HeaderValue::Str),
        };
        match value {
            Ok(value) => header.set(key, value),
            Err(fitsio::errors::Error::Fits(e)) if e.status == KEY_NO_EXIST => {}
            Err(_) => header.set(key, HeaderValue::Undefined),
        }
    }
    header
}

fn write_header(
    fptr: &mut FitsFile,
    hdu: &FitsHdu,
    path: &Path,
    header: &Header,
) -> Result<(), CutoutError> {
    for card in header.cards() {
        let key = card.key.as_str();
        let result = match &card.value {
            HeaderValue::Float(v) => hdu.write_key(fptr, key, *v),
            HeaderValue::Int(v) => hdu.write_key(fptr, key, *v),
            HeaderValue::Str(v) if v.len() <= MAX_SHORT_STRING => {
                hdu.write_key(fptr, key, v.as_str())
            }
            HeaderValue::Str(v) => write_raw(fptr, path, key, Some(v))?,
            HeaderValue::Undefined => write_raw(fptr, path, key, None)?,
        };
        result.map_err(|source| CutoutError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

/// Cards the safe API cannot express: undefined values and long strings
/// (written with the CONTINUE convention). Writes to the current HDU, which
/// is always the one `write_header` was called for.
fn write_raw(
    fptr: &mut FitsFile,
    path: &Path,
    key: &str,
    value: Option<&str>,
) -> Result<fitsio::errors::Result<()>, CutoutError> {
    let invalid = || CutoutError::InvalidCard {
        path: path.to_path_buf(),
        key: key.to_string(),
    };
    let c_key = CString::new(key).map_err(|_| invalid())?;
    let c_value = value.map(CString::new).transpose().map_err(|_| invalid())?;

    let mut status = 0;
    unsafe {
        let raw = fptr.as_raw();
        match &c_value {
            Some(v) => {
                fitsio::sys::ffpkls(raw, c_key.as_ptr(), v.as_ptr(), std::ptr::null(), &mut status);
            }
            None => {
                fitsio::sys::ffpkyu(raw, c_key.as_ptr(), std::ptr::null(), &mut status);
            }
        }
    }
    Ok(check_status(status))
}
