//! Cutout and composite image containers, and the I/O seam the pipeline reads
//! and writes them through.

mod fits;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::header::Header;
use crate::plane::Plane;

pub use fits::FitsIo;

#[derive(Debug, Error)]
pub enum CutoutError {
    #[error("Failed to open '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: fitsio::errors::Error,
    },

    #[error("Failed to read {what} from '{path}': {source}")]
    Read {
        path: PathBuf,
        what: String,
        #[source]
        source: fitsio::errors::Error,
    },

    #[error("'{path}' has no image plane '{plane}'")]
    MissingPlane { path: PathBuf, plane: String },

    #[error("Plane '{plane}' of '{path}' is not a 2-D image")]
    NotAnImage { path: PathBuf, plane: String },

    #[error("Mask of '{path}' is {actual:?}, data is {expected:?}")]
    MaskShape {
        path: PathBuf,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: fitsio::errors::Error,
    },

    #[error("Invalid header card '{key}' for '{path}'")]
    InvalidCard { path: PathBuf, key: String },

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No such cutout '{path}'")]
    NotFound { path: PathBuf },
}

/// Headers of one cutout: the science plane and the alignment plane that
/// carries the world coordinate solution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CutoutHeader {
    pub science: Header,
    pub alignment: Header,
}

/// One aligned per-epoch cutout.
#[derive(Debug, Clone)]
pub struct Cutout {
    pub header: CutoutHeader,
    pub data: Plane<f32>,
    /// `true` = masked. `None` when the file carries no mask plane.
    pub mask: Option<Plane<bool>>,
}

/// One named extension of a composite.
#[derive(Debug, Clone)]
pub struct CompositePlane {
    pub name: String,
    pub data: Plane<f32>,
}

/// A stacked output: aggregate primary header, WCS cards shared by all planes.
#[derive(Debug, Clone, Default)]
pub struct Composite {
    pub header: Header,
    pub wcs: Header,
    pub planes: Vec<CompositePlane>,
}

impl Composite {
    pub fn plane(&self, name: &str) -> Option<&CompositePlane> {
        self.planes.iter().find(|p| p.name == name)
    }

    pub fn plane_names(&self) -> Vec<&str> {
        self.planes.iter().map(|p| p.name.as_str()).collect()
    }
}

/// Image container access used by the header synthesizer and the stacker.
pub trait ImageIo {
    fn read_header(&self, path: &Path) -> Result<CutoutHeader, CutoutError>;

    fn read_cutout(&self, path: &Path) -> Result<Cutout, CutoutError>;

    fn exists(&self, path: &Path) -> bool;

    /// Writes the composite so that `path` is either absent or complete.
    /// Parent directories are created as needed; an existing file is replaced.
    fn write_composite(&self, path: &Path, composite: &Composite) -> Result<(), CutoutError>;
}
