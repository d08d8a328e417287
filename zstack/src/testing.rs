//! In-memory image store and cutout fixtures shared by unit tests.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rusqlite::params;

use crate::cutout::{Composite, Cutout, CutoutError, CutoutHeader, ImageIo};
use crate::header::{keys, Header};
use crate::plane::Plane;
use crate::store::Store;

/// Target position shared by all fixture cutouts.
pub const TARGET_RA: f64 = 150.0;
pub const TARGET_DEC: f64 = 20.0;

#[derive(Default)]
pub struct MemoryIo {
    cutouts: RefCell<BTreeMap<PathBuf, Cutout>>,
    composites: RefCell<BTreeMap<PathBuf, Composite>>,
    writes: Cell<usize>,
}

impl MemoryIo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, cutout: Cutout) {
        self.cutouts.borrow_mut().insert(path.into(), cutout);
    }

    pub fn composite(&self, path: &Path) -> Option<Composite> {
        self.composites.borrow().get(path).cloned()
    }

    /// Places a composite as if an earlier run had written it.
    pub fn insert_composite(&self, path: impl Into<PathBuf>, composite: Composite) {
        self.composites.borrow_mut().insert(path.into(), composite);
    }

    pub fn remove_composite(&self, path: &Path) {
        self.composites.borrow_mut().remove(path);
    }

    pub fn writes(&self) -> usize {
        self.writes.get()
    }
}

impl ImageIo for MemoryIo {
    fn read_header(&self, path: &Path) -> Result<CutoutHeader, CutoutError> {
        self.read_cutout(path).map(|c| c.header)
    }

    fn read_cutout(&self, path: &Path) -> Result<Cutout, CutoutError> {
        self.cutouts
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| CutoutError::NotFound {
                path: path.to_path_buf(),
            })
    }

    fn exists(&self, path: &Path) -> bool {
        self.composites.borrow().contains_key(path)
    }

    fn write_composite(&self, path: &Path, composite: &Composite) -> Result<(), CutoutError> {
        self.composites
            .borrow_mut()
            .insert(path.to_path_buf(), composite.clone());
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }
}

/// Science header of a well-calibrated frame: zero point 25, unit gain, 1 s
/// exposure, no background, unit distances.
pub fn science_header(pid: i64, obsjd: f64) -> Header {
    let mut h = Header::new();
    h.set(keys::OBJECT, "X");
    h.set(keys::DBPID, pid);
    h.set(keys::OBSJD, obsjd);
    h.set(keys::EXPTIME, 1.0);
    h.set(keys::MAGZP, 25.0);
    h.set(keys::GAIN, 1.0);
    h.set(keys::BGMEDIAN, 0.0);
    h.set(keys::RH, 1.0);
    h.set(keys::RDOT, -1.0);
    h.set(keys::DELTA, 1.0);
    h.set(keys::PHASE, 30.0);
    h.set(keys::SELONG, 120.0);
    h.set(keys::SANGLE, 250.0);
    h.set(keys::VANGLE, 90.0);
    h.set(keys::TRUEANOM, -20.0);
    h.set(keys::TMTP, -40.0);
    h.set(keys::TGTRA, TARGET_RA);
    h.set(keys::TGTDEC, TARGET_DEC);
    h.set(keys::TGTDRA, 10.0);
    h.set(keys::TGTDDEC, -5.0);
    h.set(keys::TGTRASIG, 0.1);
    h.set(keys::TGTDESIG, 0.2);
    h
}

/// TAN solution with the target at the centre pixel of a `width x height` plane.
pub fn alignment_header(width: usize, height: usize) -> Header {
    let mut h = Header::new();
    h.set("WCSAXES", 2i64);
    h.set("CTYPE1", "RA---TAN");
    h.set("CTYPE2", "DEC--TAN");
    h.set("CRPIX1", (width / 2) as f64 + 1.0);
    h.set("CRPIX2", (height / 2) as f64 + 1.0);
    h.set("CRVAL1", TARGET_RA);
    h.set("CRVAL2", TARGET_DEC);
    h.set("CD1_1", -1.0 / 3600.0);
    h.set("CD1_2", 0.0);
    h.set("CD2_1", 0.0);
    h.set("CD2_2", 1.0 / 3600.0);
    h.set("RADESYS", "ICRS");
    h
}

/// Unmasked cutout of constant value with fixture headers.
pub fn cutout(pid: i64, obsjd: f64, value: f32, width: usize, height: usize) -> Cutout {
    Cutout {
        header: CutoutHeader {
            science: science_header(pid, obsjd),
            alignment: alignment_header(width, height),
        },
        data: Plane::new_filled(width, height, value),
        mask: None,
    }
}

/// Inserts an aligned image record: one exposure per record, `pid == foundid`.
/// The cutout lives at `<desg token>/<foundid>.fits`.
pub fn insert_record(
    store: &Store,
    foundid: i64,
    desg: &str,
    night: (i64, &str),
    obsjd: f64,
    filter: &str,
) {
    let conn = store.connection();
    conn.execute(
        "INSERT OR IGNORE INTO nights (nightid, date, nframes) VALUES (?1, ?2, 0)",
        params![night.0, night.1],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO obs (pid, nightid, filtercode, obsjd) VALUES (?1, ?2, ?3, ?4)",
        params![foundid, night.0, filter, obsjd],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO found (foundid, desg, obsjd, rh, rdot, delta, pid, archivefile)
         VALUES (?1, ?2, ?3, 2.0, -1.0, 1.5, ?1, ?4)",
        params![
            foundid,
            desg,
            obsjd.to_string(),
            format!("{}/{foundid}.fits", crate::naming::desg_to_file(desg))
        ],
    )
    .unwrap();
    set_alignment(store, foundid, 1, 1);
}

pub fn set_alignment(store: &Store, foundid: i64, vangleimg: i64, sangleimg: i64) {
    store
        .connection()
        .execute(
            "INSERT OR REPLACE INTO projections (foundid, vangleimg, sangleimg) VALUES (?1, ?2, ?3)",
            params![foundid, vangleimg, sangleimg],
        )
        .unwrap();
}
