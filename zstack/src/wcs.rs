//! Linear gnomonic (TAN) world coordinate solution.
//!
//! Only the sky-to-pixel direction is needed: the target's expected pixel
//! position is what the un-mask box is centred on.

use crate::header::Header;

/// TAN projection read from a FITS header.
///
/// `crpix` is stored 0-based; FITS headers carry 1-based reference pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Wcs {
    pub crpix: (f64, f64),
    pub crval: (f64, f64),
    /// [[CD1_1, CD1_2], [CD2_1, CD2_2]] in degrees per pixel.
    pub cd: [[f64; 2]; 2],
}

impl Wcs {
    pub fn new(crpix: (f64, f64), crval: (f64, f64), cd: [[f64; 2]; 2]) -> Self {
        Self { crpix, crval, cd }
    }

    /// Reads CRPIX/CRVAL and either a CD matrix or CDELT with an optional PC
    /// matrix. Returns `None` for a missing or degenerate solution.
    pub fn from_header(header: &Header) -> Option<Self> {
        let crpix = (
            header.get_f64("CRPIX1")? - 1.0,
            header.get_f64("CRPIX2")? - 1.0,
        );
        let crval = (header.get_f64("CRVAL1")?, header.get_f64("CRVAL2")?);

        let cd = if header.get_f64("CD1_1").is_some() {
            let cd = |key: &str| header.get_f64(key).unwrap_or(0.0);
            [[cd("CD1_1"), cd("CD1_2")], [cd("CD2_1"), cd("CD2_2")]]
        } else {
            let cdelt = (header.get_f64("CDELT1")?, header.get_f64("CDELT2")?);
            let pc = |key: &str, default: f64| header.get_f64(key).unwrap_or(default);
            [
                [cdelt.0 * pc("PC1_1", 1.0), cdelt.0 * pc("PC1_2", 0.0)],
                [cdelt.1 * pc("PC2_1", 0.0), cdelt.1 * pc("PC2_2", 1.0)],
            ]
        };

        let wcs = Self::new(crpix, crval, cd);
        (wcs.determinant().abs() > 1e-15).then_some(wcs)
    }

    fn determinant(&self) -> f64 {
        self.cd[0][0] * self.cd[1][1] - self.cd[0][1] * self.cd[1][0]
    }

    /// Converts sky coordinates (RA, Dec in degrees) to 0-based pixel coordinates.
    ///
    /// Returns `None` for positions on the far hemisphere, where the gnomonic
    /// projection is undefined.
    pub fn sky_to_pixel(&self, ra: f64, dec: f64) -> Option<(f64, f64)> {
        let ra_rad = ra.to_radians();
        let dec_rad = dec.to_radians();
        let ra0 = self.crval.0.to_radians();
        let dec0 = self.crval.1.to_radians();

        let (sin_dec, cos_dec) = dec_rad.sin_cos();
        let (sin_dec0, cos_dec0) = dec0.sin_cos();
        let (sin_dra, cos_dra) = (ra_rad - ra0).sin_cos();

        let d = sin_dec * sin_dec0 + cos_dec * cos_dec0 * cos_dra;
        if d <= 0.0 {
            return None;
        }

        // Standard coordinates in degrees.
        let xi = (cos_dec * sin_dra / d).to_degrees();
        let eta = ((sin_dec * cos_dec0 - cos_dec * sin_dec0 * cos_dra) / d).to_degrees();

        // Solve CD * (dx, dy) = (xi, eta)
        let det = self.determinant();
        let dx = (self.cd[1][1] * xi - self.cd[0][1] * eta) / det;
        let dy = (-self.cd[1][0] * xi + self.cd[0][0] * eta) / det;

        Some((self.crpix.0 + dx, self.crpix.1 + dy))
    }
}
