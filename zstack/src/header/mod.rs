//! FITS-style header model and the aggregate header synthesizer.
//!
//! Headers are kept as ordered keyword cards so that copied blocks (the WCS)
//! keep the order of their source file.

mod synth;

pub use synth::{
    aggregate, baseline_cards, is_wcs_key, spherical_mean, synthesize, INSTRUMENT_CARDS, MEAN_KEYS,
};

/// Keywords read from or written to cutout and composite headers.
pub mod keys {
    // Per-frame photometry.
    pub const MAGZP: &str = "MAGZP";
    pub const GAIN: &str = "GAIN";
    pub const EXPTIME: &str = "EXPTIME";
    pub const BGMEDIAN: &str = "BGMEDIAN";
    pub const BGSTDEV: &str = "BGSTDEV";

    // Geometry from the ephemeris.
    pub const RH: &str = "RH";
    pub const RDOT: &str = "RDOT";
    pub const DELTA: &str = "DELTA";
    pub const PHASE: &str = "PHASE";
    pub const SELONG: &str = "SELONG";
    pub const SANGLE: &str = "SANGLE";
    pub const VANGLE: &str = "VANGLE";
    pub const TRUEANOM: &str = "TRUEANOM";
    pub const TMTP: &str = "TMTP";
    pub const TGTRA: &str = "TGTRA";
    pub const TGTDEC: &str = "TGTDEC";
    pub const TGTDRA: &str = "TGTDRA";
    pub const TGTDDEC: &str = "TGTDDEC";
    pub const TGTRASIG: &str = "TGTRASIG";
    pub const TGTDESIG: &str = "TGTDESIG";

    // Identity and time.
    pub const OBJECT: &str = "OBJECT";
    pub const DBPID: &str = "DBPID";
    pub const OBSJD: &str = "OBSJD";
    pub const DATE_OBS: &str = "DATE-OBS";

    // Aggregate-only.
    pub const NIMAGES: &str = "NIMAGES";
    pub const DBPIDS: &str = "DBPIDS";
    pub const OBSJD1: &str = "OBSJD1";
    pub const OBSJD2: &str = "OBSJD2";
    pub const DATE1: &str = "DATE1";
    pub const DATE2: &str = "DATE2";

    // Baseline provenance.
    pub const BLNIMG: &str = "BLNIMG";
    pub const BLEXPT: &str = "BLEXPT";
    pub const BLDATE1: &str = "BLDATE1";
    pub const BLDATE2: &str = "BLDATE2";
    pub const BLOBSJD: &str = "BLOBSJD";
    pub const BLPIDS: &str = "BLPIDS";

    pub const EXTNAME: &str = "EXTNAME";
}

/// A header card value. `Undefined` is a keyword present with an empty value.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Float(f64),
    Int(i64),
    Str(String),
    Undefined,
}

impl HeaderValue {
    /// Numeric view; integers widen to float. Non-finite floats count as missing.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HeaderValue::Float(v) if v.is_finite() => Some(*v),
            HeaderValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HeaderValue::Int(v) => Some(*v),
            HeaderValue::Float(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, HeaderValue::Undefined)
    }
}

impl From<f64> for HeaderValue {
    fn from(value: f64) -> Self {
        HeaderValue::Float(value)
    }
}

impl From<i64> for HeaderValue {
    fn from(value: i64) -> Self {
        HeaderValue::Int(value)
    }
}

impl From<usize> for HeaderValue {
    fn from(value: usize) -> Self {
        HeaderValue::Int(value as i64)
    }
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        HeaderValue::Str(value.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(value: String) -> Self {
        HeaderValue::Str(value)
    }
}

impl<T: Into<HeaderValue>> From<Option<T>> for HeaderValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(HeaderValue::Undefined, Into::into)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub key: String,
    pub value: HeaderValue,
}

/// Ordered list of keyword cards. Keywords are stored upper-case and unique.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    cards: Vec<Card>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the value of an existing keyword in place, or appends a new card.
    pub fn set(&mut self, key: &str, value: impl Into<HeaderValue>) {
        let key = key.to_ascii_uppercase();
        let value = value.into();
        match self.cards.iter_mut().find(|c| c.key == key) {
            Some(card) => card.value = value,
            None => self.cards.push(Card { key, value }),
        }
    }

    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.cards
            .iter()
            .find(|c| c.key.eq_ignore_ascii_case(key))
            .map(|c| &c.value)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(HeaderValue::as_f64)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(HeaderValue::as_i64)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(HeaderValue::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    #[cfg(test)]
    pub fn remove(&mut self, key: &str) -> Option<HeaderValue> {
        let idx = self
            .cards
            .iter()
            .position(|c| c.key.eq_ignore_ascii_case(key))?;
        Some(self.cards.remove(idx).value)
    }

    /// Appends (or overwrites) every card of `other`, in its order.
    pub fn extend(&mut self, other: &Header) {
        for card in &other.cards {
            self.set(&card.key, card.value.clone());
        }
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}
