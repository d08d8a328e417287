//! Nightly and baseline co-adds of moving-target cutouts.
//!
//! Image records in the metadata store are grouped by night, target and
//! filter. Each group's cutouts are normalized to a common photometric and
//! geometric scale, combined under their masks and written as one composite
//! file, optionally with a difference against the preceding baseline window.

pub mod config;
pub mod cutout;
pub mod header;
pub mod naming;
pub mod pipeline;
pub mod plane;
pub mod selector;
pub mod stacking;
pub mod store;
pub mod time;
pub mod wcs;

#[cfg(test)]
mod testing;

pub use config::{Config, ConfigError};
pub use pipeline::{RunSummary, Stacker, StackerOptions};
pub use selector::SelectorOptions;
pub use stacking::ScaleModel;
