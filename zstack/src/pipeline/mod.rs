//! Per-group driver: header synthesis, combination, output and status.


use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::cutout::{Composite, CompositePlane, ImageIo};
use crate::header::{self, keys, Header};
use crate::selector::{work_items, SelectorOptions, WorkItem};
use crate::stacking::{
    load_frames, stack_model, ScaleModel, StackError, DEFAULT_UNMASK_HALF_WIDTH, REFERENCE_MAGZP,
};
use crate::store::{Outcome, Store};

#[derive(Debug, Clone)]
pub struct StackerOptions {
    /// Root that record `archivefile` paths are relative to.
    pub cutout_path: PathBuf,
    /// Root of the composites.
    pub stack_path: PathBuf,
    /// Overwrite existing composites instead of adopting them.
    pub restack: bool,
    pub scales: Vec<ScaleModel>,
    pub unmask_half_width: usize,
}

impl StackerOptions {
    pub fn new(cutout_path: impl Into<PathBuf>, stack_path: impl Into<PathBuf>) -> Self {
        Self {
            cutout_path: cutout_path.into(),
            stack_path: stack_path.into(),
            restack: false,
            scales: vec![ScaleModel::Coma, ScaleModel::Surface],
            unmask_half_width: DEFAULT_UNMASK_HALF_WIDTH,
        }
    }
}

/// What happened to one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupOutcome {
    Written(String),
    /// Output already existed; its records were marked stacked.
    Adopted(String),
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub written: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: &GroupOutcome) {
        match outcome {
            GroupOutcome::Written(_) => self.written += 1,
            GroupOutcome::Adopted(_) => self.skipped += 1,
            GroupOutcome::Failed => self.failed += 1,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} written, {} failed, {} skipped",
            self.written, self.failed, self.skipped
        )
    }
}

pub struct Stacker<I: ImageIo> {
    store: Store,
    io: I,
    options: StackerOptions,
}

impl<I: ImageIo> Stacker<I> {
    pub fn new(store: Store, io: I, options: StackerOptions) -> Self {
        Self { store, io, options }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn io(&self) -> &I {
        &self.io
    }

    /// Stacks every pending group. Groups are committed one at a time, so an
    /// error leaves all earlier groups recorded.
    pub fn run(&mut self, selector: &SelectorOptions) -> Result<RunSummary> {
        let items = work_items(&self.store, selector).context("Failed to read image records")?;
        tracing::info!("{} groups to stack", items.len());

        let mut summary = RunSummary::default();
        for item in items {
            let outcome = self.stack_group(&item)?;
            summary.record(&outcome);
        }

        tracing::info!("Stacking finished: {summary}");
        Ok(summary)
    }

    /// Processes one group and records its outcome for all source records.
    pub fn stack_group(&mut self, item: &WorkItem) -> Result<GroupOutcome> {
        let Some(filename) = item.filename.clone() else {
            tracing::warn!(
                "[{}] {} {}: no mean date or distance to name the stack, marking failed",
                item.remaining,
                item.desg,
                item.filter
            );
            return self.commit(item, GroupOutcome::Failed);
        };

        tracing::info!(
            "[{}] {}: {} nightly, {} baseline images",
            item.remaining,
            filename,
            item.nightly.len(),
            item.baseline.len()
        );

        let out_path = self.options.stack_path.join(&filename);
        if !self.options.restack && self.io.exists(&out_path) {
            tracing::info!("{filename} exists, marking its images stacked");
            return self.commit(item, GroupOutcome::Adopted(filename));
        }

        let nightly = self.cutout_paths(&item.nightly);
        let baseline = self.cutout_paths(&item.baseline);

        let mut composite = self.combine(&nightly, &baseline);
        if composite.planes.is_empty() {
            tracing::warn!("{filename}: no usable data, marking {} images failed", item.ids.len());
            return self.commit(item, GroupOutcome::Failed);
        }

        composite.header = self.composite_header(&nightly, &baseline);
        composite.wcs = wcs_cards(&composite.header);

        self.io
            .write_composite(&out_path, &composite)
            .with_context(|| format!("Failed to write {}", out_path.display()))?;
        tracing::info!(
            "Wrote {filename} ({})",
            composite.plane_names().join(", ")
        );

        self.commit(item, GroupOutcome::Written(filename))
    }

    /// Clears the status of records whose composite no longer exists.
    pub fn clean_missing(&mut self) -> Result<usize> {
        let missing: Vec<i64> = self
            .store
            .stacked_files()
            .context("Failed to read stack status")?
            .into_iter()
            .filter(|(_, file)| !self.io.exists(&self.options.stack_path.join(file)))
            .map(|(id, _)| id)
            .collect();

        let cleared = self
            .store
            .clear_status(&missing)
            .context("Failed to clear stack status")?;
        if cleared > 0 {
            tracing::info!("Cleared status of {cleared} images with missing stacks");
        }
        Ok(cleared)
    }

    fn cutout_paths(&self, files: &[String]) -> Vec<PathBuf> {
        files
            .iter()
            .map(|f| self.options.cutout_path.join(f))
            .collect()
    }

    fn combine(&self, nightly: &[PathBuf], baseline: &[PathBuf]) -> Composite {
        let half = self.options.unmask_half_width;
        let nightly = load_frames(&self.io, nightly, half);
        let baseline = load_frames(&self.io, baseline, half);

        let mut composite = Composite::default();
        for &model in &self.options.scales {
            match stack_model(&nightly, &baseline, model) {
                Ok(planes) => {
                    composite.planes.push(CompositePlane {
                        name: model.plane_name(),
                        data: planes.combined,
                    });
                    if let Some(difference) = planes.difference {
                        composite.planes.push(CompositePlane {
                            name: model.baseline_plane_name(),
                            data: difference,
                        });
                    }
                }
                Err(StackError::EmptyInput) => {
                    tracing::debug!("No {model} plane: no usable frames");
                }
                Err(err) => tracing::warn!("No {model} plane: {err}"),
            }
        }
        composite
    }

    fn composite_header(&self, nightly: &[PathBuf], baseline: &[PathBuf]) -> Header {
        let mut primary = header::synthesize(&self.io, nightly);
        let baseline = header::synthesize(&self.io, baseline);
        primary.extend(&header::baseline_cards(&baseline));
        primary.set(keys::MAGZP, REFERENCE_MAGZP);
        primary
    }

    fn commit(&mut self, item: &WorkItem, outcome: GroupOutcome) -> Result<GroupOutcome> {
        let status = match &outcome {
            GroupOutcome::Written(file) | GroupOutcome::Adopted(file) => {
                Outcome::Stacked(file.clone())
            }
            GroupOutcome::Failed => Outcome::Failed,
        };
        self.store
            .record_outcome(&item.ids, &status)
            .context("Failed to record stack status")?;
        Ok(outcome)
    }
}

fn wcs_cards(header: &Header) -> Header {
    let mut wcs = Header::new();
    for card in header.cards() {
        if header::is_wcs_key(&card.key) {
            wcs.set(&card.key, card.value.clone());
        }
    }
    wcs
}
