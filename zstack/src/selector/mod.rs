//! Grouping selector: turns store rows into per-(night, target, filter) work
//! items with their trailing baseline sets.
//!
//! Rows are projected once into memory; eligibility, status and baseline
//! windows are plain predicates over that table.


use std::collections::{btree_map, BTreeMap};

use common::group_by;

use crate::naming::{leading_num_key, stack_filename};
use crate::store::{ImageRow, Store, StoreError};

/// Half a day of slack below the baseline window, so a baseline of `n` days
/// reaches back over the full night `n` days earlier.
const BASELINE_SLACK_DAYS: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct SelectorOptions {
    /// Restrict to these designations; empty selects all targets.
    pub desgs: Vec<String>,
    /// Select groups regardless of their stacking status.
    pub restack: bool,
    pub baseline_days: f64,
}

impl Default for SelectorOptions {
    fn default() -> Self {
        Self {
            desgs: Vec::new(),
            restack: false,
            baseline_days: 14.0,
        }
    }
}

/// One (night, target, filter) group ready to be stacked.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    /// Items left including this one; counts down to 1.
    pub remaining: usize,
    pub nightid: i64,
    pub night: Option<String>,
    pub desg: String,
    pub filter: String,
    /// Source record ids whose status this group decides.
    pub ids: Vec<i64>,
    /// Output path relative to the stack root. `None` when the group has no
    /// usable mean date or heliocentric distance to name it by.
    pub filename: Option<String>,
    /// Cutout paths relative to the cutout root.
    pub nightly: Vec<String>,
    pub baseline: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct GroupKey {
    nightid: i64,
    target: (u64, String),
    desg: String,
    filter: String,
}

/// Lazy sequence of work items, ordered by night, then target by leading
/// number, then filter.
pub struct WorkItems {
    rows: Vec<ImageRow>,
    groups: btree_map::IntoIter<GroupKey, Vec<usize>>,
    /// Earliest observation of each (night, target), across all filters.
    starts: BTreeMap<(i64, String), f64>,
    remaining: usize,
    baseline_days: f64,
}

impl WorkItems {
    pub fn new(rows: Vec<ImageRow>, options: &SelectorOptions) -> Self {
        let rows: Vec<ImageRow> = rows.into_iter().filter(ImageRow::is_eligible).collect();

        let mut starts: BTreeMap<(i64, String), f64> = BTreeMap::new();
        for row in &rows {
            starts
                .entry((row.nightid, row.desg.clone()))
                .and_modify(|t| *t = t.min(row.obsjd))
                .or_insert(row.obsjd);
        }

        let groups = group_by(0..rows.len(), |&i| {
            let row = &rows[i];
            let (number, rest) = leading_num_key(&row.desg);
            GroupKey {
                nightid: row.nightid,
                target: (number, rest.to_string()),
                desg: row.desg.clone(),
                filter: row.filter.clone(),
            }
        });

        // A group is pending while any of its records is.
        let groups: BTreeMap<GroupKey, Vec<usize>> = groups
            .into_iter()
            .filter(|(_, idx)| options.restack || idx.iter().any(|&i| !rows[i].is_processed()))
            .collect();

        Self {
            remaining: groups.len(),
            groups: groups.into_iter(),
            rows,
            starts,
            baseline_days: options.baseline_days,
        }
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    fn baseline(&self, desg: &str, filter: &str, start: f64) -> Vec<String> {
        let from = start - self.baseline_days - BASELINE_SLACK_DAYS;
        let mut rows: Vec<&ImageRow> = self
            .rows
            .iter()
            .filter(|r| r.desg == desg && r.filter == filter)
            .filter(|r| r.obsjd >= from && r.obsjd < start)
            .collect();
        rows.sort_by(|a, b| a.obsjd.total_cmp(&b.obsjd));
        rows.iter().filter_map(|r| r.archivefile.clone()).collect()
    }
}

impl Iterator for WorkItems {
    type Item = WorkItem;

    fn next(&mut self) -> Option<WorkItem> {
        let (key, indices) = self.groups.next()?;
        let members: Vec<&ImageRow> = indices.iter().map(|&i| &self.rows[i]).collect();

        let start = self
            .starts
            .get(&(key.nightid, key.desg.clone()))
            .copied()
            .unwrap_or(f64::NAN);
        let baseline = self.baseline(&key.desg, &key.filter, start);

        let filename = group_filename(&key.desg, &key.filter, &members);
        let item = WorkItem {
            remaining: self.remaining,
            nightid: key.nightid,
            night: members.first().and_then(|r| r.night.clone()),
            ids: members.iter().map(|r| r.foundid).collect(),
            nightly: members.iter().filter_map(|r| r.archivefile.clone()).collect(),
            baseline,
            filename,
            desg: key.desg,
            filter: key.filter,
        };
        self.remaining -= 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for WorkItems {}

/// Reads the store and plans the run.
pub fn work_items(store: &Store, options: &SelectorOptions) -> Result<WorkItems, StoreError> {
    Ok(WorkItems::new(store.image_rows(&options.desgs)?, options))
}

fn group_filename(desg: &str, filter: &str, members: &[&ImageRow]) -> Option<String> {
    let mean = |values: Vec<f64>| {
        (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
    };
    let obsjd = mean(members.iter().map(|r| r.obsjd).collect())?;
    let rh = mean(members.iter().filter_map(|r| r.rh).collect())?;
    let rdot = mean(members.iter().filter_map(|r| r.rdot).collect()).unwrap_or(0.0);
    stack_filename(desg, obsjd, rh, rdot, filter)
}
