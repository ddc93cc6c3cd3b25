//! Location × date feature matrix fed to the clustering calls.

use chrono::NaiveDate;
use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::error::{ClusterError, ClusterResult};
use crate::logs::{log_success, log_warning, log_warning_indent};
use crate::models::{FeatureKind, IndexedObservation, Location};

/// What to do with locations that lack a value for some date.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MissingPolicy {
    /// Abort the run.
    #[default]
    Fail,
    /// Remove those locations, logging each one.
    DropIncomplete,
}

/// One row per location (ordered by code), one column per date (ascending).
///
/// Gaps are stored as NaN until [`FeatureMatrix::ensure_complete`] runs.
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    pub locations: Vec<Location>,
    pub dates: Vec<NaiveDate>,
    pub values: Array2<f64>,
    pub feature: FeatureKind,
}

impl FeatureMatrix {
    /// Pivot long-format observations into the matrix.
    pub fn pivot(indexed: &[IndexedObservation], feature: FeatureKind) -> ClusterResult<Self> {
        let locations: BTreeMap<&str, &Location> = indexed
            .iter()
            .map(|o| (o.code(), &o.observation.location))
            .collect();
        let dates: BTreeSet<NaiveDate> = indexed.iter().map(|o| o.date()).collect();

        if locations.is_empty() || dates.is_empty() {
            return Err(ClusterError::EmptyMatrix);
        }

        let row_of: BTreeMap<&str, usize> = locations.keys().enumerate().map(|(i, c)| (*c, i)).collect();
        let dates: Vec<NaiveDate> = dates.into_iter().collect();
        let col_of: BTreeMap<NaiveDate, usize> = dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();

        let mut values = Array2::from_elem((locations.len(), dates.len()), f64::NAN);
        for obs in indexed {
            values[[row_of[obs.code()], col_of[&obs.date()]]] = feature.value_of(obs);
        }

        Ok(Self {
            locations: locations.into_values().cloned().collect(),
            dates,
            values,
            feature,
        })
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    /// Local-authority codes in row order.
    pub fn codes(&self) -> Vec<String> {
        self.locations.iter().map(|l| l.code.clone()).collect()
    }

    pub fn row(&self, i: usize) -> ArrayView1<'_, f64> {
        self.values.row(i)
    }

    /// Missing dates per row, for rows that have any.
    pub fn gaps(&self) -> Vec<(usize, Vec<NaiveDate>)> {
        self.values
            .axis_iter(Axis(0))
            .enumerate()
            .filter_map(|(i, row)| {
                let missing: Vec<NaiveDate> = row
                    .iter()
                    .zip(&self.dates)
                    .filter(|(v, _)| v.is_nan())
                    .map(|(_, d)| *d)
                    .collect();
                (!missing.is_empty()).then_some((i, missing))
            })
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.values.iter().all(|v| !v.is_nan())
    }

    /// Apply the missing-value policy so every row is fully populated.
    pub fn ensure_complete(self, policy: MissingPolicy) -> ClusterResult<Self> {
        let gaps = self.gaps();
        if gaps.is_empty() {
            log_success(format!(
                "Matrix {} locations × {} dates, fully populated",
                self.nrows(),
                self.ncols()
            ));
            return Ok(self);
        }

        match policy {
            MissingPolicy::Fail => {
                let (row, missing) = &gaps[0];
                Err(ClusterError::IncompleteRow {
                    code: self.locations[*row].code.clone(),
                    missing: missing.len(),
                    first_missing: missing[0].to_string(),
                })
            }
            MissingPolicy::DropIncomplete => {
                log_warning(format!("Dropping {} incomplete local authorities", gaps.len()));
                for (row, missing) in &gaps {
                    let loc = &self.locations[*row];
                    log_warning_indent(
                        format!("{} {} ({} missing dates)", loc.code, loc.name, missing.len()),
                        1,
                    );
                }

                let dropped: HashSet<usize> = gaps.iter().map(|(r, _)| *r).collect();
                let keep: Vec<usize> = (0..self.nrows()).filter(|r| !dropped.contains(r)).collect();
                if keep.is_empty() {
                    return Err(ClusterError::EmptyMatrix);
                }

                Ok(Self {
                    locations: keep.iter().map(|&r| self.locations[r].clone()).collect(),
                    values: self.values.select(Axis(0), &keep),
                    dates: self.dates,
                    feature: self.feature,
                })
            }
        }
    }

    /// Number of distinct rows (upper bound for a meaningful k).
    pub fn distinct_rows(&self) -> usize {
        self.values
            .axis_iter(Axis(0))
            .map(|row| row.iter().map(|v| v.to_bits()).collect::<Vec<u64>>())
            .collect::<HashSet<_>>()
            .len()
    }
}
