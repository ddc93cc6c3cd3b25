//! Machine-readable outputs: assignment and observation CSVs, JSON summary.

use chrono::NaiveDate;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::ReportResult;
use crate::models::{ClusterAssignment, Observation};
use crate::transform::join::ClusteredObservation;
use crate::transform::matrix::FeatureMatrix;

/// One row of `assignments.csv`.
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentRow {
    pub code: String,
    pub name: String,
    pub region_code: String,
    pub region_name: String,
    pub kmeans: Option<usize>,
    pub hierarchical: Option<usize>,
}

/// Flat long-table row (csv cannot serialize nested structs).
#[derive(Debug, Clone, Serialize)]
pub struct LongRow<'a> {
    pub region_code: &'a str,
    pub region_name: &'a str,
    pub code: &'a str,
    pub name: &'a str,
    pub date: NaiveDate,
    pub price: f64,
}

/// Assignment rows for every matrix location, in code order.
pub fn assignment_rows(
    matrix: &FeatureMatrix,
    kmeans: &ClusterAssignment,
    hierarchical: &ClusterAssignment,
) -> Vec<AssignmentRow> {
    matrix
        .locations
        .iter()
        .map(|loc| AssignmentRow {
            code: loc.code.clone(),
            name: loc.name.clone(),
            region_code: loc.region_code.clone(),
            region_name: loc.region_name.clone(),
            kmeans: kmeans.label(&loc.code),
            hierarchical: hierarchical.label(&loc.code),
        })
        .collect()
}

/// Serialize rows as CSV with a header line.
pub fn write_csv<W: Write, T: Serialize>(writer: W, rows: &[T]) -> ReportResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_assignments(path: &Path, rows: &[AssignmentRow]) -> ReportResult<()> {
    write_csv(fs::File::create(path)?, rows)
}

pub fn write_observations(path: &Path, rows: &[ClusteredObservation]) -> ReportResult<()> {
    write_csv(fs::File::create(path)?, rows)
}

/// Long table before indexing, as produced by the reshape step.
pub fn write_long_table<W: Write>(writer: W, observations: &[Observation]) -> ReportResult<()> {
    let rows: Vec<LongRow> = observations
        .iter()
        .map(|o| LongRow {
            region_code: &o.location.region_code,
            region_name: &o.location.region_name,
            code: &o.location.code,
            name: &o.location.name,
            date: o.date,
            price: o.price,
        })
        .collect();
    write_csv(writer, &rows)
}

/// Pretty-printed JSON file.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> ReportResult<()> {
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}
