//! Error types for the house-price clustering pipeline.
//!
//! One error enum per pipeline stage:
//!
//! - [`IngestError`] - Spreadsheet and CSV reading errors
//! - [`ReshapeError`] - Wide-to-long reshaping, date filtering, indexing
//! - [`ClusterError`] - Feature matrix and clustering library errors
//! - [`IntegrityError`] - Data-integrity check violations
//! - [`GeoError`] - Boundary loading and map rendering errors
//! - [`ReportError`] - Chart rendering and export errors
//! - [`PipelineError`] - Top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across stage boundaries.

use thiserror::Error;

// =============================================================================
// Ingest Errors
// =============================================================================

/// Errors while reading the source spreadsheet.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// Workbook could not be opened or decoded.
    #[error("Workbook error: {0}")]
    Workbook(String),

    /// Requested sheet is not in the workbook.
    #[error("Sheet '{sheet}' not found (available: {available})")]
    MissingSheet { sheet: String, available: String },

    /// Invalid CSV content.
    #[error("Invalid CSV at line {line}: {message}")]
    Csv { line: usize, message: String },

    /// Nothing left after skipping the header offset.
    #[error("Table is empty after skipping {0} rows")]
    EmptyTable(usize),

    /// Not enough columns for four identifiers plus one period.
    #[error("Expected at least 5 columns (4 identifiers + periods), found {0}")]
    TooFewColumns(usize),
}

// =============================================================================
// Reshape Errors
// =============================================================================

/// Errors while reshaping, filtering, or indexing observations.
#[derive(Debug, Error)]
pub enum ReshapeError {
    /// A period header could not be parsed as a date.
    #[error("Column {column} header '{header}' is not a recognised period")]
    BadPeriod { column: usize, header: String },

    /// A price cell is neither numeric nor a missing-value marker.
    #[error("Row {row}, column '{column}': '{value}' is not a price")]
    BadPrice { row: usize, column: String, value: String },

    /// The same (local authority, date) appears twice.
    #[error("Duplicate observation for {code} at {date}")]
    DuplicateObservation { code: String, date: String },

    /// A row has no local-authority code.
    #[error("Row {0} has an empty local-authority code")]
    MissingCode(usize),

    /// Date window removed every observation of a location.
    #[error("{count} local authorities have no observations in the date window (first: {first})")]
    EmptyWindow { count: usize, first: String },

    /// Baseline price cannot be used as a divisor.
    #[error("Baseline price for {code} at {date} is not positive: {price}")]
    BadBaseline { code: String, date: String, price: f64 },

    /// No observations at all.
    #[error("No observations to process")]
    NoObservations,
}

// =============================================================================
// Clustering Errors
// =============================================================================

/// Errors while building the feature matrix or clustering it.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Matrix has no rows or no columns.
    #[error("Feature matrix is empty")]
    EmptyMatrix,

    /// A location is missing values for some dates.
    #[error("{code} has no value for {missing} date(s), first {first_missing}")]
    IncompleteRow { code: String, missing: usize, first_missing: String },

    /// Requested cluster count is out of range.
    #[error("Cannot form {k} clusters from {rows} locations")]
    InvalidK { k: usize, rows: usize },

    /// The k-means library call failed.
    #[error("k-means failed: {0}")]
    KMeans(String),

    /// Fewer distinct trajectories than requested clusters.
    #[error("Cannot form {k} clusters: only {distinct} distinct trajectories")]
    TooFewDistinct { k: usize, distinct: usize },
}

// =============================================================================
// Integrity Errors
// =============================================================================

/// Violations of the pipeline's data-integrity properties.
#[derive(Debug, Error)]
pub enum IntegrityError {
    /// Index at baseline differs from 100.
    #[error("{code}: index at baseline {date} is {value}, expected 100")]
    Baseline { code: String, date: String, value: f64 },

    /// Distinct location count changed between stages.
    #[error("Location count changed at {stage}: expected {expected}, found {actual}")]
    LocationCount { stage: String, expected: usize, actual: usize },

    /// Matrix row contains a missing value.
    #[error("Row {code} of the clustering matrix has missing values")]
    IncompleteRow { code: String },

    /// Wrong number of distinct labels.
    #[error("{algorithm} produced {actual} distinct labels, expected {expected}")]
    LabelCount { algorithm: String, expected: usize, actual: usize },
}

// =============================================================================
// Geo Errors
// =============================================================================

/// Errors while loading boundaries or rendering the map.
#[derive(Debug, Error)]
pub enum GeoError {
    /// IO error.
    #[error("Boundary IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("Boundary JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Document is not a FeatureCollection.
    #[error("Boundary file is not a GeoJSON FeatureCollection")]
    NotFeatureCollection,

    /// No feature carries the code property.
    #[error("No feature has a '{0}' property")]
    MissingCodeField(String),
}

// =============================================================================
// Report Errors
// =============================================================================

/// Errors while rendering charts or writing exports.
#[derive(Debug, Error)]
pub enum ReportError {
    /// IO error.
    #[error("Report IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Chart backend error.
    #[error("Chart rendering failed: {0}")]
    Render(String),

    /// CSV writer error.
    #[error("CSV export error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON error.
    #[error("JSON export error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the error type returned by [`crate::transform::pipeline::run`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Ingest error.
    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    /// Reshape error.
    #[error("Reshape error: {0}")]
    Reshape(#[from] ReshapeError),

    /// Clustering error.
    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    /// Integrity violation.
    #[error("Integrity check failed: {0}")]
    Integrity(#[from] IntegrityError),

    /// Boundary or map error.
    #[error("Map error: {0}")]
    Geo(#[from] GeoError),

    /// Chart or export error.
    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    /// Options file could not be read.
    #[error("Invalid options: {0}")]
    Options(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for ingest operations.
pub type IngestResult<T> = Result<T, IngestError>;

/// Result type for reshape operations.
pub type ReshapeResult<T> = Result<T, ReshapeError>;

/// Result type for clustering operations.
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Result type for integrity checks.
pub type IntegrityResult<T> = Result<T, IntegrityError>;

/// Result type for geo operations.
pub type GeoResult<T> = Result<T, GeoError>;

/// Result type for report operations.
pub type ReportResult<T> = Result<T, ReportError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // IngestError -> PipelineError
        let ingest_err = IngestError::EmptyTable(6);
        let pipeline_err: PipelineError = ingest_err.into();
        assert!(pipeline_err.to_string().contains("empty"));

        // ClusterError -> PipelineError
        let cluster_err = ClusterError::InvalidK { k: 5, rows: 3 };
        let pipeline_err: PipelineError = cluster_err.into();
        assert!(pipeline_err.to_string().contains("5 clusters"));
    }

    #[test]
    fn test_reshape_error_format() {
        let err = ReshapeError::BadPrice {
            row: 12,
            column: "Year ending Mar 1996".into(),
            value: "n/a".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Row 12"));
        assert!(msg.contains("Year ending Mar 1996"));
        assert!(msg.contains("'n/a'"));
    }
}
