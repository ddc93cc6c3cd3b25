//! # houseprice - Clustering local authorities by house-price growth
//!
//! Reads the median price paid by local authority (a wide spreadsheet, one
//! column per reporting period), indexes each location's prices against its
//! own baseline, and groups local authorities with similar growth using
//! k-means and hierarchical clustering.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌─────────────┐   ┌─────────────┐   ┌─────────────┐
//! │ Spreadsheet │──▶│   Reshape   │──▶│ Index/Pivot │──▶│   Cluster   │──▶│ Charts, map │
//! │ (xlsx/CSV)  │   │ wide → long │   │  LA × date  │   │ k-means, HC │   │ CSV, JSON   │
//! └─────────────┘   └─────────────┘   └─────────────┘   └─────────────┘   └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use houseprice::{run, AnalysisOptions};
//!
//! let result = run(&AnalysisOptions {
//!     input: Some("prices.xlsx".into()),
//!     k: 5,
//!     ..Default::default()
//! })?;
//! println!("{:?}", result.summary.profiles);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per stage
//! - [`logs`] - Log broadcaster
//! - [`models`] - Locations, observations, assignments
//! - [`parser`] - Workbook and CSV ingest with auto-detection
//! - [`transform`] - Reshape, index, pivot, join, and pipeline
//! - [`cluster`] - k-means and hierarchical clustering
//! - [`validation`] - Integrity checks between stages
//! - [`geo`] - Boundary join and choropleth maps
//! - [`report`] - SVG charts and exports

// Core modules
pub mod error;
pub mod logs;
pub mod models;

// Ingest
pub mod parser;

// Transformation
pub mod transform;

// Clustering
pub mod cluster;

// Validation
pub mod validation;

// Output
pub mod geo;
pub mod report;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ClusterError,
    GeoError,
    IngestError,
    IntegrityError,
    PipelineError,
    PipelineResult,
    ReportError,
    ReshapeError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    Algorithm,
    ClusterAssignment,
    FeatureKind,
    IndexedObservation,
    Linkage,
    Location,
    Observation,
};

// =============================================================================
// Re-exports - Ingest
// =============================================================================

pub use parser::{
    read_table,
    read_csv,
    read_xlsx,
    parse_bytes_auto,
    detect_encoding,
    detect_delimiter,
    decode_content,
    SourceSpec,
    WideTable,
    DEFAULT_SHEET,
    DEFAULT_SKIP_ROWS,
};

// =============================================================================
// Re-exports - Transform
// =============================================================================

pub use transform::{
    attach_labels,
    cluster_profiles,
    filter_dates,
    parse_period,
    price_index,
    wide_to_long,
    ClusterProfile,
    ClusteredObservation,
    FeatureMatrix,
    MissingPolicy,
};

// =============================================================================
// Re-exports - Clustering
// =============================================================================

pub use cluster::{assign_hierarchical, assign_kmeans, elbow, ElbowPoint};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    analyze_table,
    prepare_matrix,
    run,
    write_outputs,
    Analysis,
    AnalysisOptions,
    AnalysisResult,
    Prepared,
    StageCounts,
    Summary,
};
